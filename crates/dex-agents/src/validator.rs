use dex_types::ExecutionPlan;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Structural soundness check: non-empty, acyclic, no dangling
/// dependencies, and (as a warning only) steps listed in a dependency
/// order consistent with their `order` field.
pub struct PlanValidator;

impl PlanValidator {
    pub fn validate(plan: &ExecutionPlan) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if plan.steps.is_empty() {
            errors.push("Plan has no execution steps".to_string());
            return ValidationOutcome { errors, warnings };
        }

        if Self::has_circular_dependency(plan) {
            errors.push("Plan has circular step dependencies".to_string());
            return ValidationOutcome { errors, warnings };
        }

        let step_ids: HashSet<Uuid> = plan.steps.iter().map(|s| s.id).collect();
        for step in &plan.steps {
            for dep in &step.depends_on {
                if !step_ids.contains(dep) {
                    errors.push(format!("Step {} depends on undefined step {}", step.id, dep));
                }
            }
        }

        warnings.extend(Self::check_ordering(plan));

        ValidationOutcome { errors, warnings }
    }

    fn has_circular_dependency(plan: &ExecutionPlan) -> bool {
        let by_id: HashMap<Uuid, &[Uuid]> = plan.steps.iter().map(|s| (s.id, s.depends_on.as_slice())).collect();

        let mut visited = HashSet::new();
        for step in &plan.steps {
            let mut rec_stack = HashSet::new();
            if Self::dfs_has_cycle(step.id, &by_id, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn dfs_has_cycle(
        id: Uuid,
        by_id: &HashMap<Uuid, &[Uuid]>,
        visited: &mut HashSet<Uuid>,
        rec_stack: &mut HashSet<Uuid>,
    ) -> bool {
        if rec_stack.contains(&id) {
            return true;
        }
        if visited.contains(&id) {
            return false;
        }
        visited.insert(id);
        rec_stack.insert(id);

        if let Some(deps) = by_id.get(&id) {
            for dep in deps.iter() {
                if Self::dfs_has_cycle(*dep, by_id, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(&id);
        false
    }

    /// A step whose list position is not after every one of its
    /// dependencies' positions is a warning, not a rejection: the executor
    /// still honors `depends_on` regardless of list order.
    fn check_ordering(plan: &ExecutionPlan) -> Vec<String> {
        let position: HashMap<Uuid, usize> = plan.steps.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let mut warnings = Vec::new();
        for (i, step) in plan.steps.iter().enumerate() {
            for dep in &step.depends_on {
                if let Some(&dep_pos) = position.get(dep) {
                    if dep_pos >= i {
                        warnings.push(format!(
                            "Step {} is listed before its dependency {}",
                            step.id, dep
                        ));
                    }
                }
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_types::PlanStep;

    fn plan_from(steps: Vec<PlanStep>) -> ExecutionPlan {
        ExecutionPlan::new(Uuid::new_v4(), steps, "test", "test")
    }

    #[test]
    fn empty_plan_is_rejected() {
        let outcome = PlanValidator::validate(&plan_from(vec![]));
        assert!(!outcome.is_valid());
        assert_eq!(outcome.errors[0], "Plan has no execution steps");
    }

    #[test]
    fn circular_dependency_is_rejected_with_exact_message() {
        let mut a = PlanStep::new(1, "a", "note_create");
        let mut b = PlanStep::new(2, "b", "note_create");
        a.depends_on = vec![b.id];
        b.depends_on = vec![a.id];
        let outcome = PlanValidator::validate(&plan_from(vec![a, b]));
        assert!(!outcome.is_valid());
        assert_eq!(outcome.errors[0], "Plan has circular step dependencies");
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut a = PlanStep::new(1, "a", "note_create");
        a.depends_on = vec![Uuid::new_v4()];
        let outcome = PlanValidator::validate(&plan_from(vec![a]));
        assert!(!outcome.is_valid());
    }

    #[test]
    fn out_of_order_dependency_is_a_warning_not_an_error() {
        let a = PlanStep::new(1, "a", "note_create");
        let mut b = PlanStep::new(2, "b", "note_create");
        b.depends_on = vec![a.id];
        // list b before a: still topologically fine because depends_on doesn't
        // require specific list placement for the validator's error path.
        let outcome = PlanValidator::validate(&plan_from(vec![b, a]));
        assert!(outcome.is_valid());
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn well_formed_plan_has_no_errors_or_warnings() {
        let a = PlanStep::new(1, "a", "note_create");
        let mut b = PlanStep::new(2, "b", "note_create");
        b.depends_on = vec![a.id];
        let outcome = PlanValidator::validate(&plan_from(vec![a, b]));
        assert!(outcome.is_valid());
        assert!(outcome.warnings.is_empty());
    }
}
