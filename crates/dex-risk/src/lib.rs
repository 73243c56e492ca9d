//! Per-tool risk classification, plan-level aggregation, and the
//! confirmation policy that decides when a human must approve a plan
//! before the executor runs it.

use dex_types::ExecutionPlan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub level: RiskLevel,
    pub score: f64,
    pub reasoning: String,
    pub mitigations: Vec<String>,
}

const HIGH_RISK_TOOLS: &[&str] = &["shell_command"];
const MEDIUM_RISK_TOOLS: &[&str] = &["file_write", "note_create", "reminder_set", "app_launch"];

fn step_score(tool_name: &str) -> f64 {
    if HIGH_RISK_TOOLS.contains(&tool_name) {
        0.9
    } else if MEDIUM_RISK_TOOLS.contains(&tool_name) {
        0.5
    } else {
        0.1
    }
}

fn reasoning_for(level: RiskLevel, tools: &[String]) -> String {
    match level {
        RiskLevel::High => format!(
            "Plan includes high-risk operations ({}) that can make irreversible system changes.",
            tools.join(", ")
        ),
        RiskLevel::Medium => format!(
            "Plan includes moderate-risk operations ({}) that modify local state.",
            tools.join(", ")
        ),
        RiskLevel::Low => "Plan uses only low-risk, read-only or informational operations.".to_string(),
    }
}

fn mitigations_for(level: RiskLevel) -> Vec<String> {
    match level {
        RiskLevel::High => vec![
            "Require explicit user confirmation before execution".to_string(),
            "Log full command and arguments for audit".to_string(),
            "Run with the minimum necessary privileges".to_string(),
        ],
        RiskLevel::Medium => vec![
            "Confirm destination paths and content before writing".to_string(),
            "Log the operation for later review".to_string(),
        ],
        RiskLevel::Low => vec!["No additional mitigation required".to_string()],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    Strict,
    #[default]
    Balanced,
    Permissive,
}

/// Scores plans and decides whether a human confirmation gate applies.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    pub mode: ConfirmationMode,
}

impl RiskEngine {
    pub fn new(mode: ConfirmationMode) -> Self {
        Self { mode }
    }

    /// An empty plan carries no risk by definition.
    pub fn evaluate_plan(&self, plan: &ExecutionPlan) -> RiskScore {
        if plan.steps.is_empty() {
            return RiskScore {
                level: RiskLevel::Low,
                score: 0.0,
                reasoning: "Empty plan".to_string(),
                mitigations: Vec::new(),
            };
        }

        let mut score: f64 = 0.0;
        let mut risky_tools = Vec::new();
        for step in &plan.steps {
            let s = step_score(&step.tool_name);
            if s > score {
                score = s;
            }
            if s >= 0.5 && !risky_tools.contains(&step.tool_name) {
                risky_tools.push(step.tool_name.clone());
            }
        }

        let level = RiskLevel::from_score(score);
        RiskScore {
            reasoning: reasoning_for(level, &risky_tools),
            mitigations: mitigations_for(level),
            level,
            score,
        }
    }

    pub fn requires_confirmation(&self, risk: &RiskScore) -> bool {
        match self.mode {
            ConfirmationMode::Strict => risk.level != RiskLevel::Low,
            ConfirmationMode::Balanced => risk.level == RiskLevel::High,
            ConfirmationMode::Permissive => risk.level == RiskLevel::High && risk.score > 0.95,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_types::PlanStep;
    use uuid::Uuid;

    fn plan_with(tool_names: &[&str]) -> ExecutionPlan {
        let steps = tool_names
            .iter()
            .enumerate()
            .map(|(i, name)| PlanStep::new(i as u32 + 1, "step", *name))
            .collect();
        ExecutionPlan::new(Uuid::new_v4(), steps, "test", "test")
    }

    #[test]
    fn empty_plan_is_low_risk() {
        let engine = RiskEngine::default();
        let risk = engine.evaluate_plan(&plan_with(&[]));
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(risk.score, 0.0);
    }

    #[test]
    fn shell_command_is_high_risk() {
        let engine = RiskEngine::default();
        let risk = engine.evaluate_plan(&plan_with(&["shell_command"]));
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn risk_is_monotone_non_decreasing_when_adding_steps() {
        let engine = RiskEngine::default();
        let base = engine.evaluate_plan(&plan_with(&["note_list"]));
        let extended = engine.evaluate_plan(&plan_with(&["note_list", "shell_command"]));
        assert!(extended.score >= base.score);
    }

    #[test]
    fn balanced_mode_only_confirms_high() {
        let engine = RiskEngine::new(ConfirmationMode::Balanced);
        let medium = engine.evaluate_plan(&plan_with(&["file_write"]));
        let high = engine.evaluate_plan(&plan_with(&["shell_command"]));
        assert!(!engine.requires_confirmation(&medium));
        assert!(engine.requires_confirmation(&high));
    }

    #[test]
    fn strict_mode_confirms_anything_above_low() {
        let engine = RiskEngine::new(ConfirmationMode::Strict);
        let medium = engine.evaluate_plan(&plan_with(&["file_write"]));
        assert!(engine.requires_confirmation(&medium));
    }

    #[test]
    fn permissive_mode_needs_very_high_score() {
        let engine = RiskEngine::new(ConfirmationMode::Permissive);
        let high = engine.evaluate_plan(&plan_with(&["shell_command"]));
        assert!(!engine.requires_confirmation(&high));
    }
}
