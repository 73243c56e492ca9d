//! Planner, executor and verifier agents, wired onto a shared
//! [`dex_bus::MessageBus`], plus the plan validator and state manager that
//! back them. Agents never hold references to each other; the bus is the
//! only edge between them.

mod executor;
mod planner;
mod state;
mod validator;
mod verifier;

pub use executor::ExecutorAgent;
pub use planner::{PlannerAgent, PlanningBackend, RuleBasedPlanner};
pub use state::StateManager;
pub use validator::{PlanValidator, ValidationOutcome};
pub use verifier::VerifierAgent;

use dex_bus::{BusConfig, MessageBus};
use dex_memory::MemoryStore;
use dex_risk::RiskEngine;
use dex_telemetry::TelemetrySink;
use dex_tools::ToolRegistry;
use std::sync::Arc;

/// Owns the shared bus and the three agents, and subscribes each to its
/// message type. Dropping this does not tear down the bus (agents keep an
/// `Arc` to it); call nothing further is required to stop it beyond
/// letting it go out of scope, since there is no background task owned
/// directly by the system itself.
pub struct AgentSystem {
    pub bus: MessageBus,
    pub planner: Arc<PlannerAgent>,
    pub executor: Arc<ExecutorAgent>,
    pub verifier: Arc<VerifierAgent>,
    pub state: StateManager,
}

impl AgentSystem {
    /// Builds the pipeline and subscribes every agent to the bus. `memory`
    /// enables memory-assisted planning; `telemetry` enables tool-call and
    /// latency events from the executor.
    pub async fn start(
        registry: ToolRegistry,
        risk_engine: RiskEngine,
        memory: Option<Arc<MemoryStore>>,
        telemetry: Option<Arc<TelemetrySink>>,
    ) -> Self {
        let bus = MessageBus::new(BusConfig::default());
        let state = StateManager::new();

        let planner = Arc::new(PlannerAgent::new(bus.clone(), risk_engine, memory));
        let executor = Arc::new(ExecutorAgent::new(bus.clone(), registry, state.clone(), telemetry));
        let verifier = Arc::new(VerifierAgent::new(bus.clone()));

        planner.clone().register().await;
        executor.clone().register().await;
        verifier.clone().register().await;

        Self { bus, planner, executor, verifier, state }
    }
}
