//! Cycle engine — the live guard and the stage orchestrator.

pub mod guard;
pub mod orchestrator;

pub use orchestrator::RunCycleOrchestrator;
