//! Coordination layer: components B through F. Everything here is a thin
//! layer over the messaging substrate (`crate::substrate`) — no component
//! holds state the substrate doesn't already have, except the
//! orchestrator's in-memory plan (§3, §4.B-F).

pub mod agent_registry;
pub mod lock_manager;
pub mod models;
pub mod monitor;
pub mod orchestrator;
pub mod task_queue;

pub use agent_registry::AgentRegistry;
pub use lock_manager::LockManager;
pub use monitor::LivenessMonitor;
pub use orchestrator::Orchestrator;
pub use task_queue::TaskQueue;
