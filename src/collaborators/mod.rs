//! External collaborator adapters (§6, SPEC_FULL §4.M). Interfaces only:
//! the contract shape a model/search/browser collaborator must satisfy,
//! implemented just deep enough to back the JIT installer and the
//! `subagent` tool.

pub mod model;
pub mod search;
pub mod subagent;

pub use model::ModelClient;
pub use search::{BrowserAutomationClient, KeywordSearchClient};
pub use subagent::SubagentTool;
