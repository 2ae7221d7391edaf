//! Tool-execution layer: components G through L. A tool is a JSON-schema
//! bounded operation over a shared `ToolContext`; the registry is a closed
//! match over tool name, not virtual dispatch, per the tagged-variant
//! design this system uses for dynamic tool calls (§9 design notes).

pub mod change_dir;
pub mod keyword_search;
pub mod lsp;
pub mod read_file;
pub mod shell;
pub mod subagent;
pub mod workdir;

use crate::collaborators::KeywordSearchClient;
use crate::collaborators::SubagentTool;
use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::monitoring::Metrics;
use lsp::manager::LanguageServerManager;
use shell::jit_install::JitInstaller;
use std::sync::Arc;
use workdir::WorkdirHandle;

/// One piece of a tool's output. Mirrors the content-list shape used
/// throughout the system so a tool result slots directly into a model
/// message without conversion (§4.L).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Image { mime_type: String, data: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolContent::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<serde_json::Value>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            display: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            display: None,
            is_error: true,
        }
    }
}

/// Shared handles every tool operates over. Constructed once per node and
/// cloned cheaply (everything inside is an `Arc`).
#[derive(Clone)]
pub struct ToolContext {
    pub workdir: Arc<WorkdirHandle>,
    pub config: Arc<Config>,
    pub jit_installer: Arc<JitInstaller>,
    pub lsp_manager: Arc<LanguageServerManager>,
    pub subagent: Arc<SubagentTool>,
    pub keyword_search: Option<Arc<dyn KeywordSearchClient>>,
    pub metrics: Option<Arc<Metrics>>,
    pub agent_name: String,
}

pub struct ToolRegistry;

impl ToolRegistry {
    pub const NAMES: &'static [&'static str] = &[
        "bash",
        "change_dir",
        "read_file",
        "code_intelligence",
        "keyword_search",
        "subagent",
    ];

    /// Validates that `name` is known, then dispatches. Per-tool input
    /// schema validation happens inside each tool's `run`, via serde's
    /// `Deserialize` failing on a missing required field. `keyword_search`
    /// and `subagent` are named in the tagged-variant dispatch (§9) but
    /// the former has no collaborator implementation in this core (§1) —
    /// it errors clearly rather than being absent from the match.
    pub async fn run(ctx: &ToolContext, name: &str, raw_input: serde_json::Value) -> Result<ToolOutput> {
        match name {
            "bash" => shell::run(ctx, raw_input).await,
            "change_dir" => change_dir::run(ctx, raw_input).await,
            "read_file" => read_file::run(ctx, raw_input).await,
            "code_intelligence" => lsp::run(ctx, raw_input).await,
            "keyword_search" => keyword_search::run(ctx, raw_input).await,
            "subagent" => subagent::run(ctx, raw_input).await,
            other => Err(ForgeError::invalid(format!("unknown tool: {other}"))),
        }
    }
}
