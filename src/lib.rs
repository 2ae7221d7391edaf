pub mod api;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod coordination;
pub mod error;
pub mod monitoring;
pub mod security;
pub mod substrate;
pub mod tools;
pub mod validation;

use crate::collaborators::model::HttpModelClient;
use crate::config::Config;
use crate::coordination::models::AgentCard;
use crate::coordination::{AgentRegistry, LivenessMonitor, LockManager, Orchestrator, TaskQueue};
use crate::error::{ForgeError, Result};
use crate::monitoring::Metrics;
use crate::substrate::embedded::EmbeddedSubstrate;
use crate::substrate::nats::NatsSubstrate;
use crate::substrate::Substrate;
use crate::tools::lsp::manager::LanguageServerManager;
use crate::tools::shell::jit_install::JitInstaller;
use crate::tools::{ToolContext, ToolRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The runtime shell inside one agent process: wires the coordination
/// layer and tool-execution layer onto a single substrate connection.
/// Cyclic ownership (monitor <-> node) is broken by construction order:
/// the node owns the monitor; the monitor only ever receives the node's
/// subsystem handles by reference at construction (§9 design notes).
pub struct Node {
    pub agent_id: String,
    pub substrate: Arc<dyn Substrate>,
    pub agents: Arc<AgentRegistry>,
    pub tasks: Arc<TaskQueue>,
    pub locks: Arc<LockManager>,
    pub orchestrator: Arc<Orchestrator>,
    pub monitor: Arc<LivenessMonitor>,
    pub metrics: Arc<Metrics>,
    pub tool_ctx: ToolContext,
    cancel: CancellationToken,
}

impl Node {
    /// Connects the substrate first; every other subsystem is cheap and
    /// infallible to build, so a failure here is the only thing that
    /// needs unwind-on-partial-init handling (§7: `Fatal` tears down
    /// everything allocated so far — here, nothing has been allocated yet).
    pub async fn start(config: Config) -> Result<Self> {
        let substrate: Arc<dyn Substrate> = if config.substrate.embedded {
            let storage_dir = config.substrate.storage_dir.as_ref().map(std::path::PathBuf::from);
            Arc::new(EmbeddedSubstrate::new(storage_dir)?)
        } else {
            let url = config
                .substrate
                .url
                .as_ref()
                .ok_or_else(|| ForgeError::Fatal("substrate.url required for networked mode".to_string()))?;
            Arc::new(NatsSubstrate::connect(url).await?)
        };

        let agent_id = Uuid::new_v4().to_string();
        let metrics = Metrics::new();
        let agents = Arc::new(AgentRegistry::new(substrate.clone()));
        let tasks = Arc::new(TaskQueue::with_metrics(substrate.clone(), metrics.clone()));
        let locks = Arc::new(LockManager::new(substrate.clone()));
        let orchestrator = Arc::new(Orchestrator::new(agent_id.clone(), tasks.clone()));
        let monitor = Arc::new(LivenessMonitor::with_metrics(
            substrate.clone(),
            agents.clone(),
            tasks.clone(),
            locks.clone(),
            orchestrator.clone(),
            metrics.clone(),
        ));

        let model_client = Arc::new(HttpModelClient::new(&config.model));
        let jit_installer = Arc::new(JitInstaller::new(&config.jit_install, Some(model_client.clone())));
        let lsp_manager = Arc::new(LanguageServerManager::new());
        let workdir = tools::workdir::WorkdirHandle::new(std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_else(|_| "/".to_string()));
        let subagent = Arc::new(crate::collaborators::SubagentTool::new(model_client));

        let tool_ctx = ToolContext {
            workdir,
            config: Arc::new(config.clone()),
            jit_installer,
            lsp_manager,
            subagent,
            keyword_search: None,
            metrics: Some(metrics.clone()),
            agent_name: config.node.agent_name.clone(),
        };

        let card = AgentCard::new(agent_id.clone(), config.node.agent_name.clone(), config.node.capabilities.clone());
        agents.register(card).await?;

        Ok(Self {
            agent_id,
            substrate,
            agents,
            tasks,
            locks,
            orchestrator,
            monitor,
            metrics,
            tool_ctx,
            cancel: CancellationToken::new(),
        })
    }

    /// Runs the liveness monitor and metrics logger until `shutdown` is
    /// called. Meant to be spawned and awaited alongside the HTTP server.
    pub async fn run_background_loops(&self) {
        let monitor = self.monitor.clone();
        let metrics = self.metrics.clone();
        let cancel = self.cancel.clone();
        tokio::join!(
            monitor.run(cancel.clone()),
            metrics.run_logger(cancel),
        );
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tool_ctx.lsp_manager.shutdown_all().await;
        let _ = self.agents.deregister(&self.agent_id).await;
    }

    pub async fn run_tool(&self, name: &str, input: serde_json::Value) -> Result<tools::ToolOutput> {
        ToolRegistry::run(&self.tool_ctx, name, input).await
    }
}
