//! E2E-4 (large output spill) and E2E-5 (background lifecycle) against
//! the real `bash` executor.

use forgemesh_core::collaborators::model::HttpModelClient;
use forgemesh_core::collaborators::SubagentTool;
use forgemesh_core::config::{ApiConfig, Config, JitInstallConfig, ModelConfig, NodeConfig, ShellConfig, SubstrateConfig};
use forgemesh_core::tools::lsp::manager::LanguageServerManager;
use forgemesh_core::tools::shell::jit_install::JitInstaller;
use forgemesh_core::tools::workdir::WorkdirHandle;
use forgemesh_core::tools::{ToolContext, ToolRegistry};
use std::sync::Arc;

fn test_ctx() -> ToolContext {
    let config = Config {
        node: NodeConfig { agent_name: "test-agent".into(), capabilities: vec![], repo: None, branch: None },
        substrate: SubstrateConfig { embedded: true, url: None, storage_dir: None },
        shell: ShellConfig { git_commit_coauthor_trailer: false, conversation_id: None },
        jit_install: JitInstallConfig { enabled: false, package_manager_override: None },
        model: ModelConfig { api_key: "x".repeat(40), base_url: "https://example.invalid".into(), model: "test".into(), max_tokens: 16 },
        api: ApiConfig { host: "127.0.0.1".into(), port: 0, bearer_token: None },
    };
    let model_client = Arc::new(HttpModelClient::new(&config.model));
    ToolContext {
        workdir: WorkdirHandle::new("/tmp"),
        config: Arc::new(config.clone()),
        jit_installer: Arc::new(JitInstaller::new(&config.jit_install, None)),
        lsp_manager: Arc::new(LanguageServerManager::new()),
        subagent: Arc::new(SubagentTool::new(model_client)),
        keyword_search: None,
        metrics: None,
        agent_name: "test-agent".to_string(),
    }
}

#[tokio::test]
async fn e2e_4_large_output_spill() {
    let ctx = test_ctx();
    let command = "for i in $(seq 1 1500); do printf '%060d\\n' $i; done";
    let output = ToolRegistry::run(&ctx, "bash", serde_json::json!({"command": command}))
        .await
        .unwrap();
    let text = match &output.content[0] {
        forgemesh_core::tools::ToolContent::Text { text } => text.clone(),
        _ => panic!("expected text content"),
    };
    assert!(text.starts_with("[output too large"));
    assert!(text.contains("First lines:"));
    assert!(text.contains("Last lines:"));
    assert!(text.contains("saved to:"));
}

#[tokio::test]
async fn e2e_5_background_lifecycle() {
    let ctx = test_ctx();
    let started = std::time::Instant::now();
    let output = ToolRegistry::run(
        &ctx,
        "bash",
        serde_json::json!({"command": "sleep 0.1 && echo done", "background": true}),
    )
    .await
    .unwrap();
    assert!(started.elapsed() < std::time::Duration::from_millis(500));

    let text = match &output.content[0] {
        forgemesh_core::tools::ToolContent::Text { text } => text.clone(),
        _ => panic!("expected text content"),
    };
    let path = text.split("output: ").nth(1).unwrap().trim().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(contents.trim_end().ends_with("[background process completed]"));
}
