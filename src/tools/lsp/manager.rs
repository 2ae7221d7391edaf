//! Component K lifecycle: one live server per name, started on first
//! matching query, restarted when the repository root changes. Each
//! server's pending-response table is mutex-protected; server-initiated
//! messages without an id are notifications (diagnostics, stored per
//! URI) (§4.K, §5).

use super::catalog::{self, ServerConfig};
use super::protocol;
use crate::constants::LSP_SHUTDOWN_TIMEOUT_SECS;
use crate::error::{ForgeError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::Duration;

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type DiagnosticsTable = Arc<Mutex<HashMap<String, Value>>>;

pub struct LiveServer {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    root_uri: String,
    next_id: AtomicU64,
    pending: PendingTable,
    doc_versions: Mutex<HashMap<String, i32>>,
    diagnostics: DiagnosticsTable,
}

pub struct LanguageServerManager {
    servers: RwLock<HashMap<String, Arc<LiveServer>>>,
}

impl Default for LanguageServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageServerManager {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn server_for(&self, extension: &str, root_uri: &str) -> Result<Arc<LiveServer>> {
        let config = catalog::for_extension(extension)
            .ok_or_else(|| ForgeError::invalid(format!("no language server registered for .{extension}")))?;

        if which::which(config.command).is_err() {
            return Err(ForgeError::not_found(format!(
                "{} not found on PATH. {}",
                config.command, config.install_hint
            )));
        }

        {
            let servers = self.servers.read().await;
            if let Some(existing) = servers.get(config.name) {
                if existing.root_uri == root_uri {
                    return Ok(existing.clone());
                }
            }
        }

        // Either no server yet, or the root changed: shut down whatever
        // was registered under this name and start fresh.
        if let Some(old) = self.servers.write().await.remove(config.name) {
            let _ = Self::shutdown_server(&old).await;
        }

        let server = Arc::new(Self::start_server(config, root_uri).await?);
        self.servers
            .write()
            .await
            .insert(config.name.to_string(), server.clone());
        Ok(server)
    }

    async fn start_server(config: &ServerConfig, root_uri: &str) -> Result<LiveServer> {
        let mut child = tokio::process::Command::new(config.command)
            .args(config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ForgeError::ProcessFailure(format!("failed to start {}: {e}", config.command)))?;

        let stdin = child.stdin.take().expect("stdin piped");
        let stdout = child.stdout.take().expect("stdout piped");

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let diagnostics: DiagnosticsTable = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(Self::reader_loop(stdout, pending.clone(), diagnostics.clone()));

        Ok(LiveServer {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            root_uri: root_uri.to_string(),
            next_id: AtomicU64::new(1),
            pending,
            doc_versions: Mutex::new(HashMap::new()),
            diagnostics,
        })
    }

    /// Reads frames until the subprocess closes its stdout. Responses
    /// (messages carrying `id` that match a pending call) resolve the
    /// waiting oneshot; everything else is a server-initiated notification
    /// — `textDocument/publishDiagnostics` is stored per URI, anything
    /// else is dropped.
    async fn reader_loop(
        stdout: tokio::process::ChildStdout,
        pending: PendingTable,
        diagnostics: DiagnosticsTable,
    ) {
        let mut reader = BufReader::new(stdout);
        loop {
            let message = match protocol::read_message(&mut reader).await {
                Ok(Some(message)) => message,
                Ok(None) | Err(_) => return,
            };

            if let Some(id) = message.get("id").and_then(|v| v.as_u64()) {
                if let Some(sender) = pending.lock().await.remove(&id) {
                    let _ = sender.send(message);
                    continue;
                }
            }

            if message.get("method").and_then(|m| m.as_str()) == Some("textDocument/publishDiagnostics") {
                if let Some(params) = message.get("params") {
                    if let Some(uri) = params.get("uri").and_then(|u| u.as_str()) {
                        diagnostics.lock().await.insert(uri.to_string(), params.clone());
                    }
                }
            }
        }
    }

    pub async fn shutdown_server(server: &LiveServer) -> Result<()> {
        let id = server.next_id.fetch_add(1, Ordering::SeqCst);
        let request = protocol::request(id, "shutdown", Value::Null);
        {
            let mut stdin = server.stdin.lock().await;
            let _ = tokio::time::timeout(
                Duration::from_secs(LSP_SHUTDOWN_TIMEOUT_SECS),
                protocol::write_message(&mut *stdin, &request),
            )
            .await;
            let exit = protocol::notification("exit", Value::Null);
            let _ = protocol::write_message(&mut *stdin, &exit).await;
            let _ = stdin.shutdown().await;
        }
        let mut child = server.child.lock().await;
        if tokio::time::timeout(Duration::from_secs(LSP_SHUTDOWN_TIMEOUT_SECS), child.wait())
            .await
            .is_err()
        {
            let _ = child.kill().await;
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) {
        let servers = self.servers.write().await;
        for server in servers.values() {
            let _ = Self::shutdown_server(server).await;
        }
    }
}

impl LiveServer {
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = protocol::request(id, method, params);
        {
            let mut stdin = self.stdin.lock().await;
            protocol::write_message(&mut *stdin, &request).await?;
        }

        match rx.await {
            Ok(value) => Ok(value),
            Err(_) => Err(ForgeError::ServerClosed(format!("{method} response channel closed"))),
        }
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let notification = protocol::notification(method, params);
        let mut stdin = self.stdin.lock().await;
        protocol::write_message(&mut *stdin, &notification).await
    }

    /// Ensures the document is open (version 1) or bumps its version with
    /// a `didChange`, per the first-touch/subsequent-touch contract.
    pub async fn touch_document(&self, uri: &str, content: &str, language_id: &str) -> Result<()> {
        let mut versions = self.doc_versions.lock().await;
        match versions.get_mut(uri) {
            None => {
                versions.insert(uri.to_string(), 1);
                drop(versions);
                self.notify(
                    "textDocument/didOpen",
                    serde_json::json!({
                        "textDocument": {
                            "uri": uri,
                            "languageId": language_id,
                            "version": 1,
                            "text": content,
                        }
                    }),
                )
                .await
            }
            Some(version) => {
                *version += 1;
                let new_version = *version;
                drop(versions);
                self.notify(
                    "textDocument/didChange",
                    serde_json::json!({
                        "textDocument": {"uri": uri, "version": new_version},
                        "contentChanges": [{"text": content}],
                    }),
                )
                .await
            }
        }
    }

    pub async fn close_document(&self, uri: &str) -> Result<()> {
        self.doc_versions.lock().await.remove(uri);
        self.notify(
            "textDocument/didClose",
            serde_json::json!({"textDocument": {"uri": uri}}),
        )
        .await
    }

    pub async fn diagnostics_for(&self, uri: &str) -> Option<Value> {
        self.diagnostics.lock().await.get(uri).cloned()
    }
}

/// Falls back to a plain `file://` concatenation if `path` isn't absolute
/// (`Url::from_file_path` requires it) — callers always pass an
/// already-canonicalized path, but the fallback keeps this infallible.
pub fn file_uri(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}
