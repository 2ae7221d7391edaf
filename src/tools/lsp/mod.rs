//! Component K: code-intelligence tool. Dispatches `definition`,
//! `references`, `hover`, `workspace/symbol` queries over the
//! length-prefixed JSON-RPC transport (§4.K, §6).

pub mod catalog;
pub mod manager;
pub mod protocol;

use super::{ToolContext, ToolOutput};
use crate::error::{ForgeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct Input {
    operation: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    query: Option<String>,
}

async fn repository_root(cwd: &str) -> String {
    match tokio::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(cwd)
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => cwd.to_string(),
    }
}

fn language_id(extension: &str) -> &'static str {
    match extension {
        "go" => "go",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "rs" => "rust",
        _ => "plaintext",
    }
}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input)
        .map_err(|e| ForgeError::invalid(format!("code_intelligence: {e}")))?;

    let cwd = ctx.workdir.get();
    let root = repository_root(&cwd).await;
    let root_uri = manager::file_uri(Path::new(&root));

    match input.operation.as_str() {
        "definition" => query_position(ctx, &input, &cwd, &root_uri, "textDocument/definition").await,
        "references" => {
            query_position_with(ctx, &input, &cwd, &root_uri, "textDocument/references", |pos, params| {
                params["context"] = serde_json::json!({"includeDeclaration": true});
                let _ = pos;
            })
            .await
        }
        "hover" => query_position(ctx, &input, &cwd, &root_uri, "textDocument/hover").await,
        "symbols" => {
            let query = input.query.clone().unwrap_or_default();
            let file = input
                .file
                .as_ref()
                .ok_or_else(|| ForgeError::invalid("symbols requires a file to resolve the server"))?;
            let extension = extension_of(file)?;
            let server = ctx.lsp_manager.server_for(extension, &root_uri).await?;
            let result = server
                .call("workspace/symbol", serde_json::json!({"query": query}))
                .await?;
            Ok(ToolOutput::ok(serde_json::to_string_pretty(&result)?))
        }
        other => Err(ForgeError::invalid(format!("unknown code_intelligence operation: {other}"))),
    }
}

fn extension_of(file: &str) -> Result<&str> {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ForgeError::invalid(format!("{file} has no file extension")))
}

async fn query_position(ctx: &ToolContext, input: &Input, cwd: &str, root_uri: &str, method: &str) -> Result<ToolOutput> {
    query_position_with(ctx, input, cwd, root_uri, method, |_, _| {}).await
}

async fn query_position_with(
    ctx: &ToolContext,
    input: &Input,
    cwd: &str,
    root_uri: &str,
    method: &str,
    extend: impl FnOnce(&serde_json::Value, &mut serde_json::Value),
) -> Result<ToolOutput> {
    let file = input
        .file
        .as_ref()
        .ok_or_else(|| ForgeError::invalid(format!("{method} requires a file")))?;
    let line = input
        .line
        .ok_or_else(|| ForgeError::invalid(format!("{method} requires a line")))?;
    let column = input
        .column
        .ok_or_else(|| ForgeError::invalid(format!("{method} requires a column")))?;

    let extension = extension_of(file)?;
    let server = ctx.lsp_manager.server_for(extension, root_uri).await?;

    let path = resolve_path(cwd, file);
    let uri = manager::file_uri(&path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| ForgeError::not_found(format!("{} does not exist", path.display())))?;
    server.touch_document(&uri, &content, language_id(extension)).await?;

    // Positions arrive 1-based (human-readable); LSP wants 0-based.
    let position = serde_json::json!({"line": line.saturating_sub(1), "character": column.saturating_sub(1)});
    let mut params = serde_json::json!({
        "textDocument": {"uri": uri},
        "position": position,
    });
    extend(&position, &mut params);

    let result = server.call(method, params).await?;
    Ok(ToolOutput::ok(serde_json::to_string_pretty(&result)?))
}

fn resolve_path(cwd: &str, file: &str) -> PathBuf {
    let candidate = Path::new(file);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        Path::new(cwd).join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_rejects_extensionless_paths() {
        assert!(extension_of("Makefile").is_err());
        assert_eq!(extension_of("main.rs").unwrap(), "rs");
    }

    #[test]
    fn language_id_covers_the_default_catalog() {
        assert_eq!(language_id("rs"), "rust");
        assert_eq!(language_id("go"), "go");
        assert_eq!(language_id("cobol"), "plaintext");
    }
}
