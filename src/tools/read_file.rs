//! Component J: file reader tool. Resolves relative paths against the
//! working-directory handle, rejects directories/binaries/missing files
//! with distinct error kinds, and returns a line-numbered, paginated view
//! (§4.J).

use super::{ToolContext, ToolOutput};
use crate::constants::{READ_FILE_BINARY_SNIFF_BYTES, READ_FILE_DEFAULT_LIMIT, READ_FILE_DEFAULT_OFFSET, READ_FILE_MAX_LIMIT};
use crate::error::{ForgeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct Input {
    path: String,
    #[serde(default = "default_offset")]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_offset() -> usize {
    READ_FILE_DEFAULT_OFFSET
}

fn default_limit() -> usize {
    READ_FILE_DEFAULT_LIMIT
}

fn resolve(cwd: &str, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        Path::new(cwd).join(candidate)
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(READ_FILE_BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input)
        .map_err(|e| ForgeError::invalid(format!("read_file: {e}")))?;
    let limit = input.limit.min(READ_FILE_MAX_LIMIT);

    let cwd = ctx.workdir.get();
    let resolved = resolve(&cwd, &input.path);

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|_| ForgeError::not_found(format!("{} does not exist", resolved.display())))?;
    if metadata.is_dir() {
        return Err(ForgeError::invalid(format!("{} is a directory", resolved.display())));
    }

    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|e| ForgeError::not_found(format!("{}: {e}", resolved.display())))?;
    if looks_binary(&bytes) {
        return Err(ForgeError::invalid(format!("{} appears to be a binary file", resolved.display())));
    }

    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.strip_suffix('\n').unwrap_or(&text);
    let lines: Vec<&str> = if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('\n').collect()
    };
    let total = lines.len();

    if total == 0 {
        return Ok(ToolOutput::ok(format!("File: {} (0 lines)", input.path)));
    }

    if input.offset > total {
        return Err(ForgeError::invalid(format!(
            "offset {} exceeds file length {total}",
            input.offset
        )));
    }

    let start = input.offset.saturating_sub(1);
    let end = (start + limit).min(total);
    let mut output = format!(
        "File: {} ({total} total lines, showing {}-{end})\n",
        input.path,
        input.offset
    );
    for (i, line) in lines[start..end].iter().enumerate() {
        output.push_str(&format!("{:>6}\t{line}\n", start + i + 1));
    }
    if end < total {
        output.push_str(&format!("... truncated ({} lines remaining)\n", total - end));
    }

    Ok(ToolOutput::ok(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_binary_detects_nul_byte() {
        assert!(looks_binary(b"hello\0world"));
        assert!(!looks_binary(b"hello world"));
    }

    #[test]
    fn resolve_respects_absolute_paths() {
        assert_eq!(resolve("/cwd", "/abs"), PathBuf::from("/abs"));
        assert_eq!(resolve("/cwd", "rel.rs"), PathBuf::from("/cwd/rel.rs"));
    }
}
