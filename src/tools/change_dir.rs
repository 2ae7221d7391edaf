//! Component H: directory-change tool. Resolves the input path against
//! the working-directory handle, rejects files and nonexistent paths, and
//! normalizes before storing (§4.H).

use super::{ToolContext, ToolOutput};
use crate::error::{ForgeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct Input {
    path: String,
}

fn resolve(current: &str, input: &str) -> PathBuf {
    let candidate = Path::new(input);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        Path::new(current).join(candidate)
    }
}

/// Collapses `.` and `..` components lexically, without touching the
/// filesystem — the existence check happens separately via `canonicalize`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input)
        .map_err(|e| ForgeError::invalid(format!("change_dir: {e}")))?;

    let current = ctx.workdir.get();
    let resolved = normalize(&resolve(&current, &input.path));

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|_| ForgeError::not_found(format!("{} does not exist", resolved.display())))?;

    if !metadata.is_dir() {
        return Err(ForgeError::invalid(format!(
            "{} is not a directory",
            resolved.display()
        )));
    }

    let final_path = resolved.to_string_lossy().to_string();
    ctx.workdir.set(final_path.clone());
    Ok(ToolOutput::ok(format!("changed directory to {final_path}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_parent_dir_components() {
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/./b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn resolve_keeps_absolute_paths_as_is() {
        assert_eq!(resolve("/cwd", "/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(resolve("/cwd", "rel"), PathBuf::from("/cwd/rel"));
    }
}
