//! Component I: shell executor. Foreground calls run under a
//! fast/slow timeout and are killed process-group-wide on expiry;
//! background calls detach from the caller's cancellation entirely and
//! are reaped by a spawned task (§4.I).

pub mod jit_install;
pub mod tokenize;

use super::{ToolContext, ToolOutput};
use crate::constants::{
    SHELL_BACKGROUND_TIMEOUT_SECS, SHELL_FAST_TIMEOUT_SECS, SHELL_OUTPUT_SPILL_THRESHOLD_BYTES,
    SHELL_SLOW_TIMEOUT_SECS, SHELL_SUMMARY_HEAD_LINES, SHELL_SUMMARY_LINE_MAX_CHARS,
    SHELL_SUMMARY_TAIL_LINES, SHELL_WAIT_DELAY_SECS,
};
use crate::error::{ForgeError, Result};
use regex::Regex;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Deserialize)]
struct Input {
    command: String,
    #[serde(default)]
    slow_ok: bool,
    #[serde(default)]
    background: bool,
}

const CONVERSATION_ID_ENV: &str = "FORGEMESH_CONVERSATION_ID";
const AGENT_MARKER_ENV: &str = "FORGEMESH_AGENT";

/// Splits on `&&`, `||`, `;`, and `|` (not inside quotes) so a chained
/// command line yields one program name per stage instead of just the
/// first one.
fn chain_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&&|\|\||;|\|").unwrap())
}

fn extract_program_names(command: &str) -> Vec<String> {
    chain_separator()
        .split(command)
        .filter_map(|stage| {
            shell_words::split(stage)
                .ok()
                .and_then(|tokens| tokens.into_iter().next())
        })
        .collect()
}

fn maybe_append_coauthor_trailer(command: &str, enabled: bool, agent_name: &str) -> String {
    if !enabled {
        return command.to_string();
    }
    let tokens = shell_words::split(command).unwrap_or_default();
    let is_git_commit = tokens.windows(2).any(|w| w[0] == "git" && w[1] == "commit");
    if !is_git_commit {
        return command.to_string();
    }
    format!(
        "{command} --trailer=\"Co-authored-by: {agent_name} <{agent_name}@forgemesh.local>\""
    )
}

fn build_env(ctx: &ToolContext) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| k != CONVERSATION_ID_ENV)
        .collect();
    if let Some(id) = &ctx.config.shell.conversation_id {
        env.push((CONVERSATION_ID_ENV.to_string(), id.clone()));
    }
    env.push((AGENT_MARKER_ENV.to_string(), ctx.agent_name.clone()));
    env.push(("EDITOR".to_string(), "true".to_string()));
    env
}

#[cfg(unix)]
fn new_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn new_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    let _ = signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

pub async fn run(ctx: &ToolContext, raw_input: serde_json::Value) -> Result<ToolOutput> {
    let input: Input = serde_json::from_value(raw_input)
        .map_err(|e| ForgeError::invalid(format!("bash: {e}")))?;

    let cwd = ctx.workdir.get();
    if tokio::fs::metadata(&cwd).await.is_err() {
        return Ok(ToolOutput::error(format!(
            "working directory {cwd} does not exist; use change_dir first"
        )));
    }

    if let Some(reason) = tokenize::destructive_reason(&input.command) {
        return Ok(ToolOutput::error(format!("refused to run destructive command: {reason}")));
    }

    if ctx.config.jit_install.enabled {
        for program in extract_program_names(&input.command) {
            ctx.jit_installer.maybe_install(&program).await;
        }
    }

    let command = maybe_append_coauthor_trailer(
        &input.command,
        ctx.config.shell.git_commit_coauthor_trailer,
        &ctx.agent_name,
    );

    if input.background {
        run_background(ctx, &cwd, &command).await
    } else {
        let timeout = if input.slow_ok {
            Duration::from_secs(SHELL_SLOW_TIMEOUT_SECS)
        } else {
            Duration::from_secs(SHELL_FAST_TIMEOUT_SECS)
        };
        run_foreground(ctx, &cwd, &command, timeout).await
    }
}

async fn run_foreground(ctx: &ToolContext, cwd: &str, command: &str, timeout: Duration) -> Result<ToolOutput> {
    let wrapped = format!("{{ {command} ; }} 2>&1");
    let mut cmd = Command::new("bash");
    cmd.args(["--login", "-c", &wrapped])
        .current_dir(cwd)
        .env_clear()
        .envs(build_env(ctx))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    new_process_group(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return Ok(ToolOutput::error(format!("failed to start command: {e}"))),
    };
    let pid = child.id().unwrap_or(0);
    let mut stdout = child.stdout.take().expect("stdout piped");

    let mut buffer = Vec::new();
    let run_to_completion = async {
        stdout.read_to_end(&mut buffer).await.ok();
        child.wait().await
    };

    match tokio::time::timeout(timeout, run_to_completion).await {
        Ok(Ok(status)) => {
            let output = render_output(&buffer);
            if status.success() {
                Ok(ToolOutput::ok(output))
            } else {
                Ok(ToolOutput::error(format!(
                    "[command failed: exit status {}]\n{output}",
                    status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string())
                )))
            }
        }
        Ok(Err(e)) => Ok(ToolOutput::error(format!("process wait failed: {e}"))),
        Err(_) => {
            kill_process_group(pid);
            let _ = tokio::time::timeout(Duration::from_secs(SHELL_WAIT_DELAY_SECS), child.wait()).await;
            if let Some(metrics) = &ctx.metrics {
                metrics.shell_timeouts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            let output = render_output(&buffer);
            Ok(ToolOutput::error(format!(
                "[command timed out after {timeout:?}, showing output until timeout]\n{output}"
            )))
        }
    }
}

/// Spills to a temp file + truncated head/tail summary if `buffer` exceeds
/// the spill threshold; otherwise returns it verbatim (§8 invariant 7).
fn render_output(buffer: &[u8]) -> String {
    if buffer.len() <= SHELL_OUTPUT_SPILL_THRESHOLD_BYTES {
        return String::from_utf8_lossy(buffer).to_string();
    }

    let text = String::from_utf8_lossy(buffer);
    let lines: Vec<&str> = text.lines().collect();
    let spill_dir = match tempfile::tempdir() {
        Ok(dir) => dir.into_path(),
        Err(_) => return text.to_string(),
    };
    let spill_path = spill_dir.join("output");
    if std::fs::write(&spill_path, buffer).is_err() {
        return text.to_string();
    }

    let truncate = |line: &str| -> String {
        if line.len() > SHELL_SUMMARY_LINE_MAX_CHARS {
            format!("{}...", &line[..SHELL_SUMMARY_LINE_MAX_CHARS])
        } else {
            line.to_string()
        }
    };

    let mut summary = format!(
        "[output too large ({}KB, {} lines), saved to: {}]\nFirst lines:\n",
        buffer.len() / 1024,
        lines.len(),
        spill_path.display()
    );
    for (i, line) in lines.iter().take(SHELL_SUMMARY_HEAD_LINES).enumerate() {
        summary.push_str(&format!("{}\t{}\n", i + 1, truncate(line)));
    }
    summary.push_str("Last lines:\n");
    let tail_start = lines.len().saturating_sub(SHELL_SUMMARY_TAIL_LINES);
    for (i, line) in lines.iter().enumerate().skip(tail_start) {
        summary.push_str(&format!("{}\t{}\n", i + 1, truncate(line)));
    }
    summary
}

async fn run_background(ctx: &ToolContext, cwd: &str, command: &str) -> Result<ToolOutput> {
    let wrapped = format!("{{ {command} ; }} 2>&1");
    let temp_dir = tempfile::tempdir().map_err(|e| ForgeError::ProcessFailure(format!("temp dir: {e}")))?;
    let output_path = temp_dir.path().join("output");
    let output_file = std::fs::File::create(&output_path)
        .map_err(|e| ForgeError::ProcessFailure(format!("output file: {e}")))?;
    let output_file_for_stderr = output_file
        .try_clone()
        .map_err(|e| ForgeError::ProcessFailure(format!("output file clone: {e}")))?;

    let mut cmd = Command::new("bash");
    cmd.args(["--login", "-c", &wrapped])
        .current_dir(cwd)
        .env_clear()
        .envs(build_env(ctx))
        .stdin(Stdio::null())
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::from(output_file_for_stderr));
    new_process_group(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return Ok(ToolOutput::error(format!("failed to start background command: {e}"))),
    };
    let pid = child.id().unwrap_or(0);

    // Detached from the caller's cancellation: only the background
    // timeout applies, enforced inside this reaping task, not the caller's.
    tokio::spawn(async move {
        let result = tokio::time::timeout(
            Duration::from_secs(SHELL_BACKGROUND_TIMEOUT_SECS),
            child.wait(),
        )
        .await;
        let marker = match result {
            Ok(Ok(status)) if status.success() => "[background process completed]".to_string(),
            Ok(Ok(status)) => format!("[background process failed: exit status {status}]"),
            Ok(Err(e)) => format!("[background process failed: {e}]"),
            Err(_) => {
                kill_process_group(pid);
                "[background process failed: timed out]".to_string()
            }
        };
        use std::io::Write;
        if let Ok(mut file) = std::fs::OpenOptions::new().append(true).open(&output_path) {
            let _ = writeln!(file, "{marker}");
        }
    });

    Ok(ToolOutput::ok(format!(
        "started background process pid={pid}, output: {}",
        output_path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_program_names_takes_the_first_token() {
        assert_eq!(extract_program_names("cargo test"), vec!["cargo".to_string()]);
    }

    #[test]
    fn extract_program_names_splits_chained_commands() {
        assert_eq!(
            extract_program_names("gofmt -l . && go build ./... ; go vet ./..."),
            vec!["gofmt".to_string(), "go".to_string(), "go".to_string()]
        );
    }

    #[test]
    fn coauthor_trailer_appended_only_for_git_commit() {
        let out = maybe_append_coauthor_trailer("git commit -m hi", true, "agent-1");
        assert!(out.contains("--trailer="));
        let out = maybe_append_coauthor_trailer("git status", true, "agent-1");
        assert!(!out.contains("--trailer="));
    }

    #[test]
    fn coauthor_trailer_respects_opt_out() {
        let out = maybe_append_coauthor_trailer("git commit -m hi", false, "agent-1");
        assert_eq!(out, "git commit -m hi");
    }

    #[test]
    fn render_output_passes_small_output_through_verbatim() {
        let out = render_output(b"hello\nworld\n");
        assert_eq!(out, "hello\nworld\n");
    }

    #[test]
    fn render_output_spills_large_output() {
        let big: String = (1..=1500).map(|n| format!("{:060}\n", n)).collect();
        let out = render_output(big.as_bytes());
        assert!(out.starts_with("[output too large"));
        assert!(out.contains("First lines:"));
        assert!(out.contains("Last lines:"));
        assert!(out.contains("saved to:"));
    }
}
