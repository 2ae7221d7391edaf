//! Shell-aware destructive-command check (§4.I, §9 design notes). Uses a
//! real tokenizer (`shell_words`) rather than substring search; if the
//! command can't be tokenized reliably, it fails closed.

const DESTRUCTIVE_TARGETS: &[&str] = &["/", "~", "/home", "/root", "*", ".git"];

/// Returns `Some(reason)` if the command looks like it would delete a
/// `.git` directory, a home directory, or a broad `/`-anchored wildcard.
pub fn destructive_reason(command: &str) -> Option<String> {
    let tokens = match shell_words::split(command) {
        Ok(tokens) => tokens,
        Err(_) => return Some("command could not be safely tokenized".to_string()),
    };

    let mut saw_rm = false;
    let mut saw_force_recursive = false;
    for token in &tokens {
        let lowered = token.to_lowercase();
        if lowered == "rm" || lowered.ends_with("/rm") {
            saw_rm = true;
            continue;
        }
        if !saw_rm {
            continue;
        }
        if lowered.starts_with('-') && (lowered.contains('r') || lowered.contains('f')) {
            saw_force_recursive = true;
            continue;
        }
        if DESTRUCTIVE_TARGETS.iter().any(|t| token == t)
            || token.ends_with("/.git")
            || token == ".git"
            || token.ends_with("/*")
            || token == "/*"
        {
            return Some(format!("command targets a destructive path: {token}"));
        }
    }

    if saw_rm && saw_force_recursive && tokens.iter().any(|t| t == "/" || t == "~") {
        return Some("recursive force-delete of a root-anchored path".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_rm_rf_slash() {
        assert!(destructive_reason("rm -rf /").is_some());
    }

    #[test]
    fn rejects_rm_rf_git() {
        assert!(destructive_reason("rm -rf .git").is_some());
    }

    #[test]
    fn rejects_rm_rf_home() {
        assert!(destructive_reason("rm -rf ~").is_some());
    }

    #[test]
    fn allows_harmless_rm() {
        assert!(destructive_reason("rm build/output.log").is_none());
    }

    #[test]
    fn allows_unrelated_commands() {
        assert!(destructive_reason("cargo test --all").is_none());
    }

    #[test]
    fn fails_closed_on_unparseable_command() {
        assert!(destructive_reason("echo \"unterminated").is_some());
    }
}
