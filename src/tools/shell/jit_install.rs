//! Component I.2: JIT installer. For each shell command invoking a binary
//! not found on `PATH`, asks a secondary model whether the binary is
//! legitimate and, if so, installs it with the host's package manager.
//! Best-effort throughout: failures are logged, never fatal to the
//! original shell command (§4.I.2).

use crate::collaborators::model::HttpModelClient;
use crate::config::JitInstallConfig;
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

struct PackageManager {
    name: &'static str,
    install: fn(&str) -> Vec<String>,
}

const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager { name: "apt", install: |pkg| vec!["sh".into(), "-c".into(), format!("apt update && apt install -y {pkg}")] },
    PackageManager { name: "apt-get", install: |pkg| vec!["sh".into(), "-c".into(), format!("apt-get update && apt-get install -y {pkg}")] },
    PackageManager { name: "brew", install: |pkg| vec!["brew".into(), "install".into(), pkg.into()] },
    PackageManager { name: "apk", install: |pkg| vec!["apk".into(), "add".into(), pkg.into()] },
    PackageManager { name: "yum", install: |pkg| vec!["yum".into(), "install".into(), "-y".into(), pkg.into()] },
    PackageManager { name: "dnf", install: |pkg| vec!["dnf".into(), "install".into(), "-y".into(), pkg.into()] },
    PackageManager { name: "pacman", install: |pkg| vec!["pacman".into(), "-S".into(), "--noconfirm".into(), pkg.into()] },
    PackageManager { name: "zypper", install: |pkg| vec!["zypper".into(), "install".into(), "-y".into(), pkg.into()] },
    PackageManager { name: "xbps-install", install: |pkg| vec!["xbps-install".into(), "-y".into(), pkg.into()] },
    PackageManager { name: "emerge", install: |pkg| vec!["emerge".into(), pkg.into()] },
    PackageManager { name: "nix-env", install: |pkg| vec!["nix-env".into(), "-i".into(), pkg.into()] },
    PackageManager { name: "guix", install: |pkg| vec!["guix".into(), "install".into(), pkg.into()] },
    PackageManager { name: "pkg", install: |pkg| vec!["pkg".into(), "install".into(), "-y".into(), pkg.into()] },
    PackageManager { name: "slackpkg", install: |pkg| vec!["slackpkg".into(), "install".into(), pkg.into()] },
];

pub struct JitInstaller {
    enabled: bool,
    model: Option<Arc<HttpModelClient>>,
    package_manager: Option<&'static str>,
    attempted: Mutex<HashSet<String>>,
}

impl JitInstaller {
    pub fn new(config: &JitInstallConfig, model: Option<Arc<HttpModelClient>>) -> Self {
        let package_manager = config
            .package_manager_override
            .as_deref()
            .and_then(|name| PACKAGE_MANAGERS.iter().find(|pm| pm.name == name))
            .map(|pm| pm.name)
            .or_else(Self::autodetect);
        Self {
            enabled: config.enabled,
            model,
            package_manager,
            attempted: Mutex::new(HashSet::new()),
        }
    }

    fn autodetect() -> Option<&'static str> {
        PACKAGE_MANAGERS
            .iter()
            .find(|pm| which::which(pm.name).is_ok())
            .map(|pm| pm.name)
    }

    /// Best-effort; never returns an error to the caller. Logs and gives
    /// up silently when the feature is disabled, no model is configured,
    /// no package manager is present, or the binary was already attempted
    /// this process.
    pub async fn maybe_install(&self, binary: &str) {
        if !self.enabled || which::which(binary).is_ok() {
            return;
        }
        let Some(model) = &self.model else {
            return;
        };
        let Some(pm_name) = self.package_manager else {
            tracing::debug!(binary, "JIT install: no package manager detected");
            return;
        };

        {
            let mut attempted = self.attempted.lock().await;
            if !attempted.insert(binary.to_string()) {
                return;
            }
        }

        let question = format!(
            "Is `{binary}` a legitimate, non-harmful, commonly-used command installable with {pm_name}? \
             If yes respond only with the package name, else respond NO or UNSURE."
        );
        let answer = match model.ask(question).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::debug!(binary, error = %e, "JIT install: model query failed");
                return;
            }
        };

        if answer.is_empty() || answer.eq_ignore_ascii_case("NO") || answer.eq_ignore_ascii_case("UNSURE") {
            tracing::debug!(binary, answer, "JIT install: declined by model");
            return;
        }

        if pm_name == "brew" {
            tracing::warn!(binary, "JIT install: invoking brew without explicit user consent");
        }

        let Some(pm) = PACKAGE_MANAGERS.iter().find(|pm| pm.name == pm_name) else {
            return;
        };
        let args = (pm.install)(&answer);
        let Some((program, rest)) = args.split_first() else {
            return;
        };
        tracing::info!(binary, package = %answer, manager = pm_name, "JIT installing");
        let result = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            tracing::warn!(binary, error = %e, "JIT install: spawn failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_installer_is_a_no_op() {
        let installer = JitInstaller::new(
            &JitInstallConfig {
                enabled: false,
                package_manager_override: None,
            },
            None,
        );
        installer.maybe_install("definitely-not-a-real-binary").await;
    }

    #[tokio::test]
    async fn enabled_without_model_is_a_no_op() {
        let installer = JitInstaller::new(
            &JitInstallConfig {
                enabled: true,
                package_manager_override: Some("apt".into()),
            },
            None,
        );
        installer.maybe_install("definitely-not-a-real-binary").await;
    }
}
