use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for one node process.
///
/// Loaded with the `config` crate: a base `forgemesh.toml` (optional) is
/// layered under environment variables prefixed `FORGEMESH__`, with nested
/// keys separated by `__` (e.g. `FORGEMESH__SUBSTRATE__STORAGE_DIR`). A
/// local `.env` file is sourced first via `dotenvy` so the environment
/// layer can be populated from a file in development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub substrate: SubstrateConfig,
    pub shell: ShellConfig,
    pub jit_install: JitInstallConfig,
    pub model: ModelConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub agent_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Where the messaging substrate (§4.A) lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateConfig {
    /// `true` starts an embedded in-process substrate; `false` connects to `url`.
    #[serde(default = "default_true")]
    pub embedded: bool,
    #[serde(default)]
    pub url: Option<String>,
    /// Directory for the embedded backend to mirror buckets to disk.
    /// Absent means volatile (in-memory only).
    #[serde(default)]
    pub storage_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_true")]
    pub git_commit_coauthor_trailer: bool,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitInstallConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub package_manager_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_key: String,
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_model_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_model_name() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    7420
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("loaded .env from {:?}", path),
            Err(e) => tracing::debug!("no .env loaded: {}", e),
        }

        let raw = config::Config::builder()
            .add_source(config::File::with_name("forgemesh").required(false))
            .add_source(config::Environment::with_prefix("FORGEMESH").separator("__"))
            .build()?;

        let cfg: Config = raw.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.node.agent_name.trim().is_empty() {
            return Err(ForgeError::invalid("node.agent_name must not be empty"));
        }
        if !self.substrate.embedded && self.substrate.url.is_none() {
            return Err(ForgeError::invalid(
                "substrate.url is required when substrate.embedded is false",
            ));
        }
        if self.model.api_key.trim().is_empty() {
            return Err(ForgeError::invalid("model.api_key must not be empty"));
        }
        if let Some(token) = &self.api.bearer_token {
            if token.len() < 32 {
                return Err(ForgeError::invalid(
                    "api.bearer_token must be at least 32 characters",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            node: NodeConfig {
                agent_name: "worker-1".into(),
                capabilities: vec!["rust".into()],
                repo: None,
                branch: None,
            },
            substrate: SubstrateConfig {
                embedded: true,
                url: None,
                storage_dir: None,
            },
            shell: ShellConfig {
                git_commit_coauthor_trailer: true,
                conversation_id: None,
            },
            jit_install: JitInstallConfig {
                enabled: false,
                package_manager_override: None,
            },
            model: ModelConfig {
                api_key: "x".repeat(40),
                base_url: default_model_base_url(),
                model: default_model_name(),
                max_tokens: 4096,
            },
            api: ApiConfig {
                host: default_api_host(),
                port: default_api_port(),
                bearer_token: None,
            },
        }
    }

    #[test]
    fn rejects_empty_agent_name() {
        let mut cfg = base_config();
        cfg.node.agent_name = "".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_networked_substrate_without_url() {
        let mut cfg = base_config();
        cfg.substrate.embedded = false;
        cfg.substrate.url = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_short_bearer_token() {
        let mut cfg = base_config();
        cfg.api.bearer_token = Some("short".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_base_config() {
        assert!(base_config().validate().is_ok());
    }
}
