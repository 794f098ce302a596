//! Configuration file for BabySquad.
//!
//! Every section is optional. API keys belong in the environment
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`); a key written into the file is
//! accepted with a warning as long as the file is not world-readable.

use std::path::{Path, PathBuf};

use babysquad_common::{Result, SquadError};
use babysquad_knowledge::KnowledgeConfig;
use babysquad_llm::LlmConfig;
use babysquad_sessions::SessionsConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "babysquad.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BabySquadConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

/// `[eval]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Judge model on the `[llm]` provider; unset reuses `[llm].model`
    #[serde(default)]
    pub judge_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl BabySquadConfig {
    /// Load `path` if given (it must exist), else `./babysquad.toml` if
    /// present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(&fallback)
                } else {
                    info!("No config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a TOML file, rejecting unsafe permissions on Unix.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SquadError::Config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| SquadError::Config(format!("{}: {e}", path.display())))?;

        #[cfg(unix)]
        validate_config_file_permissions(path, config.has_inline_secrets())?;

        if config.has_inline_secrets() {
            warn!(
                path = %path.display(),
                "API key found in config file; prefer OPENAI_API_KEY / ANTHROPIC_API_KEY"
            );
        }

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SquadError::Config(format!("Invalid config: {e}")))
    }

    /// Model settings for the evaluation judge.
    pub fn judge_llm(&self) -> LlmConfig {
        let mut judge = self.llm.clone();
        if let Some(model) = self.eval.judge_model.as_deref().filter(|m| !m.is_empty()) {
            judge.model = model.to_string();
        }
        judge
    }

    fn has_inline_secrets(&self) -> bool {
        let set = |key: &Option<String>| key.as_deref().is_some_and(|k| !k.is_empty());
        set(&self.llm.api_key) || set(&self.knowledge.embedding_api_key)
    }
}

/// Reject non-regular files, world-writable files, and world-readable files
/// that carry an API key.
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path, has_secrets: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path).map_err(|e| {
        SquadError::Config(format!("Failed to stat config file '{}': {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(SquadError::Config(format!(
            "Config path '{}' is not a regular file",
            path.display()
        )));
    }

    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o002 != 0 {
        return Err(SquadError::Config(format!(
            "Config file '{}' is world-writable (mode {mode:04o}); fix with: chmod o-w {}",
            path.display(),
            path.display()
        )));
    }

    if has_secrets && mode & 0o004 != 0 {
        return Err(SquadError::Config(format!(
            "Config file '{}' contains an API key but is world-readable (mode {mode:04o}); \
             fix with: chmod 600 {}",
            path.display(),
            path.display()
        )));
    }

    if has_secrets && mode & 0o040 != 0 {
        warn!(path = %path.display(), "Config file with an API key is group-readable");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use babysquad_knowledge::EmbeddingProvider;
    use babysquad_sessions::SessionBackend;

    const FULL_CONFIG: &str = r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
timeout_ms = 30000

[llm.retry]
max_retries = 2

[knowledge]
index_path = "/var/lib/babysquad/index.sqlite"
embedding_provider = "openai"
embedding_model = "text-embedding-3-small"
top_k = 5

[sessions]
backend = "memory"

[server]
bind = "0.0.0.0"
port = 9000

[eval]
judge_model = "claude-opus-4-20250514"
"#;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BabySquadConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.knowledge.collection, "baby_knowledge");
        assert_eq!(config.sessions.backend, SessionBackend::Sqlite);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.judge_llm().model, "gpt-4o");
    }

    #[test]
    fn every_section_is_parsed() {
        let config = BabySquadConfig::from_toml(FULL_CONFIG).unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.retry.max_retries, 2);
        assert_eq!(config.knowledge.embedding_provider, EmbeddingProvider::Openai);
        assert_eq!(config.knowledge.top_k, 5);
        assert_eq!(config.knowledge.chunk_size, 1000);
        assert_eq!(config.sessions.backend, SessionBackend::Memory);
        assert_eq!(config.server.port, 9000);

        let judge = config.judge_llm();
        assert_eq!(judge.model, "claude-opus-4-20250514");
        assert_eq!(judge.provider, "anthropic");
        assert_eq!(judge.timeout_ms, 30000);
        assert_eq!(config.llm.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = BabySquadConfig::from_toml("[llm\nmodel = 1").unwrap_err();
        assert!(matches!(err, SquadError::Config(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BabySquadConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, SquadError::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn permission_rules() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("babysquad.toml");
        let set_mode = |mode: u32| {
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap()
        };

        std::fs::write(&path, "[server]\nport = 8001\n").unwrap();
        set_mode(0o644);
        assert_eq!(BabySquadConfig::from_file(&path).unwrap().server.port, 8001);

        set_mode(0o646);
        assert!(BabySquadConfig::from_file(&path).is_err());

        std::fs::write(&path, "[llm]\napi_key = \"sk-test\"\n").unwrap();
        set_mode(0o644);
        assert!(BabySquadConfig::from_file(&path).is_err());

        set_mode(0o600);
        let config = BabySquadConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }
}
