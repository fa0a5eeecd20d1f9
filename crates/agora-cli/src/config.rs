//! Configuration file management for agora.
//!
//! Provides a TOML-based config file at `~/.config/agora/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use agora_core::agent::gemini::{self, GeminiAgent};
use agora_core::orchestrator::{DebateConfig, DebateOrchestrator};
use agora_core::persona::PersonaRegistry;
use agora_core::round::{FailurePolicy, RoundConfig};
use agora_core::speech::{GoogleTts, SpeechSynthesizer};
use agora_core::verdict::VerdictPolicy;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub gemini: GeminiSection,
    pub server: ServerSection,
    pub debate: DebateSection,
    pub speech: SpeechSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateSection {
    pub rounds: Option<u32>,
    pub phase_timeout_secs: Option<u64>,
    pub failure_policy: Option<FailurePolicy>,
    pub verdict_policy: Option<VerdictPolicy>,
    /// Persona file replacing the built-in cast.
    pub personas_file: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub api_key: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the agora config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/agora` or `~/.config/agora`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("agora");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("agora")
}

/// Return the path to the agora config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Read the config file at `path`.
///
/// The file is optional: agora runs on env vars and defaults alone, so a
/// missing file yields an empty [`ConfigFile`]. Unreadable or malformed
/// files are errors.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ConfigFile::default());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write `config` to `path`, creating parent dirs as needed.
///
/// The file holds API keys, so it is restricted to 0600 on Unix.
pub fn save_config(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub personas: Option<PathBuf>,
    pub rounds: Option<u32>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct AgoraConfig {
    pub api_key: Option<String>,
    pub gemini_base_url: String,
    pub request_timeout: Duration,
    pub bind: String,
    pub port: u16,
    pub personas_file: Option<PathBuf>,
    pub debate: DebateConfig,
    pub tts_api_key: Option<String>,
}

/// Read a non-empty environment variable.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a non-empty environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {key}={v:?}: {e}"))
        })
        .transpose()
}

impl AgoraConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Self::resolve_with(cli, load_config(&config_path())?)
    }

    /// Resolve against an already-loaded config file.
    ///
    /// - API key: `GOOGLE_API_KEY` > `gemini.api_key`
    /// - Base URL: `AGORA_GEMINI_BASE_URL` > `gemini.base_url` > public endpoint
    /// - Bind/port: `--bind`/`--port` > `AGORA_BIND`/`PORT` > `[server]` > `0.0.0.0:8080`
    /// - Personas: `--personas` > `AGORA_PERSONAS` > `debate.personas_file` > built-in
    /// - Rounds: `--rounds` > `AGORA_ROUNDS` > `debate.rounds` > 2
    /// - Phase timeout, policies: `AGORA_*` env > `[debate]` > defaults
    /// - Speech key: `AGORA_TTS_API_KEY` > `speech.api_key`
    pub fn resolve_with(cli: &CliOverrides, file: ConfigFile) -> Result<Self> {
        let api_key = env_var(gemini::API_KEY_ENV).or(file.gemini.api_key);

        let gemini_base_url = env_var("AGORA_GEMINI_BASE_URL")
            .or(file.gemini.base_url)
            .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string());

        let request_timeout = file
            .gemini
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(gemini::DEFAULT_TIMEOUT);

        let bind = match &cli.bind {
            Some(bind) => bind.clone(),
            None => env_var("AGORA_BIND")
                .or(file.server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        };

        let port = match cli.port {
            Some(port) => port,
            None => env_parse::<u16>("PORT")?
                .or(file.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let personas_file = match &cli.personas {
            Some(path) => Some(path.clone()),
            None => env_var("AGORA_PERSONAS")
                .map(PathBuf::from)
                .or(file.debate.personas_file),
        };

        let defaults = DebateConfig::default();
        let rounds = match cli.rounds {
            Some(rounds) => rounds,
            None => env_parse::<u32>("AGORA_ROUNDS")?
                .or(file.debate.rounds)
                .unwrap_or(defaults.rounds),
        };

        let phase_timeout = env_parse::<u64>("AGORA_PHASE_TIMEOUT_SECS")?
            .or(file.debate.phase_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let failure_policy = env_parse::<FailurePolicy>("AGORA_FAILURE_POLICY")?
            .or(file.debate.failure_policy)
            .unwrap_or_default();

        let verdict_policy = env_parse::<VerdictPolicy>("AGORA_VERDICT_POLICY")?
            .or(file.debate.verdict_policy)
            .unwrap_or_default();

        let tts_api_key = env_var("AGORA_TTS_API_KEY").or(file.speech.api_key);

        Ok(Self {
            api_key,
            gemini_base_url,
            request_timeout,
            bind,
            port,
            personas_file,
            debate: DebateConfig {
                rounds,
                round: RoundConfig {
                    failure_policy,
                    phase_timeout,
                    ..RoundConfig::default()
                },
                verdict_policy,
            },
            tts_api_key,
        })
    }

    /// The persona registry: the configured file, or the built-in cast.
    pub fn registry(&self) -> Result<PersonaRegistry> {
        match &self.personas_file {
            Some(path) => PersonaRegistry::load(path)
                .with_context(|| format!("failed to load personas from {}", path.display())),
            None => Ok(PersonaRegistry::builtin()),
        }
    }

    /// A Gemini agent for the configured key and endpoint.
    pub fn agent(&self) -> Result<GeminiAgent> {
        let key = self.api_key.as_deref().unwrap_or_default();
        GeminiAgent::with_options(key, &self.gemini_base_url, self.request_timeout).context(
            "Gemini API key not found; set GOOGLE_API_KEY or run `agora init --api-key <KEY>`",
        )
    }

    /// Orchestrator over the configured cast and the Gemini agent.
    pub fn orchestrator(&self) -> Result<DebateOrchestrator> {
        let registry = self.registry()?;
        let agent = self.agent()?;
        Ok(DebateOrchestrator::new(
            Arc::new(agent),
            Arc::new(registry),
            self.debate.clone(),
        ))
    }

    /// Speech backend, when a key is configured.
    pub fn speech(&self) -> Result<Option<Arc<dyn SpeechSynthesizer>>> {
        match &self.tts_api_key {
            Some(key) => {
                let tts = GoogleTts::new(key.clone()).context("failed to build speech client")?;
                Ok(Some(Arc::new(tts)))
            }
            None => Ok(None),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
