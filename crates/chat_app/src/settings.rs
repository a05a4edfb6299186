//! Startup settings.
//!
//! Settings come from an optional JSON file named by
//! `AGENT_CHAT_SETTINGS_PATH`, then `AGENT_CHAT_TRANSPORT` and
//! `AGENT_CHAT_MODEL` override the file. Unknown JSON fields are rejected.
//!
//! ```json
//! {
//!   "transport": "cli",
//!   "model": "sonnet",
//!   "allowed_tools": ["Read", "Grep"],
//!   "max_session_history": 50,
//!   "pricing": { "input_per_million": 3.0, "output_per_million": 15.0 }
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use agent_chat::Pricing;
use serde::Deserialize;
use session_store::{data_file, data_root, DEFAULT_MAX_SESSION_HISTORY};
use thiserror::Error;

use crate::controller::TurnOptions;

pub const SETTINGS_PATH_ENV_VAR: &str = "AGENT_CHAT_SETTINGS_PATH";
pub const TRANSPORT_ENV_VAR: &str = "AGENT_CHAT_TRANSPORT";
pub const MODEL_ENV_VAR: &str = "AGENT_CHAT_MODEL";

pub const DEFAULT_TRANSPORT_ID: &str = "cli";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("failed to resolve working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingSettings {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        let pricing = Pricing::default();
        Self {
            input_per_million: pricing.input_per_million,
            output_per_million: pricing.output_per_million,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub transport: String,
    pub model: Option<String>,
    pub executable_path: Option<PathBuf>,
    pub allowed_tools: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub max_session_history: usize,
    pub pricing: PricingSettings,
    /// Directory holding the session data file; defaults under the working directory.
    pub data_dir: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: DEFAULT_TRANSPORT_ID.to_string(),
            model: None,
            executable_path: None,
            allowed_tools: Vec::new(),
            env: BTreeMap::new(),
            max_session_history: DEFAULT_MAX_SESSION_HISTORY,
            pricing: PricingSettings::default(),
            data_dir: None,
            working_directory: None,
        }
    }
}

impl Settings {
    /// Loads the settings file (if configured), applies env overrides, validates.
    pub fn load() -> Result<Self, SettingsError> {
        let settings = match env_string_opt(SETTINGS_PATH_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        let settings = settings.with_env_overrides(
            env_string_opt(TRANSPORT_ENV_VAR),
            env_string_opt(MODEL_ENV_VAR),
        );
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn with_env_overrides(mut self, transport: Option<String>, model: Option<String>) -> Self {
        if let Some(transport) = transport {
            self.transport = transport;
        }
        if let Some(model) = model {
            self.model = Some(model);
        }
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.transport.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "'transport' must not be empty".to_string(),
            ));
        }

        if self.max_session_history == 0 {
            return Err(SettingsError::Invalid(
                "'max_session_history' must be > 0".to_string(),
            ));
        }

        let PricingSettings {
            input_per_million,
            output_per_million,
        } = self.pricing;
        if !(input_per_million >= 0.0 && output_per_million >= 0.0) {
            return Err(SettingsError::Invalid(
                "'pricing' values must be non-negative numbers".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn pricing(&self) -> Pricing {
        Pricing::new(
            self.pricing.input_per_million,
            self.pricing.output_per_million,
        )
    }

    /// Configured working directory, or the process working directory.
    pub fn resolved_working_directory(&self) -> Result<PathBuf, SettingsError> {
        match &self.working_directory {
            Some(path) => Ok(path.clone()),
            None => env::current_dir().map_err(SettingsError::WorkingDirectory),
        }
    }

    /// Path of the JSON document sessions are persisted in.
    #[must_use]
    pub fn data_file_path(&self, working_directory: &Path) -> PathBuf {
        let root = self
            .data_dir
            .clone()
            .unwrap_or_else(|| data_root(working_directory));
        data_file(&root)
    }

    #[must_use]
    pub fn turn_options(&self, working_directory: PathBuf) -> TurnOptions {
        TurnOptions {
            working_directory,
            allowed_tools: self.allowed_tools.clone(),
            env: self.env.clone(),
            model: self.model.clone(),
            executable_path: self.executable_path.clone(),
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
