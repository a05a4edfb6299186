use std::path::PathBuf;

/// Executable launched when neither the config nor the request names one.
pub const DEFAULT_AGENT_EXECUTABLE: &str = "claude";

/// Launch configuration for the agent subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliTransportConfig {
    pub executable: PathBuf,
    /// Arguments placed before the generated per-turn arguments.
    pub base_args: Vec<String>,
    /// Passed as `--model` when a request names none; also reported by the profile.
    pub default_model: Option<String>,
}

impl Default for CliTransportConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_AGENT_EXECUTABLE),
            base_args: Vec::new(),
            default_model: None,
        }
    }
}

impl CliTransportConfig {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model;
        self
    }
}
