//! Transport selection.

use std::sync::Arc;

use agent_protocol::{AgentTransport, TransportInitError};
use agent_transport_cli::{CliTransport, CliTransportConfig, CLI_TRANSPORT_ID};
use agent_transport_mock::{ScriptedTransport, MOCK_TRANSPORT_ID};

use crate::settings::Settings;

/// Builds the transport named by `settings.transport`.
pub fn transport_for_settings(
    settings: &Settings,
) -> Result<Arc<dyn AgentTransport>, TransportInitError> {
    match settings.transport.trim() {
        CLI_TRANSPORT_ID => {
            let mut config =
                CliTransportConfig::default().with_default_model(settings.model.clone());
            if let Some(executable) = &settings.executable_path {
                config.executable = executable.clone();
            }
            Ok(Arc::new(CliTransport::new(config)?))
        }
        MOCK_TRANSPORT_ID => Ok(Arc::new(ScriptedTransport::default())),
        unknown => Err(TransportInitError::new(format!(
            "Unsupported transport '{unknown}'. Available transports: {CLI_TRANSPORT_ID}, {MOCK_TRANSPORT_ID}"
        ))),
    }
}
