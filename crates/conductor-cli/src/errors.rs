//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use conductor_config::SettingsError;
use conductor_supervisor::telemetry::TelemetryError;
use conductor_supervisor::{ControlError, LogError, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Logs(#[from] LogError),
    #[error("failed to serialise command output: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write command output: {0}")]
    Output(io::Error),
}
