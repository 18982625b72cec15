//! Shared configuration for the conductor supervisor.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path`), then `CONDUCTOR_*`
//! environment variables, then command-line flags. The supervisor only reads
//! timing and path settings from here; per-service ports come from the
//! separate key=value [`Settings`] source.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod settings;

pub use defaults::{
    DEFAULT_CYCLE_SETTLE_MS, DEFAULT_INTERPRETER, DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_RESTART_PAUSE_MS, DEFAULT_SETTINGS_FILE, DEFAULT_SETTLE_MS,
    DEFAULT_STOP_TIMEOUT_MS, default_interpreter, default_log_filter, default_log_filter_string,
    default_log_format, default_project_root, default_settings_file,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use settings::{Settings, SettingsError};

/// Supervisor configuration resolved from every configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CONDUCTOR")]
pub struct Config {
    /// Directory that service executables, PID files and logs live under.
    #[ortho_config(default = default_project_root())]
    pub project_root: Utf8PathBuf,
    /// Key=value settings file, relative to the project root unless absolute.
    #[ortho_config(default = default_settings_file())]
    pub settings_file: Utf8PathBuf,
    /// Interpreter used to launch script-based services.
    #[ortho_config(default = default_interpreter())]
    pub interpreter: String,
    /// Tracing filter expression (for example `info` or `conductor=debug`).
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Formatting applied to diagnostic log lines.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// How long a freshly spawned service must stay alive to count as started.
    #[ortho_config(default = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,
    /// How long a graceful termination request may take before escalation.
    #[ortho_config(default = DEFAULT_STOP_TIMEOUT_MS)]
    pub stop_timeout_ms: u64,
    /// Interval between liveness polls.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Pause between the stop and start phases of a restart.
    #[ortho_config(default = DEFAULT_RESTART_PAUSE_MS)]
    pub restart_pause_ms: u64,
    /// Pause between the stop-all and start-all phases of a fleet cycle.
    #[ortho_config(default = DEFAULT_CYCLE_SETTLE_MS)]
    pub cycle_settle_ms: u64,
    /// Connect and read budget for a service health probe.
    #[ortho_config(default = DEFAULT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            settings_file: default_settings_file(),
            interpreter: default_interpreter(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            settle_ms: DEFAULT_SETTLE_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            restart_pause_ms: DEFAULT_RESTART_PAUSE_MS,
            cycle_settle_ms: DEFAULT_CYCLE_SETTLE_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Loads configuration from every layer, using `args` as the command line.
    ///
    /// `args` must start with the program name and contain only configuration
    /// flags; command tokens are split off by the CLI beforehand.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when any layer fails to
    /// parse or merge.
    pub fn load_from_args<I, T>(args: I) -> ortho_config::OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Root directory of the managed project.
    #[must_use]
    pub fn project_root(&self) -> &camino::Utf8Path {
        self.project_root.as_path()
    }

    /// Location of the key=value settings file.
    #[must_use]
    pub fn settings_path(&self) -> Utf8PathBuf {
        if self.settings_file.is_absolute() {
            self.settings_file.clone()
        } else {
            self.project_root.join(&self.settings_file)
        }
    }

    /// Interpreter used for script-based services.
    #[must_use]
    pub fn interpreter(&self) -> &str {
        self.interpreter.as_str()
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Diagnostic log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Settle window applied after spawning a service.
    #[must_use]
    pub const fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Grace period granted to a terminating service.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Interval between liveness polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause between the phases of a single-service restart.
    #[must_use]
    pub const fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }

    /// Pause between the phases of a fleet cycle.
    #[must_use]
    pub const fn cycle_settle(&self) -> Duration {
        Duration::from_millis(self.cycle_settle_ms)
    }

    /// Budget for a single health probe.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
