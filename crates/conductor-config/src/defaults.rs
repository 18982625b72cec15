use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default settle window after spawning a service, in milliseconds.
pub const DEFAULT_SETTLE_MS: u64 = 2_000;

/// Default graceful-termination budget, in milliseconds (ten one-second polls).
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;

/// Default liveness poll interval, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default pause between the stop and start halves of a restart, in milliseconds.
pub const DEFAULT_RESTART_PAUSE_MS: u64 = 2_000;

/// Default pause between the stop-all and start-all phases, in milliseconds.
pub const DEFAULT_CYCLE_SETTLE_MS: u64 = 3_000;

/// Default health-probe budget, in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default interpreter for script-based services.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Default settings file name, relative to the project root.
pub const DEFAULT_SETTINGS_FILE: &str = ".env";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default project root: the directory the supervisor was invoked from.
#[must_use]
pub fn default_project_root() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

/// Default settings file.
#[must_use]
pub fn default_settings_file() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SETTINGS_FILE)
}

/// Default interpreter as an owned value.
#[must_use]
pub fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_owned()
}
