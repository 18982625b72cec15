//! Static registry of the services the supervisor manages.
//!
//! A [`ServiceDescriptor`] records everything needed to launch and track one
//! service. Relative paths resolve against the service working directory, so a
//! registry built for one project root never touches files outside it unless
//! a descriptor names an absolute path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use conductor_config::{Config, Settings};

const LOG_DIR: &str = "logs";

/// Static description of one managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    name: String,
    executable: PathBuf,
    launcher: Option<String>,
    args: Vec<String>,
    working_dir: PathBuf,
    pid_file: PathBuf,
    stdout_log: PathBuf,
    stderr_log: Option<PathBuf>,
    port: Option<u16>,
    health_path: Option<String>,
}

impl ServiceDescriptor {
    /// Describes a service launched directly from `executable`.
    ///
    /// The PID file and log default to `logs/<name>.pid` and `logs/<name>.log`
    /// under `working_dir`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let working_dir = working_dir.into();
        let logs = working_dir.join(LOG_DIR);
        Self {
            pid_file: logs.join(format!("{name}.pid")),
            stdout_log: logs.join(format!("{name}.log")),
            executable: executable.into(),
            launcher: None,
            args: Vec::new(),
            stderr_log: None,
            port: None,
            health_path: None,
            working_dir,
            name,
        }
    }

    /// Runs the executable through `launcher`, for example an interpreter.
    #[must_use]
    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = Some(launcher.into());
        self
    }

    /// Appends extra arguments passed after the executable.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overrides the PID file location.
    #[must_use]
    pub fn with_pid_file(mut self, path: impl AsRef<Path>) -> Self {
        self.pid_file = self.working_dir.join(path);
        self
    }

    /// Overrides the primary log location.
    #[must_use]
    pub fn with_stdout_log(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout_log = self.working_dir.join(path);
        self
    }

    /// Sends standard error to its own log instead of the primary log.
    #[must_use]
    pub fn with_stderr_log(mut self, path: impl AsRef<Path>) -> Self {
        self.stderr_log = Some(self.working_dir.join(path));
        self
    }

    /// Records the port the service listens on.
    #[must_use]
    pub const fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Enables the HTTP health probe at `path`.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    /// Unique service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable path as configured, possibly relative.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Executable path resolved against the working directory.
    #[must_use]
    pub fn executable_path(&self) -> PathBuf {
        self.working_dir.join(&self.executable)
    }

    /// Launcher program, when the executable is not run directly.
    #[must_use]
    pub fn launcher(&self) -> Option<&str> {
        self.launcher.as_deref()
    }

    /// Extra arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory the process is started in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// PID file location.
    #[must_use]
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Primary log location; receives stdout and, by default, stderr.
    #[must_use]
    pub fn stdout_log(&self) -> &Path {
        &self.stdout_log
    }

    /// Separate stderr log, when configured.
    #[must_use]
    pub fn stderr_log(&self) -> Option<&Path> {
        self.stderr_log.as_deref()
    }

    /// Listening port, when known.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Health endpoint path, when the service exposes one.
    #[must_use]
    pub fn health_path(&self) -> Option<&str> {
        self.health_path.as_deref()
    }

    /// Operator-facing URL for services with a port.
    #[must_use]
    pub fn access_url(&self) -> Option<String> {
        self.port.map(|port| format!("http://localhost:{port}"))
    }

    /// URL polled by the health probe.
    #[must_use]
    pub fn health_url(&self) -> Option<String> {
        let port = self.port?;
        let path = self.health_path.as_deref()?;
        Some(format!("http://127.0.0.1:{port}{path}"))
    }

    /// Human-readable command line, used in diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = self.launcher.iter().cloned().collect();
        parts.push(self.executable.display().to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Ordered, name-unique collection of service descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Builds a registry, preserving the given order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateService`] when two descriptors share
    /// a name.
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.name()) {
                return Err(RegistryError::DuplicateService {
                    name: service.name().to_owned(),
                });
            }
        }
        Ok(Self { services })
    }

    /// The four built-in services of the trading-bot project.
    ///
    /// Ports come from `DASHBOARD_PORT` and `MCP_PORT` in `settings`, falling
    /// back to 5000 and 3000.
    #[must_use]
    pub fn builtin(config: &Config, settings: &Settings) -> Self {
        let root = config.project_root().as_std_path();
        let interpreter = config.interpreter();
        let services = vec![
            ServiceDescriptor::new("rl-bot", "rl_trading_bot.py", root)
                .with_launcher(interpreter)
                .with_pid_file("logs/rl_bot.pid")
                .with_stdout_log("logs/rl_bot.log"),
            ServiceDescriptor::new("chart-bot", "chart_analysis_bot.py", root)
                .with_launcher(interpreter)
                .with_pid_file("logs/chart_bot.pid")
                .with_stdout_log("logs/chart_bot.log"),
            ServiceDescriptor::new("dashboard", "src/web_dashboard.py", root)
                .with_launcher(interpreter)
                .with_pid_file("logs/dashboard.pid")
                .with_stdout_log("logs/dashboard.log")
                .with_port(Some(settings.port("DASHBOARD_PORT").unwrap_or(5000)))
                .with_health_path("/api/health"),
            ServiceDescriptor::new("mcp-server", "src/mcp_server.py", root)
                .with_launcher(interpreter)
                .with_pid_file("logs/mcp_server.pid")
                .with_stdout_log("logs/mcp_server.log")
                .with_stderr_log("logs/mcp_server_error.log")
                .with_port(Some(settings.port("MCP_PORT").unwrap_or(3000)))
                .with_health_path("/api/v1/health"),
        ];
        Self { services }
    }

    /// Looks up a service by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownService`] listing the known names.
    pub fn get(&self, name: &str) -> Result<&ServiceDescriptor, RegistryError> {
        self.services
            .iter()
            .find(|service| service.name() == name)
            .ok_or_else(|| RegistryError::UnknownService {
                name: name.to_owned(),
                known: self.names().join(", "),
            })
    }

    /// Service names in registry order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(ServiceDescriptor::name).collect()
    }

    /// Iterates the services in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.services.iter()
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Errors raised by registry construction and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No service carries the requested name.
    #[error("unknown service '{name}' (known services: {known})")]
    UnknownService {
        /// Requested name.
        name: String,
        /// Comma-separated list of registered names.
        known: String,
    },
    /// Two descriptors share a name.
    #[error("service '{name}' is registered more than once")]
    DuplicateService {
        /// Duplicated name.
        name: String,
    },
}
