//! Agent error types with miette diagnostics.
//!
//! Everything that aborts startup ends up here; faults inside the sampling
//! loop never do.

use miette::Diagnostic;
use thiserror::Error;

use enviro_config::ConfigError;
use enviro_core::CoreError;

/// Process exit codes; a clean shutdown exits with 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(enviro::no_config),
        help(
            "Create a config.toml with at least [mqtt] broker_ip and topic.\n\
             Expected at: {path}\n\
             Or pass --config / set ENVIRO_CONFIG."
        )
    )]
    NoConfig { path: String },

    #[error("Invalid configuration")]
    #[diagnostic(
        code(enviro::config),
        help("Fix the value in the config file or its ENVIRO_<SECTION>__<KEY> override.")
    )]
    Config(#[source] ConfigError),

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to broker at {broker}")]
    #[diagnostic(
        code(enviro::connection_failed),
        help(
            "Check that the broker is running and reachable.\n\
             Broker: {broker}\n\
             Verify broker_port, tls_mode and credentials in [mqtt]."
        )
    )]
    ConnectionFailed {
        broker: String,
        #[source]
        source: enviro_mqtt::Error,
    },

    // ── Hardware ─────────────────────────────────────────────────────
    #[error("Sensor initialisation failed")]
    #[diagnostic(
        code(enviro::sensor),
        help("Check that the sensor kernel drivers are loaded and the paths in [sensors] / [pms] exist.")
    )]
    Startup(#[source] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig { path },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::Startup(err)
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Startup(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}
