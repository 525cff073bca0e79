use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logging level for the process.
///
/// Controls the verbosity of log output, from errors only to detailed
/// per-event tracing of OS session signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only failures that stop the service from starting.
    Error,

    /// Contained failures: skipped sessions, lost metadata, thumbnail timeouts.
    Warn,

    /// Service lifecycle and session topology changes (default level).
    #[default]
    Info,

    /// Every OS signal, selection change and dispatched command.
    Debug,

    /// Everything, including backend property reads.
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}
