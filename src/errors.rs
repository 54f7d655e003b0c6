//! Error types shared across the supervisor and the status engine.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Lifecycle operation referenced a module name absent from the manifest.
    NotFound(String),
    /// The OS refused to start a module process.
    Spawn(String),
    /// File-system or process-control failure.
    Io(String),
    /// The data service could not be reached, timed out, or answered non-2xx.
    Network(String),
    /// The data service answered with a body that is not the expected JSON.
    MalformedResponse(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Network(msg) => write!(f, "network: {msg}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
