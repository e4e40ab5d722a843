//! Error types for sndmix

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SndMixError {
    /// Structurally invalid container or archive (magic, codec, channels, rate, bit depth)
    #[error("Format error: {0}")]
    Format(String),

    /// The input ended before a field or payload could be read in full
    #[error("Truncated input: {0}")]
    TruncatedInput(String),

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

impl From<std::io::Error> for SndMixError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::TruncatedInput(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl SndMixError {
    /// True for the format-level failures of a container or archive
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedInput(_))
    }

    /// Prefixes the message of a decode error with the location it occurred at
    pub(crate) fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Format(msg) => Self::Format(format!("{}: {}", context, msg)),
            Self::TruncatedInput(msg) => Self::TruncatedInput(format!("{}: {}", context, msg)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SndMixError>;
