use std::sync::mpsc;
use strum_macros::IntoStaticStr;
use thiserror::Error;

/// Per-line decode failure. None of these are fatal; the offending line is
/// dropped and the next one is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error, IntoStaticStr)]
pub enum FrameError {
    #[error("missing '*' checksum delimiter")]
    MissingChecksumDelimiter,

    #[error("checksum must be two hex digits, got '{0}'")]
    BadChecksumFormat(String),

    #[error("expected {expected} fields, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("field '{0}' is not a valid integer")]
    FieldParseError(String),

    #[error("checksum mismatch: received {received:02X}, calculated {calculated:02X}")]
    ChecksumMismatch { received: u8, calculated: u8 },

    #[error("unknown IMU id {0}")]
    UnknownSourceId(i32),

    #[error("unrecognized line")]
    UnrecognizedLine,

    #[error("unterminated input exceeded {limit} bytes and was discarded")]
    BufferOverflow { limit: usize },
}

impl FrameError {
    /// Variant name, for log fields and counters.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// A frame that was dropped, together with the text that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}: {line}")]
pub struct RejectedLine {
    pub error: FrameError,
    pub line: String,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Command send error: {0}")]
    CommandSend(String),

    #[error("Reader thread failed to start: {0}")]
    Startup(String),

    #[error("No valid frame received within {0:?}")]
    NoValidFrame(std::time::Duration),

    #[error("No valid baud rate found")]
    NoValidBaudRate,
}

impl<T> From<std::sync::PoisonError<T>> for PlatformError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PlatformError::Lock(format!("Lock poisoned: {}", err))
    }
}

impl<T> From<mpsc::SendError<T>> for PlatformError {
    fn from(err: mpsc::SendError<T>) -> Self {
        PlatformError::CommandSend(format!("Failed to send command: {}", err))
    }
}
