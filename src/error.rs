use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PiperError {
    #[error("invalid timestamp {0:?} (expected YYYY-MM-DDTHH:MM:SS[.fff])")]
    #[diagnostic(help("example: 2023-02-05T00:00:00.000"))]
    InvalidTimestamp(String),

    #[error("invalid time range: end {end} is before start {start}")]
    InvalidRange { start: String, end: String },

    #[error("invalid cadence: {0}")]
    #[diagnostic(help("cadence must be a positive number of minutes, hours or days, e.g. 12min, 1h, 1day"))]
    InvalidCadence(String),

    #[error("unsupported AIA wavelength: {0}")]
    #[diagnostic(help("supported: 94, 131, 171, 193, 211, 304, 335, 1600, 1700, 4500"))]
    InvalidWavelength(u32),

    #[error("invalid wavelength {0:?}")]
    #[diagnostic(help("supported: 94, 131, 171, 193, 211, 304, 335, 1600, 1700, 4500"))]
    InvalidWavelengthText(String),

    #[error("search window around {0} is outside the supported time range")]
    TimeOutOfRange(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigInvalid(String),

    #[error("archive unreachable: {0}")]
    ArchiveUnreachable(String),

    #[error("archive denied access with status {0}")]
    ArchiveAccessDenied(u16),

    #[error("archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("archive returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("unexpected archive response: {0}")]
    ArchiveResponse(String),

    #[error("no archive record within {tolerance_secs}s of {timestamp}")]
    NoRecord {
        timestamp: String,
        tolerance_secs: i64,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl PiperError {
    /// Errors that make every later sample pointless; the batch stops on these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PiperError::ArchiveUnreachable(_)
                | PiperError::ArchiveAccessDenied(_)
                | PiperError::Filesystem(_)
        )
    }
}
