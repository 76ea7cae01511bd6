//! Error taxonomy for ingest-watch
//!
//! Each error carries a stable numeric code; the CLI derives its exit code
//! from the code family. Transport-level failures never appear here: the
//! subscription loop absorbs them and retries, and only reconnect
//! exhaustion or an explicit server-side task failure surfaces.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric codes, grouped by family:
/// configuration 1xx, io 2xx, connection 3xx, task 5xx, internal 9xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    ConfigNotFound = 100,
    ConfigParse = 101,
    ConfigValidation = 102,

    Io = 200,

    InvalidEndpoint = 300,
    ReconnectExhausted = 301,

    TaskFailed = 500,

    Internal = 900,
}

impl ErrorCode {
    /// CLI exit code, one per family
    pub fn exit_code(self) -> i32 {
        (self as u16 / 100 * 10) as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Invalid progress endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Gave up after {attempts} reconnect attempts without a terminal status")]
    ReconnectExhausted { attempts: u32 },

    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn task_failed(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TaskFailed {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } | Error::Toml(_) => ErrorCode::ConfigParse,
            Error::ConfigValidation { .. } | Error::Config(_) => ErrorCode::ConfigValidation,
            Error::Io(_) => ErrorCode::Io,
            Error::InvalidEndpoint { .. } => ErrorCode::InvalidEndpoint,
            Error::ReconnectExhausted { .. } => ErrorCode::ReconnectExhausted,
            Error::TaskFailed { .. } => ErrorCode::TaskFailed,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// A one-line hint shown under the error, when there is something
    /// actionable to say
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => {
                Some("Run 'ingest-watch config init' to create a default configuration file.")
            }
            Error::ConfigParse { .. } => {
                Some("Check the file syntax with 'ingest-watch config validate'.")
            }
            Error::ConfigValidation { .. } | Error::Config(_) => {
                Some("Review the configuration file and fix the invalid values.")
            }
            Error::InvalidEndpoint { .. } => {
                Some("The endpoint URL must start with ws:// or wss:// and name the upload progress route.")
            }
            Error::ReconnectExhausted { .. } => {
                Some("The backend stopped responding. Check whether the task is still listed as active.")
            }
            Error::TaskFailed { .. } => {
                Some("The ingestion pipeline rejected the document. Inspect the server logs for the task id.")
            }
            _ => None,
        }
    }

    /// Render for the terminal: red code prefix, optional yellow hint
    pub fn format_for_terminal(&self) -> String {
        let mut out = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code(), self);
        if let Some(hint) = self.suggestion() {
            out.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }
        out
    }

    /// Render for log files, without ANSI escapes
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }
}
