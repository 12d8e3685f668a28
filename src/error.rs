//! Error types for parallelizer
//!
//! Pool-level failures only. Per-task failures never travel through this
//! type; they are recorded in their result slot as a [`TaskError`].
//!
//! [`TaskError`]: crate::task::TaskError

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Argument and task list errors (3xx)
    LengthMismatch = 300,
    InvalidWorkerCount = 301,
    UnknownFunction = 302,
    InvalidTaskList = 303,
    InvalidBatchCount = 304,

    // Worker protocol errors (4xx)
    ProtocolMalformed = 401,
    ProtocolSerialization = 402,

    // Execution errors (5xx)
    WorkerSpawn = 500,
    TransformFailed = 501,
    PoolClosed = 502,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Argument errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Execution errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the pool
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Argument Errors
    // ─────────────────────────────────────────────────────────────

    /// Argument sequences of unequal length
    #[error(
        "Argument '{parameter}' has {actual} values but '{reference}' has {expected}"
    )]
    LengthMismatch {
        parameter: String,
        reference: String,
        expected: usize,
        actual: usize,
    },

    /// Worker count of zero
    #[error("Invalid worker count: {0} (must be at least 1)")]
    InvalidWorkerCount(usize),

    /// Task indices are duplicated or out of range
    #[error("Invalid task list: {message}")]
    InvalidTaskList { message: String },

    /// Batch count of zero
    #[error("Invalid batch count: {0} (must be at least 1)")]
    InvalidBatchCount(usize),

    /// Task function name not present in the registry
    #[error("Unknown task function: {name}")]
    UnknownFunction { name: String },

    // ─────────────────────────────────────────────────────────────
    // Worker Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// A worker sent or received a line that is not a valid message
    #[error("Malformed worker message: {message}")]
    ProtocolMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// A worker process could not be started
    #[error("Failed to spawn worker process '{program}'")]
    WorkerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The result transform rejected a value
    #[error("Result transform failed for task {index}: {message}")]
    Transform { index: usize, message: String },

    /// Work submitted after the pool stopped accepting jobs
    #[error("Worker pool is closed")]
    PoolClosed,

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::ProtocolSerialization,

            Error::LengthMismatch { .. } => ErrorCode::LengthMismatch,
            Error::InvalidWorkerCount(_) => ErrorCode::InvalidWorkerCount,
            Error::InvalidTaskList { .. } => ErrorCode::InvalidTaskList,
            Error::InvalidBatchCount(_) => ErrorCode::InvalidBatchCount,
            Error::UnknownFunction { .. } => ErrorCode::UnknownFunction,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,

            Error::WorkerSpawn { .. } => ErrorCode::WorkerSpawn,
            Error::Transform { .. } => ErrorCode::TransformFailed,
            Error::PoolClosed => ErrorCode::PoolClosed,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error was caused by the caller's input rather than the pool
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::LengthMismatch { .. }
                | Error::InvalidWorkerCount(_)
                | Error::InvalidTaskList { .. }
                | Error::InvalidBatchCount(_)
                | Error::UnknownFunction { .. }
                | Error::Transform { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'parallelizer config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'parallelizer config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::LengthMismatch { .. } => Some(
                "Every argument column must hold one value per task."
            ),
            Error::InvalidWorkerCount(_) => Some(
                "Pass a positive worker count, or omit it to use all but one CPU."
            ),
            Error::UnknownFunction { .. } => Some(
                "Run 'parallelizer functions' to list the available task functions."
            ),

            Error::WorkerSpawn { .. } => Some(
                "Check 'pool.worker_program' in the configuration, or unset it to use this executable."
            ),
            Error::ProtocolMalformed { .. } => Some(
                "The worker program must speak the parallelizer line protocol ('parallelizer worker')."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn invalid_task_list(message: impl Into<String>) -> Self {
        Error::InvalidTaskList {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Error::ProtocolMalformed {
            message: message.into(),
        }
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Error::UnknownFunction { name: name.into() }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
