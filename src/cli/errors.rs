//! CLI-specific error types
//!
//! Every failure carries a stable code that is echoed in the JSON error
//! envelope.

use std::fmt;
use std::io;

use crate::catalog::CatalogError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout, input files)
    IoError,
    /// Storage directory already holds data
    AlreadyInitialized,
    /// Storage directory missing
    NotInitialized,
    /// Record absent or not visible to the caller
    NotFound,
    /// Caller may not write the record
    Unauthorized,
    /// Record exists and overwrite was not requested
    Conflict,
    /// Malformed metadata, query or search text
    BadRequest,
    /// Storage or index failure
    Internal,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CATALOG_CLI_CONFIG_ERROR",
            Self::IoError => "CATALOG_CLI_IO_ERROR",
            Self::AlreadyInitialized => "CATALOG_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "CATALOG_CLI_NOT_INITIALIZED",
            Self::NotFound => "CATALOG_NOT_FOUND",
            Self::Unauthorized => "CATALOG_UNAUTHORIZED",
            Self::Conflict => "CATALOG_CONFLICT",
            Self::BadRequest => "CATALOG_BAD_REQUEST",
            Self::Internal => "CATALOG_INTERNAL",
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            403 => Self::Unauthorized,
            404 => Self::NotFound,
            409 => Self::Conflict,
            _ => Self::Internal,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Storage directory already initialized",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Storage directory not initialized. Run 'catalog-store init' first.",
        )
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Config(message) => Self::config_error(message),
            other => Self::new(CliErrorCode::from_status(other.status_code()), other.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
