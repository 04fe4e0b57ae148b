//! Error types for statbridge-core.

use thiserror::Error;

use crate::registry::ParamKind;

/// Result type for statbridge-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing the runtime or dispatching a method.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedded runtime could not be allocated. Retryable.
    #[error("runtime initialization failed: {0}")]
    Initialization(String),

    /// A worker's packages or module could not be installed. Retryable.
    #[error("failed to load worker {worker_id}: {cause}")]
    WorkerLoad { worker_id: u8, cause: String },

    /// A caller-supplied argument does not match the declared kind.
    #[error("invalid value for parameter '{param}': expected {expected}, got {got}")]
    Validation {
        param: String,
        expected: ParamKind,
        got: String,
    },

    /// The args map carries a key the method does not declare.
    #[error("method '{method}' does not accept parameter '{param}'")]
    UnknownParameter { method: String, param: String },

    /// A required parameter was not supplied.
    #[error("method '{method}' requires parameter '{param}'")]
    MissingParameter { method: String, param: String },

    /// Method id not present in the registry.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A call named a worker that does not own the method.
    #[error("method '{method}' belongs to worker {expected}, not worker {requested}")]
    WorkerMismatch {
        method: String,
        expected: u8,
        requested: u8,
    },

    /// Extraction produced fewer samples or groups than the method needs.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The interpreter reported an error payload for the call.
    #[error("'{method}' reported an error: {message}")]
    RuntimeExecution { method: String, message: String },

    /// Communication with the interpreter process broke down.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Malformed registry data.
    #[error("registry error: {0}")]
    Registry(String),

    /// A success payload could not be decoded into the typed result.
    #[error("failed to decode result of '{method}': {message}")]
    Decode { method: String, message: String },

    /// Invalid or unresolvable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a caller-level retry can succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Initialization(_) | Error::WorkerLoad { .. })
    }

    /// Format the error with a recovery hint for terminal output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Initialization(_) => Some(
                "check that the interpreter is installed, or set STATBRIDGE_PYTHON to its path",
            ),
            Error::WorkerLoad { .. } => Some(
                "check the worker module directory (STATBRIDGE_WORKERS_DIR) and that its packages are installed",
            ),
            Error::Validation { .. } | Error::UnknownParameter { .. } | Error::MissingParameter { .. } => {
                Some("run `statbridge methods` to see the parameters each method accepts")
            }
            Error::UnknownMethod(_) => Some("run `statbridge methods` to list registered methods"),
            Error::InsufficientData(_) => {
                Some("check the column mapping and that the selected columns contain numeric values")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
