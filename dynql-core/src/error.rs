use thiserror::Error;

/// Error codes reported by the store for rejected requests.
///
/// These travel inside [`Error::Store`] unchanged so callers can branch on
/// the store's own classification.
pub mod store_code {
    pub const CONDITIONAL_CHECK_FAILED: &str = "CONDITIONAL_CHECK_FAILED";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const RESOURCE_IN_USE: &str = "RESOURCE_IN_USE";
    pub const THROUGHPUT_EXCEEDED: &str = "THROUGHPUT_EXCEEDED";
    pub const TRANSACTION_CANCELED: &str = "TRANSACTION_CANCELED";
    pub const VALIDATION: &str = "VALIDATION";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed dialect text, tagged with the offending token's position
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: u64,
        column: u64,
    },

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bind error: {0}")]
    Bind(String),

    /// Remote rejection, carrying the store's native code
    #[error("Store error [{code}]: {message}")]
    Store { code: String, message: String },

    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// Commit-time batch failure; nothing in the batch was applied
    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("{0} is not supported")]
    NotSupported(String),

    /// Deadline or cancellation reported by the store client
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    /// For store errors this is the store's own code.
    pub fn code(&self) -> &str {
        match self {
            Error::Syntax { .. } => "SYNTAX_ERROR",
            Error::Compile(_) => "COMPILE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Bind(_) => "BIND_ERROR",
            Error::Store { code, .. } => code,
            Error::TransactionState(_) => "TRANSACTION_STATE_ERROR",
            Error::Transaction(_) => "TRANSACTION_ERROR",
            Error::NotSupported(_) => "NOT_SUPPORTED",
            Error::Cancelled(_) => "CANCELLED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may reasonably retry the same call.
    ///
    /// Nothing inside this crate retries; the flag is for the caller or the
    /// transport layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store { code, .. } => code == store_code::THROUGHPUT_EXCEEDED,
            Error::Cancelled(_) => true,

            Error::Syntax { .. }
            | Error::Compile(_)
            | Error::Validation(_)
            | Error::Bind(_)
            | Error::TransactionState(_)
            | Error::Transaction(_)
            | Error::NotSupported(_)
            | Error::InvalidConfig(_)
            | Error::Internal(_) => false,
        }
    }

    /// Builds a store error from a code and message.
    pub fn store(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Store {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for a store rejection caused by a failed write condition.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Error::Store { code, .. } if code == store_code::CONDITIONAL_CHECK_FAILED)
    }

    /// Adds context to an error by wrapping it in an Internal error.
    pub fn with_context(self, context: &str) -> Error {
        Error::Internal(format!("{}: {}", context, self))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
