//! Error types and handling
//!
//! Every operation in the core returns a structured fault rather than
//! panicking. Faults carry a stable `error_code` (the wire-protocol codes
//! consumed by client applications) and a `FaultKind` that separates
//! client-side faults from server-side integrity/persistence failures.
//!
//! Soft verification failures (expired key, device limit) are *not* errors;
//! they are `VerifyOutcome` variants returned by the verification engine.

use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or range
    #[error("Validation error: {0}")]
    Validation(String),

    /// No key record with the given code
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// No user account with the given id or name
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Username already registered
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Custom key code collides with an existing record
    #[error("Key code already exists: {0}")]
    DuplicateKeyCode(String),

    /// Code generation kept colliding and hit the retry cap
    #[error("Key generation exhausted after {attempts} attempts")]
    KeyGenerationExhausted { attempts: u32 },

    /// Requested key duration exceeds the configured policy maximum
    #[error("Key duration of {requested} days exceeds the {max}-day limit")]
    MaxDaysExceeded { requested: i64, max: i64 },

    /// Device already carries the maximum number of accounts
    #[error("Device already has the maximum of {max} accounts")]
    DeviceAccountLimit { max: usize },

    /// Account is banned
    #[error("Account is banned")]
    AccountBanned,

    /// Account is deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// Registration is switched off in the runtime settings
    #[error("Registration is currently disabled")]
    RegistrationDisabled,

    /// Unknown username or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Stored signature does not match the recomputed one. The record was
    /// edited outside the API or the signing secret rotated; surfaced as a
    /// server-side fault, never silently repaired.
    #[error("Signature mismatch for key {0}")]
    SignatureMismatch(String),

    /// Store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fault taxonomy, mirrored by the HTTP layer's status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Bad input; recoverable, nothing was mutated
    Validation,
    /// Unknown key/user/device
    NotFound,
    /// A configured limit was exceeded
    Policy,
    /// Data corruption (signature mismatch)
    Integrity,
    /// Store read/write failure
    Persistence,
}

impl FaultKind {
    /// True for faults that indicate a server-side problem (5xx severity)
    /// rather than a client mistake.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, FaultKind::Integrity | FaultKind::Persistence)
    }
}

impl AppError {
    /// Stable error code for programmatic handling by clients
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::KeyNotFound(_) => "KEY_NOT_FOUND",
            AppError::UserNotFound(_) => "USER_NOT_FOUND",
            AppError::UsernameTaken(_) => "USERNAME_TAKEN",
            AppError::DuplicateKeyCode(_) => "DUPLICATE_KEY_CODE",
            AppError::KeyGenerationExhausted { .. } => "KEY_GENERATION_EXHAUSTED",
            AppError::MaxDaysExceeded { .. } => "MAX_DAYS_EXCEEDED",
            AppError::DeviceAccountLimit { .. } => "DEVICE_ACCOUNT_LIMIT",
            AppError::AccountBanned => "ACCOUNT_BANNED",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::RegistrationDisabled => "REGISTRATION_DISABLED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::SignatureMismatch(_) => "SIGNATURE_MISMATCH",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "SERVER_ERROR",
        }
    }

    /// The taxonomy bucket this fault belongs to
    pub fn kind(&self) -> FaultKind {
        match self {
            AppError::Validation(_)
            | AppError::UsernameTaken(_)
            | AppError::DuplicateKeyCode(_)
            | AppError::InvalidCredentials => FaultKind::Validation,
            AppError::KeyNotFound(_) | AppError::UserNotFound(_) => FaultKind::NotFound,
            AppError::KeyGenerationExhausted { .. }
            | AppError::MaxDaysExceeded { .. }
            | AppError::DeviceAccountLimit { .. }
            | AppError::AccountBanned
            | AppError::AccountDisabled
            | AppError::RegistrationDisabled => FaultKind::Policy,
            AppError::SignatureMismatch(_) => FaultKind::Integrity,
            AppError::Storage(_) | AppError::Internal(_) => FaultKind::Persistence,
        }
    }
}

// Implement From for common error types

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("JSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for core operations
pub type AppResult<T> = Result<T, AppError>;
