//! Error types for crosscast

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No active accounts found for the selected platforms")]
    NoActiveAccounts,

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("Post already published successfully for this account")]
    AlreadyPublished,

    #[error("Retry limit of {limit} reached (attempted {attempts} retries)")]
    RetryLimitExceeded { limit: u32, attempts: u32 },

    #[error("Rate limit exceeded for {identifier}, retry after {retry_after_secs}s")]
    RateLimited {
        identifier: String,
        retry_after_secs: u64,
    },
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::Validation(_) => 3,
            CrosscastError::NotFound(_, _) => 3,
            CrosscastError::AlreadyPublished => 3,
            CrosscastError::RetryLimitExceeded { .. } => 3,
            CrosscastError::Platform(PlatformError::Authentication { .. }) => 2,
            CrosscastError::Platform(_) => 1,
            CrosscastError::NoActiveAccounts => 1,
            CrosscastError::RateLimited { .. } => 1,
            CrosscastError::Config(_) => 1,
            CrosscastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures surfaced by a platform adapter for a single account.
///
/// These are captured into the owning post result during fan-out; they only
/// propagate as errors when an operation targets the account directly.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("{platform} authentication failed: {message}")]
    Authentication { platform: Platform, message: String },

    #[error("{message}")]
    ContentRejected {
        platform: Platform,
        message: String,
        code: Option<String>,
    },

    #[error("{platform} publish failed: {message}")]
    Publish {
        platform: Platform,
        message: String,
        code: Option<String>,
    },

    #[error("{platform} engagement fetch failed: {message}")]
    Engagement { platform: Platform, message: String },

    #[error("Credential unavailable for {platform} account {account_id}: {message}")]
    Credential {
        platform: Platform,
        account_id: String,
        message: String,
    },
}

impl PlatformError {
    /// Machine-readable code recorded alongside the message, when the
    /// platform supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            PlatformError::ContentRejected { code, .. } | PlatformError::Publish { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }
}
