//! Error types for arbor operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    // The source chain contains the actual DbError with message/detail/hint
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly.");
    }
    msg
}

/// All error types that arbor operations can produce.
#[derive(Error, Debug)]
pub enum ArborError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A user-supplied URL flag is missing, empty, or not an absolute URL.
    /// Reported before any side effect occurs.
    #[error("Please provide a valid `{flag}` URL (current: {value})")]
    InvalidUrl { flag: String, value: String },

    /// A database query or connection operation failed.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// A network-wide operation was requested on a single-tenant installation.
    #[error("This is not a multi-tenant installation.")]
    NotMultiTenant,

    /// Could not acquire the PostgreSQL advisory lock guarding a schema sync.
    #[error("Failed to acquire advisory lock: {0}")]
    LockError(String),

    /// The requested site id does not exist in the site directory.
    #[error("Site {site_id} not found in the site directory")]
    SiteNotFound { site_id: i64 },
}

/// Convenience type alias for `Result<T, ArborError>`.
pub type Result<T> = std::result::Result<T, ArborError>;
