//! Error types for the workout log.
//!
//! - [`StoreError`]: database failures, including the two integrity errors
//!   the web layer turns into flash messages
//! - [`ExportError`]: workbook generation and persistence
//! - [`ConfigError`]: start-up configuration
//! - [`AppError`]: top-level wrapper returned by the binaries

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "web")]
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[cfg(feature = "web")]
    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or connect to the database file.
    #[error("Database connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The schema script could not be applied.
    #[error("Migration failed: {message}")]
    MigrationFailed { message: String },

    /// An exercise with this name already exists.
    #[error("Exercise already exists: {name}")]
    DuplicateExercise { name: String },

    /// A set referenced an exercise id that is not in the catalogue.
    #[error("Unknown exercise id: {exercise_id}")]
    UnknownExercise { exercise_id: i64 },

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Export errors.
///
/// Only the primary copy can fail an export; the mirror copy is best effort.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}
