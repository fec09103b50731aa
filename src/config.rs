//! Configuration management.
//!
//! Everything is environment-style: variables are read once at start-up
//! (after loading an optional `.env`) into a [`Config`] that is handed to
//! each component explicitly.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Default database path.
pub const DEFAULT_DATABASE_PATH: &str = "/data/workouts.sqlite";

/// Default primary export directory.
pub const DEFAULT_EXPORT_DIR: &str = "/exports";

/// Default mirror export directory (usually a network share).
pub const DEFAULT_MIRROR_EXPORT_DIR: &str = "/smb/exports";

/// Default timezone identifier.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Default bootstrap admin username.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default static asset directory.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Default session lifetime in minutes.
pub const DEFAULT_SESSION_MINUTES: u64 = 120;

/// Longest accepted session lifetime in minutes (one year).
pub const MAX_SESSION_MINUTES: u64 = 60 * 24 * 365;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// A wrapper for sensitive strings that redacts the value in Debug/Display output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the underlying secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

/// The two places exports are written to and looked up from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDirs {
    /// Primary export directory. Writing here must succeed.
    pub primary: PathBuf,
    /// Mirrored secondary directory. Writing here is best effort.
    pub mirror: PathBuf,
}

impl ExportDirs {
    #[must_use]
    pub fn new(primary: impl Into<PathBuf>, mirror: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            mirror: mirror.into(),
        }
    }

    /// Both roots, primary first.
    #[must_use]
    pub fn roots(&self) -> [&PathBuf; 2] {
        [&self.primary, &self.mirror]
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub export_dirs: ExportDirs,
    /// Timezone used for "today", the current time and set timestamps.
    pub timezone: Tz,
    pub admin_username: String,
    /// PHC-format argon2 hash. No admin is seeded when empty.
    pub admin_password_hash: SecretString,
    pub bind_addr: String,
    pub static_dir: PathBuf,
    pub session_minutes: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `DATABASE_PATH` (`/data/workouts.sqlite`)
    /// - `EXPORT_DIR` (`/exports`)
    /// - `MIRROR_EXPORT_DIR` (`/smb/exports`)
    /// - `TIMEZONE` (`UTC`)
    /// - `ADMIN_USERNAME` (`admin`)
    /// - `ADMIN_PASSWORD_HASH` (empty)
    /// - `BIND_ADDR` (`127.0.0.1:3000`)
    /// - `STATIC_DIR` (`static`)
    /// - `SESSION_MINUTES` (`120`)
    /// - `LOG_LEVEL` (`info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `TIMEZONE` is not a known IANA zone or
    /// `SESSION_MINUTES` is not an integer in `1..=MAX_SESSION_MINUTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let timezone_name = var("TIMEZONE", DEFAULT_TIMEZONE);
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "TIMEZONE".into(),
                reason: format!("unknown timezone '{timezone_name}': {e}"),
            })?;

        let session_minutes = match lookup("SESSION_MINUTES") {
            None => DEFAULT_SESSION_MINUTES,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(minutes) if (1..=MAX_SESSION_MINUTES).contains(&minutes) => minutes,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "SESSION_MINUTES".into(),
                        reason: format!("must be an integer from 1 to {MAX_SESSION_MINUTES}"),
                    });
                }
            },
        };

        Ok(Self {
            database_path: PathBuf::from(var("DATABASE_PATH", DEFAULT_DATABASE_PATH)),
            export_dirs: ExportDirs::new(
                var("EXPORT_DIR", DEFAULT_EXPORT_DIR),
                var("MIRROR_EXPORT_DIR", DEFAULT_MIRROR_EXPORT_DIR),
            ),
            timezone,
            admin_username: var("ADMIN_USERNAME", DEFAULT_ADMIN_USERNAME),
            admin_password_hash: SecretString::new(var("ADMIN_PASSWORD_HASH", "")),
            bind_addr: var("BIND_ADDR", DEFAULT_BIND_ADDR),
            static_dir: PathBuf::from(var("STATIC_DIR", DEFAULT_STATIC_DIR)),
            session_minutes,
            log_level: var("LOG_LEVEL", DEFAULT_LOG_LEVEL),
        })
    }

    /// Current instant in the configured timezone.
    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Today's calendar date in the configured timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}
