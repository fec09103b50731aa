//! SQLite store for users, the exercise catalogue, logged sets and
//! finalization markers.
//!
//! Every read is by exact date or by date range; every write is a single-row
//! insert/update or a delete scoped by date. Dates are stored as
//! `YYYY-MM-DD` text so that lexical and calendar order agree.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};

use crate::config::Config;
use crate::error::StoreError;

/// Exercises inserted when the catalogue is empty.
pub const SEED_EXERCISES: [&str; 15] = [
    "Leg Press",
    "Machine Chest Press",
    "Lat Pulldown",
    "Seated Cable Row",
    "Bicep Curls",
    "Machine Shoulder Press",
    "Leg Curl",
    "Leg Extension",
    "Calf Extension",
    "Tricep Pushdown",
    "Pec Fly",
    "Vertical Chest Press",
    "Treadmill",
    "Exercise Bike",
    "Rowing Machine",
];

/// Tables with a `date` column that a day wipe clears.
///
/// The `finalized` marker table is not listed: markers guard wipes and are
/// never wiped themselves.
pub const DATED_TABLES: &[&str] = &["sets"];

/// Longest notes text kept on a set, in characters.
pub const NOTES_MAX_CHARS: usize = 500;

/// Row limit of the history view when no range is given.
pub const RECENT_LIMIT: i64 = 200;

const SET_COLUMNS: &str = "s.id, s.date, s.time, e.name AS exercise, s.reps, s.weight_kg, s.sets, s.notes \
     FROM sets s JOIN exercises e ON s.exercise_id = e.id";

/// Canonical text form of a calendar date in the store.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` date as submitted by an HTML date input.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// A set about to be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSet {
    /// Submission timestamp (RFC 3339, configured timezone); fixes entry order.
    pub ts: String,
    pub date: NaiveDate,
    /// Wall-clock time as entered, `HH:MM`.
    pub time: String,
    pub exercise_id: i64,
    pub reps: i64,
    pub weight_kg: f64,
    pub sets: i64,
    pub notes: String,
    pub user_id: Option<i64>,
}

/// A logged set joined with its exercise name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedSet {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub exercise: String,
    pub reps: i64,
    pub weight_kg: f64,
    pub sets: i64,
    pub notes: Option<String>,
}

impl LoggedSet {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            date: row.try_get("date")?,
            time: row.try_get("time")?,
            exercise: row.try_get("exercise")?,
            reps: row.try_get("reps")?,
            weight_kg: row.try_get("weight_kg")?,
            sets: row.try_get("sets")?,
            notes: row.try_get("notes")?,
        })
    }
}

/// SQLite-backed store. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database file and apply the schema.
    pub async fn open(database_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::ConnectionFailed {
                message: format!("Failed to create database directory: {e}"),
            })?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
                .map_err(|e| StoreError::ConnectionFailed {
                    message: format!("Invalid database path: {e}"),
                })?
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                message: format!("Failed to connect to database: {e}"),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory store for tests. A single pooled connection that never
    /// expires keeps the database alive.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionFailed {
                message: format!("Invalid memory database options: {e}"),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                message: format!("Failed to create in-memory database: {e}"),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let schema = include_str!("../migrations/001_initial_schema.sql");
        sqlx::query(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed {
                message: format!("Failed to apply schema: {e}"),
            })?;
        Ok(())
    }

    /// First-run seeding: the exercise catalogue and, when a hash is
    /// configured, the admin user.
    pub async fn bootstrap(&self, config: &Config) -> Result<(), StoreError> {
        self.seed_exercises().await?;

        if config.admin_password_hash.is_empty() {
            tracing::debug!("No ADMIN_PASSWORD_HASH configured; admin not seeded");
            return Ok(());
        }
        self.seed_user(
            &config.admin_username,
            config.admin_password_hash.expose(),
            &config.now().to_rfc3339(),
        )
        .await?;
        Ok(())
    }

    /// Seed the exercise catalogue if it is empty. Returns how many were added.
    pub async fn seed_exercises(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercises")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for name in SEED_EXERCISES {
            sqlx::query("INSERT INTO exercises (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!(count = SEED_EXERCISES.len(), "Seeded exercise catalogue");
        Ok(SEED_EXERCISES.len())
    }

    /// Insert the bootstrap user unless one with that name already exists.
    /// Returns whether a row was inserted.
    pub async fn seed_user(
        &self,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<bool, StoreError> {
        if self.find_user_by_name(username).await?.is_some() {
            return Ok(false);
        }

        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        tracing::info!(username, "Seeded user");
        Ok(true)
    }

    pub async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| user_from_row(&row)).transpose().map_err(Into::into)
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row =
            sqlx::query("SELECT id, username, password_hash, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| user_from_row(&row)).transpose().map_err(Into::into)
    }

    pub async fn set_password_hash(&self, user_id: i64, hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active exercises, by name. These populate the entry form.
    pub async fn active_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        self.exercises("SELECT id, name, is_active FROM exercises WHERE is_active = 1 ORDER BY name")
            .await
    }

    /// The whole catalogue, by name.
    pub async fn all_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        self.exercises("SELECT id, name, is_active FROM exercises ORDER BY name")
            .await
    }

    async fn exercises(&self, sql: &str) -> Result<Vec<Exercise>, StoreError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let is_active: i64 = row.try_get("is_active")?;
                Ok(Exercise {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    is_active: is_active != 0,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(Into::into)
    }

    /// Add an exercise to the catalogue.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateExercise`] if the name is taken.
    pub async fn add_exercise(&self, name: &str) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO exercises (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateExercise {
                        name: name.to_string(),
                    }
                } else {
                    StoreError::Query(e)
                }
            })?;
        Ok(result.last_insert_rowid())
    }

    /// Flip an exercise between active and inactive. Unknown ids are ignored.
    pub async fn toggle_exercise(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE exercises SET is_active = 1 - is_active WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Log one set. Notes beyond [`NOTES_MAX_CHARS`] are cut off.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownExercise`] if `exercise_id` is not in the catalogue.
    pub async fn insert_set(&self, set: &NewSet) -> Result<i64, StoreError> {
        let unknown = || StoreError::UnknownExercise {
            exercise_id: set.exercise_id,
        };

        let known: Option<i64> = sqlx::query_scalar("SELECT id FROM exercises WHERE id = ?")
            .bind(set.exercise_id)
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Err(unknown());
        }

        let notes: String = set.notes.chars().take(NOTES_MAX_CHARS).collect();
        let result = sqlx::query(
            "INSERT INTO sets (ts, date, time, exercise_id, reps, weight_kg, sets, notes, user_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&set.ts)
        .bind(date_key(set.date))
        .bind(&set.time)
        .bind(set.exercise_id)
        .bind(set.reps)
        .bind(set.weight_kg)
        .bind(set.sets)
        .bind(notes)
        .bind(set.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                unknown()
            } else {
                StoreError::Query(e)
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Sets logged on one day, in the order they were entered.
    pub async fn sets_on(&self, date: NaiveDate) -> Result<Vec<LoggedSet>, StoreError> {
        let sql = format!("SELECT {SET_COLUMNS} WHERE s.date = ? ORDER BY s.ts ASC, s.id ASC");
        let rows = sqlx::query(&sql)
            .bind(date_key(date))
            .fetch_all(&self.pool)
            .await?;
        collect_sets(&rows)
    }

    /// Sets between two days inclusive, by date then time.
    pub async fn sets_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LoggedSet>, StoreError> {
        let sql = format!(
            "SELECT {SET_COLUMNS} WHERE s.date BETWEEN ? AND ? ORDER BY s.date, s.time, s.id"
        );
        let rows = sqlx::query(&sql)
            .bind(date_key(start))
            .bind(date_key(end))
            .fetch_all(&self.pool)
            .await?;
        collect_sets(&rows)
    }

    /// The most recent sets, newest first.
    pub async fn recent_sets(&self, limit: i64) -> Result<Vec<LoggedSet>, StoreError> {
        let sql = format!("SELECT {SET_COLUMNS} ORDER BY s.date DESC, s.time DESC, s.id DESC LIMIT ?");
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        collect_sets(&rows)
    }

    /// Whether a finalization marker exists for `date`.
    pub async fn has_marker(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM finalized WHERE date = ?")
            .bind(date_key(date))
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Record that `date` was exported as `file_name`.
    pub async fn record_marker(
        &self,
        date: NaiveDate,
        file_name: &str,
        finalized_at: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO finalized (date, file_name, finalized_at) VALUES (?, ?, ?) \
             ON CONFLICT(date) DO UPDATE SET file_name = excluded.file_name, \
             finalized_at = excluded.finalized_at",
        )
        .bind(date_key(date))
        .bind(file_name)
        .bind(finalized_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete every row dated `date` from each of [`DATED_TABLES`].
    ///
    /// Runs in one transaction. A failing table is logged and skipped; the
    /// others are still cleared. Returns the number of rows removed.
    pub async fn delete_dated_rows(&self, date: NaiveDate) -> Result<u64, StoreError> {
        let day = date_key(date);
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for table in DATED_TABLES {
            let sql = format!("DELETE FROM \"{table}\" WHERE date = ?");
            match sqlx::query(&sql).bind(&day).execute(&mut *tx).await {
                Ok(result) => deleted += result.rows_affected(),
                Err(e) => tracing::warn!(table, error = %e, "Skipping table during wipe"),
            }
        }

        tx.commit().await?;
        Ok(deleted)
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect_sets(rows: &[SqliteRow]) -> Result<Vec<LoggedSet>, StoreError> {
    rows.iter()
        .map(LoggedSet::from_row)
        .collect::<Result<_, _>>()
        .map_err(Into::into)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}
