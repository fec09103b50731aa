//! Daily and weekly spreadsheet exports.
//!
//! Each export is written to the primary export directory (must succeed) and
//! then mirrored to the secondary directory (best effort). Filenames come from
//! [`crate::finalize`] so the finalization check recognizes them later.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};

use crate::config::ExportDirs;
use crate::downloader::to_xlsx;
use crate::error::ExportError;
use crate::finalize::{daily_file_name, weekly_file_name};
use crate::store::{Store, date_key};

/// Length of the weekly window, inclusive of both ends.
pub const WEEK_DAYS: u64 = 7;

/// Result of a daily export. Carries the bytes for download.
#[derive(Debug, Clone)]
pub struct DayExport {
    pub date: NaiveDate,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub row_count: usize,
    pub primary_path: PathBuf,
    pub mirrored: bool,
}

/// Result of a weekly export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekExport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub file_name: String,
    pub row_count: usize,
    pub primary_path: PathBuf,
    pub mirrored: bool,
}

/// First day of the weekly window ending on `end`.
#[must_use]
pub fn week_start(end: NaiveDate) -> NaiveDate {
    end - Days::new(WEEK_DAYS - 1)
}

/// Export one day and mark it finalized.
///
/// A day with no sets still produces a header-only workbook. The marker row
/// is written once the primary copy is on disk; failing to write it is logged
/// because the file alone already finalizes the day.
pub async fn export_day(
    store: &Store,
    dirs: &ExportDirs,
    date: NaiveDate,
    finalized_at: &str,
) -> Result<DayExport, ExportError> {
    let rows = store.sets_on(date).await?;
    let bytes = to_xlsx(&date_key(date), &rows)?;
    let file_name = daily_file_name(date);

    let (primary_path, mirrored) = persist(dirs, &file_name, &bytes).await?;

    if let Err(e) = store.record_marker(date, &file_name, finalized_at).await {
        tracing::warn!(%date, error = %e, "Failed to record finalization marker");
    }

    tracing::info!(%date, rows = rows.len(), file = %file_name, mirrored, "Daily export written");
    Ok(DayExport {
        date,
        file_name,
        bytes,
        row_count: rows.len(),
        primary_path,
        mirrored,
    })
}

/// Export the seven days ending on `end`.
///
/// Returns `None`, writing nothing, when the window holds no sets.
pub async fn export_week(
    store: &Store,
    dirs: &ExportDirs,
    end: NaiveDate,
) -> Result<Option<WeekExport>, ExportError> {
    let start = week_start(end);
    let rows = store.sets_between(start, end).await?;
    if rows.is_empty() {
        tracing::info!(%start, %end, "No sets this week; nothing exported");
        return Ok(None);
    }

    let bytes = to_xlsx("Weekly", &rows)?;
    let file_name = weekly_file_name(start, end);
    let (primary_path, mirrored) = persist(dirs, &file_name, &bytes).await?;

    tracing::info!(%start, %end, rows = rows.len(), file = %file_name, mirrored, "Weekly export written");
    Ok(Some(WeekExport {
        start,
        end,
        file_name,
        row_count: rows.len(),
        primary_path,
        mirrored,
    }))
}

/// Write `bytes` to the primary directory, then try the mirror.
async fn persist(
    dirs: &ExportDirs,
    file_name: &str,
    bytes: &[u8],
) -> Result<(PathBuf, bool), ExportError> {
    let primary_path = dirs.primary.join(file_name);
    write_file(&dirs.primary, &primary_path, bytes)
        .await
        .map_err(|source| ExportError::Write {
            path: primary_path.clone(),
            source,
        })?;

    let mirror_path = dirs.mirror.join(file_name);
    let mirrored = match write_file(&dirs.mirror, &mirror_path, bytes).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %mirror_path.display(), error = %e, "Mirror copy not written");
            false
        }
    };

    Ok((primary_path, mirrored))
}

async fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalize::is_finalized;
    use crate::store::tests::{day, exercise_id, new_set, test_store};

    fn dirs_in(root: &Path) -> ExportDirs {
        ExportDirs::new(root.join("exports"), root.join("smb").join("exports"))
    }

    #[test]
    fn test_week_start() {
        assert_eq!(week_start(day("2024-03-01")), day("2024-02-24"));
        assert_eq!(week_start(day("2024-01-03")), day("2023-12-28"));
    }

    #[tokio::test]
    async fn test_export_day_writes_both_copies_and_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = dirs_in(tmp.path());
        let store = test_store().await;
        let press = exercise_id(&store, "Leg Press").await;
        store.insert_set(&new_set("2024-03-01", "10:00", press, 0)).await.unwrap();

        let export = export_day(&store, &dirs, day("2024-03-01"), "t").await.unwrap();

        assert_eq!(export.file_name, "01-03-2024 - workout.xlsx");
        assert_eq!(export.row_count, 1);
        assert!(export.mirrored);
        assert_eq!(export.primary_path, dirs.primary.join("01-03-2024 - workout.xlsx"));
        assert_eq!(std::fs::read(&export.primary_path).unwrap(), export.bytes);
        assert!(dirs.mirror.join("01-03-2024 - workout.xlsx").exists());
        assert!(store.has_marker(day("2024-03-01")).await.unwrap());
        assert!(is_finalized(&store, &dirs, day("2024-03-01")).await);
    }

    #[tokio::test]
    async fn test_export_empty_day_still_writes_header_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = dirs_in(tmp.path());
        let store = test_store().await;

        let export = export_day(&store, &dirs, day("2024-03-05"), "t").await.unwrap();
        assert_eq!(export.row_count, 0);
        assert!(export.primary_path.exists());
        assert!(export.bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_fail_export() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the mirror directory should be.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let dirs = ExportDirs::new(tmp.path().join("exports"), blocker.join("exports"));
        let store = test_store().await;

        let export = export_day(&store, &dirs, day("2024-03-01"), "t").await.unwrap();
        assert!(!export.mirrored);
        assert!(export.primary_path.exists());
    }

    #[tokio::test]
    async fn test_primary_failure_fails_export() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let dirs = ExportDirs::new(blocker.join("exports"), tmp.path().join("mirror"));
        let store = test_store().await;

        let err = export_day(&store, &dirs, day("2024-03-01"), "t").await.unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(!store.has_marker(day("2024-03-01")).await.unwrap());
    }

    #[tokio::test]
    async fn test_export_week_counts_window_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = dirs_in(tmp.path());
        let store = test_store().await;
        let press = exercise_id(&store, "Leg Press").await;
        store.insert_set(&new_set("2024-02-23", "10:00", press, 0)).await.unwrap();
        store.insert_set(&new_set("2024-02-24", "10:00", press, 1)).await.unwrap();
        store.insert_set(&new_set("2024-03-01", "10:00", press, 2)).await.unwrap();
        store.insert_set(&new_set("2024-03-02", "10:00", press, 3)).await.unwrap();

        let export = export_week(&store, &dirs, day("2024-03-01"))
            .await
            .unwrap()
            .expect("rows in window");

        assert_eq!(export.row_count, 2);
        assert_eq!(export.file_name, "24-02-2024 to 01-03-2024 - weekly.xlsx");
        assert!(export.primary_path.exists());
        assert!(dirs.mirror.join(&export.file_name).exists());
        // Weekly exports never finalize days.
        assert!(!store.has_marker(day("2024-03-01")).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_week_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = dirs_in(tmp.path());
        let store = test_store().await;

        assert_eq!(export_week(&store, &dirs, day("2024-03-01")).await.unwrap(), None);
        assert!(!dirs.primary.exists());
    }
}
