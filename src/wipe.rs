//! Reset/wipe of a single day, guarded by the finalization check.

use chrono::NaiveDate;

use crate::config::ExportDirs;
use crate::error::StoreError;
use crate::finalize::is_finalized;
use crate::store::Store;

/// What a wipe did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    /// The day is finalized; nothing was touched.
    Finalized,
    /// The day was open and this many rows were removed (possibly zero).
    Wiped { rows_deleted: u64 },
}

/// Delete every dated row for `date` unless the day is finalized.
///
/// Idempotent: a second call on the same open day removes nothing more.
pub async fn wipe_day(
    store: &Store,
    dirs: &ExportDirs,
    date: NaiveDate,
) -> Result<WipeOutcome, StoreError> {
    if is_finalized(store, dirs, date).await {
        tracing::info!(%date, "Day is finalized; wipe skipped");
        return Ok(WipeOutcome::Finalized);
    }

    let rows_deleted = store.delete_dated_rows(date).await?;
    tracing::info!(%date, rows_deleted, "Day wiped");
    Ok(WipeOutcome::Wiped { rows_deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{day, exercise_id, new_set, test_store};

    #[tokio::test]
    async fn test_wipe_open_day_is_idempotent() {
        crate::logging::init_test();
        let tmp = tempfile::tempdir().unwrap();
        let dirs = ExportDirs::new(tmp.path().join("a"), tmp.path().join("b"));
        let store = test_store().await;
        let press = exercise_id(&store, "Leg Press").await;
        store.insert_set(&new_set("2024-03-01", "10:00", press, 0)).await.unwrap();
        store.insert_set(&new_set("2024-03-02", "10:00", press, 1)).await.unwrap();

        let first = wipe_day(&store, &dirs, day("2024-03-01")).await.unwrap();
        let after_first = store.sets_on(day("2024-03-01")).await.unwrap();
        let second = wipe_day(&store, &dirs, day("2024-03-01")).await.unwrap();
        let after_second = store.sets_on(day("2024-03-01")).await.unwrap();

        assert_eq!(first, WipeOutcome::Wiped { rows_deleted: 1 });
        assert_eq!(second, WipeOutcome::Wiped { rows_deleted: 0 });
        assert!(after_first.is_empty());
        assert_eq!(after_first, after_second);
        assert_eq!(store.sets_on(day("2024-03-02")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wipe_finalized_by_artifact_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = ExportDirs::new(tmp.path().join("a"), tmp.path().join("b"));
        std::fs::create_dir_all(&dirs.mirror).unwrap();
        std::fs::write(dirs.mirror.join("01-03-2024 - workout.xlsx"), b"x").unwrap();

        let store = test_store().await;
        let press = exercise_id(&store, "Leg Press").await;
        store.insert_set(&new_set("2024-03-01", "10:00", press, 0)).await.unwrap();

        let outcome = wipe_day(&store, &dirs, day("2024-03-01")).await.unwrap();
        assert_eq!(outcome, WipeOutcome::Finalized);
        assert_eq!(store.sets_on(day("2024-03-01")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wipe_finalized_by_marker_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = ExportDirs::new(tmp.path().join("a"), tmp.path().join("b"));
        let store = test_store().await;
        let press = exercise_id(&store, "Leg Press").await;
        store.insert_set(&new_set("2024-03-01", "10:00", press, 0)).await.unwrap();
        store
            .record_marker(day("2024-03-01"), "01-03-2024 - workout.xlsx", "t")
            .await
            .unwrap();

        let outcome = wipe_day(&store, &dirs, day("2024-03-01")).await.unwrap();
        assert_eq!(outcome, WipeOutcome::Finalized);
        assert_eq!(store.sets_on(day("2024-03-01")).await.unwrap().len(), 1);
    }
}
