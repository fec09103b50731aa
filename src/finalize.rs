//! Finalization check.
//!
//! A day is finalized once its log has been exported: the canonical export
//! file exists in either export root, or the store carries a marker row for
//! it. Every probe fails open, so infrastructure trouble can never block a
//! reset.

use std::path::Path;

use chrono::NaiveDate;

use crate::config::ExportDirs;
use crate::store::Store;

/// Canonical daily export filename, `DD-MM-YYYY - workout.xlsx`.
#[must_use]
pub fn daily_file_name(date: NaiveDate) -> String {
    date.format("%d-%m-%Y - workout.xlsx").to_string()
}

/// Canonical weekly export filename, `DD-MM-YYYY to DD-MM-YYYY - weekly.xlsx`.
#[must_use]
pub fn weekly_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{} to {} - weekly.xlsx",
        start.format("%d-%m-%Y"),
        end.format("%d-%m-%Y")
    )
}

/// Whether `date` has already been exported.
pub async fn is_finalized(store: &Store, dirs: &ExportDirs, date: NaiveDate) -> bool {
    let file_name = daily_file_name(date);

    for root in dirs.roots() {
        if artifact_exists(&root.join(&file_name)).await {
            tracing::debug!(%date, root = %root.display(), "Export artifact found");
            return true;
        }
    }

    match store.has_marker(date).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(%date, error = %e, "Marker lookup failed; treating day as open");
            false
        }
    }
}

async fn artifact_exists(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not probe export artifact");
            false
        }
    }
}
