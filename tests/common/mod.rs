//! Helpers shared by the integration test crates.

#![allow(dead_code, clippy::unwrap_used)]

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

/// Every row of `sheet` in an xlsx workbook, rendered as text.
pub fn sheet_rows(bytes: &[u8], sheet: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| row.iter().map(Data::to_string).collect())
        .collect()
}

/// Header row of every export.
pub const HEADER: [&str; 7] = ["date", "time", "exercise", "reps", "weight (kg)", "sets", "notes"];
