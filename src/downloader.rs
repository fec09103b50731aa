use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

use crate::store::LoggedSet;

/// Header row written at the top of every export.
pub const HEADERS: [&str; 7] = ["date", "time", "exercise", "reps", "weight (kg)", "sets", "notes"];

/// MIME type of the generated workbooks.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Convert logged sets to XLSX format
///
/// Builds a single-sheet workbook: row 1 is [`HEADERS`], then one row per set
/// in the order given. Reps, weight and set count are written as numbers so
/// they stay summable in Excel; missing notes leave the cell blank.
///
/// # Arguments
/// * `sheet_name` - Title of the worksheet tab
/// * `rows` - Sets to write, already in output order
///
/// # Returns
/// * `Result<Vec<u8>, XlsxError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use workout_log::downloader::to_xlsx;
///
/// let bytes = to_xlsx("2024-03-01", &[]).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(sheet_name: &str, rows: &[LoggedSet]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name)?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (i, set) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, set.date.as_str())?;
        worksheet.write_string(row, 1, set.time.as_str())?;
        worksheet.write_string(row, 2, set.exercise.as_str())?;
        worksheet.write_number(row, 3, set.reps as f64)?;
        worksheet.write_number(row, 4, set.weight_kg)?;
        worksheet.write_number(row, 5, set.sets as f64)?;
        if let Some(notes) = set.notes.as_deref().filter(|n| !n.is_empty()) {
            worksheet.write_string(row, 6, notes)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

    use super::*;

    fn logged(date: &str, notes: Option<&str>) -> LoggedSet {
        LoggedSet {
            id: 1,
            date: date.to_string(),
            time: "10:00".to_string(),
            exercise: "Leg Press".to_string(),
            reps: 10,
            weight_kg: 40.0,
            sets: 3,
            notes: notes.map(str::to_string),
        }
    }

    fn read_back(bytes: Vec<u8>, sheet: &str) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![sheet.to_string()]);
        let range = workbook.worksheet_range(sheet).unwrap();
        range.rows().map(<[Data]>::to_vec).collect()
    }

    fn text(row: &[Data]) -> Vec<String> {
        row.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_header_only_workbook() {
        let bytes = to_xlsx("2024-03-01", &[]).unwrap();
        let rows = read_back(bytes, "2024-03-01");

        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0]), HEADERS);
    }

    #[test]
    fn test_rows_follow_header_in_order() {
        let rows = [
            logged("2024-03-01", Some("felt easy")),
            LoggedSet {
                time: "10:05".to_string(),
                weight_kg: 42.5,
                ..logged("2024-03-02", None)
            },
        ];
        let sheet = read_back(to_xlsx("Weekly", &rows).unwrap(), "Weekly");

        assert_eq!(sheet.len(), 3);
        assert_eq!(text(&sheet[0]), HEADERS);
        assert_eq!(
            text(&sheet[1]),
            ["2024-03-01", "10:00", "Leg Press", "10", "40", "3", "felt easy"]
        );
        assert_eq!(
            text(&sheet[2]),
            ["2024-03-02", "10:05", "Leg Press", "10", "42.5", "3", ""]
        );
    }

    #[test]
    fn test_counts_and_weight_are_numbers() {
        let sheet = read_back(to_xlsx("Weekly", &[logged("2024-03-01", None)]).unwrap(), "Weekly");
        let row = &sheet[1];

        assert_eq!(row[0], Data::String("2024-03-01".to_string()));
        assert_eq!(row[3], Data::Float(10.0));
        assert_eq!(row[4], Data::Float(40.0));
        assert_eq!(row[5], Data::Float(3.0));
        assert_eq!(row[6], Data::Empty);
    }

    #[test]
    fn test_invalid_sheet_name_is_an_error() {
        assert!(to_xlsx("bad/name", &[]).is_err());
    }
}
