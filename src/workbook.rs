use crate::error::{ReconcilerError, Result};
use crate::table::{CellValue, Dataset};
use crate::utils::normalize_headers;
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use std::path::Path;

/// Maps a spreadsheet cell onto a dataset cell.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.trim()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                CellValue::Text(value.format("%Y-%m-%d").to_string())
            }
            Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
    }
}

fn is_named_header(cell: &CellValue) -> bool {
    matches!(cell, CellValue::Text(s) if !s.trim().is_empty())
}

/// Builds a dataset from a sheet grid whose first row is the header.
///
/// When the header row holds numbers or blanks, the sheet carries a title
/// row above the real header, so the next row is promoted instead.
pub fn dataset_from_grid(mut grid: Vec<Vec<CellValue>>, max_columns: Option<usize>) -> Result<Dataset> {
    if grid.is_empty() {
        return Ok(Dataset::empty());
    }

    if let Some(max) = max_columns {
        for row in &mut grid {
            row.truncate(max);
        }
    }

    let mut rows = grid.into_iter();
    let mut header = rows.next().unwrap_or_default();
    if !header.iter().all(is_named_header) {
        if let Some(next) = rows.next() {
            warn!("Header row is not all text; promoting the first data row");
            header = next;
        }
    }

    let names: Vec<Option<String>> = header
        .iter()
        .map(|cell| match cell {
            CellValue::Null => None,
            other => Some(other.to_string()),
        })
        .collect();

    let mut dataset = Dataset::new(normalize_headers(&names))?;
    for row in rows {
        dataset.push_row(row)?;
    }
    Ok(dataset)
}

/// Loads the first sheet of a workbook (xlsx, xlsm, xls, xlsb or ods).
pub fn load_workbook(path: impl AsRef<Path>, max_columns: Option<usize>) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReconcilerError::InputNotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReconcilerError::Workbook(format!("{}: {}", path.display(), e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(ReconcilerError::Workbook(format!("{}: {}", path.display(), e)));
        }
        None => {
            warn!("{} has no worksheets", path.display());
            return Ok(Dataset::empty());
        }
    };

    let grid: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    dataset_from_grid(grid, max_columns)
}

/// Loads the first sheet of every workbook and stacks them, dropping duplicate rows.
pub fn load_and_concatenate_workbooks<P: AsRef<Path>>(
    paths: &[P],
    max_columns: Option<usize>,
) -> Result<Dataset> {
    let mut datasets = Vec::with_capacity(paths.len());
    for path in paths {
        let dataset = load_workbook(path, max_columns)?;
        debug!("{}: {} row(s)", path.as_ref().display(), dataset.len());
        datasets.push(dataset);
    }

    let mut combined = Dataset::concat(datasets);
    let before = combined.len();
    combined.dedup_rows();
    info!(
        "Combined {} workbook(s) into {} row(s) ({} duplicate(s) removed)",
        paths.len(),
        combined.len(),
        before - combined.len()
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_cell_value_mapping() {
        assert_eq!(cell_value(&Data::Empty), CellValue::Null);
        assert_eq!(cell_value(&Data::String("  ".to_string())), CellValue::Null);
        assert_eq!(cell_value(&Data::String("Truck 7".to_string())), text("Truck 7"));
        assert_eq!(cell_value(&Data::Int(42)), CellValue::Number(42.0));
        assert_eq!(cell_value(&Data::Float(3.5)), CellValue::Number(3.5));
        assert_eq!(cell_value(&Data::Bool(true)), text("true"));
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-09-01".to_string())),
            text("2024-09-01")
        );
    }

    #[test]
    fn test_grid_with_text_header() {
        let grid = vec![
            vec![text("Employee"), text("Date"), text("JobNumber")],
            vec![text("John"), text("2024-09-01"), CellValue::Number(123.0)],
        ];
        let ds = dataset_from_grid(grid, None).unwrap();
        assert_eq!(ds.columns(), &["Employee", "Date", "JobNumber"]);
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_grid_promotes_header_after_title_row() {
        let grid = vec![
            vec![text("August Labor Report"), CellValue::Null, CellValue::Null],
            vec![text("Employee"), text("Date"), text("JobNumber")],
            vec![text("John"), text("2024-08-01"), text("123")],
        ];
        let ds = dataset_from_grid(grid, None).unwrap();
        assert_eq!(ds.columns(), &["Employee", "Date", "JobNumber"]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.value(0, "JobNumber"), Some(&text("123")));
    }

    #[test]
    fn test_grid_truncates_columns() {
        let grid = vec![
            vec![text("Employee"), text("Date"), text("Notes")],
            vec![text("John"), text("2024-08-01"), text("late")],
        ];
        let ds = dataset_from_grid(grid, Some(2)).unwrap();
        assert_eq!(ds.columns(), &["Employee", "Date"]);
        assert_eq!(ds.rows()[0].len(), 2);
    }

    #[test]
    fn test_empty_grid() {
        assert!(dataset_from_grid(Vec::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_workbook() {
        let err = load_and_concatenate_workbooks(&["/no/such/labor.xlsx"], None).unwrap_err();
        assert!(matches!(err, ReconcilerError::InputNotFound(_)));
    }

    #[test]
    fn test_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"this is not a zip archive").unwrap();

        let err = load_workbook(&path, None).unwrap_err();
        assert!(matches!(err, ReconcilerError::Workbook(_)));
    }

    fn write_sheet(path: &Path, rows: &[Vec<CellValue>]) {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Text(s) => {
                        sheet.write_string(r as u32, c as u16, s.as_str()).unwrap();
                    }
                    CellValue::Number(n) => {
                        sheet.write_number(r as u32, c as u16, *n).unwrap();
                    }
                    CellValue::Null => {}
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_concatenate_workbook_files() {
        let dir = tempfile::tempdir().unwrap();
        let week1 = dir.path().join("labor_week1.xlsx");
        let week2 = dir.path().join("labor_week2.xlsx");
        let week3 = dir.path().join("labor_week3.xlsx");

        write_sheet(
            &week1,
            &[
                vec![text("Employee"), text("Date"), text("JobNumber")],
                vec![text("John"), text("2024-08-01"), CellValue::Number(123.0)],
                vec![text("Jane"), text("2024-08-02"), CellValue::Number(456.0)],
            ],
        );
        write_sheet(
            &week2,
            &[
                vec![text("Employee"), text("Date"), text("JobNumber"), text("Notes")],
                vec![text("Jane"), text("2024-08-02"), CellValue::Number(456.0), text("dup")],
                vec![text("Mike"), text("2024-08-09"), CellValue::Number(789.0), text("new")],
            ],
        );
        write_sheet(
            &week3,
            &[
                vec![text("Week 3 Labor")],
                vec![text("Employee"), text("Date"), text("JobNumber")],
                vec![text("Ann"), text("2024-08-16"), CellValue::Number(321.0)],
            ],
        );

        let combined = load_and_concatenate_workbooks(&[&week1, &week2, &week3], Some(3)).unwrap();

        assert_eq!(combined.columns(), &["Employee", "Date", "JobNumber"]);
        let employees: Vec<String> = combined
            .column_values("Employee")
            .unwrap()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(employees, vec!["John", "Jane", "Mike", "Ann"]);
        assert_eq!(combined.value(2, "JobNumber"), Some(&CellValue::Number(789.0)));

        let wide = load_and_concatenate_workbooks(&[&week1, &week2], None).unwrap();
        assert_eq!(wide.columns(), &["Employee", "Date", "JobNumber", "Notes"]);
        assert_eq!(wide.len(), 4);
        assert_eq!(wide.value(0, "Notes"), Some(&CellValue::Null));
    }

    #[test]
    fn test_no_workbooks_is_empty() {
        let paths: Vec<&str> = Vec::new();
        assert!(load_and_concatenate_workbooks(&paths, None).unwrap().is_empty());
    }
}
