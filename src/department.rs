//! Splitting of multi-department summary rows.
//!
//! Financial summary reports print one table row per summary line, with every
//! department's figure stacked inside the same cell and separated by line
//! breaks. The DEPARTMENT cell lists the department names in the same order,
//! so segment `i` of every other cell belongs to department `i`.

use crate::config::DepartmentSplitConfig;
use crate::table::{CellValue, Dataset};
use crate::utils::split_lines;
use log::{debug, warn};

/// Splits a cell into its line-separated segments.
///
/// Text is split on line breaks with empty segments kept as `Null` so that
/// positions stay aligned. Numbers are a single segment. `Null` has none.
pub fn cell_segments(cell: &CellValue) -> Vec<CellValue> {
    match cell {
        CellValue::Text(s) => split_lines(s).into_iter().map(CellValue::text).collect(),
        CellValue::Number(_) => vec![cell.clone()],
        CellValue::Null => Vec::new(),
    }
}

/// Returns segment `index` of a cell, or `Null` when the cell has fewer segments.
pub fn segment_at(cell: &CellValue, index: usize) -> CellValue {
    cell_segments(cell)
        .into_iter()
        .nth(index)
        .unwrap_or(CellValue::Null)
}

/// Expands DEPARTMENT-tagged summary rows into one row per department.
///
/// Running-total rows (see [`DepartmentSplitConfig::skipped_descriptions`]) are
/// dropped first. The first remaining row is then expanded using the department
/// names in its DEPARTMENT cell; excluded departments and departments without
/// any populated data cell are left out. The output keeps the input column order.
/// A dataset without the department column yields an empty dataset.
pub fn process_departments(dataset: &Dataset, config: &DepartmentSplitConfig) -> Dataset {
    let Some(department_idx) = dataset.column_index(&config.department_column) else {
        return Dataset::empty();
    };
    let description_idx = dataset.column_index(&config.description_column);

    let summary_rows = dataset.filter_rows(|row| match description_idx {
        Some(idx) => !is_skipped_description(&row[idx], config),
        None => true,
    });

    let Some(row) = summary_rows.rows().first() else {
        debug!("No summary row left after dropping running totals");
        return Dataset::from_parts(dataset.columns().to_vec(), Vec::new());
    };
    if summary_rows.len() > 1 {
        debug!(
            "Using the first of {} summary rows; the rest are ignored",
            summary_rows.len()
        );
    }

    let departments = cell_segments(&row[department_idx]);
    if departments.is_empty() {
        warn!(
            "Summary row has no {} value; its cells cannot be attributed",
            config.department_column
        );
    }

    let mut rows = Vec::new();
    for (position, department) in departments.iter().enumerate() {
        let Some(name) = department.as_text() else {
            continue;
        };
        if config.excluded_departments.iter().any(|d| d == name) {
            debug!("Skipping excluded department '{}'", name);
            continue;
        }

        match extract_department_data(row, department_idx, description_idx, position) {
            Some(mut values) => {
                values[department_idx] = CellValue::text(name);
                rows.push(values);
            }
            None => debug!("Department '{}' has no data in this table", name),
        }
    }

    debug!(
        "Split {} department(s) into {} row(s)",
        departments.len(),
        rows.len()
    );

    Dataset::from_parts(dataset.columns().to_vec(), rows)
}

/// Builds the cells of one department's row from a multi-department summary row.
///
/// Each cell takes the segment at `position`, or `Null` when the cell has fewer
/// segments. A single-segment description labels every department. Returns
/// `None` when every data cell is `Null`. The department cell is left `Null`
/// for the caller to fill.
pub fn extract_department_data(
    row: &[CellValue],
    department_idx: usize,
    description_idx: Option<usize>,
    position: usize,
) -> Option<Vec<CellValue>> {
    let mut values = Vec::with_capacity(row.len());
    let mut has_data = false;
    let mut data_columns = 0;

    for (col_idx, cell) in row.iter().enumerate() {
        if col_idx == department_idx {
            values.push(CellValue::Null);
            continue;
        }

        if Some(col_idx) == description_idx {
            let segments = cell_segments(cell);
            let label = if segments.len() <= 1 {
                cell.clone()
            } else {
                segment_at(cell, position)
            };
            values.push(label);
            continue;
        }

        let value = segment_at(cell, position);
        data_columns += 1;
        has_data |= !value.is_null();
        values.push(value);
    }

    if data_columns > 0 && !has_data {
        return None;
    }
    Some(values)
}

fn is_skipped_description(cell: &CellValue, config: &DepartmentSplitConfig) -> bool {
    match cell.as_text() {
        Some(text) => config.skipped_descriptions.iter().any(|d| d == text),
        None => false,
    }
}
