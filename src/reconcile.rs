use crate::config::{ReconciliationConfig, ReportingPeriod};
use crate::error::{ReconcilerError, Result};
use crate::table::{CellKey, CellValue, Dataset};
use crate::utils::{excel_serial_to_date, parse_date_str};
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Outcome of comparing job numbers between two monthly sources.
///
/// Rows whose (employee, date) key exists in only one source never reach
/// `good` or `bad`; the counts below make that visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Joined rows whose job numbers agree
    pub good: Dataset,
    /// Joined rows whose job numbers differ or are missing
    pub bad: Dataset,
    pub left_rows: usize,
    pub right_rows: usize,
    pub left_in_period: usize,
    pub right_in_period: usize,
    pub joined_rows: usize,
    /// In-period rows of the first source without a partner in the second
    pub unmatched_left: usize,
    /// In-period rows of the second source without a partner in the first
    pub unmatched_right: usize,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.bad.is_empty() && self.unmatched_left == 0 && self.unmatched_right == 0
    }
}

/// Result of an inner join, with the rows that found no partner counted.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub dataset: Dataset,
    pub unmatched_left: usize,
    pub unmatched_right: usize,
}

fn coerce_date(cell: &CellValue, column: &str, row: usize) -> Result<Option<NaiveDate>> {
    let parsed = match cell {
        CellValue::Null => return Ok(None),
        CellValue::Text(s) => parse_date_str(s),
        CellValue::Number(n) => excel_serial_to_date(*n),
    };

    parsed.map(Some).ok_or_else(|| ReconcilerError::MalformedDate {
        column: column.to_string(),
        row,
        value: cell.to_string(),
    })
}

/// Keeps the rows whose date falls inside `period`.
///
/// Every date cell is parsed before any row is kept, so one malformed value
/// fails the whole call. Empty dates belong to no month and are dropped. Kept
/// dates are rewritten as `YYYY-MM-DD`.
pub fn filter_by_month(
    dataset: &Dataset,
    date_column: &str,
    period: ReportingPeriod,
) -> Result<Dataset> {
    filter_by_month_in(dataset, date_column, period, "dataset")
}

fn filter_by_month_in(
    dataset: &Dataset,
    date_column: &str,
    period: ReportingPeriod,
    label: &str,
) -> Result<Dataset> {
    let date_idx = dataset.require_column(date_column, label)?;

    let dates = dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(row, cells)| coerce_date(&cells[date_idx], date_column, row))
        .collect::<Result<Vec<_>>>()?;

    let first = period.first_day()?;
    let last = period.last_day()?;

    let mut kept = Vec::new();
    for (row, date) in dataset.rows().iter().zip(dates) {
        if let Some(date) = date.filter(|d| first <= *d && *d <= last) {
            let mut row = row.clone();
            row[date_idx] = CellValue::Text(date.format("%Y-%m-%d").to_string());
            kept.push(row);
        }
    }

    debug!(
        "{}: {} of {} row(s) fall in {}",
        label,
        kept.len(),
        dataset.len(),
        period
    );
    Ok(Dataset::from_parts(dataset.columns().to_vec(), kept))
}

fn row_key(row: &[CellValue], key_idx: &[usize]) -> Option<Vec<CellKey>> {
    key_idx
        .iter()
        .map(|&i| match &row[i] {
            CellValue::Null => None,
            cell => Some(cell.key()),
        })
        .collect()
}

/// Inner-joins two datasets on equal key columns.
///
/// The output holds the left columns in order (overlapping non-key columns
/// suffixed with `suffixes.0`) followed by the right non-key columns
/// (overlapping ones suffixed with `suffixes.1`). Rows follow left row order,
/// then right row order within a key. Rows with an empty key cell never join.
pub fn merge_on(
    left: &Dataset,
    right: &Dataset,
    keys: &[&str],
    suffixes: (&str, &str),
) -> Result<MergeOutcome> {
    let left_keys = keys
        .iter()
        .map(|k| left.require_column(k, "first dataset"))
        .collect::<Result<Vec<_>>>()?;
    let right_keys = keys
        .iter()
        .map(|k| right.require_column(k, "second dataset"))
        .collect::<Result<Vec<_>>>()?;

    let is_key = |name: &String| keys.iter().any(|k| *k == name.as_str());

    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .map(|c| {
            if !is_key(c) && right.has_column(c) {
                format!("{}{}", c, suffixes.0)
            } else {
                c.clone()
            }
        })
        .collect();

    let right_values: Vec<usize> = (0..right.columns().len())
        .filter(|&i| !right_keys.contains(&i))
        .collect();
    for &i in &right_values {
        let c = &right.columns()[i];
        if left.has_column(c) {
            columns.push(format!("{}{}", c, suffixes.1));
        } else {
            columns.push(c.clone());
        }
    }
    let mut merged = Dataset::new(columns)?;

    let mut index: HashMap<Vec<CellKey>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = row_key(row, &right_keys) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut unmatched_left = 0;
    let mut matched_right = HashSet::new();
    for row in left.rows() {
        let partners = row_key(row, &left_keys).and_then(|key| index.get(&key));
        let Some(partners) = partners else {
            unmatched_left += 1;
            continue;
        };

        for &r in partners {
            matched_right.insert(r);
            let mut joined = row.clone();
            joined.extend(right_values.iter().map(|&i| right.rows()[r][i].clone()));
            merged.push_row(joined)?;
        }
    }

    Ok(MergeOutcome {
        dataset: merged,
        unmatched_left,
        unmatched_right: right.len() - matched_right.len(),
    })
}

/// Job numbers agree only when both are present and of the same kind.
pub fn job_numbers_match(a: &CellValue, b: &CellValue) -> bool {
    match (a, b) {
        (CellValue::Text(a), CellValue::Text(b)) => a == b,
        (CellValue::Number(a), CellValue::Number(b)) => a == b,
        _ => false,
    }
}

/// Splits joined rows into those whose two job number columns agree and the rest.
pub fn partition_by_job_number(
    merged: &Dataset,
    left_job_column: &str,
    right_job_column: &str,
) -> Result<(Dataset, Dataset)> {
    let left_idx = merged.require_column(left_job_column, "joined dataset")?;
    let right_idx = merged.require_column(right_job_column, "joined dataset")?;

    let good = merged.filter_rows(|row| job_numbers_match(&row[left_idx], &row[right_idx]));
    let bad = merged.filter_rows(|row| !job_numbers_match(&row[left_idx], &row[right_idx]));
    Ok((good, bad))
}

fn check_job_number_with(
    first: &Dataset,
    second: &Dataset,
    employee_column: &str,
    date_column: &str,
    job_number_column: &str,
    suffixes: (&str, &str),
) -> Result<(MergeOutcome, Dataset, Dataset)> {
    if job_number_column == employee_column || job_number_column == date_column {
        return Err(ReconcilerError::InvalidConfig(format!(
            "job number column '{}' cannot also be a join key",
            job_number_column
        )));
    }
    first.require_column(job_number_column, "first dataset")?;
    second.require_column(job_number_column, "second dataset")?;

    let outcome = merge_on(first, second, &[employee_column, date_column], suffixes)?;
    let (good, bad) = partition_by_job_number(
        &outcome.dataset,
        &format!("{}{}", job_number_column, suffixes.0),
        &format!("{}{}", job_number_column, suffixes.1),
    )?;
    Ok((outcome, good, bad))
}

/// Checks that rows with the same employee and date carry the same job number.
///
/// Returns `(good, bad)`; both share the joined schema, where the job number
/// columns appear as `<job>_df1` and `<job>_df2`.
pub fn check_job_number(
    first: &Dataset,
    second: &Dataset,
    employee_column: &str,
    date_column: &str,
    job_number_column: &str,
) -> Result<(Dataset, Dataset)> {
    let (_, good, bad) = check_job_number_with(
        first,
        second,
        employee_column,
        date_column,
        job_number_column,
        ("_df1", "_df2"),
    )?;
    Ok((good, bad))
}

/// Filters both datasets to the configured month, joins them on
/// (employee, date) and partitions the joined rows by job number agreement.
pub fn reconcile(
    config: &ReconciliationConfig,
    first: &Dataset,
    second: &Dataset,
) -> Result<ReconciliationReport> {
    config.validate()?;

    let first_in_period =
        filter_by_month_in(first, &config.date_column, config.period, "first dataset")?;
    let second_in_period =
        filter_by_month_in(second, &config.date_column, config.period, "second dataset")?;

    let (outcome, good, bad) = check_job_number_with(
        &first_in_period,
        &second_in_period,
        &config.employee_column,
        &config.date_column,
        &config.job_number_column,
        (&config.left_suffix, &config.right_suffix),
    )?;

    if outcome.unmatched_left > 0 || outcome.unmatched_right > 0 {
        warn!(
            "{} row(s) of the first and {} row(s) of the second dataset have no matching {}/{} in the other",
            outcome.unmatched_left,
            outcome.unmatched_right,
            config.employee_column,
            config.date_column
        );
    }

    Ok(ReconciliationReport {
        joined_rows: outcome.dataset.len(),
        unmatched_left: outcome.unmatched_left,
        unmatched_right: outcome.unmatched_right,
        left_rows: first.len(),
        right_rows: second.len(),
        left_in_period: first_in_period.len(),
        right_in_period: second_in_period.len(),
        good,
        bad,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[(&str, &str, &str)]) -> Dataset {
        Dataset::from_rows(
            ["Employee", "Date", "JobNumber"],
            rows.iter()
                .map(|(e, d, j)| vec![CellValue::from(*e), CellValue::from(*d), CellValue::from(*j)])
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn september() -> ReportingPeriod {
        ReportingPeriod::new(9, 2024).unwrap()
    }

    #[test]
    fn test_filter_by_month_bounds() {
        let ds = records(&[
            ("John", "2024-08-31", "1"),
            ("John", "2024-09-01", "2"),
            ("John", "09/30/2024", "3"),
            ("John", "2024-10-01", "4"),
            ("John", "2023-09-15", "5"),
        ]);

        let filtered = filter_by_month(&ds, "Date", september()).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.value(0, "JobNumber"), Some(&CellValue::from("2")));
        assert_eq!(filtered.value(1, "Date"), Some(&CellValue::from("2024-09-30")));
    }

    #[test]
    fn test_filter_malformed_date_is_fatal() {
        let ds = records(&[("John", "2024-09-01", "1"), ("Jane", "someday", "2")]);
        let err = filter_by_month(&ds, "Date", september()).unwrap_err();
        match err {
            ReconcilerError::MalformedDate { column, row, value } => {
                assert_eq!(column, "Date");
                assert_eq!(row, 1);
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_filter_accepts_serial_and_skips_empty_dates() {
        let ds = Dataset::from_rows(
            ["Employee", "Date", "JobNumber"],
            vec![
                vec![CellValue::from("John"), CellValue::Number(45536.0), CellValue::from("1")],
                vec![CellValue::from("Jane"), CellValue::Null, CellValue::from("2")],
            ],
        )
        .unwrap();
        let filtered = filter_by_month(&ds, "Date", september()).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.value(0, "Date"), Some(&CellValue::from("2024-09-01")));
    }

    #[test]
    fn test_filter_missing_column() {
        let ds = records(&[("John", "2024-09-01", "1")]);
        assert!(matches!(
            filter_by_month(&ds, "Day", september()),
            Err(ReconcilerError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_check_job_number_mismatch() {
        let df1 = records(&[("John", "2024-09-01", "123")]);
        let df2 = records(&[("John", "2024-09-01", "999")]);

        let (good, bad) = check_job_number(&df1, &df2, "Employee", "Date", "JobNumber").unwrap();
        assert!(good.is_empty());
        assert_eq!(bad.len(), 1);
        assert_eq!(bad.columns(), &["Employee", "Date", "JobNumber_df1", "JobNumber_df2"]);
        assert_eq!(bad.value(0, "JobNumber_df1"), Some(&CellValue::from("123")));
        assert_eq!(bad.value(0, "JobNumber_df2"), Some(&CellValue::from("999")));
    }

    #[test]
    fn test_duplicate_keys_produce_cross_product() {
        let df1 = records(&[("John", "2024-09-01", "1"), ("John", "2024-09-01", "2")]);
        let df2 = records(&[("John", "2024-09-01", "1"), ("John", "2024-09-01", "3")]);

        let outcome = merge_on(&df1, &df2, &["Employee", "Date"], ("_df1", "_df2")).unwrap();
        assert_eq!(outcome.dataset.len(), 4);

        let (good, bad) =
            partition_by_job_number(&outcome.dataset, "JobNumber_df1", "JobNumber_df2").unwrap();
        assert_eq!(good.len(), 1);
        assert_eq!(bad.len(), 3);
        assert_eq!(good.len() + bad.len(), outcome.dataset.len());
    }

    #[test]
    fn test_merge_counts_unmatched_rows() {
        let df1 = records(&[("John", "2024-09-01", "1"), ("Ann", "2024-09-02", "2")]);
        let df2 = records(&[
            ("John", "2024-09-01", "1"),
            ("Bob", "2024-09-01", "7"),
            ("", "2024-09-01", "8"),
        ]);

        let outcome = merge_on(&df1, &df2, &["Employee", "Date"], ("_df1", "_df2")).unwrap();
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.unmatched_left, 1);
        assert_eq!(outcome.unmatched_right, 2);
    }

    #[test]
    fn test_merge_suffixes_only_overlapping_columns() {
        let df1 = Dataset::from_rows(
            ["Employee", "Date", "JobNumber", "Truck"],
            vec![vec!["A".into(), "2024-09-01".into(), "1".into(), "T1".into()]],
        )
        .unwrap();
        let df2 = Dataset::from_rows(
            ["Date", "Gallons", "Employee", "JobNumber"],
            vec![vec!["2024-09-01".into(), "12".into(), "A".into(), "1".into()]],
        )
        .unwrap();

        let outcome = merge_on(&df1, &df2, &["Employee", "Date"], ("_df1", "_df2")).unwrap();
        assert_eq!(
            outcome.dataset.columns(),
            &["Employee", "Date", "JobNumber_df1", "Truck", "Gallons", "JobNumber_df2"]
        );
        assert_eq!(outcome.dataset.value(0, "Gallons"), Some(&CellValue::from("12")));
    }

    #[test]
    fn test_null_job_numbers_never_match() {
        assert!(!job_numbers_match(&CellValue::Null, &CellValue::Null));
        assert!(!job_numbers_match(&CellValue::from("123"), &CellValue::Number(123.0)));
        assert!(job_numbers_match(&CellValue::Number(7.0), &CellValue::Number(7.0)));
    }

    #[test]
    fn test_reconcile_report_counts() {
        let df1 = records(&[
            ("John Doe", "2024-09-01", "123"),
            ("Jane Smith", "2024-09-02", "456"),
            ("John Doe", "2024-09-03", "789"),
            ("John Doe", "2024-08-30", "111"),
        ]);
        let df2 = records(&[
            ("John Doe", "09/01/2024", "123"),
            ("Jane Smith", "2024-09-02", "456"),
            ("John Doe", "2024-09-03", "000"),
            ("Ann Lee", "2024-09-04", "222"),
        ]);

        let config = ReconciliationConfig::for_period(september());
        let report = reconcile(&config, &df1, &df2).unwrap();

        assert_eq!(report.left_rows, 4);
        assert_eq!(report.right_rows, 4);
        assert_eq!(report.left_in_period, 3);
        assert_eq!(report.right_in_period, 4);
        assert_eq!(report.joined_rows, 3);
        assert_eq!(report.good.len(), 2);
        assert_eq!(report.bad.len(), 1);
        assert_eq!(report.unmatched_left, 0);
        assert_eq!(report.unmatched_right, 1);
        assert!(!report.is_clean());
        assert_eq!(report.bad.value(0, "JobNumber_df2"), Some(&CellValue::from("000")));
    }

    #[test]
    fn test_job_column_cannot_be_key() {
        let df = records(&[("John", "2024-09-01", "1")]);
        assert!(matches!(
            check_job_number(&df, &df, "Employee", "Date", "Date"),
            Err(ReconcilerError::InvalidConfig(_))
        ));
    }
}
