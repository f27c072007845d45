//! # Fuel Bill Reconciler
//!
//! A library for the monthly fleet-fuel billing check: it pulls per-department
//! figures out of financial summary PDFs and verifies that two independently
//! produced record sets agree on job numbers for every employee and day.
//!
//! ## Core Concepts
//!
//! - **Dataset**: ordered, uniquely named columns over rows of [`CellValue`]s
//! - **Raw Table**: a grid of optional strings detected on a PDF page, header first
//! - **Department Split**: summary rows stack every department's figure in one
//!   cell separated by line breaks; splitting yields one row per department
//! - **Reconciliation**: both sources are restricted to one month, joined on
//!   (employee, date) and partitioned by whether their job numbers agree
//!
//! ## Example
//!
//! ```rust,ignore
//! use fuel_bill_reconciler::*;
//!
//! let departments = extract_tables_from_pdf("August-Financial Summary.pdf")?;
//!
//! let labor = load_and_concatenate_workbooks(&["labor_week1.xlsx", "labor_week2.xlsx"], None)?;
//! let fuel = load_workbook("fuel_charges.xlsx", None)?;
//!
//! let config = ReconciliationConfig::for_period("2024-08".parse()?);
//! let report = Reconciler::process(&config, &labor, &fuel)?;
//! println!("{} mismatched job numbers", report.bad.len());
//! ```

pub mod config;
pub mod department;
pub mod error;
pub mod pdf;
pub mod reconcile;
pub mod table;
pub mod utils;
pub mod workbook;

pub use config::{DepartmentSplitConfig, ReconciliationConfig, ReportingPeriod};
pub use department::{extract_department_data, process_departments};
pub use error::{ReconcilerError, Result};
pub use pdf::{
    extract_tables_from_pdf, process_table, PdfTableExtractor, TableDetector,
    WhitespaceTableDetector,
};
pub use reconcile::{
    check_job_number, filter_by_month, merge_on, partition_by_job_number, MergeOutcome,
    ReconciliationReport,
};
pub use table::{CellValue, Dataset, RawTable};
pub use workbook::{load_and_concatenate_workbooks, load_workbook};

use log::{debug, info};

pub struct Reconciler;

impl Reconciler {
    pub fn process(
        config: &ReconciliationConfig,
        first: &Dataset,
        second: &Dataset,
    ) -> Result<ReconciliationReport> {
        info!(
            "Reconciling {} against {} for {}",
            config.job_number_column, config.employee_column, config.period
        );
        debug!(
            "Inputs contain {} and {} rows",
            first.len(),
            second.len()
        );

        let report = reconcile::reconcile(config, first, second)?;

        info!(
            "{} joined row(s): {} matching, {} mismatched",
            report.joined_rows,
            report.good.len(),
            report.bad.len()
        );

        Ok(report)
    }
}

/// Filters both datasets to `month`/`year`, then checks job numbers.
///
/// Returns `(good, bad)` with the job number columns suffixed `_df1`/`_df2`.
pub fn process_dataframes(
    first: &Dataset,
    second: &Dataset,
    date_column: &str,
    employee_column: &str,
    job_number_column: &str,
    month: u32,
    year: i32,
) -> Result<(Dataset, Dataset)> {
    let config = ReconciliationConfig {
        employee_column: employee_column.to_string(),
        date_column: date_column.to_string(),
        job_number_column: job_number_column.to_string(),
        ..ReconciliationConfig::for_period(ReportingPeriod::new(month, year)?)
    };

    let report = Reconciler::process(&config, first, second)?;
    Ok((report.good, report.bad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(jobs: [&str; 3]) -> Dataset {
        Dataset::from_rows(
            ["Employee", "Date", "JobNumber"],
            vec![
                vec!["John Doe".into(), "2024-09-01".into(), jobs[0].into()],
                vec!["Jane Smith".into(), "2024-09-02".into(), jobs[1].into()],
                vec!["John Doe".into(), "2024-09-03".into(), jobs[2].into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_process_dataframes_end_to_end() {
        let df1 = sample(["123", "456", "789"]);
        let df2 = sample(["123", "456", "000"]);

        let (good, bad) =
            process_dataframes(&df1, &df2, "Date", "Employee", "JobNumber", 9, 2024).unwrap();

        assert_eq!(good.len(), 2);
        assert_eq!(bad.len(), 1);
        assert_eq!(good.columns(), bad.columns());
        assert_eq!(bad.value(0, "Date"), Some(&CellValue::from("2024-09-03")));
        assert_eq!(bad.value(0, "JobNumber_df1"), Some(&CellValue::from("789")));
    }

    #[test]
    fn test_process_dataframes_other_month_is_empty() {
        let df1 = sample(["123", "456", "789"]);
        let df2 = sample(["123", "456", "000"]);

        let (good, bad) =
            process_dataframes(&df1, &df2, "Date", "Employee", "JobNumber", 10, 2024).unwrap();
        assert!(good.is_empty());
        assert!(bad.is_empty());
    }

    #[test]
    fn test_process_dataframes_rejects_bad_month() {
        let df = sample(["1", "2", "3"]);
        let result = process_dataframes(&df, &df, "Date", "Employee", "JobNumber", 0, 2024);
        assert!(matches!(result, Err(ReconcilerError::InvalidMonth(0))));
    }
}
