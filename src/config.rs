use crate::error::{ReconcilerError, Result};
use crate::utils::{first_day_of_month, last_day_of_month, parse_period_string, validate_month};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month that a billing cycle is reconciled against.
///
/// Deserialization goes through [`ReportingPeriod::new`], so a month outside
/// 1..=12 is rejected while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ReportingPeriod {
    #[schemars(description = "Calendar month, 1 = January through 12 = December")]
    pub month: u32,

    #[schemars(description = "Four digit calendar year")]
    pub year: i32,
}

impl ReportingPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        validate_month(month)?;
        Ok(Self { month, year })
    }

    pub fn first_day(&self) -> Result<NaiveDate> {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(&self) -> Result<NaiveDate> {
        last_day_of_month(self.year, self.month)
    }

    /// Inclusive check against the first and last day of the month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.first_day(), self.last_day()) {
            (Ok(first), Ok(last)) => first <= date && date <= last,
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct PeriodRepr {
    month: u32,
    year: i32,
}

impl<'de> Deserialize<'de> for ReportingPeriod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = PeriodRepr::deserialize(deserializer)?;
        Self::new(repr.month, repr.year).map_err(de::Error::custom)
    }
}

impl FromStr for ReportingPeriod {
    type Err = ReconcilerError;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = parse_period_string(s)?;
        Self::new(month, year)
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReconciliationConfig {
    #[serde(default = "default_employee_column")]
    #[schemars(description = "Column identifying the employee in both datasets")]
    pub employee_column: String,

    #[serde(default = "default_date_column")]
    #[schemars(description = "Column holding the work or fuel date in both datasets")]
    pub date_column: String,

    #[serde(default = "default_job_number_column")]
    #[schemars(description = "Column holding the job number that both sources must agree on")]
    pub job_number_column: String,

    #[schemars(description = "The month both datasets are restricted to before joining")]
    pub period: ReportingPeriod,

    #[serde(default = "default_left_suffix")]
    #[schemars(description = "Suffix for overlapping columns from the first dataset")]
    pub left_suffix: String,

    #[serde(default = "default_right_suffix")]
    #[schemars(description = "Suffix for overlapping columns from the second dataset")]
    pub right_suffix: String,
}

fn default_employee_column() -> String {
    "Employee".to_string()
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_job_number_column() -> String {
    "JobNumber".to_string()
}

fn default_left_suffix() -> String {
    "_df1".to_string()
}

fn default_right_suffix() -> String {
    "_df2".to_string()
}

impl ReconciliationConfig {
    pub fn for_period(period: ReportingPeriod) -> Self {
        Self {
            employee_column: default_employee_column(),
            date_column: default_date_column(),
            job_number_column: default_job_number_column(),
            period,
            left_suffix: default_left_suffix(),
            right_suffix: default_right_suffix(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_month(self.period.month)?;
        if self.left_suffix == self.right_suffix {
            return Err(ReconcilerError::InvalidConfig(format!(
                "left and right suffixes must differ, both are '{}'",
                self.left_suffix
            )));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReconciliationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Column names and filters used when splitting multi-department summary tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DepartmentSplitConfig {
    #[schemars(description = "Column whose cells hold newline-joined department names")]
    pub department_column: String,

    #[schemars(description = "Column labelling each summary row (e.g. TOTAL, YTD)")]
    pub description_column: String,

    #[schemars(description = "Descriptions of running-total rows that are dropped before splitting")]
    pub skipped_descriptions: Vec<String>,

    #[schemars(description = "Departments that never appear in the output")]
    pub excluded_departments: Vec<String>,
}

impl Default for DepartmentSplitConfig {
    fn default() -> Self {
        Self {
            department_column: "DEPARTMENT".to_string(),
            description_column: "DESCRIPTION".to_string(),
            skipped_descriptions: vec!["YTD".to_string(), "PERIOD".to_string()],
            excluded_departments: vec!["ACCOUNTS RECEIVABLE".to_string()],
        }
    }
}
