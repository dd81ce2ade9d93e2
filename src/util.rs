// Small formatting and parsing helpers shared by the loader, the layout
// resolver and console output.
use std::path::Path;

use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ReportError;

static REPORT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}\.\d{2}\.\d{4}").expect("valid date pattern"));

/// Render a numeric cell the way it reads in the sheet: integral values
/// without a fractional part.
pub fn format_cell_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// The `DD.MM.YYYY` date embedded in a report file name, e.g.
/// `Отчёт 21.06.2024.xlsx` -> `21.06.2024`.
///
/// The first candidate that is a real calendar date wins.
pub fn extract_report_date(path: &Path) -> Result<String, ReportError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    REPORT_DATE
        .find_iter(&name)
        .map(|m| m.as_str())
        .find(|candidate| NaiveDate::parse_from_str(candidate, "%d.%m.%Y").is_ok())
        .map(str::to_string)
        .ok_or_else(|| ReportError::MissingReportDate(path.to_path_buf()))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in log lines, e.g. `9,855 rows`.
    n.to_formatted_string(&Locale::en)
}
