use crate::classify::Classifier;
use crate::config::ColumnNames;
use crate::error::ReportError;
use crate::types::{Column, ProductKind, Record, RecordSet};
use crate::util::format_int;
use crate::workbook::Workbook;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub blank_rows: usize,
    pub derived_product_kind: bool,
}

/// Load the ledger from `.xlsx` (sheet `sheet_name`) or `.csv`.
///
/// `header_row` is the 0-based index of the header line. Only the known
/// columns are kept; if none of them exist the load fails.
pub fn load_ledger(
    path: &Path,
    sheet_name: &str,
    header_row: usize,
    columns: &ColumnNames,
    classifier: &Classifier,
) -> Result<(RecordSet, LoadReport), ReportError> {
    if !path.is_file() {
        return Err(ReportError::MissingFile(path.to_path_buf()));
    }
    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    let rows = if is_csv {
        debug!("reading {} as CSV, sheet name '{}' unused", path.display(), sheet_name);
        read_csv_rows(path)?
    } else {
        read_sheet_rows(path, sheet_name)?
    };

    let mut rows = rows.into_iter().skip(header_row);
    let headers: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.unwrap_or_default())
        .collect();
    let (set, report) = build_record_set(&headers, rows, columns, classifier)?;
    info!(
        "loaded {}: {} rows read, {} kept",
        path.display(),
        format_int(report.total_rows),
        format_int(report.kept_rows)
    );
    if report.derived_product_kind {
        info!("product kind derived from '{}'", columns.loan_type);
    }
    Ok((set, report))
}

fn read_sheet_rows(path: &Path, sheet_name: &str) -> Result<Vec<Vec<Option<String>>>, ReportError> {
    let workbook = Workbook::open(path)?;
    let sheet = workbook.sheet(sheet_name)?;
    let max_col = sheet.max_col();
    Ok((1..=sheet.max_row())
        .map(|row| sheet.row_texts(row, max_col))
        .collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Option<String>>>, ReportError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

/// Turn header + data rows into classified records.
pub fn build_record_set(
    headers: &[String],
    rows: impl Iterator<Item = Vec<Option<String>>>,
    columns: &ColumnNames,
    classifier: &Classifier,
) -> Result<(RecordSet, LoadReport), ReportError> {
    let positions: Vec<(Column, usize)> = Column::ALL
        .into_iter()
        .filter_map(|column| {
            headers
                .iter()
                .position(|h| h == columns.header(column))
                .map(|idx| (column, idx))
        })
        .collect();
    let index_of = |column: Column| {
        positions
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, idx)| *idx)
    };

    let expected = [Column::LoanType, Column::Outcome, Column::Division];
    if expected.iter().all(|c| index_of(*c).is_none()) {
        return Err(ReportError::MissingColumn {
            column: expected
                .iter()
                .map(|c| columns.header(*c))
                .collect::<Vec<_>>()
                .join(", "),
            available: headers.iter().filter(|h| !h.is_empty()).cloned().collect(),
        });
    }

    let loan_idx = index_of(Column::LoanType);
    let kind_idx = index_of(Column::ProductKind);
    let derived_product_kind = kind_idx.is_none() && loan_idx.is_some();

    let mut total_rows = 0usize;
    let mut blank_rows = 0usize;
    let mut records = Vec::new();
    for row in rows {
        total_rows += 1;
        let field = |idx: Option<usize>| idx.and_then(|i| row.get(i).cloned().flatten());
        let loan_type = field(loan_idx);
        let outcome = field(index_of(Column::Outcome));
        let division = field(index_of(Column::Division));
        let stated_kind = field(kind_idx);
        if loan_type.is_none() && outcome.is_none() && division.is_none() && stated_kind.is_none() {
            blank_rows += 1;
            continue;
        }
        let product_kind = match (&stated_kind, &loan_type) {
            (Some(label), _) => ProductKind::from_label(label),
            (None, Some(t)) if derived_product_kind => classifier.classify(t),
            _ => ProductKind::Undetermined,
        };
        records.push(Record {
            loan_type,
            outcome,
            division,
            product_kind,
        });
    }

    let mut present: Vec<(Column, String)> = positions
        .iter()
        .map(|(c, idx)| (*c, headers[*idx].clone()))
        .collect();
    if derived_product_kind {
        present.push((Column::ProductKind, columns.product_kind.clone()));
    }
    for column in expected {
        if index_of(column).is_none() {
            warn!("column '{}' not present in ledger", columns.header(column));
        }
    }

    let report = LoadReport {
        total_rows,
        kept_rows: records.len(),
        blank_rows,
        derived_product_kind,
    };
    Ok((
        RecordSet {
            columns: present,
            records,
        },
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassificationConfig;
    use std::io::Write;

    fn classifier() -> Classifier {
        Classifier::new(&ClassificationConfig::default())
    }

    fn row(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn derives_product_kind_when_absent() {
        let rows = vec![
            row(&["ипотека", "Не дозвон", "30+", "ignored"]),
            row(&["микрозаймы физическим лицам", "Дал обещание", "30+", "x"]),
            row(&["", "", "", ""]),
        ];
        let (set, report) = build_record_set(
            &headers(&["ТИП кредита", "Результат", "Деления", "Клиент"]),
            rows.into_iter(),
            &ColumnNames::default(),
            &classifier(),
        )
        .unwrap();

        assert!(report.derived_product_kind);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.blank_rows, 1);
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[0].product_kind, ProductKind::Secured);
        assert_eq!(set.records[1].product_kind, ProductKind::Unsecured);
        assert!(set.has_column(Column::ProductKind));
        assert!(set.has_column(Column::Division));
    }

    #[test]
    fn stated_product_kind_is_kept() {
        let rows = vec![row(&["ипотека", "Беззалоговый", "Не дозвон"])];
        let (set, report) = build_record_set(
            &headers(&["ТИП кредита", "Вид продукта", "Результат"]),
            rows.into_iter(),
            &ColumnNames::default(),
            &classifier(),
        )
        .unwrap();
        assert!(!report.derived_product_kind);
        assert_eq!(set.records[0].product_kind, ProductKind::Unsecured);
        assert!(!set.has_column(Column::Division));
    }

    #[test]
    fn no_known_columns_is_an_error() {
        let err = build_record_set(
            &headers(&["a", "b"]),
            std::iter::empty(),
            &ColumnNames::default(),
            &classifier(),
        )
        .unwrap_err();
        match err {
            ReportError::MissingColumn { available, .. } => assert_eq!(available, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn csv_ledger_with_offset_header() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Выгрузка от 21.06.2024,,").unwrap();
        writeln!(file, "ТИП кредита,Результат,Деления").unwrap();
        writeln!(file, "ипотека,Не дозвон,30+").unwrap();
        writeln!(file, "Овердрафт,,60+").unwrap();
        file.flush().unwrap();

        let (set, report) = load_ledger(
            file.path(),
            "Лист1",
            1,
            &ColumnNames::default(),
            &classifier(),
        )
        .unwrap();
        assert_eq!(report.kept_rows, 2);
        assert_eq!(set.records[1].outcome, None);
        assert_eq!(set.records[1].division.as_deref(), Some("60+"));
        assert_eq!(set.records[1].product_kind, ProductKind::Unsecured);
    }

    #[test]
    fn missing_ledger_file() {
        let err = load_ledger(
            Path::new("/nonexistent/ledger.xlsx"),
            "Лист1",
            0,
            &ColumnNames::default(),
            &classifier(),
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::MissingFile(_)));
    }
}
