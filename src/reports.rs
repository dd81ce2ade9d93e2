use crate::config::{ReportConfig, TableLabels};
use crate::crosstab::{CrossTab, Pivot};
use crate::error::ReportError;
use crate::types::{Column, ProductKind, RecordSet};
use crate::util::format_int;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{info, warn};

/// Partition records by exact division label, in first-seen order.
///
/// Records without a division fall in no bucket; labels that differ only by
/// surrounding whitespace or case stay distinct and are reported.
pub fn split_by_division(
    set: &RecordSet,
    division: Column,
    division_header: &str,
) -> Result<IndexMap<String, RecordSet>, ReportError> {
    if !set.has_column(division) {
        return Err(ReportError::MissingColumn {
            column: division_header.to_string(),
            available: set.column_names(),
        });
    }

    let mut buckets: IndexMap<String, Vec<_>> = IndexMap::new();
    let mut unassigned = 0usize;
    for record in &set.records {
        match record.value(division) {
            Some(label) => buckets
                .entry(label.to_string())
                .or_default()
                .push(record.clone()),
            None => unassigned += 1,
        }
    }
    if unassigned > 0 {
        warn!(
            "{} records have no '{}' value and belong to no division",
            format_int(unassigned),
            division_header
        );
    }

    let mut normalized: HashMap<String, &str> = HashMap::new();
    for label in buckets.keys() {
        let key = label.trim().to_lowercase();
        if let Some(previous) = normalized.insert(key, label.as_str()) {
            warn!(
                "divisions '{}' and '{}' differ only by whitespace or case; kept apart",
                previous, label
            );
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(label, records)| (label, set.with_records(records)))
        .collect())
}

/// Count records per (category, outcome). Records missing either value
/// are not counted.
pub fn cross_tabulate(
    set: &RecordSet,
    category: Column,
    outcome: Column,
    config: &ReportConfig,
) -> Result<Pivot, ReportError> {
    for column in [category, outcome] {
        if !set.has_column(column) {
            return Err(ReportError::MissingColumn {
                column: config.columns.header(column).to_string(),
                available: set.column_names(),
            });
        }
    }
    let mut pivot = Pivot::new();
    for record in &set.records {
        if let (Some(c), Some(o)) = (record.value(category), record.value(outcome)) {
            pivot.record(c, o);
        }
    }
    Ok(pivot)
}

/// Summary table of one record set: loan-type rows in `loan_type_order`
/// (zero rows included, unlisted types appended), then the product-kind
/// rows secured, unsecured, undetermined, with the summary row on top.
pub fn summarize(
    set: &RecordSet,
    loan_type_order: &[String],
    config: &ReportConfig,
) -> Result<CrossTab, ReportError> {
    let labels = &config.labels;
    let by_type = cross_tabulate(set, Column::LoanType, Column::Outcome, config)?
        .padded(loan_type_order)
        .ordered_by(loan_type_order);

    let by_kind = cross_tabulate(set, Column::ProductKind, Column::Outcome, config)?
        .rename_row(ProductKind::Secured.label(), &labels.secured_total)
        .rename_row(ProductKind::Unsecured.label(), &labels.unsecured_total)
        .ordered_by(&kind_row_order(labels));

    let table = CrossTab::derive(by_type.concat(by_kind), labels);
    Ok(table.format(&config.outcome_order))
}

fn kind_row_order(labels: &TableLabels) -> Vec<String> {
    vec![
        labels.secured_total.clone(),
        labels.unsecured_total.clone(),
        ProductKind::Undetermined.label().to_string(),
    ]
}

/// Per-division tables plus the combined overall table under
/// `labels.overall`. Divisions that fail to summarize are logged and left
/// out.
pub fn process_divisions(
    divisions: &IndexMap<String, RecordSet>,
    loan_type_order: &[String],
    config: &ReportConfig,
) -> IndexMap<String, CrossTab> {
    let mut tables = IndexMap::new();
    for (division, set) in divisions {
        match summarize(set, loan_type_order, config) {
            Ok(table) => {
                info!(
                    "division '{}': {} records summarized",
                    division,
                    format_int(set.records.len())
                );
                tables.insert(division.clone(), table);
            }
            Err(e) => warn!("division '{}' skipped: {}", division, e),
        }
    }

    let parts: Vec<CrossTab> = tables.values().cloned().collect();
    if let Some(overall) = CrossTab::combine(&parts) {
        tables.insert(
            config.labels.overall.clone(),
            overall.format(&config.outcome_order),
        );
    }
    tables
}
