// Stage sequence of a report run.
//
// load ledger -> discover loan-type order -> split by division -> summarize
// -> resolve anchors -> write blocks -> save. Any failing stage ends the run
// before the output workbook is written.
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::classify::Classifier;
use crate::config::ReportConfig;
use crate::crosstab::CrossTab;
use crate::error::ReportError;
use crate::layout::resolve_anchors;
use crate::loader::load_ledger;
use crate::order::{discover_order, reorder};
use crate::reports::{process_divisions, split_by_division};
use crate::template::TemplateDocument;
use crate::types::{Anchor, Column};
use crate::util::extract_report_date;
use crate::workbook::Workbook;
use crate::writer::{write_blocks, TemplateWriter};

#[derive(Debug, Clone)]
pub struct LedgerSource {
    pub path: PathBuf,
    pub sheet: String,
    pub header_row: usize,
}

#[derive(Debug, Clone)]
pub struct ReportTemplate {
    pub path: PathBuf,
    pub sheet: String,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report_date: String,
    pub tables: IndexMap<String, CrossTab>,
    pub anchors: Vec<Anchor>,
    pub blocks_written: usize,
}

/// Per-division tables plus the overall table, ordered by the template.
pub fn build_tables(
    ledger: &LedgerSource,
    template: &ReportTemplate,
    config: &ReportConfig,
) -> Result<IndexMap<String, CrossTab>, ReportError> {
    let classifier = Classifier::new(&config.classification);
    let (records, _) = load_ledger(
        &ledger.path,
        &ledger.sheet,
        ledger.header_row,
        &config.columns,
        &classifier,
    )?;

    let loan_types = records.unique_values(Column::LoanType);
    info!("loan types in ledger: {:?}", loan_types);

    let discovered = match Workbook::open(&template.path) {
        Ok(workbook) => discover_order(&workbook, &template.sheet, &loan_types),
        Err(e) => {
            error!("cannot read order reference: {}", e);
            Vec::new()
        }
    };
    if discovered.is_empty() {
        return Err(ReportError::NoOrderedCategories {
            path: template.path.clone(),
            sheet: template.sheet.clone(),
        });
    }
    let order = reorder(&loan_types, &discovered);

    let divisions = split_by_division(&records, Column::Division, &config.columns.division)?;
    Ok(process_divisions(&divisions, &order, config))
}

/// Anchors of the template. Fails unless at least one bucket block was
/// found next to the overall one.
pub fn locate_anchors(
    workbook: &Workbook,
    template: &ReportTemplate,
    config: &ReportConfig,
) -> Result<(String, Vec<Anchor>), ReportError> {
    let report_date = extract_report_date(&template.path)?;
    let anchors = resolve_anchors(workbook, &template.sheet, &report_date, config)?;
    if !anchors.iter().any(|a| a.category != config.labels.overall) {
        return Err(ReportError::NoAnchorsFound {
            sheet: template.sheet.clone(),
        });
    }
    info!("{} anchors on '{}'", anchors.len(), template.sheet);
    Ok((report_date, anchors))
}

/// Full run: tables, anchors, insertion, and the output workbook at
/// `output`. Nothing is written unless every stage succeeds.
pub fn run(
    ledger: &LedgerSource,
    template: &ReportTemplate,
    output: &Path,
    config: &ReportConfig,
) -> Result<RunOutcome, ReportError> {
    let tables = build_tables(ledger, template, config)?;
    let snapshot = Workbook::open(&template.path)?;
    let (report_date, anchors) = locate_anchors(&snapshot, template, config)?;

    let mut document = TemplateDocument::open(&template.path)?;
    let blocks_written = {
        let mut writer =
            TemplateWriter::new(&mut document, &template.sheet, &config.negative_outcomes);
        write_blocks(&mut writer, &anchors, &tables, &config.labels.overall)?
    };
    document.save(output)?;
    info!("{} blocks written to {}", blocks_written, output.display());

    Ok(RunOutcome {
        report_date,
        tables,
        anchors,
        blocks_written,
    })
}
