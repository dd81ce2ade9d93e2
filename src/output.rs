use crate::crosstab::CrossTab;
use crate::error::ReportError;
use crate::types::{Anchor, AnchorRow};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table};

#[derive(Debug, Serialize)]
pub struct TableExport {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RowExport>,
}

#[derive(Debug, Serialize)]
pub struct RowExport {
    pub label: String,
    pub values: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub report_date: Option<String>,
    pub tables: Vec<TableExport>,
    pub anchors: Vec<Anchor>,
}

impl TableExport {
    pub fn new(name: &str, table: &CrossTab) -> Self {
        Self {
            name: name.to_string(),
            headers: table.headers(),
            rows: table
                .rows()
                .into_iter()
                .map(|(label, values)| RowExport { label, values })
                .collect(),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// One CSV per table, named after the table key. Returns the files written.
pub fn write_csv_tables(
    dir: &Path,
    tables: &IndexMap<String, CrossTab>,
) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (name, table) in tables {
        let path = dir.join(format!("{}.csv", file_stem(name)));
        let mut wtr = csv::Writer::from_path(&path)?;
        let mut header = vec![String::new()];
        header.extend(table.headers());
        wtr.write_record(&header)?;
        for (label, values) in table.rows() {
            let mut record = vec![label];
            record.extend(values.iter().map(u64::to_string));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Bucket labels like "30+" or "30-" are fine in file names; path
/// separators are not.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

pub fn render_table(table: &CrossTab) -> String {
    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(table.headers());
    builder.push_record(header);
    for (label, values) in table.rows() {
        let mut record = vec![label];
        record.extend(values.iter().map(u64::to_string));
        builder.push_record(record);
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    rendered.to_string()
}

pub fn preview_tables(tables: &IndexMap<String, CrossTab>) {
    if tables.is_empty() {
        println!("(no tables)\n");
        return;
    }
    for (name, table) in tables {
        println!("\n{}:\n", name);
        println!("{}\n", render_table(table));
    }
}

pub fn preview_anchors(anchors: &[Anchor]) {
    if anchors.is_empty() {
        println!("(no anchors)\n");
        return;
    }
    println!("{}\n", render_anchors(anchors));
}

pub fn render_anchors(anchors: &[Anchor]) -> String {
    let rows: Vec<AnchorRow> = anchors.iter().map(AnchorRow::from).collect();
    Table::new(rows).with(Style::markdown()).to_string()
}
