// Read-only spreadsheet snapshot.
//
// Workbooks are read completely with calamine and the file handle is dropped
// before `open` returns, so nothing downstream holds a document open. The
// snapshot keeps cell values and merged regions for every sheet; it backs
// the ledger loader and the template scans. Editing the template happens in
// `template.rs`.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::debug;

use crate::error::ReportError;
use crate::types::{CellRef, MergedRegion};
use crate::util::format_cell_number;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Exact equality against a label. Numbers compare by their rendering.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::Text(s) => s == label,
            Self::Number(n) => format_cell_number(*n) == label,
            Self::Bool(_) => false,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_cell_number(*n),
            Self::Bool(b) => b.to_string(),
        }
    }

    fn from_data(data: &Data) -> Option<Self> {
        match data {
            Data::String(s) if s.is_empty() => None,
            Data::String(s) => Some(Self::Text(s.clone())),
            Data::Int(i) => Some(Self::Number(*i as f64)),
            Data::Float(f) => Some(Self::Number(*f)),
            Data::Bool(b) => Some(Self::Bool(*b)),
            Data::DateTime(dt) => Some(Self::Number(dt.as_f64())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Self::Text(s.clone())),
            Data::Error(_) | Data::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
    merged: Vec<MergedRegion>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, cell: CellRef) -> Option<&CellValue> {
        self.cells.get(&(cell.row, cell.col))
    }

    pub fn set(&mut self, cell: CellRef, value: CellValue) {
        self.cells.insert((cell.row, cell.col), value);
    }

    /// Non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &CellValue)> {
        self.cells
            .iter()
            .map(|(&(row, col), value)| (CellRef { row, col }, value))
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|(_, c)| *c).max().unwrap_or(0)
    }

    /// Text of every cell in `row` from column 1 to `max_col`.
    pub fn row_texts(&self, row: u32, max_col: u32) -> Vec<Option<String>> {
        (1..=max_col)
            .map(|col| self.cells.get(&(row, col)).map(CellValue::to_text))
            .collect()
    }

    /// Merged regions in the order the file lists them.
    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged
    }

    pub fn add_merged(&mut self, region: MergedRegion) {
        self.merged.push(region);
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    sheets: Vec<Sheet>,
}

impl Workbook {
    #[cfg(test)]
    pub fn new(path: &Path, sheets: Vec<Sheet>) -> Self {
        Self {
            path: path.to_path_buf(),
            sheets,
        }
    }

    /// Read every sheet of an `.xlsx` file into memory.
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::MissingFile(path.to_path_buf()));
        }
        let read_error = |message: String| ReportError::Workbook {
            path: path.to_path_buf(),
            message,
        };

        let mut book = open_workbook::<Xlsx<_>, _>(path).map_err(|e| read_error(e.to_string()))?;
        book.load_merged_regions()
            .map_err(|e| read_error(format!("merged regions: {e}")))?;

        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = book
                .worksheet_range(&name)
                .map_err(|e| read_error(format!("sheet '{name}': {e}")))?;
            let mut sheet = Sheet::new(&name);
            if let Some((row0, col0)) = range.start() {
                for (r, c, data) in range.used_cells() {
                    if let Some(value) = CellValue::from_data(data) {
                        let cell = CellRef::new(row0 + r as u32 + 1, col0 + c as u32 + 1)?;
                        sheet.set(cell, value);
                    }
                }
            }
            if let Some(regions) = book.worksheet_merge_cells(&name) {
                let regions =
                    regions.map_err(|e| read_error(format!("merged regions of '{name}': {e}")))?;
                for dims in regions {
                    sheet.add_merged(MergedRegion {
                        start: CellRef::new(dims.start.0 + 1, dims.start.1 + 1)?,
                        end: CellRef::new(dims.end.0 + 1, dims.end.1 + 1)?,
                    });
                }
            }
            debug!(
                sheet = %name,
                cells = sheet.cells.len(),
                merged = sheet.merged.len(),
                "loaded sheet"
            );
            sheets.push(sheet);
        }

        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, ReportError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ReportError::MissingSheet {
                path: self.path.clone(),
                sheet: name.to_string(),
            })
    }
}
