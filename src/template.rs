// Editable copy of the report template.
//
// The template is opened with umya-spreadsheet, edited in memory and written
// to a new path, so formulas, number formats, widths and existing styles of
// the template survive. Coordinates are the 1-based `CellRef`s used
// everywhere else.
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use umya_spreadsheet::{Border, Spreadsheet, Worksheet};

use crate::error::ReportError;
use crate::types::{CellRef, MergedRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Blue,
    Red,
}

impl Fill {
    pub fn argb(&self) -> &'static str {
        match self {
            Self::Blue => "FFDDEBF7",
            Self::Red => "FFFF0000",
        }
    }
}

pub struct TemplateDocument {
    path: PathBuf,
    book: Spreadsheet,
}

impl TemplateDocument {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::MissingFile(path.to_path_buf()));
        }
        let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| ReportError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            book,
        })
    }

    #[cfg(test)]
    pub fn from_book(path: &Path, book: Spreadsheet) -> Self {
        Self {
            path: path.to_path_buf(),
            book,
        }
    }

    #[cfg(test)]
    pub fn sheet(&self, name: &str) -> Result<&Worksheet, ReportError> {
        self.book
            .get_sheet_by_name(name)
            .ok_or_else(|| self.missing_sheet(name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Worksheet, ReportError> {
        let missing = self.missing_sheet(name);
        self.book.get_sheet_by_name_mut(name).ok_or(missing)
    }

    fn missing_sheet(&self, name: &str) -> ReportError {
        ReportError::MissingSheet {
            path: self.path.clone(),
            sheet: name.to_string(),
        }
    }

    /// Write the edited document to `path`; the source file is untouched.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        umya_spreadsheet::writer::xlsx::write(&self.book, path).map_err(|e| {
            ReportError::Workbook {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })
    }
}

/// Insert `count` empty columns before `at`. Cells, merges and formula
/// references right of `at` move with them.
pub fn insert_columns(sheet: &mut Worksheet, at: u32, count: u32) -> Result<(), ReportError> {
    let (highest_col, _) = sheet.get_highest_column_and_row();
    if highest_col >= at && highest_col.saturating_add(count) > crate::types::MAX_COL {
        return Err(ReportError::MalformedAddress(format!(
            "inserting {count} columns at {at} pushes '{}' past the last column",
            sheet.get_name()
        )));
    }
    sheet.insert_new_column_by_index(&at, &count);
    debug!(sheet = %sheet.get_name(), at, count, "inserted columns");
    Ok(())
}

/// First cell, row by row, whose value equals `label`.
pub fn find_label(sheet: &Worksheet, label: &str) -> Option<CellRef> {
    let (max_col, max_row) = sheet.get_highest_column_and_row();
    for row in 1..=max_row {
        for col in 1..=max_col {
            if let Some(cell) = sheet.get_cell((col, row)) {
                if cell.get_value() == label {
                    return Some(CellRef { row, col });
                }
            }
        }
    }
    None
}

pub fn write_text(sheet: &mut Worksheet, at: CellRef, value: &str) {
    sheet.get_cell_mut((at.col, at.row)).set_value(value);
}

pub fn write_number(sheet: &mut Worksheet, at: CellRef, value: f64) {
    sheet.get_cell_mut((at.col, at.row)).set_value_number(value);
}

/// Thin border on every side, plus an optional solid fill.
pub fn style_cell(sheet: &mut Worksheet, at: CellRef, fill: Option<Fill>) {
    let style = sheet.get_cell_mut((at.col, at.row)).get_style_mut();
    let borders = style.get_borders_mut();
    borders.get_left_mut().set_border_style(Border::BORDER_THIN);
    borders.get_right_mut().set_border_style(Border::BORDER_THIN);
    borders.get_top_mut().set_border_style(Border::BORDER_THIN);
    borders.get_bottom_mut().set_border_style(Border::BORDER_THIN);
    if let Some(fill) = fill {
        style.set_background_color(fill.argb());
    }
}

#[cfg(test)]
pub fn merged_regions(sheet: &Worksheet) -> Result<Vec<MergedRegion>, ReportError> {
    sheet
        .get_merge_cells()
        .iter()
        .map(|range| MergedRegion::parse(&range.get_range()))
        .collect()
}

/// Merge `region`, first removing any existing merge it overlaps. Returns
/// the removed regions.
pub fn merge(sheet: &mut Worksheet, region: MergedRegion) -> Vec<MergedRegion> {
    let mut dropped = Vec::new();
    let mut failed = None;
    sheet.get_merge_cells_mut().retain(|range| {
        match MergedRegion::parse(&range.get_range()) {
            Ok(existing) if existing.overlaps(&region) => {
                dropped.push(existing);
                false
            }
            Ok(_) => true,
            Err(e) => {
                failed.get_or_insert(e);
                true
            }
        }
    });
    if let Some(e) = failed {
        warn!("unreadable merged range on '{}': {}", sheet.get_name(), e);
    }
    sheet.add_merge_cells(region.to_string());
    dropped
}
