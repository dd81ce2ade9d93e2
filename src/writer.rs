use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::crosstab::CrossTab;
use crate::error::ReportError;
use crate::template::{self, Fill, TemplateDocument};
use crate::types::{Anchor, CellRef, MergedRegion};

/// One table to place in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// First inserted column; headers go on `header_row`.
    pub at: CellRef,
    pub header_row: u32,
    pub headers: Vec<String>,
    /// Row key and values aligned to `headers`.
    pub rows: Vec<(String, Vec<u64>)>,
}

impl Block {
    pub fn width(&self) -> u32 {
        self.headers.len() as u32
    }
}

/// Capability that places blocks into a document: shift existing columns
/// right by the block width at `block.at`, then fill the gap.
pub trait ReportWriter {
    fn insert_block(&mut self, block: &Block) -> Result<(), ReportError>;
}

/// Pair anchors with tables and hand the blocks to `writer` in anchor
/// order. Each block lands right of the columns inserted before it.
/// Returns how many blocks were written.
pub fn write_blocks<W: ReportWriter>(
    writer: &mut W,
    anchors: &[Anchor],
    tables: &IndexMap<String, CrossTab>,
    overall_key: &str,
) -> Result<usize, ReportError> {
    let mut inserted = 0u32;
    let mut written = 0usize;
    for anchor in anchors {
        let Some(table) = tables.get(&anchor.category) else {
            info!("no table for anchor '{}' at {}", anchor.category, anchor.cell);
            continue;
        };
        let header_row = if anchor.category == overall_key {
            anchor.cell.row + 1
        } else {
            anchor.cell.row
        };
        let block = Block {
            at: anchor.cell.right(inserted)?,
            header_row,
            headers: table.headers(),
            rows: table.rows(),
        };
        writer.insert_block(&block)?;
        info!(
            "wrote '{}' ({} columns) at {}",
            anchor.category,
            block.width(),
            block.at
        );
        inserted += block.width();
        written += 1;
    }
    for category in tables.keys() {
        if !anchors.iter().any(|a| &a.category == category) {
            warn!("table '{}' has no anchor in the template", category);
        }
    }
    Ok(written)
}

/// Writes blocks into one sheet of the editable template.
pub struct TemplateWriter<'a> {
    document: &'a mut TemplateDocument,
    sheet: String,
    negative: HashSet<String>,
}

impl<'a> TemplateWriter<'a> {
    pub fn new(document: &'a mut TemplateDocument, sheet: &str, negative_outcomes: &[String]) -> Self {
        Self {
            document,
            sheet: sheet.to_string(),
            negative: negative_outcomes.iter().cloned().collect(),
        }
    }
}

impl ReportWriter for TemplateWriter<'_> {
    fn insert_block(&mut self, block: &Block) -> Result<(), ReportError> {
        let width = block.width();
        if width == 0 {
            return Ok(());
        }
        let sheet = self.document.sheet_mut(&self.sheet)?;
        template::insert_columns(sheet, block.at.col, width)?;

        let header_start = CellRef::new(block.header_row, block.at.col)?;
        for (i, header) in block.headers.iter().enumerate() {
            let cell = header_start.right(i as u32)?;
            template::write_text(sheet, cell, header);
            let fill = self.negative.contains(header).then_some(Fill::Red);
            template::style_cell(sheet, cell, fill);
        }

        if block.header_row > 1 {
            let band_start = CellRef::new(block.header_row - 1, block.at.col)?;
            let band_end = band_start.right(width - 1)?;
            for i in 0..width {
                template::style_cell(sheet, band_start.right(i)?, Some(Fill::Blue));
            }
            if width > 1 {
                let dropped = template::merge(
                    sheet,
                    MergedRegion {
                        start: band_start,
                        end: band_end,
                    },
                );
                for region in dropped {
                    warn!("merged region {} overlapped the header band and was dropped", region);
                }
            }
        }

        for (label, values) in &block.rows {
            let Some(found) = template::find_label(sheet, label) else {
                continue;
            };
            let row_start = CellRef::new(found.row, block.at.col)?;
            for (i, value) in values.iter().enumerate() {
                template::write_number(sheet, row_start.right(i as u32)?, *value as f64);
            }
        }
        Ok(())
    }
}
