use serde::{Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

use crate::error::ReportError;

/// Collateral status of a loan product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProductKind {
    Secured,
    Unsecured,
    Undetermined,
}

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [Self::Secured, Self::Unsecured, Self::Undetermined];

    /// Label used for the kind inside ledgers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Secured => "Залоговый",
            Self::Unsecured => "Беззалоговый",
            Self::Undetermined => "Неопределенный",
        }
    }

    /// Parse a ledger label; anything unknown is undetermined.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == label)
            .unwrap_or(Self::Undetermined)
    }
}

/// Ledger columns the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    LoanType,
    Outcome,
    Division,
    ProductKind,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Self::LoanType,
        Self::Outcome,
        Self::Division,
        Self::ProductKind,
    ];
}

/// One classified ledger row. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub loan_type: Option<String>,
    pub outcome: Option<String>,
    pub division: Option<String>,
    pub product_kind: ProductKind,
}

impl Record {
    pub fn value(&self, column: Column) -> Option<&str> {
        match column {
            Column::LoanType => self.loan_type.as_deref(),
            Column::Outcome => self.outcome.as_deref(),
            Column::Division => self.division.as_deref(),
            Column::ProductKind => Some(self.product_kind.label()),
        }
    }
}

/// Records together with the columns their source actually carried.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// Source header text for each column present, in source order.
    pub columns: Vec<(Column, String)>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.iter().any(|(c, _)| *c == column)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(_, name)| name.clone()).collect()
    }

    /// A set with the same schema holding `records`.
    pub fn with_records(&self, records: Vec<Record>) -> RecordSet {
        RecordSet {
            columns: self.columns.clone(),
            records,
        }
    }

    /// Distinct non-empty values of `column` in first-seen order.
    pub fn unique_values(&self, column: Column) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter_map(|r| r.value(column))
            .filter(|v| seen.insert(*v))
            .map(str::to_string)
            .collect()
    }
}

pub const MAX_ROW: u32 = 1_048_576;
pub const MAX_COL: u32 = 16_384;

/// 1-based worksheet coordinate. Always inside the Excel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Result<Self, ReportError> {
        if row == 0 || row > MAX_ROW || col == 0 || col > MAX_COL {
            return Err(ReportError::MalformedAddress(format!(
                "row {row}, column {col}"
            )));
        }
        Ok(Self { row, col })
    }

    /// The cell `count` columns to the right.
    pub fn right(&self, count: u32) -> Result<Self, ReportError> {
        let col = self
            .col
            .checked_add(count)
            .ok_or_else(|| ReportError::MalformedAddress(format!("{self} + {count} columns")))?;
        Self::new(self.row, col)
    }

    /// Parse an A1-style address such as `"AB3"` (absolute `$` markers
    /// allowed).
    pub fn parse(address: &str) -> Result<Self, ReportError> {
        let malformed = || ReportError::MalformedAddress(address.to_string());
        let cleaned: String = address.chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(malformed)?;
        let (letters, digits) = cleaned.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(malformed());
        }
        let mut col: u32 = 0;
        for b in letters.bytes() {
            col = col
                .checked_mul(26)
                .and_then(|c| c.checked_add(u32::from(b - b'A') + 1))
                .ok_or_else(malformed)?;
        }
        let row: u32 = digits.parse().map_err(|_| malformed())?;
        Self::new(row, col).map_err(|_| malformed())
    }

    /// Spreadsheet column letters, e.g. 28 -> "AB".
    pub fn column_letters(&self) -> String {
        let mut n = self.col;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rectangular merged block; `start` is the top-left cell holding the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRegion {
    pub start: CellRef,
    pub end: CellRef,
}

impl MergedRegion {
    /// Parse a range such as `"E3:G3"`; a single cell is a 1x1 region.
    pub fn parse(range: &str) -> Result<Self, ReportError> {
        let (start, end) = match range.split_once(':') {
            Some((a, b)) => (CellRef::parse(a)?, CellRef::parse(b)?),
            None => {
                let cell = CellRef::parse(range)?;
                (cell, cell)
            }
        };
        if end.row < start.row || end.col < start.col {
            return Err(ReportError::MalformedAddress(range.to_string()));
        }
        Ok(Self { start, end })
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }
}

impl fmt::Display for MergedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Where a category's block goes in the target template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub category: String,
    pub cell: CellRef,
}

#[derive(Debug, Tabled, Clone)]
pub struct AnchorRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Address")]
    pub address: String,
}

impl From<&Anchor> for AnchorRow {
    fn from(anchor: &Anchor) -> Self {
        Self {
            category: anchor.category.clone(),
            address: anchor.cell.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(CellRef::new(1, 1).unwrap().to_string(), "A1");
        assert_eq!(CellRef::new(7, 26).unwrap().to_string(), "Z7");
        assert_eq!(CellRef::new(3, 28).unwrap().to_string(), "AB3");
        assert_eq!(CellRef::new(1, MAX_COL).unwrap().to_string(), "XFD1");
    }

    #[test]
    fn offsets_past_the_grid_are_malformed() {
        let edge = CellRef::new(5, MAX_COL - 1).unwrap();
        assert!(edge.right(1).is_ok());
        assert!(matches!(
            edge.right(3),
            Err(ReportError::MalformedAddress(_))
        ));
        assert!(CellRef::new(0, 1).is_err());
    }

    #[test]
    fn product_kind_labels_parse_back() {
        for kind in ProductKind::ALL {
            assert_eq!(ProductKind::from_label(kind.label()), kind);
        }
        assert_eq!(ProductKind::from_label("залоговый"), ProductKind::Undetermined);
    }

    #[test]
    fn unique_values_keep_first_seen_order() {
        let rec = |t: &str| Record {
            loan_type: Some(t.into()),
            outcome: None,
            division: None,
            product_kind: ProductKind::Undetermined,
        };
        let set = RecordSet {
            columns: vec![(Column::LoanType, "ТИП кредита".into())],
            records: vec![rec("b"), rec("a"), rec("b"), rec("c")],
        };
        assert_eq!(set.unique_values(Column::LoanType), vec!["b", "a", "c"]);
    }

    #[test]
    fn merged_regions_overlap() {
        let r = |a: (u32, u32), b: (u32, u32)| MergedRegion {
            start: CellRef::new(a.0, a.1).unwrap(),
            end: CellRef::new(b.0, b.1).unwrap(),
        };
        assert!(r((1, 1), (1, 3)).overlaps(&r((1, 3), (2, 4))));
        assert!(!r((1, 1), (1, 3)).overlaps(&r((2, 1), (2, 3))));
        assert_eq!(r((4, 2), (4, 5)).width(), 4);
    }

    #[test]
    fn addresses_parse_from_a1_notation() {
        assert_eq!(CellRef::parse("AB3").unwrap(), CellRef::new(3, 28).unwrap());
        assert_eq!(CellRef::parse("$E$3").unwrap(), CellRef::new(3, 5).unwrap());
        for bad in ["", "3A", "A0", "a1", "XFE1"] {
            assert!(
                matches!(CellRef::parse(bad), Err(ReportError::MalformedAddress(_))),
                "{bad}"
            );
        }

        let region = MergedRegion::parse("E3:G3").unwrap();
        assert_eq!(region.width(), 3);
        assert_eq!(region.to_string(), "E3:G3");
        assert_eq!(MergedRegion::parse("B2").unwrap().width(), 1);
        assert!(MergedRegion::parse("G3:E3").is_err());
    }
}
