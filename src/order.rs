use std::collections::HashSet;

use tracing::{error, info};

use crate::workbook::{Sheet, Workbook};

/// Canonical category order: the target labels as they first occur on
/// `sheet_name`, scanning row by row.
///
/// Returns an empty list when the sheet cannot be read; callers treat that
/// as "no ordering available".
pub fn discover_order(workbook: &Workbook, sheet_name: &str, targets: &[String]) -> Vec<String> {
    let sheet = match workbook.sheet(sheet_name) {
        Ok(sheet) => sheet,
        Err(e) => {
            error!("cannot scan for category order: {}", e);
            return Vec::new();
        }
    };
    let order = scan_order(sheet, targets);
    info!(
        "category order from '{}' on '{}': {:?}",
        workbook.path().display(),
        sheet_name,
        order
    );
    order
}

pub fn scan_order(sheet: &Sheet, targets: &[String]) -> Vec<String> {
    let wanted: HashSet<&str> = targets.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for (_, value) in sheet.cells() {
        let text = value.to_text();
        if wanted.contains(text.as_str()) && seen.insert(text.clone()) {
            order.push(text);
        }
    }
    order
}

/// Put `categories` in `discovered` order; categories the reference
/// document never mentions follow in their original order.
pub fn reorder(categories: &[String], discovered: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = discovered
        .iter()
        .filter(|d| categories.contains(d))
        .cloned()
        .collect();
    ordered.extend(
        categories
            .iter()
            .filter(|c| !discovered.contains(c))
            .cloned(),
    );
    ordered
}
