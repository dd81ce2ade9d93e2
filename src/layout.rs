// Locating where each category's block belongs in the target template.
//
// Category anchors hang off merged bucket headers: below the header, inside
// its column span, sits the dated target header, and below that the
// sub-metric label. The anchor is the cell right of the sub-metric. The
// overall anchor sits three columns right of the dated overall header.

use tracing::{info, warn};

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::types::{Anchor, CellRef, MergedRegion};
use crate::workbook::{Sheet, Workbook};

const CATEGORY_OFFSET: u32 = 1;
const OVERALL_OFFSET: u32 = 3;

/// First cell, row by row, whose value equals `label`.
pub fn find_label_cell(sheet: &Sheet, label: &str) -> Option<CellRef> {
    sheet
        .cells()
        .find(|(_, value)| value.matches(label))
        .map(|(cell, _)| cell)
}

/// First cell equal to `label` in rows `rows`, columns `cols`, row-major.
fn find_in_block(
    sheet: &Sheet,
    label: &str,
    rows: std::ops::RangeInclusive<u32>,
    cols: std::ops::RangeInclusive<u32>,
) -> Option<CellRef> {
    for row in rows {
        for col in cols.clone() {
            let cell = CellRef { row, col };
            if sheet.get(cell).is_some_and(|v| v.matches(label)) {
                return Some(cell);
            }
        }
    }
    None
}

/// Anchor below one merged bucket header, if the template has one.
fn anchor_under(
    sheet: &Sheet,
    region: &MergedRegion,
    target_header: &str,
    sub_metric: &str,
) -> Result<Option<CellRef>, ReportError> {
    let max_row = sheet.max_row();
    let span = region.width() - 1;
    let mut from_row = region.end.row + 1;
    while from_row <= max_row {
        let Some(header) = find_in_block(
            sheet,
            target_header,
            from_row..=max_row,
            region.start.col..=region.end.col,
        ) else {
            return Ok(None);
        };
        let metric = find_in_block(
            sheet,
            sub_metric,
            header.row + 1..=max_row,
            header.col..=header.col.saturating_add(span),
        );
        if let Some(metric) = metric {
            return metric.right(CATEGORY_OFFSET).map(Some);
        }
        from_row = header.row + 1;
    }
    Ok(None)
}

/// One anchor per merged region labelled with a bucket, in region order.
/// Regions without the header/sub-metric pair are skipped.
pub fn find_category_anchors(
    workbook: &Workbook,
    sheet_name: &str,
    buckets: &[String],
    target_header: &str,
    sub_metric: &str,
) -> Result<Vec<Anchor>, ReportError> {
    let sheet = workbook.sheet(sheet_name)?;
    let mut anchors = Vec::new();
    for region in sheet.merged_regions() {
        let Some(label) = sheet.get(region.start).map(|v| v.to_text()) else {
            continue;
        };
        if !buckets.contains(&label) {
            continue;
        }
        match anchor_under(sheet, region, target_header, sub_metric)? {
            Some(cell) => anchors.push(Anchor {
                category: label,
                cell,
            }),
            None => info!("bucket '{}' at {} has no '{}' cell", label, region.start, sub_metric),
        }
    }
    Ok(anchors)
}

/// Anchor of the overall table, three columns right of `overall_header`.
pub fn find_overall_anchor(
    workbook: &Workbook,
    sheet_name: &str,
    overall_header: &str,
    overall_key: &str,
) -> Result<Option<Anchor>, ReportError> {
    let sheet = workbook.sheet(sheet_name)?;
    match find_label_cell(sheet, overall_header) {
        Some(cell) => Ok(Some(Anchor {
            category: overall_key.to_string(),
            cell: cell.right(OVERALL_OFFSET)?,
        })),
        None => Ok(None),
    }
}

/// All anchors for a template dated `report_date`: overall first, then
/// buckets in configured order. Categories outside that list and repeated
/// categories are dropped.
pub fn resolve_anchors(
    workbook: &Workbook,
    sheet_name: &str,
    report_date: &str,
    config: &ReportConfig,
) -> Result<Vec<Anchor>, ReportError> {
    let layout = &config.layout;
    let overall_key = &config.labels.overall;

    let mut found = Vec::new();
    if let Some(overall) = find_overall_anchor(
        workbook,
        sheet_name,
        &layout.overall_header_for(report_date),
        overall_key,
    )? {
        found.push(overall);
    } else {
        info!("no '{}' cell on '{}'", layout.overall_header_for(report_date), sheet_name);
    }
    found.extend(find_category_anchors(
        workbook,
        sheet_name,
        &layout.buckets,
        &layout.target_header_for(report_date),
        &layout.sub_metric,
    )?);

    let mut order: Vec<&String> = vec![overall_key];
    for bucket in &layout.buckets {
        if !order.contains(&bucket) {
            order.push(bucket);
        }
    }

    let mut anchors = Vec::new();
    for category in order {
        let mut matches = found.iter().filter(|a| &a.category == category);
        if let Some(first) = matches.next() {
            anchors.push(first.clone());
        }
        for extra in matches {
            warn!("ignoring second anchor {} for '{}'", extra.cell, category);
        }
    }
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::tests::{cell, text};
    use std::path::Path;

    const SHEET: &str = "Сводная погашения NEW";
    const DATE: &str = "21.06.2024";

    fn region(a: (u32, u32), b: (u32, u32)) -> MergedRegion {
        MergedRegion {
            start: cell(a.0, a.1),
            end: cell(b.0, b.1),
        }
    }

    /// Overall header at B2, bucket "30+" merged over E3:G3, "60+" over
    /// H3:I3, and an unlisted "720+" bucket over K3:L3.
    fn template() -> Sheet {
        let mut sheet = Sheet::new(SHEET);
        sheet.set(cell(2, 2), text("Кол-во просроченных анкет на 21.06.2024"));

        sheet.set(cell(3, 5), text("30+"));
        sheet.add_merged(region((3, 5), (3, 7)));
        sheet.set(cell(4, 5), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(6, 6), text("% ОД к просроченному портфелю"));
        sheet.set(cell(9, 6), text("% ОД к просроченному портфелю"));

        sheet.set(cell(3, 8), text("60+"));
        sheet.add_merged(region((3, 8), (3, 9)));
        sheet.set(cell(5, 9), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(7, 9), text("% ОД к просроченному портфелю"));

        // Unlisted bucket label: ignored.
        sheet.set(cell(3, 11), text("720+"));
        sheet.add_merged(region((3, 11), (3, 12)));
        sheet.set(cell(4, 11), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(5, 11), text("% ОД к просроченному портфелю"));
        sheet
    }

    fn book(sheet: Sheet) -> Workbook {
        Workbook::new(Path::new("Отчёт 21.06.2024.xlsx"), vec![sheet])
    }

    fn buckets() -> Vec<String> {
        ReportConfig::default().layout.buckets
    }

    #[test]
    fn label_lookup_is_row_major_first_match() {
        let mut sheet = template();
        sheet.set(cell(1, 20), text("x"));
        sheet.set(cell(2, 1), text("x"));
        assert_eq!(find_label_cell(&sheet, "x"), Some(cell(1, 20)));
        assert_eq!(find_label_cell(&sheet, "absent"), None);
    }

    #[test]
    fn category_anchor_is_one_right_of_first_sub_metric() {
        let wb = book(template());
        let anchors = find_category_anchors(
            &wb,
            SHEET,
            &buckets(),
            "Просроченная задолженность на 21.06.2024",
            "% ОД к просроченному портфелю",
        )
        .unwrap();
        assert_eq!(
            anchors,
            vec![
                Anchor { category: "30+".into(), cell: cell(6, 7) },
                Anchor { category: "60+".into(), cell: cell(7, 10) },
            ]
        );
    }

    #[test]
    fn sub_metric_must_sit_within_the_header_span() {
        let mut sheet = Sheet::new(SHEET);
        sheet.set(cell(1, 1), text("90+"));
        sheet.add_merged(region((1, 1), (1, 2)));
        sheet.set(cell(2, 1), text("Просроченная задолженность на 21.06.2024"));
        // Three columns right of the header: outside a two-column span.
        sheet.set(cell(3, 4), text("% ОД к просроченному портфелю"));
        let wb = book(sheet);
        let anchors = resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default()).unwrap();
        assert!(anchors.is_empty());
    }

    #[test]
    fn later_header_is_tried_when_first_has_no_sub_metric() {
        let mut sheet = Sheet::new(SHEET);
        sheet.set(cell(1, 1), text("180+"));
        sheet.add_merged(region((1, 1), (1, 2)));
        sheet.set(cell(2, 1), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(3, 5), text("% ОД к просроченному портфелю"));
        sheet.set(cell(4, 2), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(5, 3), text("% ОД к просроченному портфелю"));
        let wb = book(sheet);
        let anchors = resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default()).unwrap();
        assert_eq!(anchors, vec![Anchor { category: "180+".into(), cell: cell(5, 4) }]);
    }

    #[test]
    fn resolve_puts_overall_first_with_wider_offset() {
        let wb = book(template());
        let anchors = resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default()).unwrap();
        let categories: Vec<&str> = anchors.iter().map(|a| a.category.as_str()).collect();
        assert_eq!(categories, vec!["Общий итог", "30+", "60+"]);
        assert_eq!(anchors[0].cell, cell(2, 5));
    }

    #[test]
    fn duplicate_bucket_keeps_first_region() {
        let mut sheet = template();
        sheet.set(cell(20, 1), text("30+"));
        sheet.add_merged(region((20, 1), (20, 2)));
        sheet.set(cell(21, 1), text("Просроченная задолженность на 21.06.2024"));
        sheet.set(cell(22, 1), text("% ОД к просроченному портфелю"));
        let wb = book(sheet);
        let anchors = resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default()).unwrap();
        let thirty: Vec<&Anchor> = anchors.iter().filter(|a| a.category == "30+").collect();
        assert_eq!(thirty.len(), 1);
        assert_eq!(thirty[0].cell, cell(6, 7));
    }

    #[test]
    fn no_matching_region_gives_no_anchors() {
        let mut sheet = Sheet::new(SHEET);
        sheet.set(cell(1, 1), text("Прочее"));
        sheet.add_merged(region((1, 1), (1, 3)));
        let wb = book(sheet);
        assert!(resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn overall_anchor_past_the_grid_is_malformed() {
        let mut sheet = Sheet::new(SHEET);
        sheet.set(
            cell(1, crate::types::MAX_COL - 1),
            text("Кол-во просроченных анкет на 21.06.2024"),
        );
        let wb = book(sheet);
        assert!(matches!(
            resolve_anchors(&wb, SHEET, DATE, &ReportConfig::default()),
            Err(ReportError::MalformedAddress(_))
        ));
    }

    #[test]
    fn missing_sheet_is_reported() {
        let wb = book(template());
        assert!(matches!(
            resolve_anchors(&wb, "Другой", DATE, &ReportConfig::default()),
            Err(ReportError::MissingSheet { .. })
        ));
    }
}
