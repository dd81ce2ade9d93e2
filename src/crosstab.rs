// Category × outcome count matrices.
//
// A `Pivot` holds raw counts: one row per category, one count per
// outcome, plus the row's total over every outcome it saw. A `CrossTab`
// is a pivot with its summary row derived; it is the only shape handed to
// formatting, combination and output.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::config::TableLabels;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotRow {
    counts: HashMap<String, u64>,
    total: u64,
}

impl PivotRow {
    pub fn count(&self, outcome: &str) -> u64 {
        self.counts.get(outcome).copied().unwrap_or(0)
    }

    /// Sum over every outcome the row was built from, including outcomes
    /// later dropped from display.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn increment(&mut self, outcome: &str) {
        *self.counts.entry(outcome.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    fn add(&mut self, other: &PivotRow) {
        for (outcome, n) in &other.counts {
            *self.counts.entry(outcome.clone()).or_insert(0) += n;
        }
        self.total += other.total;
    }

    fn retain_outcomes(&mut self, keep: &[String]) {
        self.counts.retain(|outcome, _| keep.contains(outcome));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pivot {
    columns: Vec<String>,
    rows: IndexMap<String, PivotRow>,
}

impl Pivot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one observation. Rows and columns appear in first-seen order.
    pub fn record(&mut self, category: &str, outcome: &str) {
        if !self.columns.iter().any(|c| c == outcome) {
            self.columns.push(outcome.to_string());
        }
        self.rows
            .entry(category.to_string())
            .or_default()
            .increment(outcome);
    }

    #[cfg(test)]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[cfg(test)]
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn row(&self, category: &str) -> Option<&PivotRow> {
        self.rows.get(category)
    }

    /// Add zero rows for categories in `categories` the pivot lacks.
    pub fn padded(mut self, categories: &[String]) -> Self {
        for category in categories {
            self.rows.entry(category.clone()).or_default();
        }
        self
    }

    /// Rows listed in `order` first, in that order; the rest keep their
    /// relative order after them.
    pub fn ordered_by(mut self, order: &[String]) -> Self {
        let rank = |key: &str| order.iter().position(|o| o == key).unwrap_or(order.len());
        self.rows.sort_by(|a, _, b, _| rank(a.as_str()).cmp(&rank(b.as_str())));
        self
    }

    pub fn rename_row(mut self, from: &str, to: &str) -> Self {
        if let Some(idx) = self.rows.get_index_of(from) {
            if let Some((_, row)) = self.rows.shift_remove_index(idx) {
                let (new_idx, _) = self.rows.insert_full(to.to_string(), row);
                self.rows.move_index(new_idx, idx.min(self.rows.len() - 1));
            }
        }
        self
    }

    /// Rows of `other` appended after ours; a repeated key is added into
    /// the existing row.
    pub fn concat(mut self, other: Pivot) -> Self {
        self.merge(&other);
        self
    }

    fn merge(&mut self, other: &Pivot) {
        for column in &other.columns {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
            }
        }
        for (category, row) in &other.rows {
            self.rows.entry(category.clone()).or_default().add(row);
        }
    }
}

/// A pivot with its summary row derived. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    labels: TableLabels,
    pivot: Pivot,
    summary: PivotRow,
}

impl CrossTab {
    /// Derive the summary row: every outcome column summed over all rows.
    /// The summary's total is secured + unsecured totals when both summary
    /// rows exist (loan-type rows already count the same records), else the
    /// sum of all row totals.
    pub fn derive(pivot: Pivot, labels: &TableLabels) -> Self {
        let mut counts = HashMap::new();
        for column in &pivot.columns {
            let sum: u64 = pivot.rows.values().map(|r| r.count(column)).sum();
            counts.insert(column.clone(), sum);
        }
        let total = match (
            pivot.rows.get(&labels.secured_total),
            pivot.rows.get(&labels.unsecured_total),
        ) {
            (Some(secured), Some(unsecured)) => secured.total + unsecured.total,
            _ => pivot.rows.values().map(PivotRow::total).sum(),
        };
        Self {
            labels: labels.clone(),
            pivot,
            summary: PivotRow { counts, total },
        }
    }

    /// Keep the outcome columns listed in `outcome_order`, in that order.
    /// Row totals are untouched; the summary row is derived again.
    pub fn format(&self, outcome_order: &[String]) -> CrossTab {
        let columns: Vec<String> = outcome_order
            .iter()
            .filter(|c| self.pivot.columns.contains(c))
            .cloned()
            .collect();
        let mut pivot = self.pivot.clone();
        for row in pivot.rows.values_mut() {
            row.retain_outcomes(&columns);
        }
        pivot.columns = columns;
        CrossTab::derive(pivot, &self.labels)
    }

    /// Cell-wise sum over the union of rows and columns, summary derived
    /// afresh. `None` when `tables` is empty.
    pub fn combine(tables: &[CrossTab]) -> Option<CrossTab> {
        let first = tables.first()?;
        let mut pivot = Pivot::new();
        for table in tables {
            pivot.merge(&table.pivot);
        }
        Some(CrossTab::derive(pivot, &first.labels))
    }

    /// Outcome columns followed by the total column.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.pivot.columns.clone();
        headers.push(self.labels.total_column.clone());
        headers
    }

    /// Row keys with values aligned to [`CrossTab::headers`], summary first.
    pub fn rows(&self) -> Vec<(String, Vec<u64>)> {
        let values = |row: &PivotRow| {
            let mut v: Vec<u64> = self.pivot.columns.iter().map(|c| row.count(c)).collect();
            v.push(row.total);
            v
        };
        std::iter::once((self.labels.total_row.clone(), values(&self.summary)))
            .chain(self.pivot.rows.iter().map(|(k, r)| (k.clone(), values(r))))
            .collect()
    }

    #[cfg(test)]
    pub fn value(&self, row: &str, column: &str) -> Option<u64> {
        let rows = self.rows();
        let headers = self.headers();
        let col = headers.iter().position(|h| h == column)?;
        rows.into_iter().find(|(k, _)| k == row).map(|(_, v)| v[col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> TableLabels {
        TableLabels::default()
    }

    fn pivot(entries: &[(&str, &str, u64)]) -> Pivot {
        let mut p = Pivot::new();
        for (category, outcome, n) in entries {
            for _ in 0..*n {
                p.record(category, outcome);
            }
        }
        p
    }

    fn keys(table: &CrossTab) -> Vec<String> {
        table.rows().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn summary_uses_secured_plus_unsecured_total() {
        let p = pivot(&[
            ("ипотека", "Не дозвон", 2),
            ("Овердрафт", "Дал обещание", 1),
            ("Всего залоговые", "Не дозвон", 2),
            ("Всего без залоговые", "Дал обещание", 1),
        ]);
        let t = CrossTab::derive(p, &labels());
        assert_eq!(t.value("Итого", "Итог"), Some(3));
        // Outcome columns are plain sums over all rows.
        assert_eq!(t.value("Итого", "Не дозвон"), Some(4));
        assert_eq!(t.value("Итого", "Дал обещание"), Some(2));
        assert_eq!(keys(&t)[0], "Итого");
    }

    #[test]
    fn summary_falls_back_to_plain_sum() {
        let p = pivot(&[("ипотека", "Не дозвон", 2), ("Всего залоговые", "Не дозвон", 2)]);
        let t = CrossTab::derive(p, &labels());
        assert_eq!(t.value("Итого", "Итог"), Some(4));
    }

    #[test]
    fn padded_and_ordered_rows() {
        let p = pivot(&[("b", "x", 1), ("z", "x", 1), ("a", "x", 1)]);
        let order = vec!["a".to_string(), "c".to_string(), "b".to_string()];
        let t = CrossTab::derive(p.padded(&order).ordered_by(&order), &labels());
        assert_eq!(keys(&t), vec!["Итого", "a", "c", "b", "z"]);
        assert_eq!(t.value("c", "x"), Some(0));
        assert_eq!(t.value("c", "Итог"), Some(0));
    }

    #[test]
    fn rename_keeps_position() {
        let p = pivot(&[("Залоговый", "x", 1), ("Беззалоговый", "x", 2)])
            .rename_row("Залоговый", "Всего залоговые");
        let names: Vec<&str> = p.categories().collect();
        assert_eq!(names, vec!["Всего залоговые", "Беззалоговый"]);
        assert_eq!(p.row("Всего залоговые").unwrap().total(), 1);
    }

    #[test]
    fn format_orders_and_drops_columns_but_keeps_totals() {
        let p = pivot(&[("a", "Не дозвон", 1), ("a", "Дал обещание", 2), ("a", "Прочее", 4)]);
        let order = vec![
            "Дал обещание".to_string(),
            "Не звонили".to_string(),
            "Не дозвон".to_string(),
        ];
        let t = CrossTab::derive(p, &labels()).format(&order);
        assert_eq!(t.headers(), vec!["Дал обещание", "Не дозвон", "Итог"]);
        assert_eq!(t.value("a", "Итог"), Some(7));
        assert_eq!(t.value("a", "Прочее"), None);
        assert_eq!(t.format(&order), t);
    }

    #[test]
    fn combine_sums_union_and_rederives_summary() {
        let t1 = CrossTab::derive(
            pivot(&[
                ("ипотека", "Не дозвон", 1),
                ("Всего залоговые", "Не дозвон", 1),
                ("Всего без залоговые", "Не дозвон", 0),
            ]),
            &labels(),
        );
        let t2 = CrossTab::derive(
            pivot(&[
                ("ипотека", "Дал обещание", 2),
                ("Овердрафт", "Не дозвон", 3),
                ("Всего залоговые", "Дал обещание", 2),
                ("Всего без залоговые", "Не дозвон", 3),
            ]),
            &labels(),
        );
        let both = CrossTab::combine(&[t1.clone(), t2.clone()]).unwrap();

        // Category cells are cell-wise sums (missing = 0).
        for (category, values) in both.rows().into_iter().skip(1) {
            for (i, header) in both.headers().iter().enumerate() {
                let expected = t1.value(&category, header).unwrap_or(0)
                    + t2.value(&category, header).unwrap_or(0);
                assert_eq!(values[i], expected, "{category}/{header}");
            }
        }
        // The summary total is re-derived: secured (3) + unsecured (3).
        assert_eq!(both.value("Итого", "Итог"), Some(6));
        // t1 has no unsecured row, so its own summary fell back to a plain
        // sum; adding the two summaries would give 2 + 5 = 7.
        assert_ne!(
            both.value("Итого", "Итог"),
            Some(t1.value("Итого", "Итог").unwrap() + t2.value("Итого", "Итог").unwrap())
        );
        assert_eq!(
            keys(&both),
            vec!["Итого", "ипотека", "Всего залоговые", "Овердрафт", "Всего без залоговые"]
        );
    }

    #[test]
    fn combine_of_nothing_is_none() {
        assert!(CrossTab::combine(&[]).is_none());
    }
}
