use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ReportError;
use crate::types::Column;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Vocabulary of a report run. Every field defaults to the collections
/// report layout, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub columns: ColumnNames,
    pub classification: ClassificationConfig,
    pub labels: TableLabels,
    /// Outcome columns in display order; the total column always follows.
    pub outcome_order: Vec<String>,
    /// Outcomes whose headers are highlighted red.
    pub negative_outcomes: Vec<String>,
    pub layout: LayoutConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            classification: ClassificationConfig::default(),
            labels: TableLabels::default(),
            outcome_order: strings(&[
                "Дал обещание",
                "Не звонили",
                "Дал номер клиента",
                "Клиент заграницей",
                "Обещал связаться с клиентом",
                "Связался с клиентом и сообщил",
                "Частично оплатил",
                "Не дозвон",
                "Бросил трубку",
                "Другой номер",
                "Не знаком с клиентом",
                "Дело в суде",
                "Клиент умер",
                "Отказывается от оплаты",
                "Отказывается от разговора",
            ]),
            negative_outcomes: strings(&[
                "Не дозвон",
                "Бросил трубку",
                "Другой номер",
                "Не знаком с клиентом",
                "Дело в суде",
                "Клиент умер",
                "Отказывается от оплаты",
                "Отказывается от разговора",
            ]),
            layout: LayoutConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReportError> {
        let config: ReportConfig =
            toml::from_str(input).map_err(|e| ReportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.outcome_order.is_empty() {
            return Err(ReportError::Config("outcome_order is empty".into()));
        }
        if self.layout.buckets.is_empty() {
            return Err(ReportError::Config("layout.buckets is empty".into()));
        }
        let labels = &self.labels;
        let reserved = [
            &labels.total_row,
            &labels.secured_total,
            &labels.unsecured_total,
        ];
        let distinct: BTreeSet<&String> = reserved.iter().copied().collect();
        if distinct.len() != reserved.len() {
            return Err(ReportError::Config(
                "labels.total_row, secured_total and unsecured_total must differ".into(),
            ));
        }
        if self.outcome_order.contains(&labels.total_column) {
            return Err(ReportError::Config(format!(
                "outcome_order must not contain the total column '{}'",
                labels.total_column
            )));
        }
        for template in [&self.layout.target_header, &self.layout.overall_header] {
            if !template.contains(DATE_PLACEHOLDER) {
                return Err(ReportError::Config(format!(
                    "layout header '{template}' has no {DATE_PLACEHOLDER} placeholder"
                )));
            }
        }
        let shared = self
            .classification
            .secured
            .intersection(&self.classification.unsecured)
            .next();
        if let Some(label) = shared {
            return Err(ReportError::Config(format!(
                "loan type '{label}' is listed as both secured and unsecured"
            )));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Ledger columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub loan_type: String,
    pub outcome: String,
    pub division: String,
    pub product_kind: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            loan_type: "ТИП кредита".into(),
            outcome: "Результат".into(),
            division: "Деления".into(),
            product_kind: "Вид продукта".into(),
        }
    }
}

impl ColumnNames {
    pub fn header(&self, column: Column) -> &str {
        match column {
            Column::LoanType => &self.loan_type,
            Column::Outcome => &self.outcome,
            Column::Division => &self.division,
            Column::ProductKind => &self.product_kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Static membership lists deciding a loan type's product kind.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassificationConfig {
    pub secured: BTreeSet<String>,
    pub unsecured: BTreeSet<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            secured: [
                "автокредиты",
                "автомикрозаймы физическим лицам",
                "cashloan",
                "Бизнес авто",
                "Бизнес ипотека",
                "ипотека",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            unsecured: ["микрозаймы физическим лицам", "карта рассрочка", "Овердрафт"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Table labels
// ---------------------------------------------------------------------------

/// Reserved row and column keys of summary tables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableLabels {
    pub total_row: String,
    pub total_column: String,
    pub overall: String,
    pub secured_total: String,
    pub unsecured_total: String,
}

impl Default for TableLabels {
    fn default() -> Self {
        Self {
            total_row: "Итого".into(),
            total_column: "Итог".into(),
            overall: "Общий итог".into(),
            secured_total: "Всего залоговые".into(),
            unsecured_total: "Всего без залоговые".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Template layout
// ---------------------------------------------------------------------------

pub const DATE_PLACEHOLDER: &str = "{date}";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Labels of the merged bucket headers, in output order.
    pub buckets: Vec<String>,
    pub target_header: String,
    pub sub_metric: String,
    pub overall_header: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            buckets: strings(&["30-", "30+", "60+", "90+", "180+", "365+"]),
            target_header: "Просроченная задолженность на {date}".into(),
            sub_metric: "% ОД к просроченному портфелю".into(),
            overall_header: "Кол-во просроченных анкет на {date}".into(),
        }
    }
}

impl LayoutConfig {
    pub fn target_header_for(&self, date: &str) -> String {
        self.target_header.replace(DATE_PLACEHOLDER, date)
    }

    pub fn overall_header_for(&self, date: &str) -> String {
        self.overall_header.replace(DATE_PLACEHOLDER, date)
    }
}
