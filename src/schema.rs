use crate::error::{AnalysisError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw cell as it arrived from the upload boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from(value.as_str())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

pub type RawRow = BTreeMap<String, CellValue>;

/// The raw ledger: header order plus one map per data row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }

    /// Builds a table from a header row and positional string records, the
    /// shape a CSV reader yields. Short records leave the trailing cells empty.
    pub fn from_records<H, R, C>(headers: H, records: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let columns: Vec<String> = headers
            .into_iter()
            .map(|h| h.into().trim().to_string())
            .collect();

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row: RawRow = columns
                    .iter()
                    .map(|c| (c.clone(), CellValue::Empty))
                    .collect();
                for (column, cell) in columns.iter().zip(record) {
                    row.insert(column.clone(), CellValue::from(cell.into()));
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// Builds a table from keyed rows, collecting columns in first-seen order.
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Income,
    Expense,
    Amount,
    Category,
    Description,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Date,
        CanonicalField::Income,
        CanonicalField::Expense,
        CanonicalField::Amount,
        CanonicalField::Category,
        CanonicalField::Description,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum MappingConfidence {
    High,
    Medium,
    Low,
    #[default]
    None,
}

/// Which source column holds each canonical field.
///
/// This is the contract an external column mapper (a language model or a
/// pattern matcher) has to fill in. Aliases accept the `*_column` naming used
/// by structured-output prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ColumnMapping {
    #[serde(alias = "date_column")]
    #[schemars(description = "Column holding the transaction date, or null if no column contains dates")]
    pub date: Option<String>,

    #[serde(alias = "income_column")]
    #[schemars(description = "Column holding income/revenue magnitudes (positive amounts), or null")]
    pub income: Option<String>,

    #[serde(alias = "expense_column")]
    #[schemars(description = "Column holding expense/cost magnitudes (amounts spent), or null")]
    pub expense: Option<String>,

    #[serde(alias = "amount_column")]
    #[schemars(description = "Column holding a signed transaction amount when income and expense are not separated, or null")]
    pub amount: Option<String>,

    #[serde(alias = "category_column")]
    #[schemars(description = "Column holding a category/type label, or null")]
    pub category: Option<String>,

    #[serde(alias = "description_column")]
    #[schemars(description = "Column holding a free-text description or memo, or null")]
    pub description: Option<String>,

    #[schemars(description = "How sure the mapper is about this mapping: high, medium, low or none")]
    pub confidence: MappingConfidence,

    #[schemars(description = "Optional hints for structuring the data better")]
    pub suggestions: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Date => self.date.as_deref(),
            CanonicalField::Income => self.income.as_deref(),
            CanonicalField::Expense => self.expense.as_deref(),
            CanonicalField::Amount => self.amount.as_deref(),
            CanonicalField::Category => self.category.as_deref(),
            CanonicalField::Description => self.description.as_deref(),
        }
    }

    pub fn set(&mut self, field: CanonicalField, column: Option<String>) {
        let slot = match field {
            CanonicalField::Date => &mut self.date,
            CanonicalField::Income => &mut self.income,
            CanonicalField::Expense => &mut self.expense,
            CanonicalField::Amount => &mut self.amount,
            CanonicalField::Category => &mut self.category,
            CanonicalField::Description => &mut self.description,
        };
        *slot = column;
    }

    /// True when the mapping can produce a signed amount for a row.
    pub fn has_amount_signal(&self) -> bool {
        self.amount.is_some() || self.income.is_some() || self.expense.is_some()
    }

    pub fn mapped_columns(&self) -> Vec<&str> {
        CanonicalField::ALL
            .iter()
            .filter_map(|f| self.get(*f))
            .collect()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ColumnMapping)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessSize {
    Micro,
    #[default]
    Small,
    Medium,
    Large,
}

impl fmt::Display for BusinessSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BusinessSize::Micro => "micro",
            BusinessSize::Small => "small",
            BusinessSize::Medium => "medium",
            BusinessSize::Large => "large",
        };
        f.write_str(label)
    }
}

/// Relative weight of each health sub-score. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HealthWeights {
    pub cash_flow: f64,
    pub profitability: f64,
    pub trend: f64,
    pub stability: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            cash_flow: 0.35,
            profitability: 0.30,
            trend: 0.20,
            stability: 0.15,
        }
    }
}

impl HealthWeights {
    pub fn total(&self) -> f64 {
        self.cash_flow + self.profitability + self.trend + self.stability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AlertThresholds {
    /// Margins below this raise a profitability warning.
    pub margin_warning: f64,
    /// Margins above this raise an expansion opportunity.
    pub strong_margin: f64,
    /// Monthly deviations beyond this many standard deviations are anomalies.
    pub anomaly_z_score: f64,
    pub opportunity_trend_strength: f64,
    pub sustained_months: usize,
    /// Number of trailing months checked for a negative cash position.
    pub recent_window_months: usize,
    pub liquidity_ratio: f64,
    pub critical_health_score: f64,
    pub strong_cash_position: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            margin_warning: 0.10,
            strong_margin: 0.30,
            anomaly_z_score: 2.0,
            opportunity_trend_strength: 0.5,
            sustained_months: 3,
            recent_window_months: 3,
            liquidity_ratio: 1.1,
            critical_health_score: 40.0,
            strong_cash_position: 10_000.0,
        }
    }
}

pub const FORECAST_HORIZON: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fewer usable transactions than this after normalization is fatal.
    pub min_transactions: usize,
    /// First synthesized date when the ledger has no date column.
    pub synthetic_date_epoch: NaiveDate,
    pub forecast_horizon: usize,
    /// Fraction of the realistic projection added/removed per unit of trend strength.
    pub scenario_spread: f64,
    pub health_weights: HealthWeights,
    pub thresholds: AlertThresholds,
    pub income_keywords: Vec<String>,
    pub expense_keywords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_transactions: 1,
            synthetic_date_epoch: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            forecast_horizon: FORECAST_HORIZON,
            scenario_spread: 0.2,
            health_weights: HealthWeights::default(),
            thresholds: AlertThresholds::default(),
            income_keywords: ["income", "revenue", "sales", "receivable", "deposit"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            expense_keywords: ["expense", "cost", "payment", "bill", "payable", "purchase"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.forecast_horizon != FORECAST_HORIZON {
            return Err(AnalysisError::InvalidConfig(format!(
                "forecast_horizon must be {}, got {}",
                FORECAST_HORIZON, self.forecast_horizon
            )));
        }

        let w = &self.health_weights;
        let weights = [w.cash_flow, w.profitability, w.trend, w.stability];
        if weights.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "health weights must be finite and non-negative".to_string(),
            ));
        }
        if (w.total() - 1.0).abs() > 1e-6 {
            return Err(AnalysisError::InvalidConfig(format!(
                "health weights must sum to 1.0 (got {})",
                w.total()
            )));
        }

        let t = &self.thresholds;
        let numeric = [
            t.margin_warning,
            t.strong_margin,
            t.anomaly_z_score,
            t.opportunity_trend_strength,
            t.liquidity_ratio,
            t.critical_health_score,
            t.strong_cash_position,
            self.scenario_spread,
        ];
        if numeric.iter().any(|x| !x.is_finite()) {
            return Err(AnalysisError::InvalidConfig(
                "thresholds must be finite numbers".to_string(),
            ));
        }
        if t.anomaly_z_score <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "anomaly_z_score must be positive".to_string(),
            ));
        }
        if self.scenario_spread < 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "scenario_spread must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
