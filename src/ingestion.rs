use crate::error::{AnalysisError, Result};
use crate::mapping::{resolve_mapping, ResolvedMapping};
use crate::schema::{AnalysisConfig, CellValue, ColumnMapping, RawRow, RawTable};
use crate::utils::{parse_amount, parse_date, round_to};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One ledger entry after normalization. Positive amounts are income,
/// negative amounts are expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
}

impl Transaction {
    pub fn new(date: NaiveDate, amount: f64, category: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            category: category.into(),
            description: None,
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.amount.total_cmp(&other.amount))
            .then_with(|| self.category.cmp(&other.category))
            .then_with(|| self.description.cmp(&other.description))
    }
}

/// A non-empty, chronologically ordered run of transactions.
///
/// Ties on the same date are broken by amount, category and description so
/// that every aggregate is computed in the same order regardless of how the
/// source rows were arranged. Deserialization goes through [`TransactionSet::new`],
/// so an empty or unordered list is rejected or re-sorted there too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionList")]
pub struct TransactionSet {
    transactions: Vec<Transaction>,
}

#[derive(Deserialize)]
struct TransactionList {
    transactions: Vec<Transaction>,
}

impl TryFrom<TransactionList> for TransactionSet {
    type Error = AnalysisError;

    fn try_from(list: TransactionList) -> Result<Self> {
        Self::new(list.transactions)
    }
}

impl TransactionSet {
    pub fn new(mut transactions: Vec<Transaction>) -> Result<Self> {
        if transactions.is_empty() {
            return Err(AnalysisError::InsufficientData {
                usable: 0,
                required: 1,
            });
        }
        if transactions.iter().any(|t| !t.amount.is_finite()) {
            return Err(AnalysisError::UnsupportedInput(
                "transaction amounts must be finite".to_string(),
            ));
        }
        transactions.sort_by(Transaction::canonical_cmp);
        Ok(Self { transactions })
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Every constructor rejects an empty list, so this is false for any
    /// set that exists.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    // Indexing relies on the non-empty check in `new`.
    pub fn first_date(&self) -> NaiveDate {
        self.transactions[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.transactions[self.transactions.len() - 1].date
    }
}

impl<'a> IntoIterator for &'a TransactionSet {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_months: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataQuality {
    pub rows_received: usize,
    pub rows_processed: usize,
    pub rows_dropped: usize,
    pub malformed_cell_count: usize,
    /// Percentage of considered cells parsed without a fallback substitution.
    pub completeness_score: f64,
    pub columns_found: Vec<String>,
    pub date_range: DateRange,
    pub synthetic_dates: bool,
    pub mapping: ResolvedMapping,
}

#[derive(Debug, Clone)]
pub struct NormalizedLedger {
    pub transactions: TransactionSet,
    pub data_quality: DataQuality,
}

// Per-row result before dates are resolved.
struct PendingRow {
    date: Option<NaiveDate>,
    amount: f64,
    category: String,
    description: Option<String>,
}

#[derive(Default)]
struct CellTally {
    considered: usize,
    malformed: usize,
}

enum ParsedCell {
    Value(f64),
    Missing,
    Malformed,
}

fn parse_numeric_cell(cell: &CellValue) -> ParsedCell {
    match cell {
        CellValue::Empty => ParsedCell::Missing,
        CellValue::Number(n) if n.is_finite() => ParsedCell::Value(*n),
        CellValue::Number(_) => ParsedCell::Malformed,
        CellValue::Text(s) if s.trim().is_empty() => ParsedCell::Missing,
        CellValue::Text(s) => match parse_amount(s) {
            Some(v) => ParsedCell::Value(v),
            None => ParsedCell::Malformed,
        },
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

fn cell<'a>(row: &'a RawRow, column: Option<&str>) -> Option<&'a CellValue> {
    column.map(|c| row.get(c).unwrap_or(&EMPTY_CELL))
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

/// Coerces a raw table plus a (possibly partial) column mapping into a
/// canonical transaction set, pushing every fallback decision into this
/// single step.
pub fn normalize(
    table: &RawTable,
    mapping: Option<&ColumnMapping>,
    config: &AnalysisConfig,
) -> Result<NormalizedLedger> {
    if table.columns.is_empty() {
        return Err(AnalysisError::UnsupportedInput(
            "the ledger has no columns".to_string(),
        ));
    }
    if table.rows.is_empty() {
        return Err(AnalysisError::UnsupportedInput(
            "the ledger has no data rows".to_string(),
        ));
    }

    let resolved = resolve_mapping(mapping, &table.columns);
    let m = &resolved.mapping;
    if !m.has_amount_signal() {
        return Err(AnalysisError::UnsupportedInput(
            "no column could be read as a transaction amount".to_string(),
        ));
    }
    info!(
        "Normalizing {} rows using {:?} mapping (confidence {:?})",
        table.rows.len(),
        resolved.source,
        m.confidence
    );

    let category_sign = resolved.uses_category_sign();
    let mut tally = CellTally::default();
    let mut pending: Vec<PendingRow> = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let date = match cell(row, m.date.as_deref()) {
            Some(c) => {
                tally.considered += 1;
                let parsed = c.as_text().and_then(|s| parse_date(&s));
                if parsed.is_none() {
                    tally.malformed += 1;
                }
                parsed
            }
            None => None,
        };

        let category = cell(row, m.category.as_deref())
            .and_then(CellValue::as_text)
            .unwrap_or_default();

        let (amount, has_signal) = if let Some(c) = cell(row, m.amount.as_deref()) {
            tally.considered += 1;
            match parse_numeric_cell(c) {
                ParsedCell::Value(v) => {
                    let lower = category.to_lowercase();
                    let signed = if category_sign && matches_any(&lower, &config.income_keywords) {
                        v.abs()
                    } else if category_sign && matches_any(&lower, &config.expense_keywords) {
                        -v.abs()
                    } else {
                        v
                    };
                    (signed, true)
                }
                ParsedCell::Missing | ParsedCell::Malformed => {
                    tally.malformed += 1;
                    (0.0, false)
                }
            }
        } else {
            let mut signal = false;
            let mut any_present = false;
            let mut side = |column: Option<&str>| -> f64 {
                match cell(row, column) {
                    Some(c) => {
                        tally.considered += 1;
                        match parse_numeric_cell(c) {
                            ParsedCell::Value(v) => {
                                signal = true;
                                any_present = true;
                                v.abs()
                            }
                            ParsedCell::Malformed => {
                                any_present = true;
                                tally.malformed += 1;
                                0.0
                            }
                            ParsedCell::Missing => 0.0,
                        }
                    }
                    None => 0.0,
                }
            };
            let income = side(m.income.as_deref());
            let expense = side(m.expense.as_deref());
            if !any_present {
                // Both sides blank: the row carries no amount at all.
                tally.malformed += 1;
            }
            (income - expense, signal)
        };

        if date.is_none() && !has_signal {
            continue;
        }

        let description = cell(row, m.description.as_deref()).and_then(CellValue::as_text);

        pending.push(PendingRow {
            date,
            amount,
            category,
            description,
        });
    }

    let rows_received = table.rows.len();
    let rows_dropped = rows_received - pending.len();
    if rows_dropped > 0 {
        warn!(
            "Dropped {} of {} rows with neither a readable date nor an amount",
            rows_dropped, rows_received
        );
    }

    let required = config.min_transactions.max(1);
    if pending.len() < required {
        return Err(AnalysisError::InsufficientData {
            usable: pending.len(),
            required,
        });
    }

    let synthetic_dates = !pending.iter().any(|p| p.date.is_some());
    let dates = if synthetic_dates {
        if m.date.is_some() {
            warn!("No value in the date column could be parsed; synthesizing sequential dates");
        }
        synthesize_dates(config.synthetic_date_epoch, pending.len())
    } else {
        fill_missing_dates(pending.iter().map(|p| p.date).collect())
    };

    let transactions: Vec<Transaction> = pending
        .into_iter()
        .zip(dates)
        .map(|(row, date)| Transaction {
            date,
            amount: row.amount,
            category: row.category,
            description: row.description,
        })
        .collect();

    let transactions = TransactionSet::new(transactions)?;

    let completeness_score = if tally.considered == 0 {
        100.0
    } else {
        let ratio = 1.0 - tally.malformed as f64 / tally.considered as f64;
        round_to((100.0 * ratio).clamp(0.0, 100.0), 2)
    };

    let start_date = transactions.first_date();
    let end_date = transactions.last_date();
    let date_range = DateRange {
        start_date,
        end_date,
        period_months: round_to((end_date - start_date).num_days() as f64 / 30.0, 2),
    };

    debug!(
        "Normalized {} transactions ({} malformed of {} cells)",
        transactions.len(),
        tally.malformed,
        tally.considered
    );

    Ok(NormalizedLedger {
        data_quality: DataQuality {
            rows_received,
            rows_processed: transactions.len(),
            rows_dropped,
            malformed_cell_count: tally.malformed,
            completeness_score,
            columns_found: table.columns.clone(),
            date_range,
            synthetic_dates,
            mapping: resolved.clone(),
        },
        transactions,
    })
}

fn synthesize_dates(epoch: NaiveDate, count: usize) -> Vec<NaiveDate> {
    (0..count)
        .map(|i| epoch.checked_add_days(Days::new(i as u64)).unwrap_or(epoch))
        .collect()
}

/// Rows whose date could not be read inherit the previous row's date; leading
/// gaps take the first readable date. Requires at least one `Some`.
fn fill_missing_dates(dates: Vec<Option<NaiveDate>>) -> Vec<NaiveDate> {
    let first_known = dates.iter().flatten().next().copied();
    let mut last = first_known;
    dates
        .into_iter()
        .map(|d| {
            if d.is_some() {
                last = d;
            }
            last.or(first_known).unwrap_or_default()
        })
        .collect()
}
