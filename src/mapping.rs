//! Column detection for ledgers with arbitrary headers.
//!
//! An external mapper (typically a language model) may hand over a
//! [`ColumnMapping`]; whatever it returns is resolved through a fixed chain
//! so the normalizer always receives something usable:
//!
//! 1. the provided mapping, when it is confident and carries an amount signal
//! 2. header keyword matching ([`KeywordColumnMapper`])
//! 3. positional defaults over the remaining columns

use crate::schema::{CanonicalField, ColumnMapping, MappingConfidence};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Capability of turning raw header names into a canonical mapping.
pub trait ColumnMapper {
    fn map_columns(&self, raw_columns: &[String]) -> ColumnMapping;
}

const DATE_KEYWORDS: &[&str] = &["date", "time", "period", "month", "day", "year", "timestamp"];
const INCOME_KEYWORDS: &[&str] = &["income", "revenue", "sales", "earning", "receivable", "credit"];
const EXPENSE_KEYWORDS: &[&str] = &["expense", "cost", "spending", "payment", "payable", "debit"];
const AMOUNT_KEYWORDS: &[&str] = &["amount", "value", "total", "sum", "balance"];
const CATEGORY_KEYWORDS: &[&str] = &["category", "type", "class", "group", "account"];
const DESCRIPTION_KEYWORDS: &[&str] = &["description", "detail", "note", "memo", "particular"];

/// Pattern-matching mapper used whenever no confident external mapping exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordColumnMapper;

impl KeywordColumnMapper {
    fn keywords(field: CanonicalField) -> &'static [&'static str] {
        match field {
            CanonicalField::Date => DATE_KEYWORDS,
            CanonicalField::Income => INCOME_KEYWORDS,
            CanonicalField::Expense => EXPENSE_KEYWORDS,
            CanonicalField::Amount => AMOUNT_KEYWORDS,
            CanonicalField::Category => CATEGORY_KEYWORDS,
            CanonicalField::Description => DESCRIPTION_KEYWORDS,
        }
    }
}

impl ColumnMapper for KeywordColumnMapper {
    fn map_columns(&self, raw_columns: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        let mut taken: Vec<&str> = Vec::new();

        for field in CanonicalField::ALL {
            let keywords = Self::keywords(field);
            let found = raw_columns.iter().find(|col| {
                let lower = col.to_lowercase();
                !taken.contains(&col.as_str()) && keywords.iter().any(|k| lower.contains(k))
            });
            if let Some(col) = found {
                taken.push(col.as_str());
                mapping.set(field, Some(col.clone()));
            }
        }

        // A matched income/expense pair carries the flows; a generic
        // "balance" or "total" column next to it is a running figure.
        if mapping.income.is_some() && mapping.expense.is_some() {
            if let Some(col) = mapping.amount.take() {
                debug!("Ignoring '{}' as amount: income and expense columns present", col);
            }
        }

        mapping.confidence = if mapping.has_amount_signal() {
            MappingConfidence::Medium
        } else if mapping.date.is_some() || mapping.category.is_some() {
            MappingConfidence::Low
        } else {
            MappingConfidence::None
        };

        mapping
    }
}

/// Where the final mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MappingSource {
    Provided,
    Keyword,
    Positional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedMapping {
    pub mapping: ColumnMapping,
    pub source: MappingSource,
}

impl ResolvedMapping {
    /// Heuristic mappings cannot be trusted for sign, so category keywords decide it.
    pub fn uses_category_sign(&self) -> bool {
        self.source != MappingSource::Provided
    }
}

/// Fields a confident external mapping may have left empty and that keyword
/// matching is allowed to fill. Amount fields are excluded so a split
/// income/expense mapping is never overridden by a generic "total" column.
const GAP_FILL_FIELDS: [CanonicalField; 3] = [
    CanonicalField::Date,
    CanonicalField::Category,
    CanonicalField::Description,
];

pub fn resolve_mapping(provided: Option<&ColumnMapping>, columns: &[String]) -> ResolvedMapping {
    let keyword = KeywordColumnMapper.map_columns(columns);

    if let Some(provided) = provided {
        let mut cleaned = provided.clone();
        for field in CanonicalField::ALL {
            if let Some(col) = cleaned.get(field).map(str::to_string) {
                if !columns.iter().any(|c| *c == col) {
                    warn!(
                        "Mapped column '{}' for {:?} does not exist in the ledger; ignoring it",
                        col, field
                    );
                    cleaned.set(field, None);
                }
            }
        }

        if cleaned.confidence != MappingConfidence::None && cleaned.has_amount_signal() {
            for field in GAP_FILL_FIELDS {
                if cleaned.get(field).is_some() {
                    continue;
                }
                if let Some(col) = keyword.get(field) {
                    if !cleaned.mapped_columns().contains(&col) {
                        debug!("Filling unmapped {:?} with keyword match '{}'", field, col);
                        cleaned.set(field, Some(col.to_string()));
                    }
                }
            }
            return ResolvedMapping {
                mapping: cleaned,
                source: MappingSource::Provided,
            };
        }

        debug!(
            "Provided mapping unusable (confidence {:?}, amount signal {}); falling back",
            cleaned.confidence,
            cleaned.has_amount_signal()
        );
    }

    if keyword.has_amount_signal() {
        debug!("Using keyword column mapping: {:?}", keyword);
        return ResolvedMapping {
            mapping: keyword,
            source: MappingSource::Keyword,
        };
    }

    let mut positional = keyword;
    {
        let next_free = |mapping: &ColumnMapping| -> Option<String> {
            let used = mapping.mapped_columns();
            columns
                .iter()
                .find(|c| !used.contains(&c.as_str()))
                .cloned()
        };

        if positional.date.is_none() && columns.len() >= 2 {
            positional.date = next_free(&positional);
        }
        positional.amount = next_free(&positional);
        if positional.category.is_none() {
            positional.category = next_free(&positional);
        }
    }
    positional.confidence = MappingConfidence::Low;

    debug!("Using positional column mapping: {:?}", positional);
    ResolvedMapping {
        mapping: positional,
        source: MappingSource::Positional,
    }
}
