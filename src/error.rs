use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {usable} usable transaction(s) after normalization, at least {required} required")]
    InsufficientData { usable: usize, required: usize },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    ExportError(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Stable, serializable name of a fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    InsufficientDataError,
    UnsupportedInputError,
    InvalidConfigError,
    ExportError,
}

/// The structured payload handed to callers when an analysis fails outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    pub error: bool,
    pub message: String,
    pub error_type: ErrorKind,
    pub suggestions: Vec<String>,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InsufficientData { .. } => ErrorKind::InsufficientDataError,
            AnalysisError::UnsupportedInput(_) => ErrorKind::UnsupportedInputError,
            AnalysisError::InvalidConfig(_) => ErrorKind::InvalidConfigError,
            AnalysisError::SerializationError(_) | AnalysisError::ExportError(_) => {
                ErrorKind::ExportError
            }
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let suggestions: &[&str] = match self.kind() {
            ErrorKind::InsufficientDataError => &[
                "Make sure each row has a date or an amount that can be read as a number",
                "Remove summary or header rows embedded in the middle of the ledger",
                "Supported: dates, amounts, income, expenses, categories",
            ],
            ErrorKind::UnsupportedInputError => &[
                "The ledger must contain a header row and at least one data row",
                "Any column names will work: date/amount/category, Date/Income/Expenses, Time/Revenue/Cost",
                "Check the file format (CSV or Excel) before uploading",
            ],
            ErrorKind::InvalidConfigError => &[
                "Health weights must be non-negative and sum to 1.0",
                "Thresholds must be finite numbers",
            ],
            ErrorKind::ExportError => &["Retry the export; the analysis itself succeeded"],
        };

        ErrorPayload {
            error: true,
            message: format!("Analysis failed: {}", self),
            error_type: self.kind(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Kinds of failure that only degrade one report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SoftErrorKind {
    ForecastUnavailable,
    BenchmarkUnavailable,
    BreakEvenUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionError {
    pub error: bool,
    pub kind: SoftErrorKind,
    pub message: String,
}

impl SectionError {
    pub fn new(kind: SoftErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: true,
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_for_insufficient_data() {
        let err = AnalysisError::InsufficientData {
            usable: 0,
            required: 1,
        };
        let payload = err.to_payload();
        assert!(payload.error);
        assert_eq!(payload.error_type, ErrorKind::InsufficientDataError);
        assert!(payload.message.contains("0 usable"));
        assert!(!payload.suggestions.is_empty());
    }

    #[test]
    fn test_payload_serializes_with_error_flag() {
        let payload = AnalysisError::UnsupportedInput("no columns".to_string()).to_payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["error"], true);
        assert_eq!(json["error_type"], "UnsupportedInputError");
    }

    #[test]
    fn test_section_error_constructor() {
        let err = SectionError::new(SoftErrorKind::ForecastUnavailable, "Insufficient history");
        assert!(err.error);
        assert_eq!(err.kind, SoftErrorKind::ForecastUnavailable);
    }
}
