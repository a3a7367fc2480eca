use crate::error::{SectionError, SoftErrorKind};
use crate::schema::AnalysisConfig;
use crate::trend::TrendMetrics;
use crate::utils::{round_to, MonthKey};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const FORECAST_ASSUMPTIONS: [&str; 3] = [
    "Based on historical trend patterns",
    "Assumes no major business changes",
    "External factors not considered",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }

    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared >= 0.7 {
            ConfidenceLevel::High
        } else if r_squared >= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Three projected monthly net cash-flow paths, each `FORECAST_HORIZON` long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioAnalysis {
    pub optimistic: Vec<f64>,
    pub realistic: Vec<f64>,
    pub pessimistic: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Forecast {
    /// `YYYY-MM` labels of the projected months, in order.
    pub periods: Vec<String>,
    pub scenario_analysis: ScenarioAnalysis,
    pub confidence_level: ConfidenceLevel,
    pub r_squared: f64,
    pub assumptions: Vec<String>,
}

/// Projects the fitted monthly trend over the configured horizon, starting
/// the month after `last_month`.
///
/// The optimistic and pessimistic paths move away from the realistic one by
/// `|realistic| * trend_strength * scenario_spread`, which keeps the three
/// paths ordered even when the projection is negative.
pub fn build_forecast(
    trend: &TrendMetrics,
    last_month: MonthKey,
    config: &AnalysisConfig,
) -> std::result::Result<Forecast, SectionError> {
    let active_months = trend
        .monthly_data
        .iter()
        .filter(|m| m.transaction_count > 0)
        .count();
    if active_months < 2 {
        warn!("Forecast skipped: only {} month(s) of history", active_months);
        return Err(SectionError::new(
            SoftErrorKind::ForecastUnavailable,
            "Insufficient history: at least 2 months of transactions are needed for a forecast",
        ));
    }

    let n = trend.months_observed;
    let spread = trend.trend_strength.max(0.0) * config.scenario_spread;

    let mut periods = Vec::with_capacity(config.forecast_horizon);
    let mut realistic = Vec::with_capacity(config.forecast_horizon);
    let mut optimistic = Vec::with_capacity(config.forecast_horizon);
    let mut pessimistic = Vec::with_capacity(config.forecast_horizon);

    let mut month = last_month;
    for step in 0..config.forecast_horizon {
        month = month.next();
        let value = trend.slope * (n + step) as f64 + trend.intercept;
        let delta = value.abs() * spread;

        periods.push(month.label());
        realistic.push(round_to(value, 2));
        optimistic.push(round_to(value + delta, 2));
        pessimistic.push(round_to(value - delta, 2));
    }

    let confidence_level = ConfidenceLevel::from_r_squared(trend.r_squared);
    debug!(
        "Forecast {} -> {}: confidence {:?}",
        periods.first().map(String::as_str).unwrap_or(""),
        periods.last().map(String::as_str).unwrap_or(""),
        confidence_level
    );

    Ok(Forecast {
        periods,
        scenario_analysis: ScenarioAnalysis {
            optimistic,
            realistic,
            pessimistic,
        },
        confidence_level,
        r_squared: trend.r_squared,
        assumptions: FORECAST_ASSUMPTIONS.iter().map(|s| s.to_string()).collect(),
    })
}
