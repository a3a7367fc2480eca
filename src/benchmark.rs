//! Comparison of computed ratios against a caller-supplied industry table.

use crate::error::{SectionError, SoftErrorKind};
use crate::health::HealthScore;
use crate::metrics::{CashFlowMetrics, ProfitabilityMetrics};
use crate::utils::round_to;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Steepness of the deviation-to-percentile curve. A value 25% above its
/// benchmark lands around the 73rd percentile.
const PERCENTILE_STEEPNESS: f64 = 4.0;

/// Metrics where a smaller value is the better outcome.
const LOWER_IS_BETTER: &[&str] = &["expense_ratio"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkEntry {
    pub industry_benchmark: f64,
}

/// Industry name -> metric name -> benchmark value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct BenchmarkTable {
    industries: BTreeMap<String, BTreeMap<String, BenchmarkEntry>>,
}

impl BenchmarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, industry: &str, metric: &str, industry_benchmark: f64) {
        self.industries
            .entry(industry.trim().to_lowercase())
            .or_default()
            .insert(metric.to_string(), BenchmarkEntry { industry_benchmark });
    }

    pub fn with(mut self, industry: &str, metric: &str, industry_benchmark: f64) -> Self {
        self.insert(industry, metric, industry_benchmark);
        self
    }

    /// Benchmarks for one industry; lookup ignores case and surrounding space.
    pub fn industry(&self, industry: &str) -> Option<&BTreeMap<String, BenchmarkEntry>> {
        let key = industry.trim().to_lowercase();
        self.industries
            .get(&key)
            .or_else(|| {
                self.industries
                    .iter()
                    .find(|(k, _)| k.to_lowercase() == key)
                    .map(|(_, v)| v)
            })
    }

    pub fn industries(&self) -> impl Iterator<Item = &str> {
        self.industries.keys().map(String::as_str)
    }

    /// Small static table of typical ratios for a handful of industries.
    /// Callers may pass it to the analyzer when they have nothing better.
    pub fn reference() -> Self {
        let rows: [(&str, f64, f64, f64); 6] = [
            ("retail", 0.05, 1.15, 0.85),
            ("services", 0.15, 1.25, 0.75),
            ("manufacturing", 0.08, 1.20, 0.80),
            ("technology", 0.25, 1.40, 0.65),
            ("consulting", 0.20, 1.30, 0.70),
            ("default", 0.10, 1.20, 0.80),
        ];

        rows.iter()
            .fold(Self::new(), |table, (industry, margin, cash_ratio, expense)| {
                table
                    .with(industry, "profit_margin", *margin)
                    .with(industry, "cash_flow_ratio", *cash_ratio)
                    .with(industry, "expense_ratio", *expense)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricComparison {
    pub your_performance: f64,
    pub industry_benchmark: f64,
    pub difference: f64,
    pub relative_deviation: f64,
    pub performance: Performance,
    #[schemars(description = "Estimated percentile within the industry, 0-100")]
    pub percentile: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkComparison {
    pub industry: String,
    pub metrics: BTreeMap<String, MetricComparison>,
}

impl BenchmarkComparison {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Values the comparator knows how to match against a benchmark table.
/// `cash_flow_ratio` is absent when there were no expenses.
pub fn comparable_metrics(
    cash_flow: &CashFlowMetrics,
    profitability: &ProfitabilityMetrics,
    health: &HealthScore,
) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();
    values.insert("profit_margin".to_string(), profitability.gross_profit_margin);
    values.insert("gross_profit_margin".to_string(), profitability.gross_profit_margin);
    values.insert("expense_ratio".to_string(), cash_flow.expense_ratio);
    values.insert(
        "profit_per_transaction".to_string(),
        profitability.profit_per_transaction,
    );
    values.insert("monthly_average".to_string(), cash_flow.monthly_average);
    values.insert("health_score".to_string(), health.score);
    if let Some(ratio) = cash_flow.cash_flow_ratio {
        values.insert("cash_flow_ratio".to_string(), ratio);
    }
    values
}

pub fn relative_deviation(value: f64, benchmark: f64) -> f64 {
    if benchmark == 0.0 {
        value - benchmark
    } else {
        (value - benchmark) / benchmark.abs()
    }
}

/// Logistic map from relative deviation to a 0-100 percentile.
pub fn estimate_percentile(deviation: f64) -> f64 {
    let p = 100.0 / (1.0 + (-PERCENTILE_STEEPNESS * deviation).exp());
    round_to(p.clamp(0.0, 100.0), 1)
}

pub fn compare_metric(metric: &str, value: f64, benchmark: f64) -> MetricComparison {
    let deviation = relative_deviation(value, benchmark);
    let oriented = if LOWER_IS_BETTER.contains(&metric) {
        -deviation
    } else {
        deviation
    };

    MetricComparison {
        your_performance: value,
        industry_benchmark: benchmark,
        difference: value - benchmark,
        relative_deviation: deviation,
        performance: if value >= benchmark {
            Performance::Above
        } else {
            Performance::Below
        },
        percentile: estimate_percentile(oriented),
    }
}

/// Compares every metric present in both `values` and the industry's
/// benchmarks. No table means an empty comparison; a table without the
/// requested industry is a soft failure.
pub fn compare_to_industry(
    table: Option<&BenchmarkTable>,
    industry: &str,
    values: &BTreeMap<String, f64>,
) -> std::result::Result<BenchmarkComparison, SectionError> {
    let Some(table) = table else {
        debug!("No benchmark table supplied; skipping comparison");
        return Ok(BenchmarkComparison {
            industry: industry.to_string(),
            metrics: BTreeMap::new(),
        });
    };

    let Some(benchmarks) = table.industry(industry) else {
        warn!("No benchmarks for industry '{}'", industry);
        return Err(SectionError::new(
            SoftErrorKind::BenchmarkUnavailable,
            format!("No benchmark data available for industry '{}'", industry),
        ));
    };

    let metrics: BTreeMap<String, MetricComparison> = benchmarks
        .iter()
        .filter(|(_, entry)| entry.industry_benchmark.is_finite())
        .filter_map(|(metric, entry)| {
            values
                .get(metric)
                .map(|value| (metric.clone(), compare_metric(metric, *value, entry.industry_benchmark)))
        })
        .collect();

    debug!(
        "Compared {} of {} benchmark metrics for '{}'",
        metrics.len(),
        benchmarks.len(),
        industry
    );

    Ok(BenchmarkComparison {
        industry: industry.to_string(),
        metrics,
    })
}
