use crate::alerts::{AlertSet, Anomaly};
use crate::benchmark::BenchmarkComparison;
use crate::error::{AnalysisError, Result, SectionError};
use crate::forecast::Forecast;
use crate::health::HealthScore;
use crate::ingestion::DataQuality;
use crate::metrics::{CashFlowMetrics, ProfitabilityMetrics};
use crate::recommendations::Recommendations;
use crate::schema::BusinessSize;
use crate::summary::NarrativeSummary;
use crate::trend::TrendMetrics;
use crate::utils::{format_currency, format_percent};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An optional report section: either its value or the reason it is missing.
/// Serialized untagged, so consumers see the section object itself or
/// `{ "error": true, "kind": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Section<T> {
    Available(T),
    Unavailable(SectionError),
}

impl<T> Section<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Section::Available(v) => Some(v),
            Section::Unavailable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SectionError> {
        match self {
            Section::Available(_) => None,
            Section::Unavailable(e) => Some(e),
        }
    }
}

impl<T> From<std::result::Result<T, SectionError>> for Section<T> {
    fn from(result: std::result::Result<T, SectionError>) -> Self {
        match result {
            Ok(v) => Section::Available(v),
            Err(e) => Section::Unavailable(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricBundle {
    pub cash_flow: CashFlowMetrics,
    pub profitability: ProfitabilityMetrics,
    pub trend: TrendMetrics,
    pub health_score: HealthScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Alert,
    Improvement,
    Strategic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionItem {
    pub priority: Priority,
    pub category: ActionCategory,
    pub action: String,
    pub timeline: String,
}

impl ActionItem {
    fn new(priority: Priority, category: ActionCategory, action: &str) -> Self {
        let timeline = match priority {
            Priority::High => "immediate",
            Priority::Medium => "1-2 weeks",
            Priority::Low => "1-3 months",
        };
        Self {
            priority,
            category,
            action: action.to_string(),
            timeline: timeline.to_string(),
        }
    }
}

/// Prioritized to-do list: critical alerts first, then warnings and the
/// immediate recommendations, then opportunities and strategic advice.
pub fn action_items(alerts: &AlertSet, recommendations: &Recommendations) -> Vec<ActionItem> {
    let mut items = Vec::new();
    let tiers = [
        (Priority::High, &alerts.critical_alerts, None),
        (
            Priority::Medium,
            &alerts.warning_alerts,
            Some((ActionCategory::Improvement, &recommendations.immediate_actions)),
        ),
        (
            Priority::Low,
            &alerts.opportunity_alerts,
            Some((
                ActionCategory::Strategic,
                &recommendations.strategic_recommendations,
            )),
        ),
    ];

    for (priority, bucket, advice) in tiers {
        for alert in bucket {
            items.push(ActionItem::new(priority, ActionCategory::Alert, &alert.message));
        }
        if let Some((category, phrases)) = advice {
            for phrase in phrases {
                items.push(ActionItem::new(priority, category, phrase));
            }
        }
    }
    items
}

/// Request-level facts echoed into the report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub industry: String,
    pub business_size: BusinessSize,
    pub data_quality: DataQuality,
}

/// The complete result of one analysis. Built once and never mutated; every
/// map inside is ordered so identical input serializes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub industry: String,
    pub business_size: BusinessSize,
    pub data_quality: DataQuality,
    pub financial_metrics: MetricBundle,
    pub forecast: Section<Forecast>,
    pub alerts: AlertSet,
    pub anomalies: Vec<Anomaly>,
    pub benchmark_comparison: Section<BenchmarkComparison>,
    pub recommendations: Recommendations,
    pub action_items: Vec<ActionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeSummary>,
}

impl Report {
    pub fn assemble(
        context: ReportContext,
        metrics: MetricBundle,
        forecast: std::result::Result<Forecast, SectionError>,
        alerts: AlertSet,
        anomalies: Vec<Anomaly>,
        benchmark: std::result::Result<BenchmarkComparison, SectionError>,
        recommendations: Recommendations,
    ) -> Self {
        let action_items = action_items(&alerts, &recommendations);
        Self {
            industry: context.industry,
            business_size: context.business_size,
            data_quality: context.data_quality,
            financial_metrics: metrics,
            forecast: forecast.into(),
            alerts,
            anomalies,
            benchmark_comparison: benchmark.into(),
            recommendations,
            action_items,
            narrative: None,
        }
    }

    pub fn with_narrative(mut self, narrative: NarrativeSummary) -> Self {
        self.narrative = Some(narrative);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Report)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }

    pub fn to_text_summary(&self) -> String {
        let m = &self.financial_metrics;
        let mut lines = vec![
            "FINANCIAL ANALYSIS SUMMARY".to_string(),
            format!(
                "Industry: {} ({} business)",
                self.industry, self.business_size
            ),
            format!(
                "Period: {} to {} ({} transactions)",
                self.data_quality.date_range.start_date,
                self.data_quality.date_range.end_date,
                self.data_quality.rows_processed
            ),
            String::new(),
            format!(
                "OVERALL HEALTH SCORE: {}/100 ({})",
                m.health_score.score, m.health_score.grade
            ),
            String::new(),
            "KEY METRICS:".to_string(),
            format!("- Cash Flow: {}", format_currency(m.cash_flow.net_cash_flow)),
            format!(
                "- Profit Margin: {}",
                format_percent(m.profitability.gross_profit_margin)
            ),
            format!("- Trend: {}", m.trend.trajectory.as_str()),
            format!("- Financial Health: {}", m.health_score.assessment),
        ];

        match &self.forecast {
            Section::Available(f) => {
                if let (Some(period), Some(value)) =
                    (f.periods.first(), f.scenario_analysis.realistic.first())
                {
                    lines.push(format!(
                        "- Forecast {}: {} ({} confidence)",
                        period,
                        format_currency(*value),
                        f.confidence_level.as_str()
                    ));
                }
            }
            Section::Unavailable(e) => lines.push(format!("- Forecast: {}", e.message)),
        }

        lines.push(String::new());
        lines.push("TOP ACTIONS:".to_string());
        if self.action_items.is_empty() {
            lines.push("No action required".to_string());
        }
        for (i, item) in self.action_items.iter().take(3).enumerate() {
            lines.push(format!("{}. {} ({})", i + 1, item.action, item.timeline));
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Key metrics as `Metric,Value,Status` rows.
    pub fn to_csv(&self) -> Result<String> {
        let m = &self.financial_metrics;
        let net = m.cash_flow.net_cash_flow;
        let margin = m.profitability.gross_profit_margin;

        let rows: Vec<[String; 3]> = vec![
            [
                "Cash Flow".to_string(),
                format_currency(net),
                if net > 0.0 { "Positive" } else { "Negative" }.to_string(),
            ],
            [
                "Profit Margin".to_string(),
                format_percent(margin),
                if margin > 0.1 {
                    "Good"
                } else {
                    "Needs Improvement"
                }
                .to_string(),
            ],
            [
                "Health Score".to_string(),
                format!("{}/100", m.health_score.score),
                m.health_score.grade.to_string(),
            ],
            [
                "Total Income".to_string(),
                format_currency(m.cash_flow.total_income),
                String::new(),
            ],
            [
                "Total Expenses".to_string(),
                format_currency(m.cash_flow.total_expenses),
                String::new(),
            ],
            [
                "Trend".to_string(),
                format!("{:.2}/month", m.trend.slope),
                m.trend.trajectory.as_str().to_string(),
            ],
            [
                "Overall Risk".to_string(),
                self.alerts.len().to_string(),
                self.alerts.severity_levels.overall_risk.as_str().to_string(),
            ],
        ];

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer
            .write_record(["Metric", "Value", "Status"])
            .map_err(|e| AnalysisError::ExportError(format!("CSV write error: {e}")))?;
        for row in &rows {
            writer
                .write_record(row)
                .map_err(|e| AnalysisError::ExportError(format!("CSV write error: {e}")))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AnalysisError::ExportError(format!("CSV flush error: {e}")))?;
        String::from_utf8(bytes).map_err(|e| AnalysisError::ExportError(e.to_string()))
    }
}
