//! # Financial Health Engine
//!
//! A deterministic pipeline that turns a user-supplied transaction ledger
//! (arbitrary column names, messy cells) into a structured financial-health
//! report.
//!
//! ## Pipeline
//!
//! - **Normalizer** ([`ingestion`]): resolves the column mapping, parses cells,
//!   fills missing dates and produces a canonical [`TransactionSet`]
//! - **Metric calculators** ([`metrics`], [`trend`]): cash flow, profitability,
//!   monthly buckets and a least-squares trend
//! - **Forecast** ([`forecast`]): six-month scenario projection with a confidence level
//! - **Health scorer** ([`health`]): weighted composite score and letter grade
//! - **Alerts** ([`alerts`]): rule table plus monthly outlier detection
//! - **Benchmarks** ([`benchmark`]): comparison against a caller-supplied industry table
//! - **Recommendations** ([`recommendations`]): fixed advice keyed by thresholds and business size
//! - **Report** ([`report`]): the single immutable value returned to callers
//!
//! Every stage is a pure function of its inputs. The engine performs no I/O,
//! so independent requests can run in parallel without coordination.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_health_engine::*;
//!
//! let table = RawTable::from_records(
//!     vec!["date", "amount", "category"],
//!     vec![
//!         vec!["2024-01-01", "5000", "Sales"],
//!         vec!["2024-01-02", "-1200", "Rent"],
//!         vec!["2024-02-01", "5200", "Sales"],
//!         vec!["2024-02-02", "-1250", "Rent"],
//!     ],
//! );
//!
//! let benchmarks = BenchmarkTable::reference();
//! let report = analyze(&table, None, "retail", BusinessSize::Small, Some(&benchmarks)).unwrap();
//!
//! assert_eq!(report.financial_metrics.cash_flow.net_cash_flow, 7750.0);
//! println!("{}", report.to_text_summary());
//! ```

pub mod alerts;
pub mod benchmark;
pub mod error;
pub mod forecast;
pub mod health;
pub mod ingestion;
pub mod mapping;
pub mod metrics;
pub mod recommendations;
pub mod report;
pub mod schema;
pub mod summary;
pub mod trend;
pub mod utils;

pub use alerts::{
    detect_anomalies, evaluate_alerts, Alert, AlertCategory, AlertKind, AlertSet, Anomaly, Impact,
    RiskLevel, SeverityLevels, Urgency,
};
pub use benchmark::{
    compare_to_industry, comparable_metrics, BenchmarkComparison, BenchmarkEntry, BenchmarkTable,
    MetricComparison, Performance,
};
pub use error::{AnalysisError, ErrorKind, ErrorPayload, Result, SectionError, SoftErrorKind};
pub use forecast::{build_forecast, ConfidenceLevel, Forecast, ScenarioAnalysis};
pub use health::{score_health, ComponentScores, Grade, HealthScore};
pub use ingestion::*;
pub use mapping::{resolve_mapping, ColumnMapper, KeywordColumnMapper, MappingSource, ResolvedMapping};
pub use metrics::{
    break_even, cash_flow, profitability, BreakEvenAnalysis, CashFlowMetrics, ProfitabilityMetrics,
};
pub use recommendations::{generate_recommendations, Recommendations};
pub use report::{
    action_items, ActionCategory, ActionItem, MetricBundle, Priority, Report, ReportContext, Section,
};
pub use schema::*;
pub use summary::{ExecutiveSummarizer, NarrativeSummarizer, NarrativeSummary};
pub use trend::{analyze_trend, fit_linear, LinearFit, MonthlyCashFlow, Trajectory, TrendMetrics};
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything one analysis needs besides configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub table: RawTable,
    /// Mapping handed over by an external column mapper, if one ran.
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    #[serde(default = "default_industry")]
    pub industry: String,
    #[serde(default)]
    pub business_size: BusinessSize,
    /// Without a table the benchmark section is simply empty.
    #[serde(default)]
    pub benchmarks: Option<BenchmarkTable>,
}

fn default_industry() -> String {
    "default".to_string()
}

impl AnalysisRequest {
    pub fn new(table: RawTable) -> Self {
        Self {
            table,
            mapping: None,
            industry: default_industry(),
            business_size: BusinessSize::default(),
            benchmarks: None,
        }
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }

    pub fn with_business_size(mut self, business_size: BusinessSize) -> Self {
        self.business_size = business_size;
        self
    }

    pub fn with_benchmarks(mut self, benchmarks: BenchmarkTable) -> Self {
        self.benchmarks = Some(benchmarks);
        self
    }
}

pub struct FinancialAnalyzer {
    config: AnalysisConfig,
    summarizer: Option<Box<dyn NarrativeSummarizer + Send + Sync>>,
}

impl Default for FinancialAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl FinancialAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn NarrativeSummarizer + Send + Sync>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<Report> {
        self.run(
            &request.table,
            request.mapping.as_ref(),
            &request.industry,
            request.business_size,
            request.benchmarks.as_ref(),
        )
    }

    fn run(
        &self,
        table: &RawTable,
        mapping: Option<&ColumnMapping>,
        industry: &str,
        business_size: BusinessSize,
        benchmarks: Option<&BenchmarkTable>,
    ) -> Result<Report> {
        self.config.validate()?;

        info!(
            "Starting analysis of {} rows ({} columns) for industry '{}', {} business",
            table.rows.len(),
            table.columns.len(),
            industry,
            business_size
        );

        let ledger = normalize(table, mapping, &self.config)?;
        let transactions = &ledger.transactions;

        let cash_flow = cash_flow(transactions);
        let profitability = profitability(transactions);
        let trend = analyze_trend(transactions);
        let health_score = score_health(
            &cash_flow,
            &profitability,
            &trend,
            &self.config.health_weights,
        );
        debug!(
            "Net cash flow {:.2}, margin {:.4}, health {}",
            cash_flow.net_cash_flow, profitability.gross_profit_margin, health_score.score
        );

        let forecast = build_forecast(&trend, MonthKey::of(transactions.last_date()), &self.config);

        let thresholds = &self.config.thresholds;
        let anomalies = detect_anomalies(&trend, &cash_flow, thresholds.anomaly_z_score);
        let alerts = evaluate_alerts(
            &cash_flow,
            &profitability,
            &trend,
            &health_score,
            &anomalies,
            thresholds,
        );

        let values = comparable_metrics(&cash_flow, &profitability, &health_score);
        let benchmark = compare_to_industry(benchmarks, industry, &values);
        let recommendations = generate_recommendations(
            &cash_flow,
            &profitability,
            &trend,
            benchmark.as_ref().ok(),
            business_size,
        );

        let mut report = Report::assemble(
            ReportContext {
                industry: industry.to_string(),
                business_size,
                data_quality: ledger.data_quality,
            },
            MetricBundle {
                cash_flow,
                profitability,
                trend,
                health_score,
            },
            forecast,
            alerts,
            anomalies,
            benchmark,
            recommendations,
        );

        if let Some(summarizer) = &self.summarizer {
            let narrative = summarizer.summarize(&report);
            report = report.with_narrative(narrative);
        }

        info!(
            "Analysis complete: {} transactions, health {} ({}), {} alert(s)",
            report.data_quality.rows_processed,
            report.financial_metrics.health_score.score,
            report.financial_metrics.health_score.grade,
            report.alerts.len()
        );

        Ok(report)
    }
}

/// Runs the full pipeline with the default configuration.
pub fn analyze(
    table: &RawTable,
    mapping: Option<&ColumnMapping>,
    industry: &str,
    business_size: BusinessSize,
    benchmarks: Option<&BenchmarkTable>,
) -> Result<Report> {
    FinancialAnalyzer::default().run(table, mapping, industry, business_size, benchmarks)
}
