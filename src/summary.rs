use crate::report::Report;
use crate::trend::Trajectory;
use crate::utils::{format_currency, format_percent};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const STRONG_MARGIN: f64 = 0.15;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeSummary {
    pub overall_health: String,
    pub key_findings: Vec<String>,
    pub critical_issues: Vec<String>,
    pub opportunities: Vec<String>,
}

/// Turns a finished report into narrative text. Implementations may call out
/// to a language model; the report is complete without one.
pub trait NarrativeSummarizer {
    fn summarize(&self, report: &Report) -> NarrativeSummary;
}

/// Offline summarizer built from fixed executive-summary rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutiveSummarizer;

impl NarrativeSummarizer for ExecutiveSummarizer {
    fn summarize(&self, report: &Report) -> NarrativeSummary {
        let metrics = &report.financial_metrics;
        let net = metrics.cash_flow.net_cash_flow;
        let margin = metrics.profitability.gross_profit_margin;

        let mut summary = NarrativeSummary {
            overall_health: metrics.health_score.grade.to_string(),
            ..Default::default()
        };

        if net > 0.0 {
            summary
                .key_findings
                .push(format!("Positive cash flow of {}", format_currency(net)));
        } else {
            summary
                .critical_issues
                .push(format!("Negative cash flow of {}", format_currency(net)));
        }

        if margin > STRONG_MARGIN {
            summary
                .key_findings
                .push(format!("Strong profit margin of {}", format_percent(margin)));
        } else if margin > 0.0 {
            summary
                .opportunities
                .push("Opportunity to improve profit margins".to_string());
        } else {
            summary
                .critical_issues
                .push("Operating at a loss or unable to calculate profitability".to_string());
        }

        match metrics.trend.trajectory {
            Trajectory::Improving => summary
                .key_findings
                .push("Monthly cash flow is trending upward".to_string()),
            Trajectory::Declining => summary
                .critical_issues
                .push("Monthly cash flow is trending downward".to_string()),
            Trajectory::Stable => {}
        }

        summary.opportunities.extend(
            report
                .alerts
                .opportunity_alerts
                .iter()
                .map(|a| a.message.clone()),
        );

        summary
    }
}
