//! Rule-based alert table and monthly outlier detection.
//!
//! Rules are evaluated in a fixed order and are independent of each other, so
//! one run may raise several alerts in the same bucket. Outliers reuse the
//! volatility and monthly average already computed for the trend and cash-flow
//! metrics instead of rescanning transactions.

use crate::health::HealthScore;
use crate::metrics::{CashFlowMetrics, ProfitabilityMetrics};
use crate::schema::AlertThresholds;
use crate::trend::{TrendMetrics, Trajectory};
use crate::utils::{format_currency, format_percent, round_to};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const VOLATILITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Critical,
    Warning,
    Opportunity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    CashFlow,
    FinancialHealth,
    Liquidity,
    Profitability,
    Anomaly,
    Trend,
    Growth,
    Expansion,
    Investment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    WithinWeek,
    WithinMonth,
    Consider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub kind: AlertKind,
    pub category: AlertCategory,
    pub message: String,
    pub impact: Impact,
    pub urgency: Urgency,
}

impl Alert {
    fn new(
        kind: AlertKind,
        category: AlertCategory,
        message: String,
        impact: Impact,
        urgency: Urgency,
    ) -> Self {
        Self {
            kind,
            category,
            message,
            impact,
            urgency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    Minimal,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "very_high",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
            RiskLevel::Minimal => "minimal",
        }
    }

    pub fn from_counts(critical: usize, warning: usize) -> Self {
        if critical > 2 {
            RiskLevel::VeryHigh
        } else if critical >= 1 {
            RiskLevel::High
        } else if warning > 3 {
            RiskLevel::Medium
        } else if warning >= 1 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeverityLevels {
    pub critical: usize,
    pub warning: usize,
    pub opportunity: usize,
    pub overall_risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertSet {
    pub critical_alerts: Vec<Alert>,
    pub warning_alerts: Vec<Alert>,
    pub opportunity_alerts: Vec<Alert>,
    pub severity_levels: SeverityLevels,
}

impl AlertSet {
    fn from_alerts(alerts: Vec<Alert>) -> Self {
        let mut critical_alerts = Vec::new();
        let mut warning_alerts = Vec::new();
        let mut opportunity_alerts = Vec::new();
        for alert in alerts {
            match alert.kind {
                AlertKind::Critical => critical_alerts.push(alert),
                AlertKind::Warning => warning_alerts.push(alert),
                AlertKind::Opportunity => opportunity_alerts.push(alert),
            }
        }

        let severity_levels = SeverityLevels {
            critical: critical_alerts.len(),
            warning: warning_alerts.len(),
            opportunity: opportunity_alerts.len(),
            overall_risk: RiskLevel::from_counts(critical_alerts.len(), warning_alerts.len()),
        };

        Self {
            critical_alerts,
            warning_alerts,
            opportunity_alerts,
            severity_levels,
        }
    }

    /// All alerts in priority order: critical, then warning, then opportunity.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.critical_alerts
            .iter()
            .chain(self.warning_alerts.iter())
            .chain(self.opportunity_alerts.iter())
    }

    pub fn len(&self) -> usize {
        self.critical_alerts.len() + self.warning_alerts.len() + self.opportunity_alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A month whose net cash flow sits unusually far from the monthly average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Anomaly {
    pub month: String,
    pub net_cash_flow: f64,
    /// Signed distance from the monthly average in standard deviations.
    pub deviation_sigma: f64,
}

pub fn detect_anomalies(
    trend: &TrendMetrics,
    cash_flow: &CashFlowMetrics,
    z_score: f64,
) -> Vec<Anomaly> {
    if trend.volatility <= VOLATILITY_EPSILON {
        return Vec::new();
    }

    trend
        .monthly_data
        .iter()
        .filter_map(|m| {
            let sigma = (m.net_cash_flow - cash_flow.monthly_average) / trend.volatility;
            if sigma.abs() > z_score {
                Some(Anomaly {
                    month: m.month.clone(),
                    net_cash_flow: m.net_cash_flow,
                    deviation_sigma: round_to(sigma, 2),
                })
            } else {
                None
            }
        })
        .collect()
}

fn recent_net(trend: &TrendMetrics, window: usize) -> f64 {
    let data = &trend.monthly_data;
    let start = data.len().saturating_sub(window.max(1));
    data[start..].iter().map(|m| m.net_cash_flow).sum()
}

pub fn evaluate_alerts(
    cash_flow: &CashFlowMetrics,
    profitability: &ProfitabilityMetrics,
    trend: &TrendMetrics,
    health: &HealthScore,
    anomalies: &[Anomaly],
    thresholds: &AlertThresholds,
) -> AlertSet {
    let mut alerts = Vec::new();
    let margin = profitability.gross_profit_margin;

    let window = thresholds.recent_window_months.min(trend.monthly_data.len()).max(1);
    let recent = recent_net(trend, window);
    if recent < 0.0 {
        alerts.push(Alert::new(
            AlertKind::Critical,
            AlertCategory::CashFlow,
            format!(
                "Critical: Negative cash flow of {} over the last {} month(s)",
                format_currency(recent.abs()),
                window
            ),
            Impact::High,
            Urgency::Immediate,
        ));
    }

    if health.score < thresholds.critical_health_score {
        alerts.push(Alert::new(
            AlertKind::Critical,
            AlertCategory::FinancialHealth,
            format!("Critical: Financial health score is {}/100", health.score),
            Impact::High,
            Urgency::Immediate,
        ));
    }

    if let Some(ratio) = cash_flow.cash_flow_ratio {
        if ratio < thresholds.liquidity_ratio {
            alerts.push(Alert::new(
                AlertKind::Warning,
                AlertCategory::Liquidity,
                format!(
                    "Warning: Low cash flow ratio of {:.2} indicates potential liquidity issues",
                    ratio
                ),
                Impact::Medium,
                Urgency::WithinWeek,
            ));
        }
    }

    if margin < thresholds.margin_warning {
        alerts.push(Alert::new(
            AlertKind::Warning,
            AlertCategory::Profitability,
            format!("Warning: Low profit margin of {}", format_percent(margin)),
            Impact::Medium,
            Urgency::WithinMonth,
        ));
    }

    for anomaly in anomalies {
        let direction = if anomaly.deviation_sigma > 0.0 {
            "above"
        } else {
            "below"
        };
        alerts.push(Alert::new(
            AlertKind::Warning,
            AlertCategory::Anomaly,
            format!(
                "Unusual month {}: net cash flow of {} is {:.1} standard deviations {} the monthly average",
                anomaly.month,
                format_currency(anomaly.net_cash_flow),
                anomaly.deviation_sigma.abs(),
                direction
            ),
            Impact::Medium,
            Urgency::WithinWeek,
        ));
    }

    if trend.trajectory == Trajectory::Declining {
        alerts.push(Alert::new(
            AlertKind::Warning,
            AlertCategory::Trend,
            format!(
                "Warning: Monthly cash flow is declining by about {} per month",
                format_currency(trend.slope.abs())
            ),
            Impact::Medium,
            Urgency::WithinMonth,
        ));
    }

    if trend.trajectory == Trajectory::Improving
        && trend.months_observed >= thresholds.sustained_months
        && trend.trend_strength > thresholds.opportunity_trend_strength
    {
        alerts.push(Alert::new(
            AlertKind::Opportunity,
            AlertCategory::Growth,
            format!(
                "Opportunity: Cash flow has improved steadily for {} months",
                trend.months_observed
            ),
            Impact::Positive,
            Urgency::Consider,
        ));
    }

    if margin > thresholds.strong_margin {
        alerts.push(Alert::new(
            AlertKind::Opportunity,
            AlertCategory::Expansion,
            format!(
                "Opportunity: Strong profit margin of {} suggests potential for growth",
                format_percent(margin)
            ),
            Impact::Positive,
            Urgency::Consider,
        ));
    }

    if cash_flow.net_cash_flow > thresholds.strong_cash_position {
        alerts.push(Alert::new(
            AlertKind::Opportunity,
            AlertCategory::Investment,
            format!(
                "Opportunity: Strong cash position of {} available for investment",
                format_currency(cash_flow.net_cash_flow)
            ),
            Impact::Positive,
            Urgency::Consider,
        ));
    }

    let set = AlertSet::from_alerts(alerts);
    debug!(
        "Alerts: {} critical, {} warning, {} opportunity",
        set.severity_levels.critical, set.severity_levels.warning, set.severity_levels.opportunity
    );
    set
}
