use crate::metrics::{CashFlowMetrics, ProfitabilityMetrics};
use crate::schema::HealthWeights;
use crate::trend::{TrendMetrics, Trajectory};
use crate::utils::round_to;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Margin at which the profitability sub-score saturates.
const FULL_MARKS_MARGIN: f64 = 0.30;
const CV_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 55.0 {
            Grade::C
        } else if score >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn assessment(&self) -> &'static str {
        match self {
            Grade::A => "Excellent financial health with strong performance indicators",
            Grade::B => "Good financial health with some areas for improvement",
            Grade::C => "Moderate financial health requiring attention to key areas",
            Grade::D => "Weak financial health with significant risks",
            Grade::F => "Poor financial health requiring immediate action",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Sub-scores, each in `[0, 100]`, before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentScores {
    pub cash_flow: f64,
    pub profitability: f64,
    pub trend: f64,
    pub stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HealthScore {
    #[schemars(description = "Weighted composite score between 0 and 100")]
    pub score: f64,
    pub grade: Grade,
    pub assessment: String,
    pub components: ComponentScores,
}

fn cash_flow_component(cf: &CashFlowMetrics) -> f64 {
    let scale = cf.total_income.max(cf.total_expenses);
    if scale <= 0.0 {
        return 50.0;
    }
    50.0 * (1.0 + (cf.net_cash_flow / scale).clamp(-1.0, 1.0))
}

fn profitability_component(p: &ProfitabilityMetrics) -> f64 {
    (p.gross_profit_margin / FULL_MARKS_MARGIN).clamp(0.0, 1.0) * 100.0
}

fn trend_component(trend: &TrendMetrics) -> f64 {
    match trend.trajectory {
        Trajectory::Improving => 70.0 + 30.0 * trend.r_squared,
        Trajectory::Stable => 50.0,
        Trajectory::Declining => 30.0 - 30.0 * trend.r_squared,
    }
}

fn stability_component(trend: &TrendMetrics) -> f64 {
    let series = trend.net_series();
    if series.is_empty() {
        return 100.0;
    }
    let mean_abs = series.iter().map(|v| v.abs()).sum::<f64>() / series.len() as f64;
    let cv = trend.volatility / (mean_abs + CV_EPSILON);
    (100.0 * (1.0 - cv / 2.0)).clamp(0.0, 100.0)
}

/// Composite health score. Only aggregate inputs are read, so the result
/// does not depend on the order of the underlying transactions.
pub fn score_health(
    cash_flow: &CashFlowMetrics,
    profitability: &ProfitabilityMetrics,
    trend: &TrendMetrics,
    weights: &HealthWeights,
) -> HealthScore {
    let components = ComponentScores {
        cash_flow: round_to(cash_flow_component(cash_flow), 2),
        profitability: round_to(profitability_component(profitability), 2),
        trend: round_to(trend_component(trend), 2),
        stability: round_to(stability_component(trend), 2),
    };

    let raw = weights.cash_flow * components.cash_flow
        + weights.profitability * components.profitability
        + weights.trend * components.trend
        + weights.stability * components.stability;
    let score = round_to(raw.clamp(0.0, 100.0), 1);
    let grade = Grade::from_score(score);

    debug!("Health components {:?} -> {} ({})", components, score, grade);

    HealthScore {
        score,
        grade,
        assessment: grade.assessment().to_string(),
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{Transaction, TransactionSet};
    use crate::metrics::{cash_flow, profitability};
    use crate::trend::analyze_trend;
    use chrono::NaiveDate;

    fn score_of(transactions: Vec<Transaction>) -> HealthScore {
        let set = TransactionSet::new(transactions).unwrap();
        score_health(
            &cash_flow(&set),
            &profitability(&set),
            &analyze_trend(&set),
            &HealthWeights::default(),
        )
    }

    fn tx(m: u32, amount: f64) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(2024, m, 1).unwrap(), amount, "")
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_score(85.0), Grade::A);
        assert_eq!(Grade::from_score(84.9), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::B);
        assert_eq!(Grade::from_score(55.0), Grade::C);
        assert_eq!(Grade::from_score(40.0), Grade::D);
        assert_eq!(Grade::from_score(39.9), Grade::F);
        assert_eq!(Grade::F.to_string(), "F");
    }

    #[test]
    fn test_growing_profitable_business_scores_high() {
        let health = score_of((1..=6).map(|m| tx(m, 1000.0 * m as f64)).collect());
        assert_eq!(health.components.cash_flow, 100.0);
        assert_eq!(health.components.profitability, 100.0);
        assert!(health.components.trend > 99.0);
        assert!(health.score >= 85.0, "score {}", health.score);
        assert_eq!(health.grade, Grade::A);
    }

    #[test]
    fn test_loss_making_business_scores_low() {
        let health = score_of(vec![tx(1, 100.0), tx(1, -900.0), tx(2, 100.0), tx(2, -950.0)]);
        assert_eq!(health.components.profitability, 0.0);
        assert!(health.score < 40.0, "score {}", health.score);
        assert_eq!(health.grade, Grade::F);
        assert_eq!(health.assessment, Grade::F.assessment());
    }

    #[test]
    fn test_components_stay_in_range() {
        let health = score_of(vec![tx(1, 5000.0), tx(2, -8000.0), tx(3, 12000.0), tx(4, -100.0)]);
        for c in [
            health.components.cash_flow,
            health.components.profitability,
            health.components.trend,
            health.components.stability,
        ] {
            assert!((0.0..=100.0).contains(&c));
        }
        assert!((0.0..=100.0).contains(&health.score));
    }

    #[test]
    fn test_score_ignores_transaction_order() {
        let a = score_of(vec![tx(1, 300.0), tx(1, -20.0), tx(2, 150.0), tx(3, -40.0)]);
        let b = score_of(vec![tx(3, -40.0), tx(2, 150.0), tx(1, -20.0), tx(1, 300.0)]);
        assert_eq!(a, b);
    }
}
