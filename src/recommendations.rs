//! Fixed-phrase recommendations keyed by metric thresholds.
//!
//! Each rule appends its whole group of phrases when it fires. The phrases
//! never depend on the magnitude of a metric except for the benchmark gap,
//! which is quoted as a percentage.

use crate::benchmark::{BenchmarkComparison, Performance};
use crate::metrics::{CashFlowMetrics, ProfitabilityMetrics};
use crate::schema::BusinessSize;
use crate::trend::TrendMetrics;
use crate::utils::format_percent;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const CRITICAL_MARGIN: f64 = 0.05;
const TIGHT_CASH_FLOW_RATIO: f64 = 1.2;
const HIGH_EXPENSE_RATIO: f64 = 0.8;
const PREMIUM_MARGIN: f64 = 0.3;

const NEGATIVE_CASH_ACTIONS: [&str; 3] = [
    "Immediately review and reduce non-essential expenses",
    "Accelerate accounts receivable collection",
    "Consider emergency financing options if cash position is critical",
];

const THIN_MARGIN_ACTIONS: [&str; 3] = [
    "Conduct urgent pricing analysis and consider price increases",
    "Review and renegotiate supplier contracts",
    "Identify and eliminate unprofitable products/services",
];

const WORKING_CAPITAL_STRATEGIES: [&str; 3] = [
    "Implement stricter payment terms for new customers",
    "Optimize inventory levels to free up working capital",
    "Explore factoring or invoice financing options",
];

const COST_OPTIMIZATION: [&str; 4] = [
    "Conduct comprehensive expense audit",
    "Implement zero-based budgeting approach",
    "Automate manual processes to reduce labor costs",
    "Negotiate better rates with vendors and suppliers",
];

const REVENUE_ENHANCEMENT: [&str; 4] = [
    "Develop premium service offerings with higher margins",
    "Implement value-based pricing strategies",
    "Focus on customer retention to reduce acquisition costs",
    "Explore cross-selling and upselling opportunities",
];

const DIVERSIFICATION_STRATEGIES: [&str; 3] = [
    "Develop new revenue streams to diversify income",
    "Invest in customer acquisition and retention programs",
    "Consider strategic partnerships or market expansion",
];

const SMALL_BUSINESS_STRATEGIES: [&str; 3] = [
    "Consider cloud-based financial management tools for better insights",
    "Implement automated invoicing and payment systems",
    "Focus on building strong customer relationships for organic growth",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendations {
    pub immediate_actions: Vec<String>,
    /// One to three month horizon.
    pub short_term_strategies: Vec<String>,
    pub long_term_strategies: Vec<String>,
    pub strategic_recommendations: Vec<String>,
    pub cost_optimization: Vec<String>,
    pub revenue_enhancement: Vec<String>,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.immediate_actions.len()
            + self.short_term_strategies.len()
            + self.long_term_strategies.len()
            + self.strategic_recommendations.len()
            + self.cost_optimization.len()
            + self.revenue_enhancement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn extend(target: &mut Vec<String>, phrases: &[&str]) {
    target.extend(phrases.iter().map(|s| s.to_string()));
}

pub fn generate_recommendations(
    cash_flow: &CashFlowMetrics,
    profitability: &ProfitabilityMetrics,
    trend: &TrendMetrics,
    benchmark: Option<&BenchmarkComparison>,
    business_size: BusinessSize,
) -> Recommendations {
    let mut recs = Recommendations::default();
    let margin = profitability.gross_profit_margin;

    if cash_flow.net_cash_flow < 0.0 {
        extend(&mut recs.immediate_actions, &NEGATIVE_CASH_ACTIONS);
    }
    if margin < CRITICAL_MARGIN {
        extend(&mut recs.immediate_actions, &THIN_MARGIN_ACTIONS);
    }

    // No expenses means no ratio, which is never tight.
    if cash_flow
        .cash_flow_ratio
        .is_some_and(|r| r < TIGHT_CASH_FLOW_RATIO)
    {
        extend(&mut recs.short_term_strategies, &WORKING_CAPITAL_STRATEGIES);
    }

    if cash_flow.expense_ratio > HIGH_EXPENSE_RATIO {
        extend(&mut recs.cost_optimization, &COST_OPTIMIZATION);
    }
    if margin < PREMIUM_MARGIN {
        extend(&mut recs.revenue_enhancement, &REVENUE_ENHANCEMENT);
    }

    if let Some(comparison) = benchmark {
        for (metric, cmp) in &comparison.metrics {
            if cmp.performance != Performance::Below {
                continue;
            }
            match metric.as_str() {
                "profit_margin" => recs.strategic_recommendations.push(format!(
                    "Your profit margin is {} below industry average. \
                     Focus on operational efficiency and pricing optimization.",
                    format_percent(cmp.difference.abs())
                )),
                "cash_flow_ratio" => recs.strategic_recommendations.push(
                    "Your cash flow ratio is below industry standards. \
                     Improve working capital management and payment collection."
                        .to_string(),
                ),
                _ => {}
            }
        }
    }

    if trend.slope < 0.0 {
        extend(&mut recs.long_term_strategies, &DIVERSIFICATION_STRATEGIES);
    }

    if matches!(business_size, BusinessSize::Micro | BusinessSize::Small) {
        extend(&mut recs.strategic_recommendations, &SMALL_BUSINESS_STRATEGIES);
    }

    debug!(
        "Generated {} recommendation(s), {} immediate",
        recs.len(),
        recs.immediate_actions.len()
    );
    recs
}
