//! Pure cash-flow and profitability calculators.
//!
//! Ratios whose denominator is zero are reported as zero (or `None` where a
//! zero would be misleading) rather than raising.

use crate::error::{SectionError, SoftErrorKind};
use crate::ingestion::TransactionSet;
use crate::report::Section;
use crate::trend::{distinct_month_count, fit_linear, monthly_buckets};
use crate::utils::safe_div;
use chrono::Datelike;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Below this many transactions a per-calendar-month profile is noise.
const SEASONAL_MIN_TRANSACTIONS: usize = 12;
/// The smallest expenses stand in for fixed costs.
const FIXED_COST_QUANTILE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowMetrics {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
    /// Net cash flow divided by the number of distinct calendar months.
    pub monthly_average: f64,
    /// Income over expenses; `None` when there are no expenses.
    pub cash_flow_ratio: Option<f64>,
    pub expense_ratio: f64,
    pub month_count: usize,
    /// Mean transaction amount per calendar month number (1-12).
    pub seasonal_pattern: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitabilityMetrics {
    pub revenue: f64,
    pub costs: f64,
    pub gross_profit: f64,
    pub gross_profit_margin: f64,
    pub profit_per_transaction: f64,
    /// Slope of the monthly margin series; positive means margins are widening.
    pub profitability_trend: f64,
    pub break_even_analysis: Section<BreakEvenAnalysis>,
}

/// Transactions (and the revenue they bring) needed to cover estimated fixed
/// costs at the current average contribution per transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BreakEvenAnalysis {
    pub fixed_costs: f64,
    pub variable_cost_ratio: f64,
    pub break_even_transactions: f64,
    pub break_even_revenue: f64,
    pub current_transactions: usize,
    /// Current transactions beyond the break-even count; negative when short.
    pub margin_of_safety: f64,
}

pub fn cash_flow(transactions: &TransactionSet) -> CashFlowMetrics {
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    for t in transactions {
        if t.amount > 0.0 {
            total_income += t.amount;
        } else if t.amount < 0.0 {
            total_expenses += -t.amount;
        }
    }

    let net_cash_flow = total_income - total_expenses;
    let month_count = distinct_month_count(transactions);

    CashFlowMetrics {
        total_income,
        total_expenses,
        net_cash_flow,
        monthly_average: net_cash_flow / month_count as f64,
        cash_flow_ratio: if total_expenses > 0.0 {
            Some(total_income / total_expenses)
        } else {
            None
        },
        expense_ratio: safe_div(total_expenses, total_income),
        month_count,
        seasonal_pattern: seasonal_pattern(transactions),
    }
}

fn seasonal_pattern(transactions: &TransactionSet) -> BTreeMap<u32, f64> {
    if transactions.len() < SEASONAL_MIN_TRANSACTIONS {
        return BTreeMap::new();
    }

    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for t in transactions {
        let entry = sums.entry(t.date.month()).or_insert((0.0, 0));
        entry.0 += t.amount;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect()
}

pub fn profitability(transactions: &TransactionSet) -> ProfitabilityMetrics {
    let cf = cash_flow(transactions);
    let revenue = cf.total_income;
    let gross_profit = cf.net_cash_flow;

    let gross_profit_margin = if revenue > 0.0 {
        gross_profit / revenue
    } else {
        0.0
    };

    let margins: Vec<f64> = monthly_buckets(transactions)
        .iter()
        .map(|m| safe_div(m.income - m.expenses, m.income))
        .collect();
    let profitability_trend = if margins.len() < 2 {
        0.0
    } else {
        fit_linear(&margins).slope
    };

    ProfitabilityMetrics {
        revenue,
        costs: cf.total_expenses,
        gross_profit,
        gross_profit_margin,
        profit_per_transaction: gross_profit / transactions.len() as f64,
        profitability_trend,
        break_even_analysis: break_even(transactions, revenue, cf.total_expenses).into(),
    }
}

pub fn break_even(
    transactions: &TransactionSet,
    revenue: f64,
    costs: f64,
) -> std::result::Result<BreakEvenAnalysis, SectionError> {
    let count = transactions.len();
    let revenue_per_transaction = revenue / count as f64;
    let variable_cost_ratio = safe_div(costs, revenue);

    if revenue_per_transaction <= 0.0 || variable_cost_ratio >= 1.0 {
        return Err(SectionError::new(
            SoftErrorKind::BreakEvenUnavailable,
            "Insufficient data for break-even analysis: revenue must exceed costs",
        ));
    }

    let mut expenses: Vec<f64> = transactions
        .iter()
        .filter(|t| t.amount < 0.0)
        .map(|t| -t.amount)
        .collect();
    expenses.sort_by(f64::total_cmp);
    let fixed_costs = quantile(&expenses, FIXED_COST_QUANTILE);

    let contribution = revenue_per_transaction * (1.0 - variable_cost_ratio);
    let break_even_transactions = fixed_costs / contribution;

    Ok(BreakEvenAnalysis {
        fixed_costs,
        variable_cost_ratio,
        break_even_transactions,
        break_even_revenue: break_even_transactions * revenue_per_transaction,
        current_transactions: count,
        margin_of_safety: count as f64 - break_even_transactions,
    })
}

/// Linearly interpolated quantile of an ascending slice; 0 when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
