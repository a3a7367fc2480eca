use crate::ingestion::TransactionSet;
use crate::utils::{mean, sample_std_dev, MonthKey};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guards `trend_strength` against an all-zero series.
const STRENGTH_EPSILON: f64 = 1e-9;
/// Minimum fit quality before a slope is called a trajectory.
const TRAJECTORY_MIN_R_SQUARED: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyCashFlow {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub income: f64,
    pub expenses: f64,
    pub net_cash_flow: f64,
    pub transaction_count: usize,
}

/// Buckets transactions by calendar month over the full observed range.
/// Months inside the range without transactions appear with zero flows.
pub fn monthly_buckets(transactions: &TransactionSet) -> Vec<MonthlyCashFlow> {
    let mut sums: BTreeMap<MonthKey, (f64, f64, usize)> = BTreeMap::new();
    for t in transactions {
        let entry = sums.entry(MonthKey::of(t.date)).or_insert((0.0, 0.0, 0));
        if t.amount > 0.0 {
            entry.0 += t.amount;
        } else if t.amount < 0.0 {
            entry.1 += -t.amount;
        }
        entry.2 += 1;
    }

    let start = MonthKey::of(transactions.first_date());
    let end = MonthKey::of(transactions.last_date());

    start
        .range_to(end)
        .into_iter()
        .map(|key| {
            let (income, expenses, count) = sums.get(&key).copied().unwrap_or((0.0, 0.0, 0));
            MonthlyCashFlow {
                month: key.label(),
                income,
                expenses,
                net_cash_flow: income - expenses,
                transaction_count: count,
            }
        })
        .collect()
}

/// Number of calendar months that actually contain a transaction (never zero).
pub fn distinct_month_count(transactions: &TransactionSet) -> usize {
    let mut months: Vec<MonthKey> = transactions.iter().map(|t| MonthKey::of(t.date)).collect();
    months.dedup();
    months.len().max(1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, t: f64) -> f64 {
        self.slope * t + self.intercept
    }
}

/// Ordinary least squares of `y` against its index `0..n`.
///
/// Fewer than two points, or a series with no variance, yields a flat line
/// through the mean with `r_squared = 0`.
pub fn fit_linear(y: &[f64]) -> LinearFit {
    let n = y.len();
    let y_mean = mean(y);
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: y_mean,
            r_squared: 0.0,
        };
    }

    let t_mean = (n - 1) as f64 / 2.0;
    let mut s_ty = 0.0;
    let mut s_tt = 0.0;
    for (i, value) in y.iter().enumerate() {
        let dt = i as f64 - t_mean;
        s_ty += dt * (value - y_mean);
        s_tt += dt * dt;
    }

    let slope = s_ty / s_tt;
    let intercept = y_mean - slope * t_mean;

    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON * (1.0 + y_mean * y_mean) * n as f64 {
        return LinearFit {
            slope: 0.0,
            intercept: y_mean,
            r_squared: 0.0,
        };
    }

    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (slope * i as f64 + intercept)).powi(2))
        .sum();
    let r_squared = (1.0 - ss_res / ss_tot).clamp(0.0, 1.0);

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendMetrics {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Sample standard deviation of monthly net cash flow.
    pub volatility: f64,
    pub trend_strength: f64,
    pub trajectory: Trajectory,
    pub months_observed: usize,
    pub monthly_data: Vec<MonthlyCashFlow>,
}

impl TrendMetrics {
    pub fn net_series(&self) -> Vec<f64> {
        self.monthly_data.iter().map(|m| m.net_cash_flow).collect()
    }
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trajectory::Improving => "improving",
            Trajectory::Declining => "declining",
            Trajectory::Stable => "stable",
        }
    }
}

pub fn classify_trajectory(slope: f64, r_squared: f64) -> Trajectory {
    if slope > 0.0 && r_squared >= TRAJECTORY_MIN_R_SQUARED {
        Trajectory::Improving
    } else if slope < 0.0 && r_squared >= TRAJECTORY_MIN_R_SQUARED {
        Trajectory::Declining
    } else {
        Trajectory::Stable
    }
}

pub fn analyze_trend(transactions: &TransactionSet) -> TrendMetrics {
    let monthly_data = monthly_buckets(transactions);
    let y: Vec<f64> = monthly_data.iter().map(|m| m.net_cash_flow).collect();

    let fit = fit_linear(&y);
    let volatility = sample_std_dev(&y);
    let mean_abs = mean(&y.iter().map(|v| v.abs()).collect::<Vec<_>>());
    let trend_strength = (fit.slope.abs() / (mean_abs + STRENGTH_EPSILON)).min(1.0);
    let trajectory = classify_trajectory(fit.slope, fit.r_squared);

    debug!(
        "Trend over {} months: slope {:.2}, r2 {:.3}, volatility {:.2}, {:?}",
        y.len(),
        fit.slope,
        fit.r_squared,
        volatility,
        trajectory
    );

    TrendMetrics {
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        volatility,
        trend_strength,
        trajectory,
        months_observed: monthly_data.len(),
        monthly_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::Transaction;
    use chrono::NaiveDate;

    fn tx(y: i32, m: u32, d: u32, amount: f64) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), amount, "")
    }

    #[test]
    fn test_buckets_fill_gap_months() {
        let set = TransactionSet::new(vec![
            tx(2024, 1, 3, 100.0),
            tx(2024, 1, 9, -40.0),
            tx(2024, 3, 1, 50.0),
        ])
        .unwrap();
        let buckets = monthly_buckets(&set);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].month, "2024-01");
        assert_eq!(buckets[0].net_cash_flow, 60.0);
        assert_eq!(buckets[0].expenses, 40.0);
        assert_eq!(buckets[1].month, "2024-02");
        assert_eq!(buckets[1].transaction_count, 0);
        assert_eq!(buckets[2].net_cash_flow, 50.0);
        assert_eq!(distinct_month_count(&set), 2);
    }

    #[test]
    fn test_fit_perfect_line() {
        let fit = fit_linear(&[1.0, 3.0, 5.0, 7.0]);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(4.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_degenerate_inputs() {
        let single = fit_linear(&[42.0]);
        assert_eq!(single.slope, 0.0);
        assert_eq!(single.r_squared, 0.0);

        let flat = fit_linear(&[5.0, 5.0, 5.0]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 0.0);
        assert_eq!(flat.intercept, 5.0);
    }

    #[test]
    fn test_single_month_is_stable() {
        let set = TransactionSet::new(vec![tx(2024, 5, 1, 100.0), tx(2024, 5, 2, -30.0)]).unwrap();
        let trend = analyze_trend(&set);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.r_squared, 0.0);
        assert_eq!(trend.volatility, 0.0);
        assert_eq!(trend.trajectory, Trajectory::Stable);
        assert_eq!(trend.months_observed, 1);
    }

    #[test]
    fn test_increasing_series_is_improving() {
        let set = TransactionSet::new(
            (1..=6)
                .map(|m| tx(2024, m, 15, 1000.0 * m as f64))
                .collect(),
        )
        .unwrap();
        let trend = analyze_trend(&set);
        assert_eq!(trend.trajectory, Trajectory::Improving);
        assert!(trend.r_squared > 0.99);
        assert!((trend.slope - 1000.0).abs() < 1e-9);
        // slope / mean(|y|) = 1000 / 3500
        assert!((trend.trend_strength - 1000.0 / 3500.0).abs() < 1e-6);
    }

    #[test]
    fn test_decreasing_series_is_declining() {
        let set = TransactionSet::new(
            (1..=4)
                .map(|m| tx(2024, m, 1, 500.0 - 200.0 * m as f64))
                .collect(),
        )
        .unwrap();
        assert_eq!(analyze_trend(&set).trajectory, Trajectory::Declining);
    }

    #[test]
    fn test_noisy_series_is_stable() {
        let set = TransactionSet::new(vec![
            tx(2024, 1, 1, 100.0),
            tx(2024, 2, 1, -100.0),
            tx(2024, 3, 1, 100.0),
            tx(2024, 4, 1, -100.0),
            tx(2024, 5, 1, 100.0),
        ])
        .unwrap();
        let trend = analyze_trend(&set);
        assert_eq!(trend.trajectory, Trajectory::Stable);
        assert!(trend.r_squared < 0.3);
    }

    #[test]
    fn test_trend_strength_is_capped() {
        // Tiny mean with a large slope.
        let set = TransactionSet::new(vec![tx(2024, 1, 1, -1000.0), tx(2024, 2, 1, 1000.0)])
            .unwrap();
        let trend = analyze_trend(&set);
        assert_eq!(trend.trend_strength, 1.0);
    }
}
