use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Month keys from `self` through `end`, inclusive.
    pub fn range_to(self, end: MonthKey) -> Vec<MonthKey> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        months
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parses the date layouts commonly found in exported ledgers.
/// A bare `YYYY-MM` resolves to the first day of that month.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    if s.len() == 7 && s.as_bytes()[4] == b'-' {
        return NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok();
    }

    None
}

const CURRENCY_SYMBOLS: [char; 5] = ['$', '£', '€', '¥', '₹'];

/// Parses a monetary cell, tolerating currency symbols, thousands separators,
/// accounting parentheses and a trailing minus. Returns `None` for anything
/// that does not reduce to a finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if s.len() > 1 && s.ends_with('-') {
        negative = !negative;
        s.pop();
    }

    let value: f64 = s.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if negative { -value } else { value })
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Division that falls back to zero instead of producing inf/NaN.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// `$1,234.56` style formatting; negatives render as `-$1,234.56`.
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Ratio as a one-decimal percentage, e.g. `0.1234` -> `12.3%`.
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}
