//! Analyze a ledger CSV and print the report.
//!
//! ```text
//! cargo run --example analyze_csv -- ledger.csv [industry] [micro|small|medium|large]
//! ```
//!
//! Set `RUST_LOG=debug` to follow the pipeline.

use anyhow::{bail, Context, Result};
use financial_health_engine::*;
use std::env;
use std::fs::File;

fn read_table(path: &str) -> Result<RawTable> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV record")?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(RawTable::from_records(headers, records))
}

fn parse_size(raw: &str) -> Result<BusinessSize> {
    Ok(match raw.to_lowercase().as_str() {
        "micro" => BusinessSize::Micro,
        "small" => BusinessSize::Small,
        "medium" => BusinessSize::Medium,
        "large" => BusinessSize::Large,
        other => bail!("Unknown business size '{}'", other),
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        bail!("Usage: analyze_csv <ledger.csv> [industry] [business_size]");
    };
    let industry = args.get(1).map(String::as_str).unwrap_or("default");
    let business_size = match args.get(2) {
        Some(raw) => parse_size(raw)?,
        None => BusinessSize::default(),
    };

    let request = AnalysisRequest::new(read_table(path)?)
        .with_industry(industry)
        .with_business_size(business_size)
        .with_benchmarks(BenchmarkTable::reference());

    let analyzer = FinancialAnalyzer::default().with_summarizer(Box::new(ExecutiveSummarizer));
    match analyzer.analyze(&request) {
        Ok(report) => {
            println!("{}", report.to_json()?);
            eprintln!("{}", report.to_text_summary());
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_payload())?);
            std::process::exit(1);
        }
    }

    Ok(())
}
