use financial_health_engine::*;

fn table_from_csv(data: &str) -> RawTable {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let records: Vec<Vec<String>> = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();

    RawTable::from_records(headers, records)
}

fn run(table: &RawTable) -> Report {
    analyze(table, None, "default", BusinessSize::Small, None).unwrap()
}

const SERVICES_LEDGER: &str = "\
Transaction_Date,Revenue,Cost,Memo
2024-01-05,\"$4,000.00\",,Consulting retainer
2024-01-20,,1200,Office rent
2024-02-05,\"$4,500.00\",,Consulting retainer
2024-02-20,,\"1,250\",Office rent
2024-03-05,\"$5,000.00\",,Consulting retainer
2024-03-20,,(1300),Office rent
2024-04-05,\"$5,500.00\",,Consulting retainer
2024-04-20,,1350,Office rent
";

#[test]
fn test_scenario_explicit_amount_mapping() {
    let table = table_from_csv(
        "when,value\n2024-01-01,5000\n2024-01-02,-1200\n2024-02-01,5200\n2024-02-02,-1250\n",
    );
    let mapping = ColumnMapping {
        date: Some("when".to_string()),
        amount: Some("value".to_string()),
        confidence: MappingConfidence::High,
        ..Default::default()
    };

    let report = analyze(&table, Some(&mapping), "retail", BusinessSize::Small, None).unwrap();
    let cf = &report.financial_metrics.cash_flow;

    assert_eq!(cf.total_income, 10200.0);
    assert_eq!(cf.total_expenses, 2450.0);
    assert_eq!(cf.net_cash_flow, 7750.0);
    assert_eq!(cf.monthly_average, 3875.0);
    assert_eq!(report.data_quality.mapping.source, MappingSource::Provided);
    assert_eq!(report.data_quality.rows_processed, 4);
    assert_eq!(report.data_quality.completeness_score, 100.0);
}

#[test]
fn test_scenario_empty_rows_are_unsupported() {
    let table = RawTable::from_records(vec!["date", "amount"], Vec::<Vec<&str>>::new());
    let err = analyze(&table, None, "retail", BusinessSize::Small, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInputError);

    let payload = err.to_payload();
    assert!(payload.error);
    assert!(!payload.suggestions.is_empty());

    let err = analyze(&RawTable::default(), None, "retail", BusinessSize::Small, None).unwrap_err();
    assert!(matches!(err, AnalysisError::UnsupportedInput(_)));
}

#[test]
fn test_scenario_single_transaction_degrades_forecast_only() {
    let table = table_from_csv("Date,Amount\n2024-03-15,250\n");
    let report = run(&table);

    assert_eq!(report.financial_metrics.cash_flow.net_cash_flow, 250.0);
    assert_eq!(report.financial_metrics.profitability.gross_profit_margin, 1.0);
    assert_eq!(report.financial_metrics.trend.trajectory, Trajectory::Stable);

    let err = report.forecast.error().unwrap();
    assert_eq!(err.kind, SoftErrorKind::ForecastUnavailable);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["forecast"]["error"], true);
    assert_eq!(json["forecast"]["kind"], "ForecastUnavailable");
    assert!(json["financial_metrics"]["health_score"]["score"].is_number());
}

#[test]
fn test_scenario_all_expenses_has_zero_margin() {
    let table = table_from_csv("Date,Amount\n2024-01-03,-100\n2024-02-03,-250\n2024-02-10,-40\n");
    let report = run(&table);
    let p = &report.financial_metrics.profitability;

    assert_eq!(p.revenue, 0.0);
    assert_eq!(p.gross_profit_margin, 0.0);
    assert_eq!(report.financial_metrics.cash_flow.expense_ratio, 0.0);
    assert!(report.financial_metrics.health_score.score.is_finite());
    assert!(!report.alerts.critical_alerts.is_empty());
}

#[test]
fn test_scenario_steady_growth_is_improving() {
    let table = table_from_csv(
        "Date,Amount\n\
         2024-01-10,1000\n2024-02-10,2000\n2024-03-10,3000\n\
         2024-04-10,4000\n2024-05-10,5000\n2024-06-10,6000\n",
    );
    let report = run(&table);
    let trend = &report.financial_metrics.trend;

    assert_eq!(trend.trajectory, Trajectory::Improving);
    assert!(trend.r_squared > 0.99);

    let forecast = report.forecast.value().unwrap();
    assert_eq!(forecast.confidence_level, ConfidenceLevel::High);
    assert_eq!(forecast.periods.first().unwrap(), "2024-07");
}

#[test]
fn test_separate_income_and_expense_columns() {
    let report = run(&table_from_csv(SERVICES_LEDGER));
    let cf = &report.financial_metrics.cash_flow;

    assert_eq!(report.data_quality.mapping.source, MappingSource::Keyword);
    assert_eq!(
        report.data_quality.mapping.mapping.income.as_deref(),
        Some("Revenue")
    );
    assert_eq!(cf.total_income, 19000.0);
    assert_eq!(cf.total_expenses, 5100.0);
    assert_eq!(cf.net_cash_flow, 13900.0);
    assert_eq!(cf.month_count, 4);
    assert_eq!(report.data_quality.completeness_score, 100.0);

    let trend = &report.financial_metrics.trend;
    assert!((trend.slope - 450.0).abs() < 1e-6);
    assert_eq!(trend.trajectory, Trajectory::Improving);
}

#[test]
fn test_malformed_cells_lower_completeness() {
    let table = table_from_csv(
        "Date,Amount\n2024-01-01,100\n2024-01-02,abc\nnot a date,50\n,\n2024-02-01,-30\n",
    );
    let report = run(&table);
    let dq = &report.data_quality;

    assert_eq!(dq.rows_received, 5);
    assert_eq!(dq.rows_dropped, 1);
    assert_eq!(dq.rows_processed, 4);
    assert_eq!(dq.malformed_cell_count, 4);
    assert_eq!(dq.completeness_score, 60.0);
    assert_eq!(report.financial_metrics.cash_flow.total_income, 150.0);
}

#[test]
fn test_all_rows_unreadable_is_insufficient_data() {
    let table = table_from_csv("Date,Amount\ngarbage,abc\n???,n/a\n");
    let err = analyze(&table, None, "retail", BusinessSize::Small, None).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InsufficientData {
            usable: 0,
            required: 1
        }
    ));
    assert_eq!(err.to_payload().error_type, ErrorKind::InsufficientDataError);
}

#[test]
fn test_missing_date_column_synthesizes_dates() {
    let table = table_from_csv("Amount,Category\n500,Sales\n200,Supplies purchase\n50,Misc\n");
    let report = run(&table);
    let dq = &report.data_quality;

    assert!(dq.synthetic_dates);
    assert_eq!(dq.date_range.start_date.to_string(), "2024-01-01");
    assert_eq!(dq.date_range.end_date.to_string(), "2024-01-03");
    // "purchase" marks the row as an expense even though the cell is positive.
    assert_eq!(report.financial_metrics.cash_flow.total_expenses, 200.0);
    assert_eq!(report.financial_metrics.cash_flow.total_income, 550.0);
}

#[test]
fn test_llm_style_mapping_with_custom_headers() {
    let mapping: ColumnMapping = serde_json::from_str(
        r#"{
            "date_column": "Posted",
            "amount_column": "Net",
            "category_column": "Bucket",
            "confidence": "medium"
        }"#,
    )
    .unwrap();
    let table = table_from_csv(
        "Posted,Net,Bucket\n2024-05-01,900,Sales\n2024-05-03,-300,Sales refund\n2024-06-01,950,Sales\n",
    );

    let report = analyze(&table, Some(&mapping), "default", BusinessSize::Medium, None).unwrap();
    // A provided mapping keeps the parsed sign instead of guessing from category text.
    assert_eq!(report.financial_metrics.cash_flow.total_expenses, 300.0);
    assert_eq!(report.data_quality.mapping.source, MappingSource::Provided);
}

#[test]
fn test_low_confidence_mapping_falls_back_to_keywords() {
    let mapping = ColumnMapping {
        amount: Some("Category".to_string()),
        confidence: MappingConfidence::None,
        ..Default::default()
    };
    let table = table_from_csv("Date,Amount,Category\n2024-01-01,100,Sales\n");
    let report = analyze(&table, Some(&mapping), "default", BusinessSize::Small, None).unwrap();
    assert_eq!(report.data_quality.mapping.source, MappingSource::Keyword);
    assert_eq!(report.financial_metrics.cash_flow.total_income, 100.0);
}

#[test]
fn test_idempotent_report() {
    let table = table_from_csv(SERVICES_LEDGER);
    let benchmarks = BenchmarkTable::reference();

    let first = analyze(&table, None, "services", BusinessSize::Small, Some(&benchmarks)).unwrap();
    let second = analyze(&table, None, "services", BusinessSize::Small, Some(&benchmarks)).unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.to_csv().unwrap(), second.to_csv().unwrap());
}

#[test]
fn test_row_order_does_not_change_metrics() {
    let original = table_from_csv(SERVICES_LEDGER);

    let mut reversed = original.clone();
    reversed.rows.reverse();

    let mut rotated = original.clone();
    rotated.rows.rotate_left(3);

    let base = run(&original);
    for shuffled in [reversed, rotated] {
        let report = run(&shuffled);
        assert_eq!(
            report.financial_metrics.health_score,
            base.financial_metrics.health_score
        );
        assert_eq!(
            report.financial_metrics.cash_flow,
            base.financial_metrics.cash_flow
        );
        assert_eq!(report.forecast, base.forecast);
    }
}

#[test]
fn test_scenarios_always_six_long_and_ordered() {
    let ledgers = [
        "Date,Amount\n2024-01-01,100\n2024-02-01,-400\n",
        "Date,Amount\n2024-01-01,-100\n2024-02-01,-400\n2024-03-01,-900\n",
        "Date,Amount\n2023-11-01,300\n2024-01-15,300\n2024-02-01,-50\n2024-02-02,75\n",
        SERVICES_LEDGER,
    ];

    for data in ledgers {
        let report = run(&table_from_csv(data));
        let forecast = report.forecast.value().unwrap();
        let s = &forecast.scenario_analysis;

        assert_eq!(forecast.periods.len(), 6);
        assert_eq!(s.optimistic.len(), 6);
        assert_eq!(s.realistic.len(), 6);
        assert_eq!(s.pessimistic.len(), 6);
        for i in 0..6 {
            assert!(s.optimistic[i] >= s.realistic[i], "{:?}", s);
            assert!(s.realistic[i] >= s.pessimistic[i], "{:?}", s);
        }
        assert!(forecast.periods.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_benchmark_comparison_against_reference_table() {
    let benchmarks = BenchmarkTable::reference();
    let report = analyze(
        &table_from_csv(SERVICES_LEDGER),
        None,
        "services",
        BusinessSize::Small,
        Some(&benchmarks),
    )
    .unwrap();

    let comparison = report.benchmark_comparison.value().unwrap();
    assert_eq!(comparison.metrics.len(), 3);

    let margin = &comparison.metrics["profit_margin"];
    assert_eq!(margin.industry_benchmark, 0.15);
    assert_eq!(margin.performance, Performance::Above);
    assert!(margin.percentile > 90.0);

    let expenses = &comparison.metrics["expense_ratio"];
    assert_eq!(expenses.performance, Performance::Below);
    assert!(expenses.percentile > 50.0);
}

#[test]
fn test_unknown_industry_only_degrades_benchmark_section() {
    let benchmarks = BenchmarkTable::reference();
    let report = analyze(
        &table_from_csv(SERVICES_LEDGER),
        None,
        "aerospace",
        BusinessSize::Large,
        Some(&benchmarks),
    )
    .unwrap();

    let err = report.benchmark_comparison.error().unwrap();
    assert_eq!(err.kind, SoftErrorKind::BenchmarkUnavailable);
    assert!(report.forecast.is_available());
    assert_eq!(report.industry, "aerospace");
}

#[test]
fn test_outlier_month_raises_anomaly_warning() {
    let table = table_from_csv(
        "Date,Amount\n\
         2024-01-05,1000\n2024-02-05,1000\n2024-03-05,1000\n2024-04-05,1000\n\
         2024-05-05,1000\n2024-06-05,1000\n2024-07-05,20000\n",
    );
    let report = run(&table);

    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].month, "2024-07");
    assert!(report
        .alerts
        .warning_alerts
        .iter()
        .any(|a| a.category == AlertCategory::Anomaly && a.message.contains("2024-07")));
}

#[test]
fn test_action_items_follow_alert_priority() {
    let table = table_from_csv("Date,Amount\n2024-01-01,100\n2024-01-05,-900\n2024-02-01,100\n2024-02-05,-950\n");
    let report = run(&table);

    let recs = &report.recommendations;
    assert_eq!(recs.immediate_actions.len(), 6);
    assert_eq!(recs.strategic_recommendations.len(), 3);
    assert_eq!(
        report.action_items.len(),
        report.alerts.len() + recs.immediate_actions.len() + recs.strategic_recommendations.len()
    );
    assert_eq!(report.action_items[0].priority, Priority::High);
    assert_eq!(report.action_items[0].category, ActionCategory::Alert);
    assert_eq!(report.action_items[0].timeline, "immediate");
    assert!(report.action_items.iter().any(|a| a.priority == Priority::Medium
        && a.category == ActionCategory::Improvement
        && a.action == "Immediately review and reduce non-essential expenses"
        && a.timeline == "1-2 weeks"));
    assert_eq!(
        report.action_items.last().unwrap().category,
        ActionCategory::Strategic
    );
}

#[test]
fn test_bank_statement_with_running_balance() {
    let table = table_from_csv(
        "Date,Description,Debit,Credit,Balance\n\
         2024-01-03,Opening deposit,,1000,1000\n\
         2024-01-10,Rent,500,,500\n\
         2024-02-02,Client payment,,500,1000\n\
         2024-02-15,Utilities,300,,700\n",
    );
    let report = run(&table);

    let cf = &report.financial_metrics.cash_flow;
    assert_eq!(cf.total_income, 1500.0);
    assert_eq!(cf.total_expenses, 800.0);
    assert_eq!(cf.net_cash_flow, 700.0);
    assert_eq!(report.data_quality.mapping.source, MappingSource::Keyword);
    assert_eq!(report.data_quality.mapping.mapping.amount, None);
}

#[test]
fn test_break_even_in_report() {
    let report = run(&table_from_csv(SERVICES_LEDGER));
    let be = report
        .financial_metrics
        .profitability
        .break_even_analysis
        .value()
        .unwrap();
    assert_eq!(be.current_transactions, 8);
    assert!(be.break_even_transactions > 0.0);
    assert!(be.margin_of_safety > 0.0);

    let losing = run(&table_from_csv(
        "Date,Amount\n2024-01-01,100\n2024-01-05,-900\n",
    ));
    let err = losing
        .financial_metrics
        .profitability
        .break_even_analysis
        .error()
        .unwrap();
    assert_eq!(err.kind, SoftErrorKind::BreakEvenUnavailable);
    assert!(losing.financial_metrics.cash_flow.net_cash_flow < 0.0);
}

#[test]
fn test_exports() {
    let report = run(&table_from_csv(SERVICES_LEDGER));

    let csv_text = report.to_csv().unwrap();
    let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
    assert_eq!(
        rdr.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["Metric", "Value", "Status"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(&rows[0][0], "Cash Flow");
    assert_eq!(&rows[0][1], "$13,900.00");
    assert_eq!(&rows[0][2], "Positive");
    assert!(rows.iter().all(|r| r.len() == 3));

    let text = report.to_text_summary();
    assert!(text.starts_with("FINANCIAL ANALYSIS SUMMARY"));
    assert!(text.contains("OVERALL HEALTH SCORE:"));
    assert!(text.contains("- Cash Flow: $13,900.00"));
}

#[test]
fn test_schema_generation() {
    let schema = Report::schema_as_json().unwrap();
    assert!(schema.contains("scenario_analysis"));
    assert!(schema.contains("health_score"));

    let mapping_schema = ColumnMapping::schema_as_json().unwrap();
    assert!(mapping_schema.contains("confidence"));
}

#[test]
fn test_request_deserializes_from_json() {
    let request: AnalysisRequest = serde_json::from_str(
        r#"{
            "table": {
                "columns": ["date", "amount"],
                "rows": [
                    {"date": "2024-01-01", "amount": 1200.5},
                    {"date": "2024-02-01", "amount": "-$200"}
                ]
            },
            "industry": "retail",
            "benchmarks": {"retail": {"profit_margin": {"industry_benchmark": 0.05}}}
        }"#,
    )
    .unwrap();

    assert_eq!(request.business_size, BusinessSize::Small);
    let report = FinancialAnalyzer::default().analyze(&request).unwrap();
    assert_eq!(report.financial_metrics.cash_flow.total_income, 1200.5);
    assert_eq!(report.financial_metrics.cash_flow.total_expenses, 200.0);
    assert_eq!(
        report.benchmark_comparison.value().unwrap().metrics.len(),
        1
    );
}
