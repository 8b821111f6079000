//! Daily follow-up report over the seeded sample portfolio.
//!
//! Builds the engine with the in-memory data source and the offline model
//! client, prints the ranked follow-up queue for a date, then runs a full
//! analysis of the queue's top customer.
//!
//! ```text
//! cargo run --bin daily_report            # defaults to 2025-08-21
//! cargo run --bin daily_report 2025-09-01
//! RUST_LOG=debug cargo run --bin daily_report
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use miette::Result;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use followgraph::config::EngineConfig;
use followgraph::engine::FollowUpEngine;
use followgraph::invoker::OfflineClient;
use followgraph::sources::InMemorySource;

fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        // Log when spans are created/closed so instrumented async boundaries show up
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,followgraph=info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    miette::set_panic_hook();

    let date: NaiveDate = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .map_err(|e| miette::miette!("bad date {arg:?}: {e}"))?,
        None => "2025-08-21".parse().expect("literal date parses"),
    };

    let config = EngineConfig::from_env()?;
    let engine = FollowUpEngine::new(
        config,
        Arc::new(InMemorySource::with_sample_data()),
        Arc::new(OfflineClient),
    )?;

    info!(%date, "building daily follow-up queue");
    let queue = engine.daily_followups(date).await?;

    println!("\nDaily follow-up queue for {date}");
    println!("{:-<72}", "");
    println!(
        "{:<4} {:<8} {:<22} {:>4} {:>6} {:>6}  {}",
        "#", "id", "customer", "prio", "churn", "rfm", "action"
    );
    for (i, entry) in queue.entries.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:<22} {:>4} {:>6.2} {:>6}  {}",
            i + 1,
            entry.customer_id,
            entry.name,
            entry.priority,
            entry.churn_risk,
            entry.rfm,
            entry.action
        );
    }

    let Some(top) = queue.entries.first() else {
        println!("\nNo customers to follow up today.");
        return Ok(());
    };

    info!(customer = %top.customer_id, "running full analysis for the top entry");
    let report = engine.analyze_as_of(&top.customer_id, date).await?;

    println!("\nAnalysis for {} ({})", report.customer_name, report.customer_id);
    println!("{:-<72}", "");
    println!(
        "scores: rfm={} churn_risk={:.3} priority={}",
        report.scores.rfm, report.scores.churn_risk, report.scores.priority
    );
    println!("summary: {}", report.summary);
    println!("recommendations:");
    for rec in &report.recommendations {
        println!("  - {}: {}", rec.action, rec.reason);
    }
    if !report.degraded_stages.is_empty() {
        println!("degraded stages: {:?}", report.degraded_stages);
    }
    println!(
        "stages run: {}, total cost: ${:.6}",
        report.stage_results.len(),
        report.total_cost_usd
    );

    Ok(())
}
