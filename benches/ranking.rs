//! Benchmarks for the pure scoring and ranking paths.
//!
//! These benchmarks measure the performance of:
//! - Order statistics derivation over growing histories
//! - RFM/churn/priority scoring
//! - Follow-up ranking over growing portfolios

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use followgraph::analysis::{rule_based_recommendations, score_set, OrderStats};
use followgraph::config::ScoringConfig;
use followgraph::models::{OrderRecord, ScoreSet};
use followgraph::ranking::rank;
use rustc_hash::FxHashMap;

fn bench_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 21).expect("valid bench date")
}

/// Deterministic synthetic order history of the given length.
fn build_orders(count: usize) -> Vec<OrderRecord> {
    (0..count)
        .map(|i| {
            let day = (i % 28) + 1;
            let month = (i % 7) + 2;
            OrderRecord::new(
                "C001",
                &format!("SO-{i:05}"),
                &format!("2025-{month:02}-{day:02}"),
                "CAKE-CHOC",
                (i % 12) as u32 + 1,
                1.5 + (i % 40) as f64 * 0.25,
            )
        })
        .collect()
}

/// Deterministic synthetic portfolio scores of the given size.
fn build_scores(count: usize) -> FxHashMap<String, ScoreSet> {
    (0..count)
        .map(|i| {
            (
                format!("C{i:05}"),
                ScoreSet {
                    rfm: ((i * 37) % 101) as u8,
                    churn_risk: ((i * 13) % 100) as f64 / 100.0,
                    priority: ((i * 7) % 5) as u8 + 1,
                },
            )
        })
        .collect()
}

fn bench_order_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_stats");

    for size in [10, 100, 1000] {
        let orders = build_orders(size);
        group.bench_with_input(BenchmarkId::new("from_orders", size), &orders, |b, orders| {
            b.iter(|| OrderStats::from_orders(orders, bench_date()));
        });
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let config = ScoringConfig::default();

    for size in [1, 10, 100] {
        let stats = OrderStats::from_orders(&build_orders(size), bench_date());

        group.bench_with_input(BenchmarkId::new("score_set", size), &stats, |b, stats| {
            b.iter(|| score_set(stats, &config));
        });

        let scores = score_set(&stats, &config);
        group.bench_with_input(
            BenchmarkId::new("rule_table", size),
            &(stats, scores),
            |b, (stats, scores)| {
                b.iter(|| {
                    rule_based_recommendations(stats, scores.rfm, scores.churn_risk, &config)
                });
            },
        );
    }

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");

    for size in [10, 100, 1000, 10_000] {
        let scores = build_scores(size);
        group.bench_with_input(BenchmarkId::new("portfolio", size), &scores, |b, scores| {
            b.iter(|| rank(scores));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_order_stats, bench_scoring, bench_rank);
criterion_main!(benches);
