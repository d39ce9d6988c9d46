//! Criterion benchmarks for the calc hot paths.
//!
//! Benchmarks:
//! 1. Panel pivot from long warehouse rows
//! 2. Scheduled simulation over a year of prices
//! 3. Attribution over the benchmark universe

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use mptrack_core::allocation::{RebalanceSchedule, Target};
use mptrack_core::attribution::{attribute, AttributionInputs};
use mptrack_core::domain::{Aggregation, Observation, Panel, Series};
use mptrack_core::engine::{simulate, RebalancePolicy};

// ── Helpers ──────────────────────────────────────────────────────────

fn ticker(i: usize) -> String {
    let a = (b'A' + (i / 676 % 26) as u8) as char;
    let b = (b'A' + (i / 26 % 26) as u8) as char;
    let c = (b'A' + (i % 26) as u8) as char;
    format!("{a}{b}{c}")
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
}

fn make_observations(n_tickers: usize, n_days: usize, value: fn(usize, usize) -> f64) -> Vec<Observation> {
    (0..n_tickers)
        .flat_map(|t| {
            (0..n_days).map(move |d| {
                Observation::new(start() + Duration::days(d as i64), ticker(t), value(t, d))
            })
        })
        .collect()
}

fn price(t: usize, d: usize) -> f64 {
    20.0 + t as f64 * 0.5 + ((d + t) as f64 * 0.1).sin() * 2.0
}

fn cap(t: usize, _d: usize) -> f64 {
    1_000.0 + t as f64 * 10.0
}

fn make_schedule(n_holdings: usize, n_days: usize) -> RebalanceSchedule {
    let targets = (0..4)
        .map(|k| Target {
            date: start() + Duration::days((k * n_days / 4) as i64),
            weights: (0..n_holdings)
                .map(|t| (ticker(t * 3), 1.0 + ((t + k) % 5) as f64))
                .collect::<BTreeMap<_, _>>(),
            cash: 2.0,
        })
        .collect();
    RebalanceSchedule::new(targets).unwrap()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_pivot(c: &mut Criterion) {
    let mut group = c.benchmark_group("pivot");
    for n_tickers in [50, 400] {
        let obs = make_observations(n_tickers, 250, price);
        group.bench_with_input(BenchmarkId::new("tickers", n_tickers), &obs, |b, obs| {
            b.iter(|| Panel::from_observations(black_box(obs), Aggregation::Mean).forward_fill())
        });
    }
    group.finish();
}

fn bench_simulate(c: &mut Criterion) {
    let prices = Panel::from_observations(&make_observations(400, 250, price), Aggregation::Mean);
    let schedule = make_schedule(30, 250);
    c.bench_function("simulate_30_holdings_250_days", |b| {
        b.iter(|| simulate(black_box(&schedule), black_box(&prices), RebalancePolicy::Scheduled))
    });
}

fn bench_attribution(c: &mut Criterion) {
    let prices = Panel::from_observations(&make_observations(400, 250, price), Aggregation::Mean);
    let caps = Panel::from_observations(&make_observations(400, 250, cap), Aggregation::Last);
    let benchmark = Series::from_points(
        (0..250)
            .map(|d| (start() + Duration::days(d), 1_200.0 + d as f64))
            .collect(),
    );
    let schedule = make_schedule(30, 250);
    let model = simulate(&schedule, &prices, RebalancePolicy::Scheduled).unwrap();
    let baseline = simulate(&schedule, &prices, RebalancePolicy::BuyAndHold).unwrap();
    let universe: Vec<String> = prices.tickers().to_vec();

    c.bench_function("attribute_400_tickers_250_days", |b| {
        b.iter(|| {
            attribute(black_box(&AttributionInputs {
                model: &model,
                baseline: &baseline,
                prices: &prices,
                caps: &caps,
                benchmark: &benchmark,
                universe: &universe,
            }))
        })
    });
}

criterion_group!(benches, bench_pivot, bench_simulate, bench_attribution);
criterion_main!(benches);
