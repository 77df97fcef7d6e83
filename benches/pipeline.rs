//! Pipeline benchmark: telemetry events → snapshot → score → decision
//! (runs on the candidate's machine alongside the exam UI).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use proctor_agent::config::{MonitorConfig, PolicyConfig};
use proctor_agent::risk::{FactorTable, InterventionPolicy, RiskScorer};
use proctor_agent::session::SessionContext;
use proctor_agent::telemetry::{TelemetryAggregator, TelemetryEvent};

fn make_events(n: usize) -> Vec<(TelemetryEvent, i64)> {
    (0..n)
        .map(|i| {
            let ts = i as i64 * 40;
            let event = match i % 5 {
                0 => TelemetryEvent::MouseMove {
                    x: (i % 640) as f64,
                    y: (i % 480) as f64,
                },
                1 => TelemetryEvent::Keystroke,
                2 => TelemetryEvent::TabHidden,
                3 => TelemetryEvent::MouseLeftTop,
                _ => TelemetryEvent::Paste,
            };
            (event, ts)
        })
        .collect()
}

fn bench_aggregate_window(c: &mut Criterion) {
    let events = make_events(100);

    c.bench_function("aggregate_100_events", |b| {
        b.iter(|| {
            let agg = TelemetryAggregator::new(&MonitorConfig::default(), 0);
            for (event, ts) in &events {
                agg.record(black_box(event), *ts);
            }
            black_box(agg.snapshot(5_000))
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let events = make_events(100);
    let scorer = RiskScorer::new(FactorTable::default());
    let policy = InterventionPolicy::new(PolicyConfig::default());
    let ctx = SessionContext::new();

    c.bench_function("full_pipeline_events_to_decision", |b| {
        b.iter(|| {
            let agg = TelemetryAggregator::new(&MonitorConfig::default(), 0);
            for (event, ts) in &events {
                agg.record(event, *ts);
            }
            let sample = agg.snapshot(5_000).expect("window has violations");
            let assessment = scorer.calculate(&sample);
            black_box(policy.recommend(assessment.score, &ctx, 5_000))
        })
    });
}

criterion_group!(benches, bench_aggregate_window, bench_full_pipeline);
criterion_main!(benches);
