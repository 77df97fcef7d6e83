//! Scorer benchmark: weighted scoring and policy decision hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use proctor_agent::config::PolicyConfig;
use proctor_agent::risk::{
    BehaviorFactor, BehaviorSample, FactorTable, InterventionPolicy, RiskScorer,
};
use proctor_agent::session::SessionContext;

fn full_sample() -> BehaviorSample {
    let mut s = BehaviorSample::new();
    s.set(BehaviorFactor::TabSwitch, 2.0)
        .set(BehaviorFactor::MouseLeave, 1.0)
        .set(BehaviorFactor::Inactivity, 45.0)
        .set(BehaviorFactor::RapidMovement, 12.5)
        .set(BehaviorFactor::CopyPaste, 1.0);
    s
}

fn bench_calculate(c: &mut Criterion) {
    let scorer = RiskScorer::new(FactorTable::default());
    let sample = full_sample();

    c.bench_function("risk_score_full_sample", |b| {
        b.iter(|| black_box(scorer.calculate(black_box(&sample))))
    });
}

fn bench_recommend(c: &mut Criterion) {
    let policy = InterventionPolicy::new(PolicyConfig::default());
    let mut ctx = SessionContext::new();
    for i in 0..50 {
        ctx.record_violation(i * 10_000, 40);
    }

    c.bench_function("intervention_recommend", |b| {
        b.iter(|| black_box(policy.recommend(black_box(55), &ctx, 600_000)))
    });
}

criterion_group!(benches, bench_calculate, bench_recommend);
criterion_main!(benches);
