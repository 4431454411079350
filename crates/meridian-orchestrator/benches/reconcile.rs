//! Orchestrator Benchmarks
//!
//! - Pool reconciliation across tier changes
//! - Cycle selection

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use meridian_common::{AgentKind, RevenueLedger, RiskState};
use meridian_darwinian::{DarwinianConfig, EvolutionEngine};
use meridian_orchestrator::config::{PoolSettings, SchedulerSettings};
use meridian_orchestrator::{AgentPool, CycleScheduler};
use rust_decimal::Decimal;

// ============ POOL BENCHMARKS ============

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    let dna = match EvolutionEngine::new(DarwinianConfig::default()) {
        Ok(engine) => engine.population().to_vec(),
        Err(_) => return,
    };
    let risk = RiskState::new(Decimal::from(500), Decimal::from(1000));
    let preference = AgentKind::ALL.to_vec();

    for realized in [150i64, 750, 2500].iter() {
        let ledger = RevenueLedger::with_realized(Decimal::from(200), Decimal::from(*realized));
        group.bench_with_input(BenchmarkId::new("scale_up_from_empty", realized), realized, |b, _| {
            b.iter_batched(
                || AgentPool::new(PoolSettings::default()),
                |mut pool| {
                    let _ = pool.reconcile(black_box(&ledger), &risk, &dna, &preference);
                    pool
                },
                BatchSize::SmallInput,
            );
        });
    }

    let high = RevenueLedger::with_realized(Decimal::from(200), Decimal::from(2500));
    let low = RevenueLedger::with_realized(Decimal::from(200), Decimal::ZERO);
    group.bench_function("scale_down_20_to_1", |b| {
        b.iter_batched(
            || {
                let mut pool = AgentPool::new(PoolSettings::default());
                let _ = pool.reconcile(&high, &risk, &dna, &preference);
                pool
            },
            |mut pool| {
                let _ = pool.reconcile(black_box(&low), &risk, &dna, &preference);
                pool
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============ SCHEDULER BENCHMARKS ============

fn bench_select_next_cycle(c: &mut Criterion) {
    let risk = RiskState::new(Decimal::from(500), Decimal::from(1000));
    let settings = SchedulerSettings::default();
    let now = Utc::now();
    c.bench_function("scheduler/select_100_cycles", |b| {
        b.iter_batched(
            || CycleScheduler::new(&settings),
            |mut scheduler| {
                for _ in 0..100 {
                    scheduler.select_next_cycle(black_box(&risk), black_box(0.35), now);
                }
                scheduler
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_reconcile, bench_select_next_cycle);
criterion_main!(benches);
