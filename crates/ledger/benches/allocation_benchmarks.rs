use chrono::{Duration, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use opsdesk_core::ClientId;
use opsdesk_ledger::{ScheduleItem, plan_allocations};

fn build_schedules(count: u32) -> Vec<ScheduleItem> {
    let client = ClientId::new();
    let now = Utc::now();
    (0..count)
        .map(|i| {
            ScheduleItem::new(
                client,
                i + 1,
                Decimal::new(250_00, 2),
                now + Duration::days(i as i64 * 30),
                None,
                "bench",
            )
        })
        .collect()
}

fn bench_fifo_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    for count in [12u32, 120, 1_200] {
        let schedules = build_schedules(count);
        // Sweep covering roughly half the outstanding balance.
        let amount = Decimal::new(250_00 * count as i64 / 2, 2);

        group.bench_function(format!("fifo_plan_{count}_schedules"), |b| {
            b.iter(|| plan_allocations(black_box(&schedules), black_box(amount)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fifo_plan);
criterion_main!(benches);
