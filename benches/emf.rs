//! EMF query benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emf_engine::engine::EmfContext;
use emf_engine::sales::SalesGenerator;
use emf_engine::spec::QuerySpec;

fn state_comparison(n: usize) -> QuerySpec {
    let states = ["NY", "NJ", "CT", "PA"];
    let ids: Vec<String> = (1..=n).map(|i| format!("{}_avg_quant", i)).collect();
    let conditions: Vec<String> = (1..=n)
        .map(|i| format!("{}.state='{}'", i, states[(i - 1) % states.len()]))
        .collect();
    let mut select = vec!["cust".to_string(), "prod".to_string()];
    select.extend(ids.iter().cloned());

    QuerySpec::try_new(select, n, vec!["cust".to_string(), "prod".to_string()], ids, conditions, "-")
        .unwrap()
}

fn benchmark_scans(c: &mut Criterion) {
    let rows = SalesGenerator::new(50_000).generate_rows().unwrap();
    let ctx = EmfContext::new();

    let mut group = c.benchmark_group("emf");
    group.sample_size(10);

    for n in [1, 2, 4] {
        let spec = state_comparison(n);
        group.bench_with_input(BenchmarkId::new("grouping_vars", n), &spec, |b, spec| {
            b.iter(|| {
                let result = ctx.execute(&rows, spec.clone()).unwrap();
                black_box(result.row_count());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_scans);
criterion_main!(benches);
