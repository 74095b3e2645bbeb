use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use libsql_bridge::prelude::*;
use libsql_bridge::routing::detect_query_type;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

// Deterministic mix of statements shaped like what hosts send through the bridge
fn generate_statements(count: usize) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|i| match rng.random_range(0..6) {
            0 => format!("SELECT a, b, c FROM t{i} WHERE id = ?1 AND note <> 'returning'"),
            1 => format!(
                "INSERT INTO t{i} (a, b) VALUES (?1, ?2) -- returning id\n",
            ),
            2 => format!(
                "UPDATE t{i} SET b = :b WHERE a > {} RETURNING a, b",
                rng.random_range(1..1000)
            ),
            3 => format!(
                "/* batch {i} */ WITH recent AS (SELECT * FROM t WHERE ts > '{}') SELECT count(*) FROM recent",
                rng.random_range(2020..=2025)
            ),
            4 => format!("DELETE FROM \"returning\" WHERE id = {}", rng.random_range(1..1000)),
            _ => {
                let padding: String = (0..rng.random_range(10..200)).map(|_| 'x').collect();
                format!("INSERT INTO notes (body) VALUES ('{padding}')")
            }
        })
        .collect()
}

fn classify_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for count in [100, 1_000] {
        let statements = generate_statements(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &statements, |b, stmts| {
            b.iter(|| {
                let mut rows = 0usize;
                for sql in stmts {
                    if classify(black_box(sql)) == StatementKind::Rows {
                        rows += 1;
                    }
                }
                rows
            });
        });
    }
    group.finish();

    let statements = generate_statements(1_000);
    c.bench_function("detect_query_type/1000", |b| {
        b.iter(|| {
            for sql in &statements {
                black_box(detect_query_type(black_box(sql)));
            }
        });
    });
}

criterion_group!(benches, classify_benchmark);
criterion_main!(benches);
