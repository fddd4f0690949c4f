use criterion::{criterion_group, criterion_main, Criterion};
use rex_core::Configuration;
use rex_sweep::{expand, GridParameter, SweepPlan, SweepStrategy};
use serde_json::json;

fn make_base() -> Configuration {
    Configuration::from_yaml_str("lr: 0.1\ndepth: 2\nwidth: 128\nseed: 0\n").expect("parse")
}

fn make_plan() -> SweepPlan {
    SweepPlan {
        strategy: SweepStrategy::Grid {
            parameters: vec![
                GridParameter {
                    name: "lr".to_string(),
                    values: (0..10).map(|i| json!(0.1 / (i + 1) as f64)).collect(),
                },
                GridParameter {
                    name: "depth".to_string(),
                    values: (1..9).map(|i| json!(i)).collect(),
                },
                GridParameter {
                    name: "width".to_string(),
                    values: vec![json!(64), json!(128), json!(256)],
                },
            ],
        },
        seeds: vec![0, 1, 2],
    }
}

fn bench_expand(c: &mut Criterion) {
    let base = make_base();
    let plan = make_plan();
    c.bench_function("expand_grid_720_runs", |b| {
        b.iter(|| expand(&base, &plan).expect("expand"))
    });
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
