use proptest::prelude::*;
use rex_core::{to_canonical_json_bytes, Configuration};
use rex_sweep::{expand, plan_hash, GridParameter, SweepPlan, SweepStrategy};
use serde_json::json;

fn base() -> Configuration {
    Configuration::from_yaml_str("lr: 0.1\ndepth: 2\nseed: 0\n").expect("parse")
}

fn plan() -> SweepPlan {
    SweepPlan {
        strategy: SweepStrategy::Grid {
            parameters: vec![
                GridParameter {
                    name: "lr".to_string(),
                    values: vec![json!(0.1), json!(0.01), json!(0.001)],
                },
                GridParameter {
                    name: "depth".to_string(),
                    values: vec![json!(2), json!(4)],
                },
            ],
        },
        seeds: vec![0, 1],
    }
}

#[test]
fn expansion_repeats_in_value_and_order() {
    let runs_a = expand(&base(), &plan()).expect("expand");
    let runs_b = expand(&base(), &plan()).expect("expand");
    assert_eq!(runs_a, runs_b);
    let bytes_a = to_canonical_json_bytes(&runs_a).expect("json");
    let bytes_b = to_canonical_json_bytes(&runs_b).expect("json");
    assert_eq!(bytes_a, bytes_b);
    assert_eq!(runs_a.len(), 12);
    assert_eq!(
        plan_hash(&base(), &plan()).expect("hash"),
        plan_hash(&base(), &plan()).expect("hash")
    );
}

#[test]
fn every_generated_config_round_trips() {
    for run in expand(&base(), &plan()).expect("expand") {
        let yaml = run.config.to_yaml_string().expect("serialize");
        let parsed = Configuration::from_yaml_str(&yaml).expect("parse");
        assert_eq!(parsed, run.config, "run {}", run.run_id);
        assert_eq!(parsed.seed(), run.seed);
    }
}

proptest! {
    #[test]
    fn run_ids_are_unique_for_any_grid(values in prop::collection::vec(0u32..100, 1..6),
                                       seeds in prop::collection::btree_set(0u64..32, 0..4)) {
        let plan = SweepPlan {
            strategy: SweepStrategy::Grid {
                parameters: vec![GridParameter {
                    name: "lr".to_string(),
                    values: values.iter().map(|v| json!(v)).collect(),
                }],
            },
            seeds: seeds.into_iter().collect(),
        };
        let runs = expand(&base(), &plan).expect("expand");
        let mut ids: Vec<_> = runs.iter().map(|r| r.run_id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), runs.len());
    }
}
