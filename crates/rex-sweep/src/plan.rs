use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rex_core::{keys, stable_hash_string, Configuration, ErrorInfo, Override, RexError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Plan describing how a base configuration fans out into concrete runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Parameter-space strategy.
    pub strategy: SweepStrategy,
    /// Optional seed repetition axis, crossed with every variant.
    #[serde(default)]
    pub seeds: Vec<u64>,
}

/// Supported deterministic sweep strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SweepStrategy {
    /// Cross product over named parameter value lists.
    Grid {
        /// Parameters in declaration order; the first varies slowest.
        parameters: Vec<GridParameter>,
    },
    /// Explicit enumeration of named override sets.
    Runs {
        /// Named runs in declaration order.
        runs: Vec<NamedRun>,
    },
}

/// Grid parameter descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParameter {
    /// Parameter name; must exist on the base configuration.
    pub name: String,
    /// Candidate values; must be non-empty.
    pub values: Vec<Value>,
}

/// One explicitly enumerated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRun {
    /// Label used as the run id (optionally suffixed with the seed).
    pub name: String,
    /// Overrides applied on top of the base configuration.
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl SweepPlan {
    /// Parses a plan from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, RexError> {
        serde_yaml::from_str(text)
            .map_err(|err| RexError::Serde(ErrorInfo::new("plan-parse", err.to_string())))
    }

    /// Loads a plan from a YAML file.
    pub fn load_yaml(path: &Path) -> Result<Self, RexError> {
        let text = fs::read_to_string(path).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("plan-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }
}

/// One concrete run produced by expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRun {
    /// Identifier unique within the batch, stable across re-expansion.
    pub run_id: String,
    /// Overrides applied to the base configuration (seed included).
    pub overrides: Vec<Override>,
    /// Seed assigned from the plan's seed axis, if any.
    pub seed: Option<u64>,
    /// Fully resolved configuration for the run.
    pub config: Configuration,
}

/// Stable hash identifying a (plan, base configuration) pair.
pub fn plan_hash(base: &Configuration, plan: &SweepPlan) -> Result<String, RexError> {
    stable_hash_string(&(base, plan))
}

/// Wraps the base configuration as the sole run of a single-run batch.
pub fn single(base: &Configuration) -> ExpandedRun {
    ExpandedRun {
        run_id: "single".to_string(),
        overrides: Vec::new(),
        seed: None,
        config: base.clone(),
    }
}

/// Expands a base configuration into an ordered sequence of concrete runs.
///
/// Expansion is pure: equal inputs yield runs equal in both value and order,
/// so downstream components may correlate sweep index to outcome. All
/// validation happens before the first run is produced.
pub fn expand(base: &Configuration, plan: &SweepPlan) -> Result<Vec<ExpandedRun>, RexError> {
    validate(base, plan)?;
    let variants = match &plan.strategy {
        SweepStrategy::Grid { parameters } => {
            let mut combos = Vec::new();
            expand_grid(parameters, 0, Vec::new(), &mut combos);
            combos
                .into_iter()
                .enumerate()
                .map(|(idx, overrides)| (format!("job_{idx:04}"), overrides))
                .collect::<Vec<_>>()
        }
        SweepStrategy::Runs { runs } => runs
            .iter()
            .map(|run| (run.name.clone(), run.overrides.clone()))
            .collect(),
    };

    let mut expanded = Vec::new();
    for (label, overrides) in variants {
        if plan.seeds.is_empty() {
            expanded.push(resolve(base, label, overrides, None));
        } else {
            for seed in &plan.seeds {
                let run_id = format!("{label}-seed{seed}");
                expanded.push(resolve(base, run_id, overrides.clone(), Some(*seed)));
            }
        }
    }
    Ok(expanded)
}

fn resolve(
    base: &Configuration,
    run_id: String,
    mut overrides: Vec<Override>,
    seed: Option<u64>,
) -> ExpandedRun {
    if let Some(seed) = seed {
        overrides.push(Override::new(keys::SEED, json!(seed)));
    }
    let config = base.with_overrides(&overrides);
    ExpandedRun {
        run_id,
        overrides,
        seed,
        config,
    }
}

fn expand_grid(
    params: &[GridParameter],
    idx: usize,
    current: Vec<Override>,
    outputs: &mut Vec<Vec<Override>>,
) {
    if idx == params.len() {
        outputs.push(current);
        return;
    }
    let param = &params[idx];
    for value in &param.values {
        let mut next = current.clone();
        next.push(Override::new(param.name.clone(), value.clone()));
        expand_grid(params, idx + 1, next, outputs);
    }
}

fn validate(base: &Configuration, plan: &SweepPlan) -> Result<(), RexError> {
    match &plan.strategy {
        SweepStrategy::Grid { parameters } => {
            let mut seen = BTreeSet::new();
            for param in parameters {
                check_known(base, &param.name)?;
                if param.values.is_empty() {
                    return Err(RexError::Sweep(
                        ErrorInfo::new("sweep-empty-values", "parameter has no candidate values")
                            .with_context("parameter", param.name.clone()),
                    ));
                }
                if !seen.insert(param.name.as_str()) {
                    return Err(RexError::Sweep(
                        ErrorInfo::new("sweep-duplicate-parameter", "parameter listed twice")
                            .with_context("parameter", param.name.clone()),
                    ));
                }
            }
        }
        SweepStrategy::Runs { runs } => {
            if runs.is_empty() {
                return Err(RexError::Sweep(ErrorInfo::new(
                    "sweep-empty-runs",
                    "runs strategy requires at least one named run",
                )));
            }
            let mut seen = BTreeSet::new();
            for run in runs {
                if !seen.insert(run.name.as_str()) {
                    return Err(RexError::Sweep(
                        ErrorInfo::new("sweep-duplicate-run", "run name listed twice")
                            .with_context("run", run.name.clone()),
                    ));
                }
                for entry in &run.overrides {
                    check_known(base, &entry.key)?;
                }
            }
        }
    }
    let mut seen_seeds = BTreeSet::new();
    for seed in &plan.seeds {
        if !seen_seeds.insert(*seed) {
            return Err(RexError::Sweep(
                ErrorInfo::new("sweep-duplicate-seed", "seed listed twice")
                    .with_context("seed", seed.to_string()),
            ));
        }
    }
    Ok(())
}

fn check_known(base: &Configuration, name: &str) -> Result<(), RexError> {
    if base.contains_key(name) {
        return Ok(());
    }
    Err(RexError::Sweep(
        ErrorInfo::new("sweep-unknown-parameter", "parameter absent from base configuration")
            .with_context("parameter", name.to_string())
            .with_hint("sweep keys must name existing base parameters"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Configuration {
        Configuration::from_yaml_str("lr: 0.1\nbatch_size: 32\nseed: 0\n").expect("parse")
    }

    fn grid_plan() -> SweepPlan {
        SweepPlan {
            strategy: SweepStrategy::Grid {
                parameters: vec![
                    GridParameter {
                        name: "lr".to_string(),
                        values: vec![json!(0.1), json!(0.01)],
                    },
                    GridParameter {
                        name: "batch_size".to_string(),
                        values: vec![json!(32), json!(64)],
                    },
                ],
            },
            seeds: vec![],
        }
    }

    #[test]
    fn grid_order_is_first_parameter_slowest() {
        let runs = expand(&base(), &grid_plan()).expect("expand");
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0].run_id, "job_0000");
        assert_eq!(runs[0].config.get("lr"), Some(&json!(0.1)));
        assert_eq!(runs[0].config.get("batch_size"), Some(&json!(32)));
        assert_eq!(runs[1].config.get("batch_size"), Some(&json!(64)));
        assert_eq!(runs[2].config.get("lr"), Some(&json!(0.01)));
    }

    #[test]
    fn seeds_cross_every_variant_innermost() {
        let mut plan = grid_plan();
        plan.seeds = vec![3, 7];
        let runs = expand(&base(), &plan).expect("expand");
        assert_eq!(runs.len(), 8);
        assert_eq!(runs[0].run_id, "job_0000-seed3");
        assert_eq!(runs[1].run_id, "job_0000-seed7");
        assert_eq!(runs[0].config.seed(), Some(3));
        assert_eq!(runs[1].config.seed(), Some(7));
    }

    #[test]
    fn unknown_parameter_is_rejected_before_expansion() {
        let plan = SweepPlan {
            strategy: SweepStrategy::Grid {
                parameters: vec![GridParameter {
                    name: "momentum".to_string(),
                    values: vec![json!(0.9)],
                }],
            },
            seeds: vec![],
        };
        let err = expand(&base(), &plan).unwrap_err();
        assert_eq!(err.info().code, "sweep-unknown-parameter");
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let plan = SweepPlan {
            strategy: SweepStrategy::Grid {
                parameters: vec![GridParameter {
                    name: "lr".to_string(),
                    values: vec![],
                }],
            },
            seeds: vec![],
        };
        let err = expand(&base(), &plan).unwrap_err();
        assert_eq!(err.info().code, "sweep-empty-values");
    }

    #[test]
    fn named_runs_keep_declaration_order() {
        let plan = SweepPlan {
            strategy: SweepStrategy::Runs {
                runs: vec![
                    NamedRun {
                        name: "baseline".to_string(),
                        overrides: vec![],
                    },
                    NamedRun {
                        name: "fast".to_string(),
                        overrides: vec![Override::new("lr", json!(0.5))],
                    },
                ],
            },
            seeds: vec![],
        };
        let runs = expand(&base(), &plan).expect("expand");
        assert_eq!(runs[0].run_id, "baseline");
        assert_eq!(runs[1].run_id, "fast");
        assert_eq!(runs[1].config.get("lr"), Some(&json!(0.5)));
    }

    #[test]
    fn plan_parses_from_yaml() {
        let text = "\
strategy:
  type: grid
  parameters:
    - name: lr
      values: [0.1, 0.01]
seeds: [0, 1]
";
        let plan = SweepPlan::from_yaml_str(text).expect("parse");
        assert_eq!(plan.seeds, vec![0, 1]);
        let runs = expand(&base(), &plan).expect("expand");
        assert_eq!(runs.len(), 4);
    }
}
