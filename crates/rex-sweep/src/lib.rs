//! Deterministic sweep expansion for rex orchestration batches.

mod plan;

pub use plan::{
    expand, plan_hash, single, ExpandedRun, GridParameter, NamedRun, SweepPlan, SweepStrategy,
};
