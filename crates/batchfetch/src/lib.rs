//! batchfetch — batched, N+1-avoiding data fetching for hierarchical
//! query engines.
//!
//! This is the public meta-crate. Downstream users depend on **batchfetch**
//! only; it re-exports the stable API from `batchfetch-core`.

pub use batchfetch_core as core;

pub use batchfetch_core::{
    error::{ExecuteError, PlanError},
    optimize::{OptimizeOptions, StepRewrite, optimize_step},
    plan::{AccessPath, PlanGraph, StepId, StepNode},
    row::EntityRow,
    sql::SelectQuery,
    step::{ActivationInputs, FetchStep, ParamRef},
    store::{FetchStore, SqlRow, StoreError},
    trace::{ExecContext, FetchTraceEvent, FetchTraceSink},
    value::Value,
};

//
// Prelude
//

pub mod prelude {
    pub use batchfetch_core::prelude::*;
}
