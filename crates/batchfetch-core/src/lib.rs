//! Core runtime for batchfetch: values, entity metadata, the plan graph,
//! batched fetch steps, record handles, and the optimizer.
//!
//! The crate sits between a hierarchical query-execution engine and a
//! relational store: many concurrent "find records matching this tuple"
//! calls collapse into one correlated query per activation, results are
//! redistributed per call, and single-valued child fetches fold into their
//! parent's query where structurally safe.

pub mod error;
pub mod model;
pub mod optimize;
pub mod plan;
pub mod row;
pub mod sql;
pub mod step;
pub mod store;
pub mod trace;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
///

pub mod prelude {
    pub use crate::{
        model::{ColumnKind, ColumnModel, EntityModel, RelationModel},
        plan::{PlanGraph, StepId},
        value::Value,
    };
}
