//! Arena-backed plan graph.
//!
//! Steps live in one arena and refer to each other through stable `StepId`
//! handles, so identity and dependency edges survive optimization rewrites.
//! Mutation happens only during the single-threaded construction and
//! optimization phase; execution reads the graph immutably.

use crate::{
    error::PlanError,
    model::EntityModel,
    step::{FetchStep, RecordStep},
    value::Value,
};
use std::fmt;

///
/// StepId
/// Stable arena handle for one plan node.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StepId(usize);

impl StepId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step#{}", self.0)
    }
}

///
/// AccessPath
///
/// What an access node extracts from its source's per-call value: a named
/// column, or the nested row an inlined to-one join produced.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccessPath {
    Column(String),
    Nested(String),
}

///
/// StepNode
///
/// One arena slot. `Constant` and `Input` are the two leaf value sources;
/// `Access` over a record is a "column read off a specific row", which is
/// what join-inlining eligibility pattern-matches on.
///

pub enum StepNode {
    /// Statically known value, identical for every call.
    Constant(Value),

    /// Engine-supplied per-call value slot.
    Input,

    /// Batched fetch step.
    Fetch(FetchStep),

    /// First row of each call's result list.
    First { source: StepId },

    /// One row per item of a call's result list (engine fan-out).
    Item { source: StepId },

    /// Record handle over one pending row.
    Record(RecordStep),

    /// Deferred extraction from a row-producing source.
    Access { source: StepId, path: AccessPath },

    /// Opaque cursor over a primary-key value.
    Cursor {
        value: StepId,
        pk_column: &'static str,
    },

    /// Node removed by the optimizer; consumers were rewired.
    Elided { replaced_by: Option<StepId> },
}

impl StepNode {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Input => "input",
            Self::Fetch(_) => "fetch",
            Self::First { .. } => "first",
            Self::Item { .. } => "item",
            Self::Record(_) => "record",
            Self::Access { .. } => "access",
            Self::Cursor { .. } => "cursor",
            Self::Elided { .. } => "elided",
        }
    }
}

///
/// PlanGraph
///

#[derive(Default)]
pub struct PlanGraph {
    nodes: Vec<StepNode>,
}

impl PlanGraph {
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, node: StepNode) -> StepId {
        let id = StepId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn node(&self, id: StepId) -> &StepNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: StepId) -> &mut StepNode {
        &mut self.nodes[id.0]
    }

    /// Iterate all nodes with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (StepId, &StepNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (StepId(i), n))
    }

    /// Follow elision redirects to the live node.
    #[must_use]
    pub fn resolve(&self, mut id: StepId) -> StepId {
        while let StepNode::Elided {
            replaced_by: Some(next),
        } = self.node(id)
        {
            id = *next;
        }
        id
    }

    // ---- leaf value sources ----

    pub fn constant(&mut self, value: Value) -> StepId {
        self.push(StepNode::Constant(value))
    }

    pub fn input(&mut self) -> StepId {
        self.push(StepNode::Input)
    }

    // ---- fetch steps ----

    /// Create a batched fetch step for `entity` with the given filter
    /// specification (column name, per-call value source).
    pub fn fetch(
        &mut self,
        entity: &'static EntityModel,
        filter: &[(&str, StepId)],
        guaranteed_to_exist: bool,
    ) -> Result<StepId, PlanError> {
        let step = FetchStep::build(entity, filter, guaranteed_to_exist)?;
        Ok(self.push(StepNode::Fetch(step)))
    }

    /// Borrow a fetch step.
    pub fn fetch_ref(&self, id: StepId) -> Result<&FetchStep, PlanError> {
        match self.node(self.resolve(id)) {
            StepNode::Fetch(step) => Ok(step),
            _ => Err(PlanError::NodeKindMismatch {
                id,
                expected: "fetch",
            }),
        }
    }

    /// Mutably borrow a fetch step (construction/optimization phase only).
    pub fn fetch_mut(&mut self, id: StepId) -> Result<&mut FetchStep, PlanError> {
        let live = self.resolve(id);
        match self.node_mut(live) {
            StepNode::Fetch(step) => Ok(step),
            _ => Err(PlanError::NodeKindMismatch {
                id,
                expected: "fetch",
            }),
        }
    }

    /// Deep-copy a fetch step. The copy shares value producers but owns a
    /// fresh dependency list, filter spec, alias registry, conditions, and
    /// parameters, so specializing it never disturbs the original.
    pub fn clone_fetch(&mut self, id: StepId) -> Result<StepId, PlanError> {
        let step = self.fetch_ref(id)?.clone();
        Ok(self.push(StepNode::Fetch(step)))
    }

    // ---- records ----

    /// Restrict to the first row of each call's result and wrap it in a
    /// record handle.
    pub fn single(&mut self, fetch_id: StepId) -> Result<StepId, PlanError> {
        let one = self.constant(Value::Int(1));
        let entity = {
            let step = self.fetch_mut(fetch_id)?;
            step.set_first(one);
            step.entity()
        };
        let first = self.push(StepNode::First { source: fetch_id });
        Ok(self.push(StepNode::Record(RecordStep::new(first, fetch_id, entity))))
    }

    /// Wrap one item of a call's result list in a record handle (the
    /// engine's list fan-out hook).
    pub fn item_record(&mut self, fetch_id: StepId) -> Result<StepId, PlanError> {
        let entity = self.fetch_ref(fetch_id)?.entity();
        let item = self.push(StepNode::Item { source: fetch_id });
        Ok(self.push(StepNode::Record(RecordStep::new(item, fetch_id, entity))))
    }

    fn record_ref(&self, id: StepId) -> Result<&RecordStep, PlanError> {
        match self.node(self.resolve(id)) {
            StepNode::Record(record) => Ok(record),
            _ => Err(PlanError::NodeKindMismatch {
                id,
                expected: "record",
            }),
        }
    }

    /// Column access on a record handle.
    ///
    /// When the column is part of the owning step's filter specification
    /// (and compares exactly), the value that fed the fetch is already
    /// known: the producing step is returned directly instead of a
    /// deferred row access. Otherwise the read is recorded for projection
    /// pruning and a deferred access node is returned.
    pub fn record_get(&mut self, record_id: StepId, column: &str) -> Result<StepId, PlanError> {
        let record = self.record_ref(record_id)?;
        let entity = record.entity();
        let fetch_id = record.fetch();

        let column_model = entity
            .column(column)
            .ok_or_else(|| PlanError::unknown_column(entity.path, column))?;

        if column_model.exact_equality {
            let step = self.fetch_ref(fetch_id)?;
            if let Some(entry) = step.filter_entry(column) {
                return Ok(step.dep_producer(entry.dep));
            }
        }

        let live = self.resolve(record_id);
        let StepNode::Record(record) = self.node_mut(live) else {
            return Err(PlanError::NodeKindMismatch {
                id: record_id,
                expected: "record",
            });
        };
        record.note_requested(column);

        Ok(self.push(StepNode::Access {
            source: record_id,
            path: AccessPath::Column(column.to_string()),
        }))
    }

    /// Opaque cursor for a record. Requires the entity kind to declare
    /// exactly one primary-key column.
    pub fn record_cursor(&mut self, record_id: StepId) -> Result<StepId, PlanError> {
        let entity = self.record_ref(record_id)?.entity();
        let &[pk_column] = entity.primary_key else {
            return Err(PlanError::CursorRequiresSinglePrimaryKey {
                entity: entity.path,
                found: entity.primary_key.len(),
            });
        };

        let value = self.record_get(record_id, pk_column)?;
        Ok(self.push(StepNode::Cursor { value, pk_column }))
    }

    /// Handle-level optimization: push the record's accumulated requested
    /// columns onto the owning fetch step, then elide the handle itself —
    /// it adds nothing beyond column redirection, so consumers are rewired
    /// to the underlying row-producing dependency.
    pub fn record_optimize(&mut self, record_id: StepId) -> Result<(), PlanError> {
        let (requested, source, fetch_id) = match self.node(record_id) {
            StepNode::Record(record) => (
                record.requested().clone(),
                record.source(),
                record.fetch(),
            ),
            // Already elided: re-optimizing is a no-op.
            StepNode::Elided { .. } => return Ok(()),
            _ => {
                return Err(PlanError::NodeKindMismatch {
                    id: record_id,
                    expected: "record",
                });
            }
        };

        self.fetch_mut(fetch_id)?.merge_requested(requested);
        self.redirect(record_id, source);
        *self.node_mut(record_id) = StepNode::Elided {
            replaced_by: Some(source),
        };

        Ok(())
    }

    // ---- rewiring ----

    /// Rewrite every dependency reference from `from` to `to`.
    pub(crate) fn redirect(&mut self, from: StepId, to: StepId) {
        for node in &mut self.nodes {
            match node {
                StepNode::Fetch(step) => step.redirect_deps(from, to),
                StepNode::First { source } | StepNode::Item { source } => {
                    if *source == from {
                        *source = to;
                    }
                }
                StepNode::Record(record) => record.redirect(from, to),
                StepNode::Access { source, .. } => {
                    if *source == from {
                        *source = to;
                    }
                }
                StepNode::Cursor { value, .. } => {
                    if *value == from {
                        *value = to;
                    }
                }
                StepNode::Constant(_) | StepNode::Input | StepNode::Elided { .. } => {}
            }
        }
    }

    /// Replace a node in place, keeping its identity.
    pub(crate) fn replace(&mut self, id: StepId, node: StepNode) {
        self.nodes[id.0] = node;
    }
}

///
/// TESTS
///
