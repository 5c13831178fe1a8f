//! Plan optimization: best-effort local rewrites, invoked once per step.
//!
//! Three rewrites, in order: short-circuit a guaranteed-existence fetch
//! whose requested columns are all filter inputs; fold a single-valued
//! child fetch into its parent's query as an optional to-one join; prune
//! a surviving step's projection to the columns its record handles
//! actually read. Unmet preconditions fall back to the independent fetch;
//! they are never errors. The pass is a fixed point: re-optimizing an
//! optimized step changes nothing.

#[cfg(test)]
mod proptests;

use crate::{
    error::PlanError,
    model::EntityModel,
    plan::{AccessPath, PlanGraph, StepId, StepNode},
    sql::ROOT_ALIAS,
    step::fetch::{AliasKind, ExecMode, FetchStep, LeftOneJoin},
    value::StorageClass,
};
use std::collections::BTreeSet;

///
/// OptimizeOptions
///

#[derive(Clone, Copy, Debug)]
pub struct OptimizeOptions {
    pub inline_joins: bool,
    pub prune_projection: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            inline_joins: true,
            prune_projection: true,
        }
    }
}

impl OptimizeOptions {
    #[must_use]
    pub const fn without_inline_joins(mut self) -> Self {
        self.inline_joins = false;
        self
    }

    #[must_use]
    pub const fn without_projection_pruning(mut self) -> Self {
        self.prune_projection = false;
        self
    }
}

///
/// StepRewrite
/// Outcome of optimizing one fetch step.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepRewrite {
    /// The step executes independently (projection possibly pruned).
    Independent { pruned: bool },

    /// No query is needed; results are synthesized from filter inputs.
    ShortCircuit,

    /// The step was folded into `parent` under `alias`.
    InlinedInto { parent: StepId, alias: String },

    /// A previous pass already rewrote this step.
    AlreadyRewritten,
}

/// Optimize one batched fetch step.
pub fn optimize_step(
    graph: &mut PlanGraph,
    id: StepId,
    options: &OptimizeOptions,
) -> Result<StepRewrite, PlanError> {
    match graph.node(id) {
        StepNode::Fetch(_) => {}
        StepNode::Elided { .. } | StepNode::Access { .. } => {
            return Ok(StepRewrite::AlreadyRewritten);
        }
        _ => {
            return Err(PlanError::NodeKindMismatch {
                id,
                expected: "fetch",
            });
        }
    }

    // Guaranteed existence + every requested column already known from
    // the filter specification: no query needed at all.
    {
        let step = graph.fetch_ref(id)?;
        if step.mode() == ExecMode::Synthesize {
            return Ok(StepRewrite::ShortCircuit);
        }
        if step.is_guaranteed() && !step.filter().is_empty() && requested_covered_by_filter(step) {
            graph.fetch_mut(id)?.set_mode(ExecMode::Synthesize);
            return Ok(StepRewrite::ShortCircuit);
        }
    }

    // Fold a pure foreign-key child fetch into its parent.
    if options.inline_joins
        && let Some(plan) = inline_candidate(graph, id)?
    {
        let parent = plan.parent_fetch;
        let alias = plan.alias.to_string();
        apply_inline(graph, id, plan)?;
        return Ok(StepRewrite::InlinedInto { parent, alias });
    }

    // Retrieve only what record handles actually read.
    let pruned = options.prune_projection && prune_projection(graph, id)?;

    Ok(StepRewrite::Independent { pruned })
}

// Every requested column must be an exact-equality filter column; synthesis
// substitutes the filter input for the stored value, which is only sound
// under collation-stable comparison.
fn requested_covered_by_filter(step: &FetchStep) -> bool {
    step.requested().iter().all(|column| {
        step.filter_entry(column)
            .is_some_and(|entry| entry.column.exact_equality)
    })
}

fn prune_projection(graph: &mut PlanGraph, id: StepId) -> Result<bool, PlanError> {
    let step = graph.fetch_mut(id)?;
    if step.requested().is_empty() {
        // No handle ever reported a read; keep the full projection.
        return Ok(false);
    }

    let projection = step.requested().clone();
    step.set_projection(projection);

    Ok(true)
}

///
/// InlinePlan
/// Everything the inlining rewrite needs, computed before any mutation.
///

struct InlinePlan {
    parent_fetch: StepId,
    /// Parent row node each child call reads from.
    row_source: StepId,
    alias: &'static str,
    entity: &'static EntityModel,
    on: Vec<(String, String)>,
    extra: Option<String>,
    projection: Option<BTreeSet<String>>,
    carried_joins: Vec<(String, LeftOneJoin)>,
    params: Vec<(String, StorageClass, StepId)>,
    /// First/record nodes over the child, to be rewired onto the parent row.
    rewire: Vec<StepId>,
}

// Check every inlining precondition; `None` means "leave the step as an
// independent fetch", never an error.
#[expect(clippy::too_many_lines)]
fn inline_candidate(graph: &PlanGraph, child_id: StepId) -> Result<Option<InlinePlan>, PlanError> {
    let child = graph.fetch_ref(child_id)?;
    if child.filter().is_empty() {
        return Ok(None);
    }

    // A required join restricts the row set and cannot ride along inside
    // an optional join; carried optional joins are fine.
    let mut carried_joins = Vec::new();
    for entry in child.aliases().iter() {
        match &entry.kind {
            AliasKind::Root | AliasKind::Correlation => {}
            AliasKind::Inner { .. } => return Ok(None),
            AliasKind::LeftOne(join) => carried_joins.push((entry.name.clone(), join.clone())),
        }
    }

    // The child must be consumed as a single row per call: first-of-batch
    // consumers only, no list fan-out.
    let mut firsts = Vec::new();
    for (node_id, node) in graph.iter() {
        match node {
            StepNode::First { source } if graph.resolve(*source) == child_id => {
                firsts.push(node_id);
            }
            StepNode::Item { source } if graph.resolve(*source) == child_id => {
                return Ok(None);
            }
            _ => {}
        }
    }
    if firsts.is_empty() {
        return Ok(None);
    }

    let mut rewire = firsts.clone();
    for (node_id, node) in graph.iter() {
        if let StepNode::Record(record) = node
            && firsts.contains(&record.source())
        {
            rewire.push(node_id);
        }
    }

    // Every filter value must be a column read off one parent row.
    let mut origin: Option<(StepId, StepId)> = None;
    let mut reads: Vec<(String, &'static str)> = Vec::new();
    for entry in child.filter().iter() {
        if !entry.column.exact_equality {
            return Ok(None);
        }
        let producer = graph.resolve(child.dep_producer(entry.dep));
        let StepNode::Access {
            source,
            path: AccessPath::Column(parent_column),
        } = graph.node(producer)
        else {
            // Constants and raw engine inputs block inlining: a foreign key
            // alone cannot justify the join condition for them.
            return Ok(None);
        };

        let row = graph.resolve(*source);
        let parent_fetch = match graph.node(row) {
            StepNode::Record(record) => record.fetch(),
            StepNode::First { source } | StepNode::Item { source } => graph.resolve(*source),
            _ => return Ok(None),
        };
        if !matches!(graph.node(parent_fetch), StepNode::Fetch(_)) {
            return Ok(None);
        }

        match origin {
            None => origin = Some((row, parent_fetch)),
            Some((known_row, _)) if known_row == row => {}
            Some(_) => return Ok(None),
        }
        reads.push((parent_column.clone(), entry.column.name));
    }
    let Some((row_source, parent_fetch)) = origin else {
        return Ok(None);
    };
    if parent_fetch == child_id {
        return Ok(None);
    }

    let parent = graph.fetch_ref(parent_fetch)?;
    for (parent_column, _) in &reads {
        let Some(column) = parent.entity().column(parent_column) else {
            return Ok(None);
        };
        if !column.exact_equality {
            return Ok(None);
        }
    }

    // The relationship must be backed by a declared unique relation whose
    // referenced columns match the filter specification exactly. Multiple
    // candidates with identical referenced-column sets resolve by
    // declaration order: the first declared relation wins.
    let filter_columns: Vec<&str> = child
        .filter()
        .iter()
        .map(|entry| entry.column.name)
        .collect();
    let relation = parent.entity().relations.iter().find(|relation| {
        relation.target.path == child.entity().path
            && relation.unique
            && relation.referenced_set_matches(&filter_columns)
            && reads.len() == relation.columns.len()
            && reads
                .iter()
                .all(|(p, c)| relation.referenced_for_local(p) == Some(*c))
    });
    let Some(relation) = relation else {
        return Ok(None);
    };

    // Alias and parameter namespaces on the parent must stay conflict-free.
    if parent.aliases().lookup(relation.name).is_some() {
        return Ok(None);
    }
    for (alias, _) in &carried_joins {
        if parent.aliases().lookup(alias).is_some() {
            return Ok(None);
        }
    }
    for param in child.params() {
        if parent.params().iter().any(|p| p.name == param.name)
            || parent.filter_entry(&param.name).is_some()
        {
            return Ok(None);
        }
    }

    let rewritten: Vec<String> = child
        .conditions()
        .iter()
        .map(|condition| rewrite_alias(condition, ROOT_ALIAS, relation.name))
        .collect();
    let extra = (!rewritten.is_empty()).then(|| rewritten.join(" AND "));

    let carried_joins = carried_joins
        .into_iter()
        .map(|(alias, mut join)| {
            if join.parent == ROOT_ALIAS {
                join.parent = relation.name.to_string();
            }
            (alias, join)
        })
        .collect();

    Ok(Some(InlinePlan {
        parent_fetch,
        row_source,
        alias: relation.name,
        entity: child.entity(),
        on: relation
            .columns
            .iter()
            .map(|(local, referenced)| ((*local).to_string(), (*referenced).to_string()))
            .collect(),
        extra,
        projection: (!child.requested().is_empty()).then(|| child.requested().clone()),
        carried_joins,
        params: child
            .params()
            .iter()
            .map(|param| (param.name.clone(), param.class, child.dep_producer(param.dep)))
            .collect(),
        rewire,
    }))
}

fn apply_inline(graph: &mut PlanGraph, child_id: StepId, plan: InlinePlan) -> Result<(), PlanError> {
    let parent = graph.fetch_mut(plan.parent_fetch)?;
    parent.push_left_join(
        LeftOneJoin {
            entity: plan.entity,
            parent: ROOT_ALIAS.to_string(),
            on: plan.on,
            extra: plan.extra,
            projection: plan.projection,
        },
        plan.alias,
    )?;
    for (alias, join) in plan.carried_joins {
        parent.push_left_join(join, &alias)?;
    }
    for (name, class, producer) in plan.params {
        parent.adopt_param(name, class, producer);
    }

    // The child's row chain now reads the nested value off the parent's
    // already-fetched row; the child step itself disappears from the plan.
    for node_id in plan.rewire {
        graph.replace(
            node_id,
            StepNode::Access {
                source: plan.row_source,
                path: AccessPath::Nested(plan.alias.to_string()),
            },
        );
    }
    graph.replace(child_id, StepNode::Elided { replaced_by: None });

    Ok(())
}

// Rewrite bare `from.`-prefixed alias references in a raw condition
// fragment. Fragments reference aliases unquoted (`t."column"`).
fn rewrite_alias(fragment: &str, from: &str, to: &str) -> String {
    let needle = format!("{from}.");
    let mut out = String::with_capacity(fragment.len());
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < fragment.len() {
        if fragment[i..].starts_with(&needle)
            && !prev.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '"')
        {
            out.push_str(to);
            out.push('.');
            prev = Some('.');
            i += needle.len();
        } else if let Some(ch) = fragment[i..].chars().next() {
            out.push(ch);
            prev = Some(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }

    out
}

///
/// TESTS
///
