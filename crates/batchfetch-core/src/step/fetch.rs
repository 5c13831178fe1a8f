//! Batched fetch step: construction surface and per-step state.
//!
//! A step is created once per fetch site, not once per row. Everything
//! here mutates only during plan construction and optimization; execution
//! (`step::execute`) reads the step immutably.

use crate::{
    error::PlanError,
    model::{ColumnKind, ColumnModel, EntityModel, RelationModel},
    plan::StepId,
    sql::{CORRELATION_ALIAS, ROOT_ALIAS},
    value::StorageClass,
};
use derive_more::Deref;
use std::collections::BTreeSet;

///
/// FilterEntry
/// One `column = per-call value` constraint of the filter specification.
///

#[derive(Clone, Debug)]
pub struct FilterEntry {
    pub column: &'static ColumnModel,
    pub class: StorageClass,
    /// Dependency slot supplying the per-call value.
    pub dep: usize,
}

///
/// FilterSpec
///
/// Ordered, append-only filter specification. Column names are unique;
/// order is significant (it fixes the correlation tuple layout).
///

#[derive(Clone, Debug, Default, Deref)]
pub struct FilterSpec {
    entries: Vec<FilterEntry>,
}

///
/// AliasEntry / AliasKind
///

#[derive(Clone, Debug)]
pub struct AliasEntry {
    pub name: String,
    pub kind: AliasKind,
}

#[derive(Clone, Debug)]
pub enum AliasKind {
    /// The step's root table.
    Root,

    /// The synthetic per-activation correlation table.
    Correlation,

    /// Required relation; restricts the row set.
    Inner { relation: &'static RelationModel },

    /// Optional to-one relation, decoded as a nested entity value.
    LeftOne(LeftOneJoin),
}

///
/// LeftOneJoin
///

#[derive(Clone, Debug)]
pub struct LeftOneJoin {
    pub entity: &'static EntityModel,
    pub parent: String,
    /// Equality pairs: (column on the parent alias, column on this alias).
    pub on: Vec<(String, String)>,
    /// Extra raw correlation SQL scoped to the parent/this alias pair.
    pub extra: Option<String>,
    /// Columns to retrieve for the nested entity; `None` retrieves all.
    pub projection: Option<BTreeSet<String>>,
}

///
/// AliasRegistry
///

#[derive(Clone, Debug, Deref)]
pub struct AliasRegistry {
    entries: Vec<AliasEntry>,
}

impl AliasRegistry {
    fn new() -> Self {
        Self {
            entries: vec![
                AliasEntry {
                    name: ROOT_ALIAS.to_string(),
                    kind: AliasKind::Root,
                },
                AliasEntry {
                    name: CORRELATION_ALIAS.to_string(),
                    kind: AliasKind::Correlation,
                },
            ],
        }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&AliasEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    fn insert(&mut self, name: &str, kind: AliasKind) -> Result<(), PlanError> {
        if self.lookup(name).is_some() {
            return Err(PlanError::DuplicateAlias {
                alias: name.to_string(),
            });
        }
        self.entries.push(AliasEntry {
            name: name.to_string(),
            kind,
        });

        Ok(())
    }
}

///
/// ParamEntry
///

#[derive(Clone, Debug)]
pub struct ParamEntry {
    pub name: String,
    pub class: StorageClass,
    /// Dependency slot supplying the per-call value.
    pub dep: usize,
}

///
/// ParamRef
/// Reference to a registered parameter, usable inside condition fragments.
///

#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct ParamRef {
    name: String,
}

impl ParamRef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SQL text resolving this parameter for the current call.
    #[must_use]
    pub fn sql(&self) -> String {
        format!("{CORRELATION_ALIAS}.\"{}\"", self.name)
    }
}

///
/// PageDeps
///
/// Registered pagination inputs. These are dependencies only; the
/// surrounding pagination machinery consumes them.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct PageDeps {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub offset: Option<usize>,
    pub before: Option<usize>,
    pub after: Option<usize>,
}

///
/// ExecMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecMode {
    /// Issue the single composed query.
    Query,

    /// Synthesize rows from known filter values; zero round trips.
    Synthesize,
}

///
/// FetchStep
///

#[derive(Clone, Debug)]
pub struct FetchStep {
    entity: &'static EntityModel,
    guaranteed_to_exist: bool,
    deps: Vec<StepId>,
    filter: FilterSpec,
    aliases: AliasRegistry,
    conditions: Vec<String>,
    params: Vec<ParamEntry>,
    page: PageDeps,
    requested: BTreeSet<String>,
    projection: Option<BTreeSet<String>>,
    mode: ExecMode,
}

impl FetchStep {
    pub(crate) fn build(
        entity: &'static EntityModel,
        filter: &[(&str, StepId)],
        guaranteed_to_exist: bool,
    ) -> Result<Self, PlanError> {
        let mut step = Self {
            entity,
            guaranteed_to_exist,
            deps: Vec::new(),
            filter: FilterSpec::default(),
            aliases: AliasRegistry::new(),
            conditions: Vec::new(),
            params: Vec::new(),
            page: PageDeps::default(),
            requested: BTreeSet::new(),
            projection: None,
            mode: ExecMode::Query,
        };

        for &(column, source) in filter {
            if step.filter_entry(column).is_some() {
                return Err(PlanError::DuplicateFilterColumn {
                    column: column.to_string(),
                });
            }
            let column = entity
                .column(column)
                .ok_or_else(|| PlanError::unknown_column(entity.path, column))?;
            let class = column
                .kind
                .storage_class()
                .ok_or_else(|| PlanError::unstorable_column(entity.path, column.name))?;
            let dep = step.add_dependency(source);
            step.filter.entries.push(FilterEntry { column, class, dep });
        }

        Ok(step)
    }

    // ---- accessors ----

    #[must_use]
    pub const fn entity(&self) -> &'static EntityModel {
        self.entity
    }

    #[must_use]
    pub const fn is_guaranteed(&self) -> bool {
        self.guaranteed_to_exist
    }

    #[must_use]
    pub const fn mode(&self) -> ExecMode {
        self.mode
    }

    #[must_use]
    pub const fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    #[must_use]
    pub const fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    #[must_use]
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    #[must_use]
    pub fn params(&self) -> &[ParamEntry] {
        &self.params
    }

    #[must_use]
    pub const fn page(&self) -> &PageDeps {
        &self.page
    }

    #[must_use]
    pub const fn requested(&self) -> &BTreeSet<String> {
        &self.requested
    }

    #[must_use]
    pub const fn projection(&self) -> Option<&BTreeSet<String>> {
        self.projection.as_ref()
    }

    #[must_use]
    pub fn filter_entry(&self, column: &str) -> Option<&FilterEntry> {
        self.filter
            .entries
            .iter()
            .find(|entry| entry.column.name == column)
    }

    /// Producer of a dependency slot.
    #[must_use]
    pub fn dep_producer(&self, slot: usize) -> StepId {
        self.deps[slot]
    }

    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.deps.len()
    }

    /// A fetch with no filter specification and no registered parameters
    /// has nothing to correlate: one base query serves every call.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.filter.is_empty() && self.params.is_empty()
    }

    // ---- construction surface ----

    pub(crate) fn add_dependency(&mut self, source: StepId) -> usize {
        self.deps.push(source);
        self.deps.len() - 1
    }

    pub fn set_first(&mut self, source: StepId) {
        self.page.first = Some(self.add_dependency(source));
    }

    pub fn set_last(&mut self, source: StepId) {
        self.page.last = Some(self.add_dependency(source));
    }

    pub fn set_offset(&mut self, source: StepId) {
        self.page.offset = Some(self.add_dependency(source));
    }

    pub fn set_before(&mut self, source: StepId) {
        self.page.before = Some(self.add_dependency(source));
    }

    pub fn set_after(&mut self, source: StepId) {
        self.page.after = Some(self.add_dependency(source));
    }

    /// Require a declared relation to match, under `alias`.
    pub fn inner_join(&mut self, relation: &str, alias: &str) -> Result<(), PlanError> {
        let relation = self
            .entity
            .relation(relation)
            .ok_or_else(|| PlanError::UnknownRelation {
                entity: self.entity.path,
                relation: relation.to_string(),
            })?;

        self.aliases.insert(alias, AliasKind::Inner { relation })
    }

    /// Attach an optional to-one relation under `alias`, scoped to
    /// `parent_alias`. The relation must be declared on the parent alias's
    /// entity kind and be unique on its referenced columns.
    pub fn left_join_and_map_one(
        &mut self,
        entity: &'static EntityModel,
        relation: &str,
        parent_alias: &str,
        alias: &str,
        condition: Option<&str>,
    ) -> Result<(), PlanError> {
        let parent_entity = self.alias_entity(parent_alias)?;
        let relation_model =
            parent_entity
                .relation(relation)
                .ok_or_else(|| PlanError::UnknownRelation {
                    entity: parent_entity.path,
                    relation: relation.to_string(),
                })?;
        if relation_model.target.path != entity.path {
            return Err(PlanError::UnknownRelation {
                entity: parent_entity.path,
                relation: relation.to_string(),
            });
        }
        if !relation_model.unique {
            return Err(PlanError::RelationNotUnique {
                entity: parent_entity.path,
                relation: relation_model.name,
            });
        }

        let on = relation_model
            .columns
            .iter()
            .map(|(local, referenced)| ((*local).to_string(), (*referenced).to_string()))
            .collect();

        self.push_left_join(LeftOneJoin {
            entity,
            parent: parent_alias.to_string(),
            on,
            extra: condition.map(str::to_string),
            projection: None,
        }, alias)
    }

    /// Register a fully-shaped optional to-one join (optimizer path).
    pub(crate) fn push_left_join(
        &mut self,
        join: LeftOneJoin,
        alias: &str,
    ) -> Result<(), PlanError> {
        self.aliases.insert(alias, AliasKind::LeftOne(join))
    }

    /// Append a raw side predicate over registered aliases/parameters.
    pub fn where_condition(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    /// Register an externally supplied per-call value under a unique name.
    /// The returned reference resolves to the value for the current call
    /// inside condition fragments.
    pub fn param(
        &mut self,
        source: StepId,
        kind: ColumnKind,
        name: Option<&str>,
    ) -> Result<ParamRef, PlanError> {
        let name = name.map_or_else(|| format!("p{}", self.params.len()), str::to_string);

        // Parameters share the correlation-table namespace with filter
        // columns, so both collisions are rejected.
        if self.params.iter().any(|param| param.name == name)
            || self.filter_entry(&name).is_some()
        {
            return Err(PlanError::DuplicateParam { name });
        }
        let class = kind
            .storage_class()
            .ok_or_else(|| PlanError::UnstorableParam { name: name.clone() })?;

        let dep = self.add_dependency(source);
        self.params.push(ParamEntry {
            name: name.clone(),
            class,
            dep,
        });

        Ok(ParamRef { name })
    }

    /// Merge column names into the requested-column set.
    pub fn select<'a>(&mut self, columns: impl IntoIterator<Item = &'a str>) -> Result<(), PlanError> {
        for column in columns {
            if self.entity.column(column).is_none() {
                return Err(PlanError::unknown_column(self.entity.path, column));
            }
            self.requested.insert(column.to_string());
        }

        Ok(())
    }

    pub(crate) fn merge_requested(&mut self, columns: BTreeSet<String>) {
        self.requested.extend(columns);
    }

    /// Carry over an already-validated parameter from an inlined step.
    pub(crate) fn adopt_param(&mut self, name: String, class: StorageClass, source: StepId) {
        let dep = self.add_dependency(source);
        self.params.push(ParamEntry { name, class, dep });
    }

    pub(crate) const fn set_mode(&mut self, mode: ExecMode) {
        self.mode = mode;
    }

    pub(crate) fn set_projection(&mut self, projection: BTreeSet<String>) {
        self.projection = Some(projection);
    }

    pub(crate) fn redirect_deps(&mut self, from: StepId, to: StepId) {
        for dep in &mut self.deps {
            if *dep == from {
                *dep = to;
            }
        }
    }

    // Entity kind behind an alias name.
    fn alias_entity(&self, alias: &str) -> Result<&'static EntityModel, PlanError> {
        let entry = self
            .aliases
            .lookup(alias)
            .ok_or_else(|| PlanError::UnknownAlias {
                alias: alias.to_string(),
            })?;

        Ok(match &entry.kind {
            AliasKind::Root | AliasKind::Correlation => self.entity,
            AliasKind::Inner { relation } => relation.target,
            AliasKind::LeftOne(join) => join.entity,
        })
    }
}

///
/// TESTS
///
