//! Batched execution: one composed query per activation.
//!
//! Every pending call contributes one correlation tuple; the store expands
//! the serialized tuple list into a derived table, joins it against the
//! root table, and each returned row comes back tagged with the call index
//! that produced it.

use crate::{
    error::ExecuteError,
    model::{ColumnKind, EntityModel},
    row::EntityRow,
    sql::{
        CORRELATION_ALIAS, CorrelationColumn, CorrelationShape, IDX_COLUMN, JoinKind, JoinShape,
        ProjectedColumn, QueryShape, ROOT_ALIAS, SelectQuery, output_column,
    },
    step::fetch::{AliasKind, ExecMode, FetchStep},
    store::{FetchStore, SqlRow},
    trace::{ExecContext, FetchTraceEvent},
    value::Value,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

///
/// ActivationInputs
///
/// Per-call values for a step's dependency slots, supplied by the
/// execution engine at activation time. Each slot carries exactly one
/// value per call.
///

#[derive(Default)]
pub struct ActivationInputs<'a> {
    slots: BTreeMap<usize, &'a [Value]>,
}

impl<'a> ActivationInputs<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Supply values for one dependency slot.
    pub fn set(&mut self, slot: usize, values: &'a [Value]) -> &mut Self {
        self.slots.insert(slot, values);
        self
    }

    fn get(&self, slot: usize, count: usize) -> Result<&'a [Value], ExecuteError> {
        let values = self
            .slots
            .get(&slot)
            .copied()
            .ok_or(ExecuteError::MissingInput { slot })?;
        if values.len() != count {
            return Err(ExecuteError::InputArityMismatch {
                slot,
                expected: count,
                found: values.len(),
            });
        }

        Ok(values)
    }
}

impl FetchStep {
    /// Batch entry point: serve all `count` pending calls with at most one
    /// store round trip, returning one result list per call index.
    pub fn execute(
        &self,
        count: usize,
        inputs: &ActivationInputs<'_>,
        store: &dyn FetchStore,
        ctx: &ExecContext<'_>,
    ) -> Result<Vec<Vec<EntityRow>>, ExecuteError> {
        let entity = self.entity().path;
        ctx.emit(FetchTraceEvent::Start { entity, count });

        let result = self.execute_inner(count, inputs, store, ctx);
        match &result {
            Ok(lists) => ctx.emit(FetchTraceEvent::Finish {
                entity,
                rows: lists.iter().map(Vec::len).sum(),
            }),
            Err(_) => ctx.emit(FetchTraceEvent::Error { entity }),
        }

        result
    }

    fn execute_inner(
        &self,
        count: usize,
        inputs: &ActivationInputs<'_>,
        store: &dyn FetchStore,
        ctx: &ExecContext<'_>,
    ) -> Result<Vec<Vec<EntityRow>>, ExecuteError> {
        if self.mode() == ExecMode::Synthesize {
            return self.synthesize(count, inputs, ctx);
        }
        if self.is_trivial() {
            return self.execute_trivial(count, store, ctx);
        }

        self.execute_batched(count, inputs, store, ctx)
    }

    // Guaranteed-existence short-circuit: every requested column is already
    // a filter input, so the result is synthesized without any query.
    fn synthesize(
        &self,
        count: usize,
        inputs: &ActivationInputs<'_>,
        ctx: &ExecContext<'_>,
    ) -> Result<Vec<Vec<EntityRow>>, ExecuteError> {
        let mut results = Vec::with_capacity(count);

        'calls: for call in 0..count {
            let mut row = EntityRow::new(self.entity());
            for entry in self.filter().iter() {
                let values = inputs.get(entry.dep, count)?;
                let value = &values[call];
                if value.is_null() {
                    results.push(Vec::new());
                    continue 'calls;
                }
                row.set(entry.column.name, value.clone());
            }
            results.push(vec![row]);
        }

        ctx.emit(FetchTraceEvent::ShortCircuit {
            entity: self.entity().path,
        });

        Ok(results)
    }

    // No filter spec and no parameters: there is nothing to correlate, so
    // the base query runs once and every call shares the same result list.
    fn execute_trivial(
        &self,
        count: usize,
        store: &dyn FetchStore,
        ctx: &ExecContext<'_>,
    ) -> Result<Vec<Vec<EntityRow>>, ExecuteError> {
        let query = self.compose(None);
        ctx.debug_log(query.to_sql());

        let rows = store.select(&query)?;
        ctx.emit(FetchTraceEvent::RoundTrip {
            entity: self.entity().path,
        });

        let shared = rows
            .iter()
            .map(|row| self.decode_root(row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vec![shared; count])
    }

    fn execute_batched(
        &self,
        count: usize,
        inputs: &ActivationInputs<'_>,
        store: &dyn FetchStore,
        ctx: &ExecContext<'_>,
    ) -> Result<Vec<Vec<EntityRow>>, ExecuteError> {
        let tuples = self.build_tuples(count, inputs)?;
        let mut results = vec![Vec::new(); count];

        // An empty correlation set cannot match anything; skip the trip.
        if tuples.is_empty() {
            ctx.emit(FetchTraceEvent::ShortCircuit {
                entity: self.entity().path,
            });
            return Ok(results);
        }

        let payload = JsonValue::Array(tuples).to_string();
        let query = self.compose(Some(payload));
        ctx.debug_log(query.to_sql());

        let rows = store.select(&query)?;
        ctx.emit(FetchTraceEvent::RoundTrip {
            entity: self.entity().path,
        });

        for row in &rows {
            let tag = row
                .get(IDX_COLUMN)
                .ok_or_else(|| ExecuteError::row_decode("missing call-index tag column"))?;
            let call = match tag {
                Value::Int(v) if *v >= 0 => usize::try_from(*v).ok(),
                Value::Uint(v) => usize::try_from(*v).ok(),
                _ => None,
            }
            .filter(|call| *call < count)
            .ok_or_else(|| ExecuteError::TagOutOfRange {
                tag: tag.clone(),
                count,
            })?;

            results[call].push(self.decode_root(row)?);
        }

        Ok(results)
    }

    /// One tuple per call that has a complete filter input: the call index
    /// followed by coerced filter values (declared order), then registered
    /// parameter values. Calls with any null filter input contribute no
    /// tuple and resolve to the empty list.
    pub(crate) fn build_tuples(
        &self,
        count: usize,
        inputs: &ActivationInputs<'_>,
    ) -> Result<Vec<JsonValue>, ExecuteError> {
        let mut tuples = Vec::with_capacity(count);

        'calls: for call in 0..count {
            let mut tuple = Vec::with_capacity(1 + self.filter().len() + self.params().len());
            tuple.push(JsonValue::from(call));

            for entry in self.filter().iter() {
                let values = inputs.get(entry.dep, count)?;
                let value = &values[call];
                if value.is_null() {
                    continue 'calls;
                }
                let coerced = value.to_storage_json(entry.class).map_err(|source| {
                    ExecuteError::ValueCoercion {
                        column: entry.column.name.to_string(),
                        source,
                    }
                })?;
                tuple.push(coerced);
            }

            for param in self.params() {
                let values = inputs.get(param.dep, count)?;
                let coerced = values[call].to_storage_json(param.class).map_err(|source| {
                    ExecuteError::ValueCoercion {
                        column: param.name.clone(),
                        source,
                    }
                })?;
                tuple.push(coerced);
            }

            tuples.push(JsonValue::Array(tuple));
        }

        Ok(tuples)
    }

    /// Compose the single query serving this activation. `payload` is the
    /// serialized correlation tuple list; `None` composes the trivial
    /// (uncorrelated) form.
    pub(crate) fn compose(&self, payload: Option<String>) -> SelectQuery {
        let mut projection = self
            .projected_columns(self.entity(), self.projection())
            .into_iter()
            .map(|column| ProjectedColumn::new(ROOT_ALIAS, column))
            .collect::<Vec<_>>();

        let mut joins = Vec::new();
        for entry in self.aliases().iter() {
            match &entry.kind {
                AliasKind::Root | AliasKind::Correlation => {}
                AliasKind::Inner { relation } => joins.push(JoinShape {
                    kind: JoinKind::Inner,
                    table: relation.target.table,
                    alias: entry.name.clone(),
                    parent_alias: ROOT_ALIAS.to_string(),
                    on: relation
                        .columns
                        .iter()
                        .map(|(local, referenced)| {
                            ((*local).to_string(), (*referenced).to_string())
                        })
                        .collect(),
                    extra: None,
                }),
                AliasKind::LeftOne(join) => {
                    for column in self.projected_columns(join.entity, join.projection.as_ref()) {
                        projection.push(ProjectedColumn::new(&entry.name, column));
                    }
                    joins.push(JoinShape {
                        kind: JoinKind::LeftOne,
                        table: join.entity.table,
                        alias: entry.name.clone(),
                        parent_alias: join.parent.clone(),
                        on: join.on.clone(),
                        extra: join.extra.clone(),
                    });
                }
            }
        }

        let correlation = payload.is_some().then(|| {
            let mut columns = Vec::new();
            let mut filter_join = Vec::new();
            for entry in self.filter().iter() {
                columns.push(CorrelationColumn {
                    name: entry.column.name.to_string(),
                    class: entry.class,
                });
                filter_join.push((
                    entry.column.name.to_string(),
                    entry.column.name.to_string(),
                ));
            }
            for param in self.params() {
                columns.push(CorrelationColumn {
                    name: param.name.clone(),
                    class: param.class,
                });
            }

            CorrelationShape {
                alias: CORRELATION_ALIAS.to_string(),
                param_index: 0,
                columns,
                filter_join,
            }
        });

        SelectQuery {
            shape: QueryShape {
                table: self.entity().table,
                root_alias: ROOT_ALIAS.to_string(),
                correlation,
                joins,
                projection,
                conditions: self.conditions().to_vec(),
            },
            params: payload.map_or_else(Vec::new, |payload| vec![Value::Text(payload)]),
        }
    }

    // Columns to retrieve for one alias: the pruned projection when one
    // was computed, otherwise every storable column of the entity.
    fn projected_columns(
        &self,
        entity: &'static EntityModel,
        projection: Option<&BTreeSet<String>>,
    ) -> Vec<&'static str> {
        entity
            .columns
            .iter()
            .filter(|column| column.kind != ColumnKind::Unsupported)
            .map(|column| column.name)
            .filter(|name| projection.is_none_or(|set| set.contains(*name)))
            .collect()
    }

    // Decode one raw row into the entity-shaped value for the root alias,
    // recursing into left-joined aliases depth-first.
    fn decode_root(&self, row: &SqlRow) -> Result<EntityRow, ExecuteError> {
        self.decode_alias(row, ROOT_ALIAS, self.entity(), self.projection())
    }

    fn decode_alias(
        &self,
        row: &SqlRow,
        alias: &str,
        entity: &'static EntityModel,
        projection: Option<&BTreeSet<String>>,
    ) -> Result<EntityRow, ExecuteError> {
        let mut decoded = EntityRow::new(entity);

        for column in self.projected_columns(entity, projection) {
            let output = output_column(alias, column);
            let value = row.get(&output).cloned().ok_or_else(|| {
                ExecuteError::row_decode(format!("row is missing projected column '{output}'"))
            })?;
            decoded.set(column, value);
        }

        for entry in self.aliases().iter() {
            if let AliasKind::LeftOne(join) = &entry.kind
                && join.parent == alias
            {
                let nested =
                    self.decode_alias(row, &entry.name, join.entity, join.projection.as_ref())?;
                let nested = if nested.all_null() { None } else { Some(nested) };
                decoded.set_nested(&entry.name, nested);
            }
        }

        Ok(decoded)
    }
}

///
/// TESTS
///
