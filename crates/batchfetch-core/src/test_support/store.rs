//! In-memory store honoring the round-trip contract: it receives the
//! composed query, expands the JSON correlation payload into a derived row
//! set, joins structurally, and returns alias-prefixed raw rows. Raw SQL
//! side conditions are out of its vocabulary and reported as unsupported.

use crate::{
    sql::{IDX_COLUMN, JoinKind, SelectQuery},
    store::{FetchStore, SqlRow, StoreError},
    value::{Value, canonical_eq},
};
use serde_json::Value as JsonValue;
use std::{
    cell::Cell,
    collections::BTreeMap,
};

type StoredRow = BTreeMap<String, Value>;

///
/// MemStore
///

#[derive(Default)]
pub(crate) struct MemStore {
    tables: BTreeMap<&'static str, Vec<StoredRow>>,
    round_trips: Cell<usize>,
}

// One in-flight result row: the call tag plus the source row (if any)
// behind each alias.
struct RowCtx {
    idx: Option<Value>,
    aliases: BTreeMap<String, Option<StoredRow>>,
}

impl MemStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, table: &'static str, columns: &[(&str, Value)]) {
        let row = columns
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        self.tables.entry(table).or_default().push(row);
    }

    pub(crate) fn round_trips(&self) -> usize {
        self.round_trips.get()
    }

    fn rows(&self, table: &str) -> &[StoredRow] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    fn expand_correlation(
        &self,
        query: &SelectQuery,
    ) -> Result<Option<Vec<(Value, StoredRow)>>, StoreError> {
        let Some(correlation) = &query.shape.correlation else {
            return Ok(None);
        };

        let Some(Value::Text(payload)) = query.params.get(correlation.param_index) else {
            return Err(StoreError::unsupported(
                "correlation payload parameter is missing or not text",
            ));
        };
        let parsed: JsonValue = serde_json::from_str(payload)
            .map_err(|err| StoreError::backend(format!("malformed correlation payload: {err}")))?;
        let JsonValue::Array(tuples) = parsed else {
            return Err(StoreError::backend("correlation payload is not an array"));
        };

        let mut out = Vec::with_capacity(tuples.len());
        for tuple in &tuples {
            let JsonValue::Array(cells) = tuple else {
                return Err(StoreError::backend("correlation tuple is not an array"));
            };
            if cells.len() != correlation.columns.len() + 1 {
                return Err(StoreError::backend("correlation tuple arity mismatch"));
            }
            let idx = Value::from_json(&cells[0]);
            let row = correlation
                .columns
                .iter()
                .zip(&cells[1..])
                .map(|(column, cell)| (column.name.clone(), Value::from_json(cell)))
                .collect();
            out.push((idx, row));
        }

        Ok(Some(out))
    }
}

impl FetchStore for MemStore {
    fn select(&self, query: &SelectQuery) -> Result<Vec<SqlRow>, StoreError> {
        self.round_trips.set(self.round_trips.get() + 1);

        let shape = &query.shape;
        if !shape.conditions.is_empty() {
            return Err(StoreError::unsupported("raw side conditions"));
        }
        if shape.joins.iter().any(|join| join.extra.is_some()) {
            return Err(StoreError::unsupported("raw join conditions"));
        }

        let base = self.rows(shape.table);

        // Seed the working set: one context per (tuple, matching base row)
        // under correlation, one per base row otherwise.
        let mut ctxs = Vec::new();
        match self.expand_correlation(query)? {
            Some(batch) => {
                let correlation = shape.correlation.as_ref().expect("correlated query");
                for (idx, corr_row) in &batch {
                    for row in base {
                        let matched = correlation.filter_join.iter().all(|(root_col, corr_col)| {
                            canonical_eq(
                                row.get(root_col).unwrap_or(&Value::Null),
                                corr_row.get(corr_col).unwrap_or(&Value::Null),
                            )
                        });
                        if matched {
                            ctxs.push(RowCtx {
                                idx: Some(idx.clone()),
                                aliases: BTreeMap::from([(
                                    shape.root_alias.clone(),
                                    Some(row.clone()),
                                )]),
                            });
                        }
                    }
                }
            }
            None => {
                for row in base {
                    ctxs.push(RowCtx {
                        idx: None,
                        aliases: BTreeMap::from([(shape.root_alias.clone(), Some(row.clone()))]),
                    });
                }
            }
        }

        // Declared joins, in order.
        for join in &shape.joins {
            let targets = self.rows(join.table);
            let mut next = Vec::new();

            for mut ctx in ctxs {
                let parent = ctx
                    .aliases
                    .get(&join.parent_alias)
                    .and_then(Option::as_ref)
                    .cloned();

                let matches: Vec<&StoredRow> = parent.as_ref().map_or_else(Vec::new, |parent| {
                    targets
                        .iter()
                        .filter(|target| {
                            join.on.iter().all(|(parent_col, child_col)| {
                                canonical_eq(
                                    parent.get(parent_col).unwrap_or(&Value::Null),
                                    target.get(child_col).unwrap_or(&Value::Null),
                                )
                            })
                        })
                        .collect()
                });

                match join.kind {
                    JoinKind::Inner => {
                        for target in matches {
                            let mut branched = RowCtx {
                                idx: ctx.idx.clone(),
                                aliases: ctx.aliases.clone(),
                            };
                            branched
                                .aliases
                                .insert(join.alias.clone(), Some(target.clone()));
                            next.push(branched);
                        }
                    }
                    JoinKind::LeftOne => {
                        ctx.aliases
                            .insert(join.alias.clone(), matches.first().map(|m| (*m).clone()));
                        next.push(ctx);
                    }
                }
            }

            ctxs = next;
        }

        // Project alias-prefixed output columns.
        let mut out = Vec::with_capacity(ctxs.len());
        for ctx in ctxs {
            let mut row = SqlRow::new();
            if let Some(idx) = &ctx.idx {
                row.insert(IDX_COLUMN, idx.clone());
            }
            for projected in &shape.projection {
                let value = ctx
                    .aliases
                    .get(&projected.alias)
                    .and_then(Option::as_ref)
                    .and_then(|source| source.get(&projected.column))
                    .cloned()
                    .unwrap_or(Value::Null);
                row.insert(projected.output.clone(), value);
            }
            out.push(row);
        }

        Ok(out)
    }
}
