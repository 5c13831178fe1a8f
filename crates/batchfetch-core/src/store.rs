use crate::{sql::SelectQuery, value::Value};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// FetchStore
///
/// The relational store port. One call is one round trip: the store
/// executes the composed query (whose parameters include at most one
/// JSON-array correlation payload, expanded store-side into a derived row
/// set) and returns raw rows with alias-prefixed column names.
///
/// Any store honoring this contract can be substituted; `SelectQuery`
/// carries both rendered SQL text and the typed shape so stores may use
/// either.
///

pub trait FetchStore {
    fn select(&self, query: &SelectQuery) -> Result<Vec<SqlRow>, StoreError>;
}

///
/// SqlRow
/// One raw result row keyed by alias-prefixed output column names.
///

#[derive(Clone, Debug, Default)]
pub struct SqlRow {
    columns: BTreeMap<String, Value>,
}

impl SqlRow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.columns.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }
}

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// The store cannot execute this query shape.
    #[error("store cannot execute this query: {message}")]
    Unsupported { message: String },

    /// Backend failure during the round trip.
    #[error("store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    // Construct one unsupported-query error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    // Construct one backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
