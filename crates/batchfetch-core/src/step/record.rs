//! Record handles: typed access onto one not-yet-materialized row.

use crate::{model::EntityModel, plan::StepId, value::Value};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeSet;

///
/// RecordStep
///
/// One pending row of a specific batched fetch step, wrapped for column
/// access. The handle tracks which columns consumers actually read; at
/// optimization time that set is pushed onto the owning step for
/// projection pruning and the handle elides itself.
///

pub struct RecordStep {
    /// Row-producing source (a first-of-batch or list-item node).
    source: StepId,
    /// Owning batched fetch step.
    fetch: StepId,
    entity: &'static EntityModel,
    requested: BTreeSet<String>,
}

impl RecordStep {
    #[must_use]
    pub(crate) fn new(source: StepId, fetch: StepId, entity: &'static EntityModel) -> Self {
        Self {
            source,
            fetch,
            entity,
            requested: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn source(&self) -> StepId {
        self.source
    }

    #[must_use]
    pub const fn fetch(&self) -> StepId {
        self.fetch
    }

    #[must_use]
    pub const fn entity(&self) -> &'static EntityModel {
        self.entity
    }

    #[must_use]
    pub const fn requested(&self) -> &BTreeSet<String> {
        &self.requested
    }

    pub(crate) fn note_requested(&mut self, column: &str) {
        self.requested.insert(column.to_string());
    }

    pub(crate) fn redirect(&mut self, from: StepId, to: StepId) {
        if self.source == from {
            self.source = to;
        }
    }
}

/// Encode one opaque cursor: base64 over the JSON pair
/// `[primaryKeyColumnName, primaryKeyValue]`.
#[must_use]
pub fn encode_cursor(pk_column: &str, value: &Value) -> String {
    let payload = json!([pk_column, value.to_json()]);
    BASE64.encode(payload.to_string().as_bytes())
}

/// Decode one opaque cursor back into its column name and value. Returns
/// `None` for payloads this layer did not produce.
#[must_use]
pub fn decode_cursor(cursor: &str) -> Option<(String, Value)> {
    let bytes = BASE64.decode(cursor).ok()?;
    let payload: JsonValue = serde_json::from_slice(&bytes).ok()?;
    let items = payload.as_array()?;
    let [name, value] = items.as_slice() else {
        return None;
    };

    Some((name.as_str()?.to_string(), Value::from_json(value)))
}

///
/// TESTS
///
