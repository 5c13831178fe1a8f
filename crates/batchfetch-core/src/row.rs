use crate::{model::EntityModel, value::Value};
use std::collections::BTreeMap;

///
/// EntityRow
///
/// One decoded, entity-shaped row. Nested optional rows (from left-joined
/// to-one relations) hang off their join alias; a nested slot holding
/// `None` means the optional relation did not match.
///

#[derive(Clone, Debug)]
pub struct EntityRow {
    entity: &'static EntityModel,
    columns: BTreeMap<String, Value>,
    nested: BTreeMap<String, Option<EntityRow>>,
}

impl EntityRow {
    #[must_use]
    pub const fn new(entity: &'static EntityModel) -> Self {
        Self {
            entity,
            columns: BTreeMap::new(),
            nested: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &'static EntityModel {
        self.entity
    }

    /// Column value, or `None` when the column was not projected.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Nested row for a left-joined alias. Outer `None`: alias unknown on
    /// this row; inner `None`: the optional relation did not match.
    #[must_use]
    pub fn nested(&self, alias: &str) -> Option<&Option<EntityRow>> {
        self.nested.get(alias)
    }

    /// Number of projected columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn set(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    pub(crate) fn set_nested(&mut self, alias: impl Into<String>, row: Option<EntityRow>) {
        self.nested.insert(alias.into(), row);
    }

    /// True when every projected column is null (the decode signal that an
    /// optional joined row did not match).
    #[must_use]
    pub fn all_null(&self) -> bool {
        self.columns.values().all(Value::is_null)
    }
}
