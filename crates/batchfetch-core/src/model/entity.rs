use crate::model::{field::ColumnModel, relation::RelationModel};

///
/// EntityModel
/// Minimal runtime model for one entity kind.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified type path (for dispatch and diagnostics).
    pub path: &'static str,
    /// Stable external name.
    pub entity_name: &'static str,
    /// Physical table name.
    pub table: &'static str,
    /// Ordered column list (authoritative for projection order).
    pub columns: &'static [ColumnModel],
    /// Primary-key column names (cursoring requires exactly one).
    pub primary_key: &'static [&'static str],
    /// Declared relations; declaration order is the ambiguity tie-break.
    pub relations: &'static [RelationModel],
}

impl EntityModel {
    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static ColumnModel> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Look up a declared relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&'static RelationModel> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}
