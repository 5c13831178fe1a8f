use crate::model::entity::EntityModel;

///
/// RelationModel
///
/// One declared relation from a source entity to a target entity, as a set
/// of (local column, referenced column) pairs. `unique` asserts that the
/// referenced columns form a unique key on the target, which is what proves
/// a join against them is one-to-one/many-to-one.
///

#[derive(Debug)]
pub struct RelationModel {
    /// Relation name; doubles as the default join alias when inlined.
    pub name: &'static str,
    /// Target entity kind.
    pub target: &'static EntityModel,
    /// (local column on the source, referenced column on the target).
    pub columns: &'static [(&'static str, &'static str)],
    /// True when the referenced columns are unique on the target.
    pub unique: bool,
}

impl RelationModel {
    /// Referenced (target-side) column for a given local column, if any.
    #[must_use]
    pub fn referenced_for_local(&self, local: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(l, _)| *l == local)
            .map(|(_, r)| *r)
    }

    /// True when the referenced-column set equals `columns` as a set.
    #[must_use]
    pub fn referenced_set_matches(&self, columns: &[&str]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .all(|(_, referenced)| columns.contains(referenced))
    }
}
