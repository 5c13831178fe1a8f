//! Static entity metadata supplied by the schema collaborator.

pub mod entity;
pub mod field;
pub mod relation;

pub use entity::EntityModel;
pub use field::{ColumnKind, ColumnModel};
pub use relation::RelationModel;
