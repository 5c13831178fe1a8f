use crate::{
    plan::StepId,
    store::StoreError,
    value::{CoerceError, Value},
};
use thiserror::Error as ThisError;

///
/// PlanError
///
/// Construction-time failures. These surface synchronously while the plan
/// is being built or optimized, never at execution time.
///

#[derive(Debug, ThisError)]
pub enum PlanError {
    /// Alias name already registered on this step.
    #[error("alias '{alias}' is already registered on this fetch step")]
    DuplicateAlias { alias: String },

    /// Parameter name already registered on this step.
    #[error("parameter '{name}' is already registered on this fetch step")]
    DuplicateParam { name: String },

    /// Filter specification names the same column twice.
    #[error("filter column '{column}' appears more than once")]
    DuplicateFilterColumn { column: String },

    /// Column does not exist on the entity kind.
    #[error("entity '{entity}' has no column '{column}'")]
    UnknownColumn { entity: &'static str, column: String },

    /// Relation does not exist on the entity kind.
    #[error("entity '{entity}' has no relation '{relation}'")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    /// Alias is not registered on this step.
    #[error("alias '{alias}' is not registered on this fetch step")]
    UnknownAlias { alias: String },

    /// Column kind has no storage-class mapping.
    #[error("column '{column}' on entity '{entity}' has no storage-class mapping")]
    UnstorableColumn { entity: &'static str, column: String },

    /// Parameter kind has no storage-class mapping.
    #[error("parameter '{name}' has no storage-class mapping")]
    UnstorableParam { name: String },

    /// Relation referenced columns are not unique on the target, so a
    /// left-join-and-map-one alias cannot be proven single-valued.
    #[error("relation '{relation}' on entity '{entity}' is not unique on its referenced columns")]
    RelationNotUnique {
        entity: &'static str,
        relation: &'static str,
    },

    /// Cursoring requires exactly one primary-key column.
    #[error("cursor requires exactly one primary-key column on '{entity}', found {found}")]
    CursorRequiresSinglePrimaryKey { entity: &'static str, found: usize },

    /// Graph handle points at a node of the wrong kind.
    #[error("step {id} is not a {expected} step")]
    NodeKindMismatch { id: StepId, expected: &'static str },
}

impl PlanError {
    // Construct one unknown-column error.
    pub(crate) fn unknown_column(entity: &'static str, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            entity,
            column: column.into(),
        }
    }

    // Construct one unstorable-column error.
    pub(crate) fn unstorable_column(entity: &'static str, column: impl Into<String>) -> Self {
        Self::UnstorableColumn {
            entity,
            column: column.into(),
        }
    }
}

///
/// ExecuteError
///
/// Activation-time failures. A failed activation fails the entire batch;
/// there is no partial success and no internal retry.
///

#[derive(Debug, ThisError)]
pub enum ExecuteError {
    /// Store round-trip failure for the single composed query.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine did not supply values for a declared dependency slot.
    #[error("no input values supplied for dependency slot {slot}")]
    MissingInput { slot: usize },

    /// The engine supplied a dependency value list of the wrong length.
    #[error("dependency slot {slot} carries {found} values, expected {expected}")]
    InputArityMismatch {
        slot: usize,
        expected: usize,
        found: usize,
    },

    /// A per-call value did not fit its column's storage class.
    #[error("value for column '{column}' is not storable: {source}")]
    ValueCoercion {
        column: String,
        #[source]
        source: CoerceError,
    },

    /// A store row was malformed (missing tag or alias-prefixed column).
    #[error("cannot decode store row: {message}")]
    RowDecode { message: String },

    /// The call-index tag on a returned row was out of range.
    #[error("row tag {tag} is outside the activation's call range 0..{count}")]
    TagOutOfRange { tag: Value, count: usize },
}

impl ExecuteError {
    // Construct one row-decode error.
    pub(crate) fn row_decode(message: impl Into<String>) -> Self {
        Self::RowDecode {
            message: message.into(),
        }
    }
}
