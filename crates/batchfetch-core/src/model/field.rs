use crate::value::StorageClass;

///
/// ColumnModel
/// Runtime column metadata used by planning and decoding.
///

#[derive(Debug)]
pub struct ColumnModel {
    /// Column name as used in filter specs and projections.
    pub name: &'static str,
    /// Runtime type shape (a lossy projection of the schema type).
    pub kind: ColumnKind,
    /// False when the store compares this column under a non-exact
    /// collation (e.g. case-insensitive text). Such columns are excluded
    /// from the record-handle known-value short-circuit and from join
    /// inlining eligibility.
    pub exact_equality: bool,
}

impl ColumnModel {
    /// Declare a column with exact (collation-stable) equality.
    #[must_use]
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            exact_equality: true,
        }
    }

    /// Declare a column whose store-side comparison is not exact.
    #[must_use]
    pub const fn inexact(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            exact_equality: false,
        }
    }
}

///
/// ColumnKind
///
/// Minimal type surface needed by the fetch layer. Aligned with `Value`
/// variants; `Unsupported` marks columns that cannot be filtered on or
/// carried through the correlation payload.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Timestamp,

    /// Marker for columns that are not filterable or correlatable.
    Unsupported,
}

impl ColumnKind {
    /// The fixed kind-to-storage-class table. `None` for unmapped kinds;
    /// callers turn that into a construction-time error, never a fallback.
    #[must_use]
    pub const fn storage_class(&self) -> Option<StorageClass> {
        match self {
            Self::Bool => Some(StorageClass::Boolean),
            Self::Int | Self::Uint | Self::Timestamp => Some(StorageClass::Integer),
            Self::Float => Some(StorageClass::Real),
            Self::Text => Some(StorageClass::Text),
            Self::Unsupported => None,
        }
    }
}
