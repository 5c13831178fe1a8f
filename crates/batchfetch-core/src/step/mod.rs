//! Fetch steps and record handles.

pub mod execute;
pub mod fetch;
pub mod record;

pub use execute::ActivationInputs;
pub use fetch::{
    AliasEntry, AliasKind, AliasRegistry, ExecMode, FetchStep, FilterEntry, FilterSpec,
    LeftOneJoin, PageDeps, ParamEntry, ParamRef,
};
pub use record::{RecordStep, decode_cursor, encode_cursor};
