//! Core data models: queries, records and the values decoded from them.

mod assay;
mod compound;
mod download;
mod fingerprint;
mod property;
mod query;
mod substance;

pub use assay::{Assay, AssayResultColumn, ProjectCategory};
pub use compound::{element_symbol, Atom, Bond, BondType, Compound, CompoundIdType, CoordinateType};
pub use download::{DownloadRequest, DownloadResult};
pub use fingerprint::{tanimoto, Fingerprint, FingerprintError};
pub use property::{
    normalize_property_name, PropertyRow, PropertyTag, PropertyValue, SynonymSet, ValueType,
};
pub use query::{
    Domain, Identifier, Operation, OutputFormat, Pagination, Query, SearchSpec, SearchType,
    XrefKind,
};
pub use substance::Substance;

use thiserror::Error;

/// A record that does not have the shape its container promises
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl RecordError {
    pub(crate) fn malformed(kind: &str, err: impl std::fmt::Display) -> Self {
        RecordError::Malformed(format!("{}: {}", kind, err))
    }
}
