//! # PubChem Client
//!
//! A client for the PubChem PUG REST service.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Queries, identifiers and decoded records (Compound, Substance, Assay)
//! - [`client`]: Request building, list-key polling, response decoding and the [`PubChemClient`] façade
//! - [`utils`]: HTTP transport, request spacing, retries and atomic downloads
//! - [`config`]: Configuration management
//!
//! ```rust,no_run
//! use pubchem_client::{Identifier, PubChemClient, Query};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pubchem_client::PubChemError> {
//! let client = PubChemClient::new()?;
//! let cids = client.get_cids(Query::compound(Identifier::name("aspirin"))).await?;
//! let aspirin = client.compound_from_cid(cids[0]).await?;
//! println!("{} {:?}", aspirin, aspirin.molecular_formula());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use client::{ErrorKind, PubChemClient, PubChemError};
pub use models::{
    Assay, Compound, Domain, Fingerprint, Identifier, Operation, OutputFormat, PropertyTag,
    Query, SearchSpec, Substance,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
