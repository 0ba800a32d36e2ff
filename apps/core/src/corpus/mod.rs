//! # Policy Corpus
//!
//! Per-domain policy sets and the term-frequency vector space built from them.
//!
//! ## Components
//! - `policy`: policy definitions and the JSON document format
//! - `index`: TF-IDF vector space and per-domain query
//! - `store`: immutable snapshots, directory loading, atomic reload

pub mod index;
pub mod policy;
pub mod store;

pub use index::{DomainCoverage, DomainIndex, SparseVector, VectorSpace};
pub use policy::{DomainDocument, Policy, PolicyDocument, Severity};
pub use store::{PolicySnapshot, PolicyStore};
