//! Similarity index over collected exports.
//!
//! [`VectorIndex`] stores `(id, text, vector, metadata)` rows in SQLite,
//! grouped by collection, and answers cosine top-k queries.
//! [`RetrievalIndexer`] turns an export into those rows.

pub mod indexer;
pub mod store;

pub use indexer::{build_units, IndexReport, IndexUnit, RetrievalIndexer};
pub use store::{IndexEntry, Metadata, MetadataValue, QueryHit, VectorIndex};
