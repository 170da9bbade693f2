//! Storage layer: DuckDB (resources, metadata queries), LanceDB
//! (embeddings, vector + full-text search).

mod embeddings;
mod error;
mod metadata_query;
mod resources;

pub use embeddings::{EmbeddingHit, EmbeddingStore, NewEmbedding};
pub use error::StoreError;
pub use metadata_query::{DateField, DateFilter, MetadataField, MetadataQuery, SortDirection};
pub use resources::{NewResource, ResourceRow, ResourceStore};
