//! External model clients: embeddings, cross-encoder reranking, plus the
//! caches that absorb repeat load and the query-language heuristic.

pub mod cache;
mod embedder;
mod error;
mod langdetect;
mod reranker;

pub use cache::{TtlCache, sha1_hex};
pub use embedder::{EMBEDDING_DIM, EmbedderClient};
pub use error::AiError;
pub use langdetect::detect_language;
pub use reranker::CrossEncoderClient;
