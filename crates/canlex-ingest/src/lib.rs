//! Ingestion pipeline: LIMS XML → typed records → chunks → embeddings →
//! storage.

pub mod chunker;
mod definitions;
mod error;
mod indexer;
mod pairing;
mod parser;
mod scope;
mod text;

pub use chunker::{Chunk, Chunker};
pub use error::{IngestError, ParseError, ParseErrorKind};
pub use indexer::{Indexer, IngestReport};
pub use pairing::pair_defined_terms;
pub use parser::parse_document;
pub use scope::{ParsedScope, parse_scope, parse_section_refs, repair_reference_artifacts};
