//! Core types, resource keys, and text normalization shared across Canlex.

pub mod config;
pub mod docid;
pub mod metadata;
pub mod normalize;
pub mod resource_key;
pub mod types;

pub use config::RetrievalConfig;
pub use docid::translate_doc_id;
pub use metadata::ResourceMetadata;
pub use normalize::{flatten_whitespace, normalize_for_embedding, normalize_term_for_matching};
pub use resource_key::{paired_resource_key, resource_key};
pub use types::{
    Act, ChangeType, DocStatus, Language, ParsedCrossReference, ParsedDefinedTerm, ParsedDocument,
    ParsedSection, Regulation, ScopeType, SectionType, SourceType,
};
