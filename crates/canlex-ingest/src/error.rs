use thiserror::Error;

/// What went wrong while parsing one LIMS document.
#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unrecognized root element <{0}>")]
    UnknownRoot(String),

    #[error("missing required identification element <{0}>")]
    MissingIdentification(&'static str),
}

/// Parse failure, located by an element path such as
/// `/Statute/Identification`. Fails the one ingest item; the batch keeps
/// going.
#[derive(Debug, Error)]
#[error("{kind} at {path}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub path: String,
}

impl ParseError {
    pub fn new(kind: impl Into<ParseErrorKind>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
        }
    }
}

/// Ingest pipeline failure (parsing, chunking, embedding, or storage).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error(transparent)]
    Store(#[from] canlex_store::StoreError),

    #[error(transparent)]
    Ai(#[from] canlex_ai::AiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
