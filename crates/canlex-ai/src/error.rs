use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding has dimension {got}, expected {want}")]
    BadDimension { got: usize, want: usize },

    #[error("provider returned {got} results for {want} inputs")]
    CountMismatch { got: usize, want: usize },
}
