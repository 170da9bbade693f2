use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Store(#[from] canlex_store::StoreError),

    #[error(transparent)]
    Ai(#[from] canlex_ai::AiError),
}
