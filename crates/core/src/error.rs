#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The request was rejected before anything was sent.
    #[error("Validation failed: {0}")]
    Validation(String),
}
