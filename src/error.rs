use thiserror::Error;

/// Errors surfaced by the grading/ranking engine. Storage failures are
/// propagated unmodified; the engine never retries.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("marks {marks} outside allowed range 0..={max_mark}")]
    InvalidMark { marks: i64, max_mark: i64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    /// Stable wire code for IPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidMark { .. } => "invalid_mark",
            EngineError::NotFound(_) => "not_found",
            EngineError::Storage(_) => "db_query_failed",
        }
    }
}
