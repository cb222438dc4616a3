use thiserror::Error;

/// Failures of the highlight core. None of these are fatal to the reader:
/// callers log them and either deactivate the core or keep previous state.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("comment thread id could not be found")]
    MissingIdentity,

    #[error("cached value for {key} is not a timestamp: {value:?}")]
    MalformedCacheValue { key: String, value: String },

    #[error("could not parse date: {0:?}")]
    UnparseableOverride(String),

    #[error("date {0} is in the future")]
    OverrideInFuture(i64),

    #[error("ui element missing: {0}")]
    MissingUiAnchor(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type HighlightResult<T> = std::result::Result<T, HighlightError>;
