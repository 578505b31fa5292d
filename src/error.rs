use thiserror::Error;

/// Failures surfaced by the workout engine. The `Display` text is what the
/// user gets to see.
#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("inputs should be positive numbers: {0}")]
    Validation(String),

    #[error("no workout with id {0}")]
    NotFound(String),

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("corrupt persisted record: {0}")]
    CorruptRecord(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("could not get your position: {0}")]
    Position(String),

    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, WorkoutError>;
