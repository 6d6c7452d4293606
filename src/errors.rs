use thiserror::Error;

/// Fatal errors that stop the program before or outside the attempt loop.
///
/// Recoverable per-attempt failures (tool exit, timeout, verification miss)
/// are not errors at all; they live in the attempt log as
/// [`AttemptStatus`](crate::download::AttemptStatus) variants.
#[derive(Debug, Error)]
pub enum SalvageError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("environment error: {0}")]
    Environment(String),
}

impl SalvageError {
    /// Process exit code for this error class. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            SalvageError::Configuration(_) => 3,
            SalvageError::Environment(_) => 2,
        }
    }
}
