use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Image payload error: {0}")]
    ImageError(String),
}

impl From<serde_json::Error> for AnnotateError {
    fn from(err: serde_json::Error) -> Self {
        AnnotateError::SerializationError(err.to_string())
    }
}

impl From<lopdf::Error> for AnnotateError {
    fn from(err: lopdf::Error) -> Self {
        AnnotateError::OperationError(err.to_string())
    }
}
