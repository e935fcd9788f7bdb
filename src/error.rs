use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported landmark shape format: {0}")]
    UnsupportedShapeFormat(String),

    #[error("Insufficient landmarks: expected at least {expected}, found {found}")]
    InsufficientLandmarks { expected: usize, found: usize },

    #[error("No landmark data for {0}")]
    RegionLookupMiss(String),

    #[error("Row processing error: {message}")]
    RowProcessing { message: String },

    #[error("Invalid region catalog: {0}")]
    InvalidCatalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn row(message: impl Into<String>) -> Self {
        Self::RowProcessing {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
