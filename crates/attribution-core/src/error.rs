use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Missing column '{column}' in input header")]
    MissingColumn { column: String },

    #[error("Non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AttributionError {
    fn from(e: serde_json::Error) -> Self {
        AttributionError::SerializationError(e.to_string())
    }
}

impl From<serde_yaml::Error> for AttributionError {
    fn from(e: serde_yaml::Error) -> Self {
        AttributionError::SerializationError(e.to_string())
    }
}
