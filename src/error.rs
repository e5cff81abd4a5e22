use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PatternError>;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Palette codes not found in catalog: {}", .0.join(", "))]
    MissingCodes(Vec<String>),

    #[error("Unsupported operation: {operation}. Supported operations: {}", .supported.join(", "))]
    UnsupportedOperation {
        operation: String,
        supported: &'static [&'static str],
    },

    #[error("Input too large: {size} bytes (max {max})")]
    OversizedInput { size: usize, max: usize },

    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: &'static str, value: String },

    #[error("Pipeline failed during {stage}: {message}")]
    Pipeline { stage: &'static str, message: String },

    #[error("Catalog entry {code} is corrupt: {reason}")]
    CorruptEntry { code: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PatternError {
    pub(crate) fn invalid(parameter: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
        }
    }

    pub(crate) fn pipeline(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage,
            message: message.into(),
        }
    }

    /// True when the failure was caused by the caller's request rather than
    /// by the image or the catalog.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PatternError::MissingCodes(_)
                | PatternError::UnsupportedOperation { .. }
                | PatternError::OversizedInput { .. }
                | PatternError::InvalidParameter { .. }
        )
    }
}
