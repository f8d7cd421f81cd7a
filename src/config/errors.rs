//! Validation errors raised before any work is scheduled

/// Rejected configuration, boundary, category spec or provider option
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Boundary geometry is malformed or out of range
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    /// Cell size is negative, non-finite or produces an unusable mesh
    #[error("Invalid cell size: {0}")]
    InvalidCellSize(String),

    /// Category spec could not be parsed
    #[error("Invalid category spec: {0}")]
    InvalidCategorySpec(String),

    /// A provider or visualizer option failed validation
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// Any other invalid engine setting
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }
}
