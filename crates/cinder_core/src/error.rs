//! Graphics error types

use thiserror::Error;

/// Errors raised by the graphic context, batchers and canvas.
///
/// State left behind after an error is not guaranteed to be consistent.
/// Recreate the offending context rather than continuing to use it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphicsError {
    /// The handle does not refer to a live backend object
    #[error("Null object: {0}")]
    NullObject(&'static str),

    /// Out-of-range index, non-positive size or malformed geometry
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single batched call needs more vertices than one flush can hold
    #[error("Capacity exceeded: {requested} vertices requested, batch holds {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    /// The active backend does not provide this capability
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl GraphicsError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        GraphicsError::InvalidArgument(message.into())
    }
}

/// Result type for graphics operations
pub type Result<T> = std::result::Result<T, GraphicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GraphicsError::CapacityExceeded {
            requested: 10,
            capacity: 4,
        };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded: 10 vertices requested, batch holds 4"
        );
        assert_eq!(
            GraphicsError::invalid_argument("texture index 300").to_string(),
            "Invalid argument: texture index 300"
        );
    }
}
