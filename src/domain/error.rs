//! Pipeline error types

use thiserror::Error;

/// Errors raised by the data pipeline.
///
/// All of these are fatal to the shard being processed, but the
/// experiment runner records them and moves on to the next shard.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An archive row has no matching row in the label table.
    #[error("image '{image_id}' has no matching row in the label table")]
    MissingLabel { image_id: String },

    /// Arrays that must share a leading dimension disagree.
    #[error("'{name}' has {found} rows, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Input data disagrees with a declared size, range or setting.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The columnar archive could not be read.
    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_label_display_names_the_id() {
        let err = PipelineError::MissingLabel {
            image_id: "abc123".to_string(),
        };
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = PipelineError::ShapeMismatch {
            name: "output_vowel".to_string(),
            expected: 10,
            found: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("output_vowel"));
        assert!(msg.contains("10"));
        assert!(msg.contains("9"));
    }
}
