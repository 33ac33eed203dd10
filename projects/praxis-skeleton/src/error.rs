use std::path::PathBuf;

/// A filename or annotation timestamp that does not match the expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Filename not in expected format (missing '{suffix}'): {name}")]
    MissingSuffix { name: String, suffix: &'static str },

    #[error("No '.' found in timestamp portion: {0}")]
    MissingFraction(String),

    #[error("No 'T' found in datetime portion: {0}")]
    MissingDateSeparator(String),

    #[error("Time '{0}' does not match HH-MM-SS")]
    InvalidTime(String),

    #[error("Frame ordinal '{0}' is not an unsigned integer")]
    InvalidOrdinal(String),
}

/// Failure to recover an action interval from a patient's annotation file.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("Failed to read annotation file {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Annotation row {row} in {path:?} has {found} columns, expected at least 3")]
    ShortRow {
        path: PathBuf,
        row: usize,
        found: usize,
    },

    #[error("Malformed interval for action {action_id} in {path:?}: {source}")]
    Timestamp {
        path: PathBuf,
        action_id: String,
        #[source]
        source: FormatError,
    },
}
