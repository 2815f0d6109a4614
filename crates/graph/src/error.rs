use refactor_catalog::MetadataAccessError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Failures that stop a resolution before traversal starts.
///
/// Anything below the root is recorded as an error node instead.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to fetch definition of {routine}: {source}")]
    RootDefinition {
        routine: String,
        source: MetadataAccessError,
    },

    #[error("Failed to extract dependencies of {routine}: {source}")]
    RootEdges {
        routine: String,
        source: MetadataAccessError,
    },

    #[error("Unknown extraction strategy: {0}")]
    UnknownStrategy(String),
}
