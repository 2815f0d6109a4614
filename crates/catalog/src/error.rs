use thiserror::Error;

/// Result type for metadata lookups
pub type Result<T> = std::result::Result<T, MetadataAccessError>;

/// Failure while querying the metadata store for a specific object.
///
/// A missing object is never an error: lookups report absence through empty
/// strings, empty column lists or `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataAccessError {
    /// Store unreachable or the session dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Caller lacks VIEW DEFINITION or similar rights
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Query exceeded the connection's timeout
    #[error("Query timed out: {0}")]
    Timeout(String),

    /// Store rejected the query text or parameters
    #[error("Malformed query ({query}): {message}")]
    MalformedQuery { query: String, message: String },

    /// Row came back in a shape the accessor does not understand
    #[error("Unexpected row shape: {0}")]
    UnexpectedRow(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MetadataAccessError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a malformed-query error
    pub fn malformed_query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected-row error
    pub fn unexpected_row(msg: impl Into<String>) -> Self {
        Self::UnexpectedRow(msg.into())
    }
}
