//! Shared adapter error types.
//!
//! One error enum covers every source and sink adapter so that the
//! pipeline can classify failures uniformly: a handful of variants are
//! fatal to a whole pass, everything else is a per-record or
//! per-action failure that the caller logs and moves past.

use thiserror::Error;

/// Error that can occur while fetching snapshots or applying actions.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A full snapshot fetch failed. Always fatal to the pass: a
    /// missing snapshot must never be mistaken for an empty one.
    #[error("{system} snapshot fetch failed: {message}")]
    SourceFetch {
        system: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote HTTP API answered with a non-success status.
    #[error("{context}: HTTP {status}: {body}")]
    HttpStatus {
        status: u16,
        body: String,
        context: String,
    },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("http error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database failure.
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Directory (LDAP) failure.
    #[error("directory error: {message}")]
    Directory {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Directory bind was rejected.
    #[error("directory authentication failed")]
    AuthenticationFailed,

    /// A record is missing a field the mapping requires. The record is
    /// rejected rather than written back partially.
    #[error("record {key}: missing required field '{field}'")]
    MissingField { key: String, field: &'static str },

    /// A record cannot be used at all (for example, no business key).
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    /// A field-id table does not agree with the canonical attribute
    /// set or with the live target schema. Fatal at startup.
    #[error("field table error: {message}")]
    FieldTable { message: String },

    /// Adapter or pipeline configuration is invalid. Fatal.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The action kind is not supported by this sink.
    #[error("{system} sink does not support {operation}")]
    UnsupportedAction {
        system: &'static str,
        operation: &'static str,
    },

    /// The authoritative snapshot looks like a failed fetch and the
    /// caller has not confirmed a teardown.
    #[error(
        "authoritative snapshot has {authoritative} records while the target has {target}; \
         refusing to tear down the target without explicit confirmation"
    )]
    TeardownRefused { authoritative: usize, target: usize },

    /// Serialization failure.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl AdapterError {
    /// Whether this error must abort the whole pass instead of being
    /// reported per action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::SourceFetch { .. }
                | AdapterError::FieldTable { .. }
                | AdapterError::InvalidConfiguration { .. }
                | AdapterError::TeardownRefused { .. }
                | AdapterError::AuthenticationFailed
        )
    }

    /// Wrap an error from a snapshot fetch, marking it fatal.
    pub fn source_fetch(
        system: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::SourceFetch {
            system,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a database error with its underlying cause.
    pub fn database(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a directory error with its underlying cause.
    pub fn directory(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::Directory {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport-level HTTP error with its underlying cause.
    pub fn http(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::Http {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        AdapterError::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a field-table error.
    pub fn field_table(message: impl Into<String>) -> Self {
        AdapterError::FieldTable {
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        AdapterError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
