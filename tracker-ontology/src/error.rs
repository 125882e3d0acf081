//! Error types for the ontology engine

use thiserror::Error;

/// Schema engine error type
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Syntax or semantic errors found while applying ontology triples.
    /// Individual diagnostics are reported inline with their location; this
    /// is the final verdict after a whole load pass.
    #[error("Syntax errors found while parsing ontology")]
    Parse,

    /// Malformed statement in an ontology source file
    #[error("{location}: {message}")]
    Statement { location: String, message: String },

    /// A property was declared but never given a domain or range
    #[error("{location}: Property {property} has no defined {missing}.")]
    IncompletePropertyDefinition {
        location: String,
        property: String,
        missing: &'static str,
    },

    /// nrl:maxCardinality values must be integers greater than zero
    #[error("Property nrl:maxCardinality only accepts integers greater than 0")]
    InvalidCardinality,

    /// nrl:secondaryIndex constraints were violated
    #[error("Invalid secondary index: {0}")]
    InvalidSecondaryIndex(String),

    /// Forwarded verbatim from the storage layer
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors while reading ontology files or persisted tables
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted table (de)serialization errors
    #[error("Persisted registry error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
