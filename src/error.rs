//! Error handling for Tracker
//!
//! This module provides the error types surfaced by the indexer core, one
//! enum per subsystem plus the umbrella [`TrackerError`].

use thiserror::Error;

use tracker_ontology::SchemaError;

/// Main error type for Tracker operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Schema/ontology errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Query-related errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Service manifest errors
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Writeback errors
    #[error("Writeback error: {0}")]
    Writeback(#[from] WritebackError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("RDF parsing failed: {0}")]
    RdfParsingFailed(String),

    #[error("Schema introspection failed: {0}")]
    IntrospectionFailed(String),
}

/// Query-specific errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Query parsed to an empty tree")]
    EmptyTree,

    #[error("Hit count query failed: {0}")]
    HitCounts(String),
}

/// Service manifest errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service manifest parsing failed: {0}")]
    ManifestParse(String),
}

/// Writeback errors
#[derive(Error, Debug)]
pub enum WritebackError {
    /// Controller initialization failures terminate startup
    #[error("Writeback initialization failed: {0}")]
    Init(String),

    /// Module failures are logged; the task still completes
    #[error("Writeback module '{module}' failed: {message}")]
    Module { module: String, message: String },

    #[error("Writeback controller is not running")]
    NotRunning,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
