//! # Tracker Ontology
//!
//! The in-memory schema engine of the Tracker metadata indexer: RDF/OWL-style
//! classes, properties, namespaces and ontology descriptors, a registry that
//! keys them by URI and row id, and loaders that build a populated registry
//! from ontology source files.
//!
//! ## Quick start
//!
//! ```no_run
//! use tracker_ontology::rdf;
//!
//! let registry = rdf::load_from_files(&["ontologies/core.ontology"])?;
//! let class = registry.class_by_uri("http://example.org/ns#Document");
//! # Ok::<(), tracker_ontology::SchemaError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`entities`] - schema entity records (classes, properties, namespaces)
//! - [`registry`] - URI- and id-keyed containers plus the persisted form
//! - [`turtle`] - line-oriented Turtle statement reader with locations
//! - [`rdf`] - ontology loader that applies triples to a registry
//! - [`error`] - error types and result handling

/// Schema error types and result handling
pub mod error;

/// Well-known namespace and predicate URIs
pub mod constants;

/// Schema entity records
pub mod entities;

/// The registry of schema entities
pub mod registry;

/// Turtle statement reader
pub mod turtle;

/// Ontology loader over RDF triple streams
pub mod rdf;

pub use error::{SchemaError, SchemaResult};
pub use entities::{Class, Namespace, Ontology, Property, Rowid};
pub use registry::{PersistedTables, Registry, SchemaValue};
