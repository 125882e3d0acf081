//! RDF metadata store
//!
//! Wraps the oxigraph store with the error handling and convenience helpers
//! the rest of the core needs. The store holds indexed documents and, when
//! the engine is bootstrapped from an existing database, the schema triples
//! the introspection loader reads back.

pub mod introspect;

use std::io::Cursor;
use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::{Literal, NamedNode, Quad};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use tracker_ontology::constants;

use crate::error::{Result, StorageError};

/// A connection to the metadata store
#[derive(Clone)]
pub struct MetadataStore {
    store: Store,
}

impl MetadataStore {
    /// Open a fresh in-memory store
    pub fn new() -> Result<Self> {
        let store = Store::new()
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to create store: {e}")))?;
        Ok(MetadataStore { store })
    }

    /// Load Turtle data into the default graph
    pub fn load_turtle(&self, rdf_data: &str) -> Result<()> {
        let reader = Cursor::new(rdf_data.as_bytes());
        self.store
            .load_from_reader(RdfFormat::Turtle, reader)
            .map_err(|e| StorageError::RdfParsingFailed(format!("Failed to load data: {e}")))?;
        Ok(())
    }

    /// Load a Turtle file into the default graph
    pub fn load_turtle_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.load_turtle(&data)
    }

    /// Run a SPARQL query
    pub fn query(&self, sparql: &str) -> Result<QueryResults> {
        self.store
            .query(sparql)
            .map_err(|e| StorageError::QueryFailed(e.to_string()).into())
    }

    /// Register an indexed document: its integer document id, its URL and
    /// its rdf:type.
    pub fn add_document(&self, doc_id: u32, url: &str, class_uri: &str) -> Result<()> {
        let subject = NamedNode::new(format!("urn:tracker:doc:{doc_id}"))
            .map_err(|e| StorageError::RdfParsingFailed(e.to_string()))?;
        let rdf_type = NamedNode::new(constants::RDF_TYPE)
            .map_err(|e| StorageError::RdfParsingFailed(e.to_string()))?;
        let class = NamedNode::new(class_uri)
            .map_err(|e| StorageError::RdfParsingFailed(e.to_string()))?;
        let tracker_id = NamedNode::new(format!("{}id", constants::PREFIX_TRACKER))
            .map_err(|e| StorageError::RdfParsingFailed(e.to_string()))?;
        let nie_url = NamedNode::new(format!("{}url", constants::PREFIX_NIE))
            .map_err(|e| StorageError::RdfParsingFailed(e.to_string()))?;

        for quad in [
            Quad::new(
                subject.clone(),
                rdf_type,
                class,
                oxigraph::model::GraphName::DefaultGraph,
            ),
            Quad::new(
                subject.clone(),
                tracker_id,
                Literal::from(doc_id as i64),
                oxigraph::model::GraphName::DefaultGraph,
            ),
            Quad::new(
                subject,
                nie_url,
                Literal::new_simple_literal(url),
                oxigraph::model::GraphName::DefaultGraph,
            ),
        ] {
            self.store
                .insert(&quad)
                .map_err(|e| StorageError::QueryFailed(format!("Failed to insert quad: {e}")))?;
        }

        Ok(())
    }

    /// The underlying oxigraph store
    pub fn inner(&self) -> &Store {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_query() {
        let store = MetadataStore::new().unwrap();
        store
            .load_turtle(
                "@prefix ex: <http://example.org/ns#> .\n\
                 ex:doc1 a ex:Document .",
            )
            .unwrap();

        let results = store
            .query("SELECT ?s WHERE { ?s a <http://example.org/ns#Document> }")
            .unwrap();
        if let QueryResults::Solutions(solutions) = results {
            assert_eq!(solutions.count(), 1);
        } else {
            panic!("expected solutions");
        }
    }

    #[test]
    fn test_add_document() {
        let store = MetadataStore::new().unwrap();
        store
            .add_document(7, "file:///tmp/a.txt", "http://example.org/ns#Document")
            .unwrap();

        let results = store
            .query(&format!(
                "SELECT ?type WHERE {{ ?s <{}id> 7 ; a ?type }}",
                constants::PREFIX_TRACKER
            ))
            .unwrap();
        if let QueryResults::Solutions(solutions) = results {
            assert_eq!(solutions.count(), 1);
        } else {
            panic!("expected solutions");
        }
    }
}
