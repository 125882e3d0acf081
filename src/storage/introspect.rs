//! Schema introspection from an initialized store
//!
//! Builds a [`Registry`] by reading schema triples back out of a storage
//! backend that was bootstrapped earlier, instead of re-parsing ontology
//! source files. The loader runs a fixed sequence of queries: ontologies,
//! namespaces, classes, properties, then the per-entity link tables.

use indexmap::IndexMap;
use oxigraph::model::Term;
use oxigraph::sparql::{QuerySolution, QueryResults};

use tracker_ontology::constants;
use tracker_ontology::{Class, Namespace, Ontology, Property, Registry, Rowid};

use crate::error::{Result, StorageError};
use crate::storage::MetadataStore;

fn term_str(solution: &QuerySolution, var: &str) -> Option<String> {
    match solution.get(var)? {
        Term::NamedNode(node) => Some(node.as_str().to_string()),
        Term::Literal(literal) => Some(literal.value().to_string()),
        _ => None,
    }
}

fn term_i64(solution: &QuerySolution, var: &str) -> Option<i64> {
    match solution.get(var)? {
        Term::Literal(literal) => literal.value().parse().ok(),
        _ => None,
    }
}

fn term_bool(solution: &QuerySolution, var: &str) -> Option<bool> {
    match solution.get(var)? {
        Term::Literal(literal) => match literal.value() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn solutions(store: &MetadataStore, sparql: &str) -> Result<Vec<QuerySolution>> {
    match store.query(sparql)? {
        QueryResults::Solutions(iter) => iter
            .map(|solution| {
                solution.map_err(|e| StorageError::IntrospectionFailed(e.to_string()).into())
            })
            .collect(),
        _ => Err(StorageError::IntrospectionFailed("expected solutions".to_string()).into()),
    }
}

/// Load a registry from an already-initialized storage backend
pub fn load_from_store(store: &MetadataStore) -> Result<Registry> {
    let mut ontologies: IndexMap<String, Ontology> = IndexMap::new();
    let mut namespaces: IndexMap<String, Namespace> = IndexMap::new();
    let mut classes: IndexMap<String, Class> = IndexMap::new();
    let mut properties: IndexMap<String, Property> = IndexMap::new();
    let mut id_uri_pairs: Vec<(Rowid, String)> = Vec::new();

    // Ontologies
    for solution in solutions(
        store,
        &format!(
            "SELECT ?uri WHERE {{ ?uri a <{}> }} ORDER BY ?uri",
            constants::NRL_ONTOLOGY
        ),
    )? {
        if let Some(uri) = term_str(&solution, "uri") {
            let mut ontology = Ontology::new();
            ontology.set_uri(&uri);
            ontologies.insert(uri, ontology);
        }
    }

    // Namespaces with their prefixes
    for solution in solutions(
        store,
        &format!(
            "SELECT ?uri ?prefix WHERE {{ ?uri a <{}> ; <{}> ?prefix }} ORDER BY ?uri",
            constants::NRL_NAMESPACE,
            constants::NRL_PREFIX
        ),
    )? {
        let (Some(uri), Some(prefix)) = (term_str(&solution, "uri"), term_str(&solution, "prefix"))
        else {
            continue;
        };
        let mut namespace = Namespace::new();
        namespace.set_uri(&uri);
        namespace.set_prefix(&prefix);
        namespaces.insert(uri, namespace);
    }

    // Classes with id and notify flag
    for solution in solutions(
        store,
        &format!(
            "SELECT ?uri ?id ?notify WHERE {{ ?uri a <{}> . \
             OPTIONAL {{ ?uri <{}id> ?id }} \
             OPTIONAL {{ ?uri <{}> ?notify }} }} ORDER BY ?id ?uri",
            constants::RDFS_CLASS,
            constants::PREFIX_TRACKER,
            constants::NRL_NOTIFY
        ),
    )? {
        let Some(uri) = term_str(&solution, "uri") else {
            continue;
        };
        let mut class = Class::new();
        class.set_uri(&uri);
        if let Some(id) = term_i64(&solution, "id") {
            class.set_id(id);
            id_uri_pairs.push((id, uri.clone()));
        }
        if let Some(notify) = term_bool(&solution, "notify") {
            class.set_notify(notify);
        }
        classes.insert(uri, class);
    }

    // Properties with their attributes
    for solution in solutions(
        store,
        &format!(
            "SELECT ?uri ?id ?domain ?range ?cardinality ?indexed ?secondary ?fulltext WHERE {{ \
             ?uri a <{}> . \
             OPTIONAL {{ ?uri <{}id> ?id }} \
             OPTIONAL {{ ?uri <{}> ?domain }} \
             OPTIONAL {{ ?uri <{}> ?range }} \
             OPTIONAL {{ ?uri <{}> ?cardinality }} \
             OPTIONAL {{ ?uri <{}> ?indexed }} \
             OPTIONAL {{ ?uri <{}> ?secondary }} \
             OPTIONAL {{ ?uri <{}> ?fulltext }} }} ORDER BY ?id ?uri",
            constants::RDF_PROPERTY,
            constants::PREFIX_TRACKER,
            constants::RDFS_DOMAIN,
            constants::RDFS_RANGE,
            constants::NRL_MAX_CARDINALITY,
            constants::NRL_INDEXED,
            constants::NRL_SECONDARY_INDEX,
            constants::NRL_FULLTEXT_INDEXED
        ),
    )? {
        let Some(uri) = term_str(&solution, "uri") else {
            continue;
        };
        let mut property = Property::new();
        property.set_uri(&uri);
        if let Some(id) = term_i64(&solution, "id") {
            property.set_id(id);
            id_uri_pairs.push((id, uri.clone()));
        }
        if let Some(domain) = term_str(&solution, "domain") {
            property.set_domain(&domain);
        }
        if let Some(range) = term_str(&solution, "range") {
            property.set_range(&range);
        }
        let cardinality = term_i64(&solution, "cardinality");
        property.set_multiple_values(cardinality != Some(1));
        if let Some(indexed) = term_bool(&solution, "indexed") {
            property.set_indexed(indexed);
        }
        if let Some(secondary) = term_str(&solution, "secondary") {
            property.set_secondary_index(&secondary);
        }
        if let Some(fulltext) = term_bool(&solution, "fulltext") {
            property.set_fulltext_indexed(fulltext);
        }
        properties.insert(uri, property);
    }

    // Inverse functional property markers
    for solution in solutions(
        store,
        &format!(
            "SELECT ?uri WHERE {{ ?uri a <{}> }}",
            constants::NRL_INVERSE_FUNCTIONAL_PROPERTY
        ),
    )? {
        if let Some(uri) = term_str(&solution, "uri") {
            if let Some(property) = properties.get_mut(&uri) {
                property.set_is_inverse_functional(true);
            }
        }
    }

    // Per-class super classes and domain indexes; classes and properties
    // must all be known before these links can be followed
    let class_uris: Vec<String> = classes.keys().cloned().collect();
    for uri in &class_uris {
        for solution in solutions(
            store,
            &format!(
                "SELECT ?super WHERE {{ <{}> <{}> ?super }} ORDER BY ?super",
                uri,
                constants::RDFS_SUB_CLASS_OF
            ),
        )? {
            if let Some(super_uri) = term_str(&solution, "super") {
                classes.get_mut(uri).unwrap().add_super_class(&super_uri);
            }
        }

        for solution in solutions(
            store,
            &format!(
                "SELECT ?property WHERE {{ <{}> <{}> ?property }} ORDER BY ?property",
                uri,
                constants::NRL_DOMAIN_INDEX
            ),
        )? {
            if let Some(property_uri) = term_str(&solution, "property") {
                classes.get_mut(uri).unwrap().add_domain_index(&property_uri);
                if let Some(property) = properties.get_mut(&property_uri) {
                    property.add_domain_index(uri);
                }
            }
        }
    }

    // Per-property super properties
    let property_uris: Vec<String> = properties.keys().cloned().collect();
    for uri in &property_uris {
        for solution in solutions(
            store,
            &format!(
                "SELECT ?super WHERE {{ <{}> <{}> ?super }} ORDER BY ?super",
                uri,
                constants::RDFS_SUB_PROPERTY_OF
            ),
        )? {
            if let Some(super_uri) = term_str(&solution, "super") {
                properties
                    .get_mut(uri)
                    .unwrap()
                    .add_super_property(&super_uri);
            }
        }
    }

    let mut registry = Registry::new();
    for (_, ontology) in ontologies {
        registry.add_ontology(ontology);
    }
    for (_, namespace) in namespaces {
        registry.add_namespace(namespace);
    }
    for (_, class) in classes {
        registry.add_class(class);
    }
    for (_, property) in properties {
        registry.add_property(property);
    }
    for (id, uri) in id_uri_pairs {
        registry.add_id_uri_pair(id, &uri);
    }

    registry.verify_completeness()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix nrl: <http://tracker.api.gnome.org/ontology/v3/nrl#> .
@prefix tracker: <http://tracker.api.gnome.org/ontology/v3/tracker#> .
@prefix ex: <http://example.org/ns#> .

<http://example.org/core> a nrl:Ontology .
<http://example.org/ns#> a nrl:Namespace ; nrl:prefix "ex" .

ex:Resource a rdfs:Class ; tracker:id 1 .
ex:Document a rdfs:Class ; tracker:id 2 ; nrl:notify true ;
	rdfs:subClassOf ex:Resource .

ex:title a rdf:Property ; tracker:id 10 ;
	rdfs:domain ex:Document ; rdfs:range ex:Resource ;
	nrl:maxCardinality 1 ; nrl:fulltextIndexed true .
ex:title a nrl:InverseFunctionalProperty .

ex:keyword a rdf:Property ; tracker:id 11 ;
	rdfs:domain ex:Document ; rdfs:range ex:Resource .

ex:Document nrl:domainIndex ex:keyword .
"#;

    #[test]
    fn test_introspection_builds_the_schema() {
        let store = MetadataStore::new().unwrap();
        store.load_turtle(SCHEMA).unwrap();

        let registry = load_from_store(&store).unwrap();

        assert_eq!(registry.ontologies().len(), 1);
        assert_eq!(registry.namespaces().len(), 1);
        assert_eq!(registry.classes().len(), 2);
        assert_eq!(registry.properties().len(), 2);

        let document = registry
            .class_by_uri("http://example.org/ns#Document")
            .unwrap();
        assert_eq!(document.id(), Some(2));
        assert!(document.notify());
        assert_eq!(document.super_classes(), &["http://example.org/ns#Resource"]);
        assert_eq!(document.domain_indexes(), &["http://example.org/ns#keyword"]);

        let title = registry
            .property_by_uri("http://example.org/ns#title")
            .unwrap();
        assert_eq!(title.id(), Some(10));
        assert!(!title.multiple_values());
        assert!(title.fulltext_indexed());
        assert!(title.is_inverse_functional());

        assert_eq!(registry.uri_by_id(2), Some("http://example.org/ns#Document"));
        assert_eq!(registry.uri_by_id(10), Some("http://example.org/ns#title"));
    }

    #[test]
    fn test_introspection_incomplete_property_fails() {
        let store = MetadataStore::new().unwrap();
        store
            .load_turtle(
                "@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .\n\
                 @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
                 @prefix ex: <http://example.org/ns#> .\n\
                 ex:A a rdfs:Class .\n\
                 ex:p a rdf:Property ; rdfs:domain ex:A .",
            )
            .unwrap();

        assert!(load_from_store(&store).is_err());
    }
}
