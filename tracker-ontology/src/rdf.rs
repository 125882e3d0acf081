//! Ontology loader over RDF triple streams
//!
//! Applies ontology source files statement by statement to a staging area,
//! then seals the result into a [`Registry`]. Diagnostics carry the
//! `<path>:<line>:<col>` location of the offending statement; individual bad
//! statements do not abort the pass, but any of them fails the overall load
//! once every file has been read.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::constants;
use crate::entities::{Class, Namespace, Ontology, Property};
use crate::error::{SchemaError, SchemaResult};
use crate::registry::Registry;
use crate::turtle::{self, Statement};

/// Load a registry from a list of ontology source files, applied in list
/// order.
pub fn load_from_files<P: AsRef<Path>>(paths: &[P]) -> SchemaResult<Registry> {
    let mut loader = Loader::new();

    for path in paths {
        let path = path.as_ref();
        let source = path.display().to_string();
        let content = fs::read_to_string(path)?;
        loader.load_document(&content, &source)?;
    }

    loader.finish()
}

/// Load a registry from in-memory ontology documents, applied in list order.
/// Each entry is `(content, source name)`.
pub fn load_from_documents(documents: &[(&str, &str)]) -> SchemaResult<Registry> {
    let mut loader = Loader::new();

    for (content, source) in documents {
        loader.load_document(content, source)?;
    }

    loader.finish()
}

struct Loader {
    classes: IndexMap<String, Class>,
    properties: IndexMap<String, Property>,
    namespaces: IndexMap<String, Namespace>,
    ontologies: IndexMap<String, Ontology>,
    had_error: bool,
}

impl Loader {
    fn new() -> Self {
        Loader {
            classes: IndexMap::new(),
            properties: IndexMap::new(),
            namespaces: IndexMap::new(),
            ontologies: IndexMap::new(),
            had_error: false,
        }
    }

    fn load_document(&mut self, content: &str, source: &str) -> SchemaResult<()> {
        let statements = turtle::read_statements(content, source)?;
        for statement in &statements {
            self.apply_statement(statement, source);
        }
        Ok(())
    }

    fn finish(self) -> SchemaResult<Registry> {
        if self.had_error {
            return Err(SchemaError::Parse);
        }

        let mut registry = Registry::new();
        for (_, ontology) in self.ontologies {
            registry.add_ontology(ontology);
        }
        for (_, namespace) in self.namespaces {
            registry.add_namespace(namespace);
        }
        for (_, class) in self.classes {
            registry.add_class(class);
        }
        for (_, property) in self.properties {
            registry.add_property(property);
        }

        registry.verify_completeness()?;
        Ok(registry)
    }

    fn report(&self, statement: &Statement, source: &str, message: &str) {
        log::warn!(
            "{}:{}:{}: {}",
            source,
            statement.line,
            statement.column,
            message
        );
    }

    fn known_class(&mut self, uri: &str, statement: &Statement, source: &str) -> bool {
        if self.classes.contains_key(uri) {
            true
        } else {
            self.report(statement, source, &format!("Unknown class {uri}"));
            self.had_error = true;
            false
        }
    }

    fn known_property(&mut self, uri: &str, statement: &Statement, source: &str) -> bool {
        if self.properties.contains_key(uri) {
            true
        } else {
            self.report(statement, source, &format!("Unknown property {uri}"));
            self.had_error = true;
            false
        }
    }

    fn apply_statement(&mut self, statement: &Statement, source: &str) {
        let subject = statement.subject.as_str();
        let object = &statement.object;

        match statement.predicate.as_str() {
            constants::RDF_TYPE => {
                match object.as_iri() {
                    Some(constants::RDFS_CLASS) => {
                        if self.classes.contains_key(subject) {
                            self.report(
                                statement,
                                source,
                                &format!("Duplicate definition of class {subject}"),
                            );
                            return;
                        }

                        let mut class = Class::new();
                        class.set_uri(subject);
                        class.set_ontology_path(source);
                        class.set_definition_line(statement.line);
                        class.set_definition_column(statement.column);
                        self.classes.insert(subject.to_string(), class);
                    }
                    Some(constants::RDF_PROPERTY) => {
                        if self.properties.contains_key(subject) {
                            self.report(
                                statement,
                                source,
                                &format!("Duplicate definition of property {subject}"),
                            );
                            return;
                        }

                        let mut property = Property::new();
                        property.set_uri(subject);
                        property.set_multiple_values(true);
                        property.set_ontology_path(source);
                        property.set_definition_line(statement.line);
                        property.set_definition_column(statement.column);
                        self.properties.insert(subject.to_string(), property);
                    }
                    Some(constants::NRL_INVERSE_FUNCTIONAL_PROPERTY) => {
                        if self.known_property(subject, statement, source) {
                            self.properties
                                .get_mut(subject)
                                .unwrap()
                                .set_is_inverse_functional(true);
                        }
                    }
                    Some(constants::NRL_NAMESPACE) => {
                        if self.namespaces.contains_key(subject) {
                            self.report(
                                statement,
                                source,
                                &format!("Duplicate definition of namespace {subject}"),
                            );
                            return;
                        }

                        let mut namespace = Namespace::new();
                        namespace.set_uri(subject);
                        self.namespaces.insert(subject.to_string(), namespace);
                    }
                    Some(constants::NRL_ONTOLOGY) => {
                        if self.ontologies.contains_key(subject) {
                            self.report(
                                statement,
                                source,
                                &format!("Duplicate definition of ontology {subject}"),
                            );
                            return;
                        }

                        let mut ontology = Ontology::new();
                        ontology.set_uri(subject);
                        self.ontologies.insert(subject.to_string(), ontology);
                    }
                    _ => {}
                }
            }
            constants::RDFS_SUB_CLASS_OF => {
                let class_known = self.known_class(subject, statement, source);
                let super_uri = object.lexical().to_string();
                let super_known = self.known_class(&super_uri, statement, source);

                if class_known && super_known {
                    self.classes
                        .get_mut(subject)
                        .unwrap()
                        .add_super_class(&super_uri);
                }
            }
            constants::NRL_NOTIFY => {
                if self.known_class(subject, statement, source) {
                    let notify = object.as_bool().unwrap_or(false);
                    self.classes.get_mut(subject).unwrap().set_notify(notify);
                }
            }
            constants::NRL_DOMAIN_INDEX => {
                let class_known = self.known_class(subject, statement, source);
                let property_uri = object.lexical().to_string();
                let property_known = self.known_property(&property_uri, statement, source);

                if class_known && property_known {
                    if self.properties[&property_uri].domain() == Some(subject) {
                        self.report(
                            statement,
                            source,
                            &format!(
                                "Property {property_uri} is already a first-class property \
                                 of {subject} while trying to add it as nrl:domainIndex"
                            ),
                        );
                        self.had_error = true;
                    }

                    self.classes
                        .get_mut(subject)
                        .unwrap()
                        .add_domain_index(&property_uri);
                    self.properties
                        .get_mut(&property_uri)
                        .unwrap()
                        .add_domain_index(subject);
                }
            }
            constants::RDFS_SUB_PROPERTY_OF => {
                let property_known = self.known_property(subject, statement, source);
                let super_uri = object.lexical().to_string();
                let super_known = self.known_property(&super_uri, statement, source);

                if property_known && super_known {
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .add_super_property(&super_uri);
                }
            }
            constants::RDFS_DOMAIN => {
                let property_known = self.known_property(subject, statement, source);
                let domain_uri = object.lexical().to_string();
                let domain_known = self.known_class(&domain_uri, statement, source);

                if property_known && domain_known {
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_domain(&domain_uri);
                }
            }
            constants::RDFS_RANGE => {
                let property_known = self.known_property(subject, statement, source);
                let range_uri = object.lexical().to_string();
                let range_known = self.known_class(&range_uri, statement, source);

                if property_known && range_known {
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_range(&range_uri);
                }
            }
            constants::NRL_MAX_CARDINALITY => {
                let property_known = self.known_property(subject, statement, source);
                let cardinality = object.as_integer().unwrap_or(0);

                if cardinality == 0 {
                    self.report(
                        statement,
                        source,
                        "Property nrl:maxCardinality only accepts integers greater than 0",
                    );
                    self.had_error = true;
                }

                if property_known {
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_multiple_values(cardinality != 1);
                }
            }
            constants::NRL_INDEXED => {
                if self.known_property(subject, statement, source) {
                    let indexed = object.as_bool().unwrap_or(false);
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_indexed(indexed);
                }
            }
            constants::NRL_SECONDARY_INDEX => {
                let property_known = self.known_property(subject, statement, source);
                let secondary_uri = object.lexical().to_string();
                let secondary_known = self.known_property(&secondary_uri, statement, source);

                if property_known && secondary_known {
                    if !self.properties[subject].indexed() {
                        self.report(
                            statement,
                            source,
                            "nrl:secondaryIndex only applies to nrl:indexed properties",
                        );
                        self.had_error = true;
                    }

                    if self.properties[subject].multiple_values()
                        || self.properties[&secondary_uri].multiple_values()
                    {
                        self.report(
                            statement,
                            source,
                            "nrl:secondaryIndex cannot be applied to properties with \
                             nrl:maxCardinality higher than one",
                        );
                        self.had_error = true;
                    }

                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_secondary_index(&secondary_uri);
                }
            }
            constants::NRL_FULLTEXT_INDEXED => {
                if self.known_property(subject, statement, source) {
                    let indexed = object.as_bool().unwrap_or(false);
                    self.properties
                        .get_mut(subject)
                        .unwrap()
                        .set_fulltext_indexed(indexed);
                }
            }
            constants::NRL_WEIGHT => {
                if self.known_property(subject, statement, source) {
                    let weight = object.as_integer().unwrap_or(0) as i32;
                    self.properties.get_mut(subject).unwrap().set_weight(weight);
                }
            }
            constants::NRL_PREFIX => {
                if !self.namespaces.contains_key(subject) {
                    self.report(statement, source, &format!("Unknown namespace {subject}"));
                    return;
                }

                self.namespaces
                    .get_mut(subject)
                    .unwrap()
                    .set_prefix(object.lexical());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "@prefix ex: <http://example.org/ns#> .\n";

    fn load(doc: &str) -> SchemaResult<Registry> {
        let content = format!("{PREAMBLE}{doc}");
        load_from_documents(&[(content.as_str(), "test.ontology")])
    }

    #[test]
    fn test_class_and_single_valued_property() {
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 1 .\n",
        )
        .unwrap();

        let class = registry.class_by_uri("http://example.org/ns#A").unwrap();
        assert_eq!(class.uri(), "http://example.org/ns#A");

        let property = registry.property_by_uri("http://example.org/ns#p").unwrap();
        assert!(!property.multiple_values());
        assert_eq!(property.domain(), Some("http://example.org/ns#A"));
    }

    #[test]
    fn test_missing_range_is_incomplete() {
        let err = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A .\n",
        )
        .unwrap_err();

        match err {
            SchemaError::IncompletePropertyDefinition {
                location,
                property,
                missing,
            } => {
                assert_eq!(property, "p");
                assert_eq!(missing, "range");
                assert!(location.starts_with("test.ontology:3:"), "{location}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_class_does_not_fail_the_load() {
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:A a rdfs:Class .\n",
        )
        .unwrap();
        assert_eq!(registry.classes().len(), 1);
    }

    #[test]
    fn test_unknown_domain_class_fails_the_load() {
        let err = load(
            "ex:p a rdf:Property ;\n\
             \trdfs:domain ex:Missing .\n",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Parse));
    }

    #[test]
    fn test_zero_cardinality_is_rejected() {
        let err = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 0 .\n",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Parse));
    }

    #[test]
    fn test_cardinality_other_than_one_means_multivalued() {
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 5 .\n",
        )
        .unwrap();

        let property = registry.property_by_uri("http://example.org/ns#p").unwrap();
        assert!(property.multiple_values());
    }

    #[test]
    fn test_secondary_index_requires_indexed_single_valued() {
        // Secondary index on an unindexed property fails
        let err = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 1 .\n\
             ex:q a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 1 ;\n\
             \tnrl:secondaryIndex ex:p .\n",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Parse));

        // With nrl:indexed and single values on both sides it is accepted
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 1 .\n\
             ex:q a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:maxCardinality 1 ;\n\
             \tnrl:indexed true ;\n\
             \tnrl:secondaryIndex ex:p .\n",
        )
        .unwrap();

        let property = registry.property_by_uri("http://example.org/ns#q").unwrap();
        assert_eq!(property.secondary_index(), Some("http://example.org/ns#p"));
    }

    #[test]
    fn test_first_class_property_cannot_be_domain_index() {
        let err = load(
            "ex:A a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A .\n\
             ex:A nrl:domainIndex ex:p .\n",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Parse));
    }

    #[test]
    fn test_domain_index_links_both_sides() {
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:B a rdfs:Class .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:B ;\n\
             \trdfs:range ex:A .\n\
             ex:A nrl:domainIndex ex:p .\n",
        )
        .unwrap();

        let class = registry.class_by_uri("http://example.org/ns#A").unwrap();
        assert_eq!(class.domain_indexes(), &["http://example.org/ns#p"]);

        let property = registry.property_by_uri("http://example.org/ns#p").unwrap();
        assert_eq!(property.domain_indexes(), &["http://example.org/ns#A"]);
    }

    #[test]
    fn test_namespace_prefix_and_ontology() {
        let registry = load(
            "<http://example.org/ns#> a nrl:Namespace ;\n\
             \tnrl:prefix \"ex\" .\n\
             <http://example.org/ontology> a nrl:Ontology .\n",
        )
        .unwrap();

        let namespace = registry
            .namespace_by_uri("http://example.org/ns#")
            .unwrap();
        assert_eq!(namespace.prefix(), Some("ex"));
        assert!(registry
            .ontology_by_uri("http://example.org/ontology")
            .is_some());
    }

    #[test]
    fn test_inverse_functional_and_flags() {
        let registry = load(
            "ex:A a rdfs:Class ;\n\
             \tnrl:notify true .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A ;\n\
             \tnrl:indexed true ;\n\
             \tnrl:fulltextIndexed true ;\n\
             \tnrl:weight 10 .\n\
             ex:p a nrl:InverseFunctionalProperty .\n",
        )
        .unwrap();

        let class = registry.class_by_uri("http://example.org/ns#A").unwrap();
        assert!(class.notify());

        let property = registry.property_by_uri("http://example.org/ns#p").unwrap();
        assert!(property.indexed());
        assert!(property.fulltext_indexed());
        assert!(property.is_inverse_functional());
        assert_eq!(property.weight(), 10);
    }

    #[test]
    fn test_sub_class_and_sub_property_links() {
        let registry = load(
            "ex:A a rdfs:Class .\n\
             ex:B a rdfs:Class ;\n\
             \trdfs:subClassOf ex:A .\n\
             ex:p a rdf:Property ;\n\
             \trdfs:domain ex:A ;\n\
             \trdfs:range ex:A .\n\
             ex:q a rdf:Property ;\n\
             \trdfs:domain ex:B ;\n\
             \trdfs:range ex:A ;\n\
             \trdfs:subPropertyOf ex:p .\n",
        )
        .unwrap();

        let class = registry.class_by_uri("http://example.org/ns#B").unwrap();
        assert_eq!(class.super_classes(), &["http://example.org/ns#A"]);
        assert_eq!(registry.super_classes_of(&class).len(), 1);

        let property = registry.property_by_uri("http://example.org/ns#q").unwrap();
        assert_eq!(property.super_properties(), &["http://example.org/ns#p"]);
    }
}
