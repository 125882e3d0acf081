//! End-to-end tests for ontology loading and the persisted registry form.

use std::fs;
use std::io::Write;

use tempfile::TempDir;
use tracker_ontology::{rdf, Registry, SchemaError};

const CORE_ONTOLOGY: &str = r#"@prefix ex: <http://example.org/ns#> .

<http://example.org/ns#> a nrl:Namespace ;
	nrl:prefix "ex" .
<http://example.org/core> a nrl:Ontology .

ex:Resource a rdfs:Class .
ex:Document a rdfs:Class ;
	rdfs:subClassOf ex:Resource ;
	nrl:notify true .

ex:title a rdf:Property ;
	rdfs:domain ex:Document ;
	rdfs:range ex:Resource ;
	nrl:maxCardinality 1 ;
	nrl:fulltextIndexed true ;
	nrl:weight 10 .

ex:keyword a rdf:Property ;
	rdfs:domain ex:Document ;
	rdfs:range ex:Resource .
"#;

const EXTRA_ONTOLOGY: &str = r#"@prefix ex: <http://example.org/ns#> .

ex:Image a rdfs:Class ;
	rdfs:subClassOf ex:Document .

ex:camera a rdf:Property ;
	rdfs:domain ex:Image ;
	rdfs:range ex:Resource ;
	nrl:maxCardinality 1 .

ex:Image nrl:domainIndex ex:title .
"#;

fn write_ontologies(dir: &TempDir, files: &[(&str, &str)]) -> Vec<std::path::PathBuf> {
    files
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(name);
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(content.as_bytes()).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_load_multiple_files_in_order() {
    let dir = TempDir::new().unwrap();
    let paths = write_ontologies(
        &dir,
        &[
            ("10-core.ontology", CORE_ONTOLOGY),
            ("20-extra.ontology", EXTRA_ONTOLOGY),
        ],
    );

    let registry = rdf::load_from_files(&paths).unwrap();

    // Classes keep the order they were defined in across files
    let names: Vec<_> = registry
        .classes()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, ["Resource", "Document", "Image"]);

    // Cross-file references resolve
    let image = registry
        .class_by_uri("http://example.org/ns#Image")
        .unwrap();
    assert_eq!(image.super_classes(), &["http://example.org/ns#Document"]);
    assert_eq!(image.domain_indexes(), &["http://example.org/ns#title"]);

    let title = registry
        .property_by_uri("http://example.org/ns#title")
        .unwrap();
    assert!(!title.multiple_values());
    assert!(title.fulltext_indexed());
    assert_eq!(title.weight(), 10);
    assert_eq!(title.domain_indexes(), &["http://example.org/ns#Image"]);
}

#[test]
fn test_registry_uniqueness() {
    let dir = TempDir::new().unwrap();
    let paths = write_ontologies(&dir, &[("core.ontology", CORE_ONTOLOGY)]);
    let registry = rdf::load_from_files(&paths).unwrap();

    for entities in [
        registry.classes().iter().map(|c| c.uri().to_string()).collect::<Vec<_>>(),
        registry
            .properties()
            .iter()
            .map(|p| p.uri().to_string())
            .collect::<Vec<_>>(),
    ] {
        let mut deduped = entities.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), entities.len());
    }
}

#[test]
fn test_completeness_failure_cites_the_property() {
    let dir = TempDir::new().unwrap();
    let broken = "@prefix ex: <http://example.org/ns#> .\n\
                  ex:A a rdfs:Class .\n\
                  ex:p a rdf:Property ;\n\
                  \trdfs:domain ex:A .\n";
    let paths = write_ontologies(&dir, &[("broken.ontology", broken)]);

    match rdf::load_from_files(&paths) {
        Err(SchemaError::IncompletePropertyDefinition {
            location,
            property,
            missing,
        }) => {
            assert_eq!(property, "p");
            assert_eq!(missing, "range");
            assert!(location.contains("broken.ontology:3:"), "{location}");
        }
        other => panic!("expected incomplete property definition, got {other:?}"),
    }
}

#[test]
fn test_dump_and_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let paths = write_ontologies(
        &dir,
        &[
            ("10-core.ontology", CORE_ONTOLOGY),
            ("20-extra.ontology", EXTRA_ONTOLOGY),
        ],
    );
    let registry = rdf::load_from_files(&paths).unwrap();

    let dump_path = dir.path().join("ontologies.json");
    registry.write_to(&dump_path).unwrap();
    let reloaded = Registry::load_from(&dump_path).unwrap();

    for class in registry.classes() {
        let other = reloaded
            .class_by_uri(class.uri())
            .unwrap_or_else(|| panic!("missing class {}", class.uri()));
        assert_eq!(other.id(), class.id());
        assert_eq!(other.name(), class.name());
        assert_eq!(other.super_classes(), class.super_classes());
    }

    for property in registry.properties() {
        let other = reloaded
            .property_by_uri(property.uri())
            .unwrap_or_else(|| panic!("missing property {}", property.uri()));
        assert_eq!(other.id(), property.id());
        assert_eq!(other.name(), property.name());
        assert_eq!(other.domain(), property.domain());
        assert_eq!(other.range(), property.range());
        assert_eq!(other.multiple_values(), property.multiple_values());
        assert_eq!(other.fulltext_indexed(), property.fulltext_indexed());
        assert_eq!(other.is_inverse_functional(), property.is_inverse_functional());
    }

    for namespace in registry.namespaces() {
        let other = reloaded.namespace_by_uri(namespace.uri()).unwrap();
        assert_eq!(other.prefix(), namespace.prefix());
    }
}

#[test]
fn test_duplicate_definitions_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let dup = "@prefix ex: <http://example.org/ns#> .\n\
               ex:A a rdfs:Class ;\n\
               \tnrl:notify true .\n\
               ex:A a rdfs:Class .\n";
    let paths = write_ontologies(&dir, &[("dup.ontology", dup)]);

    let registry = rdf::load_from_files(&paths).unwrap();
    let class = registry.class_by_uri("http://example.org/ns#A").unwrap();
    // The first definition wins
    assert!(class.notify());
    assert_eq!(registry.classes().len(), 1);
}
