//! The shipped ontology files must load into a complete schema.

use tracker_ontology::rdf;

#[test]
fn test_shipped_ontologies_build_a_complete_registry() {
    let mut files: Vec<_> = std::fs::read_dir("ontologies")
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    files.sort();
    assert!(!files.is_empty());

    let registry = rdf::load_from_files(&files).unwrap();

    // The hot properties are wired up
    assert!(registry.rdf_type().is_some());
    assert!(registry.nrl_added().is_some());
    assert!(registry.nrl_modified().is_some());

    let image = registry
        .class_by_uri("http://tracker.api.gnome.org/ontology/v3/nfo#Image")
        .unwrap();
    assert_eq!(
        image.super_classes(),
        &["http://tracker.api.gnome.org/ontology/v3/nie#InformationElement"]
    );
    assert_eq!(
        image.domain_indexes(),
        &["http://tracker.api.gnome.org/ontology/v3/nie#title"]
    );

    let title = registry
        .property_by_uri("http://tracker.api.gnome.org/ontology/v3/nie#title")
        .unwrap();
    assert!(title.fulltext_indexed());
    assert!(!title.multiple_values());
    assert_eq!(title.weight(), 10);

    // Short names and prefixed forms resolve too
    assert!(registry.property_by_uri("fileName").is_some());
    assert!(registry.property_by_uri("nie:url").is_some());

    let namespace = registry
        .namespace_by_uri("http://tracker.api.gnome.org/ontology/v3/nfo#")
        .unwrap();
    assert_eq!(namespace.prefix(), Some("nfo"));
}
