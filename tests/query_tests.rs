//! End-to-end query tests: text search over the inverted index combined
//! with class grouping through the store and the schema registry.

use std::sync::Arc;

use tracker::config::SearchConfig;
use tracker::query::{IndexManager, InvertedIndex, Language, QueryTree};
use tracker::storage::MetadataStore;
use tracker_ontology::rdf;

const ONTOLOGY: &str = "@prefix ex: <http://example.org/ns#> .\n\
                        ex:Resource a rdfs:Class .\n\
                        ex:Document a rdfs:Class ;\n\
                        \trdfs:subClassOf ex:Resource .\n\
                        ex:Image a rdfs:Class ;\n\
                        \trdfs:subClassOf ex:Resource .\n";

fn tree(query: &str) -> QueryTree {
    QueryTree::new(query, &SearchConfig::default(), &Language::new(), None)
}

#[test]
fn test_hit_counts_group_by_class() {
    let registry = rdf::load_from_documents(&[(ONTOLOGY, "test.ontology")]).unwrap();

    let store = MetadataStore::new().unwrap();
    store
        .add_document(1, "file:///docs/a.txt", "http://example.org/ns#Document")
        .unwrap();
    store
        .add_document(2, "file:///pics/b.png", "http://example.org/ns#Image")
        .unwrap();
    store
        .add_document(3, "file:///docs/c.txt", "http://example.org/ns#Document")
        .unwrap();

    let mut index = InvertedIndex::new();
    index.add("report", 1, 1, 10);
    index.add("report", 2, 1, 4);
    index.add("report", 3, 1, 2);

    let mut manager = IndexManager::new();
    manager.register(Arc::new(index), &[1]);

    let query = tree("report");
    assert_eq!(query.get_hit_count(&manager), 3);

    let counts = query.get_hit_counts(&manager, &store, &registry);
    assert_eq!(counts.len(), 2);

    let total: u32 = counts.iter().map(|c| c.count).sum();
    assert_eq!(total as usize, query.get_hit_count(&manager));

    let document = counts
        .iter()
        .find(|c| c.class.name() == "Document")
        .expect("Document group");
    assert_eq!(document.count, 2);

    let image = counts
        .iter()
        .find(|c| c.class.name() == "Image")
        .expect("Image group");
    assert_eq!(image.count, 1);
}

#[test]
fn test_hit_counts_skip_unregistered_classes() {
    let registry = rdf::load_from_documents(&[(ONTOLOGY, "test.ontology")]).unwrap();

    let store = MetadataStore::new().unwrap();
    store
        .add_document(1, "file:///docs/a.txt", "http://example.org/ns#Document")
        .unwrap();
    store
        .add_document(2, "file:///other/b.bin", "http://example.org/ns#Unregistered")
        .unwrap();

    let mut index = InvertedIndex::new();
    index.add("report", 1, 1, 1);
    index.add("report", 2, 1, 1);

    let mut manager = IndexManager::new();
    manager.register(Arc::new(index), &[1]);

    let counts = tree("report").get_hit_counts(&manager, &store, &registry);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].class.name(), "Document");
}

#[test]
fn test_hit_counts_of_empty_query_are_empty() {
    let registry = rdf::load_from_documents(&[(ONTOLOGY, "test.ontology")]).unwrap();
    let store = MetadataStore::new().unwrap();
    let manager = IndexManager::new();

    assert!(tree("and or").get_hit_counts(&manager, &store, &registry).is_empty());
    assert!(tree("missing").get_hit_counts(&manager, &store, &registry).is_empty());
}

#[test]
fn test_pagination_is_consistent_with_full_listing() {
    let mut index = InvertedIndex::new();
    for doc in 1..=10u32 {
        index.add("word", doc, 1, doc);
    }
    let mut manager = IndexManager::new();
    manager.register(Arc::new(index), &[1]);

    let query = tree("word");
    let all = query.get_hits(&manager, 0, 0);
    assert_eq!(all.len(), 10);

    let mut paginated = Vec::new();
    for page in 0..5 {
        paginated.extend(query.get_hits(&manager, page * 2, 2));
    }
    assert_eq!(paginated, all);
}
