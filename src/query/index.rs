//! Inverted indexes and the per-service index manager
//!
//! Every indexed word maps to the documents it appears in, together with a
//! raw occurrence score and the service type of the document. Services share
//! index buckets (all file services typically live in one index, emails in
//! another); the manager resolves a service id to its bucket.

use std::collections::HashMap;
use std::sync::Arc;

/// One posting in an inverted index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexItem {
    /// Document id
    pub id: u32,
    /// Service type of the document
    pub service_type_id: u32,
    /// Raw occurrence score
    pub score: u32,
}

/// An in-memory inverted index: word -> postings
#[derive(Debug, Default)]
pub struct InvertedIndex {
    words: HashMap<String, Vec<IndexItem>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    /// Add a posting for `word`. Postings keep insertion order.
    pub fn add(&mut self, word: &str, id: u32, service_type_id: u32, score: u32) {
        self.words.entry(word.to_string()).or_default().push(IndexItem {
            id,
            service_type_id,
            score,
        });
    }

    /// All postings for a word
    pub fn word_hits(&self, word: &str) -> Option<&[IndexItem]> {
        self.words.get(word).map(Vec::as_slice)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Resolves service ids to their index buckets
#[derive(Default)]
pub struct IndexManager {
    indexes: Vec<Arc<InvertedIndex>>,
    by_service: HashMap<u32, usize>,
}

impl IndexManager {
    pub fn new() -> Self {
        IndexManager::default()
    }

    /// Register an index bucket serving the given service type ids
    pub fn register(&mut self, index: Arc<InvertedIndex>, service_type_ids: &[u32]) {
        let slot = self.indexes.len();
        self.indexes.push(index);
        for id in service_type_ids {
            self.by_service.insert(*id, slot);
        }
    }

    /// The bucket slot a service id resolves to
    pub fn slot_for_service(&self, service_type_id: u32) -> Option<usize> {
        self.by_service.get(&service_type_id).copied()
    }

    pub fn index_at(&self, slot: usize) -> Option<&Arc<InvertedIndex>> {
        self.indexes.get(slot)
    }

    /// Every registered bucket, in registration order
    pub fn slots(&self) -> impl Iterator<Item = usize> {
        0..self.indexes.len()
    }
}
