//! The search query tree
//!
//! A query string is parsed into a binary operator tree over normalized
//! search terms. `and` binds tighter than `or`, and two adjacent terms are
//! joined by an implicit `and`. Evaluation walks the tree bottom-up over the
//! inverted indexes, producing a per-document score table that can be
//! flattened into ranked hits or grouped by RDF class.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;

use tracker_ontology::{constants, Class, Registry};

use crate::config::SearchConfig;
use crate::query::index::IndexManager;
use crate::query::language::{normalize_term, Language};
use crate::storage::MetadataStore;

const SCORE_MULTIPLIER: f32 = 100000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::And => 2,
            Operator::Or => 1,
        }
    }
}

#[derive(Debug)]
enum TreeNode {
    Leaf(String),
    And(Box<TreeNode>, Box<TreeNode>),
    Or(Box<TreeNode>, Box<TreeNode>),
}

#[derive(Debug, Clone)]
enum RpnItem {
    Term(String),
    Op(Operator),
}

/// A ranked query hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Document id
    pub service_id: u32,
    /// Service type of the document
    pub service_type_id: u32,
    pub score: u32,
}

/// Hits of one RDF class
#[derive(Debug, Clone)]
pub struct HitCount {
    pub class: Arc<Class>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy)]
struct HitScore {
    service_type_id: u32,
    score: u32,
}

/// A parsed text-search query, bound to its parser configuration and
/// language rules. Evaluation only reads shared state, so independent trees
/// can run on parallel threads.
pub struct QueryTree {
    query: String,
    root: Option<TreeNode>,
    services: Option<Vec<u32>>,
    config: SearchConfig,
    language: Language,
}

impl QueryTree {
    /// Parse `query` with the given search configuration and language
    /// rules. `services` restricts evaluation to the listed service type
    /// ids; `None` searches everything.
    pub fn new(
        query: &str,
        config: &SearchConfig,
        language: &Language,
        services: Option<Vec<u32>>,
    ) -> Self {
        let root = parse(query, config, language);
        QueryTree {
            query: query.to_string(),
            root,
            services,
            config: config.clone(),
            language: language.clone(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Replace the query string and rebuild the parse tree
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.root = parse(query, &self.config, &self.language);
    }

    pub fn services(&self) -> Option<&[u32]> {
        self.services.as_deref()
    }

    pub fn set_services(&mut self, services: Option<Vec<u32>>) {
        self.services = services;
    }

    /// Whether parsing produced no usable tree
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The leaf terms of the tree, depth first and in order
    pub fn words(&self) -> Vec<String> {
        fn collect(node: &TreeNode, out: &mut Vec<String>) {
            match node {
                TreeNode::Leaf(term) => out.push(term.clone()),
                TreeNode::And(left, right) | TreeNode::Or(left, right) => {
                    collect(left, out);
                    collect(right, out);
                }
            }
        }

        let mut words = Vec::new();
        if let Some(root) = &self.root {
            collect(root, &mut words);
        }
        words
    }

    /// Evaluate the tree and return the ranked hits, best score first.
    /// `offset` drops leading hits, `limit` clamps the result length
    /// (0 means unlimited). Ranking is stable: equal scores keep their
    /// evaluation order.
    pub fn get_hits(&self, manager: &IndexManager, offset: usize, limit: usize) -> Vec<Hit> {
        let Some(root) = &self.root else {
            return Vec::new();
        };

        let table = self.node_hits(root, manager);
        let mut hits: Vec<Hit> = table
            .into_iter()
            .map(|(id, hit)| Hit {
                service_id: id,
                service_type_id: hit.service_type_id,
                score: hit.score,
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));

        if offset > 0 {
            hits.drain(..offset.min(hits.len()));
        }
        if limit > 0 && limit < hits.len() {
            hits.truncate(limit);
        }

        hits
    }

    /// Number of distinct documents the query matches
    pub fn get_hit_count(&self, manager: &IndexManager) -> usize {
        match &self.root {
            Some(root) => self.node_hits(root, manager).len(),
            None => 0,
        }
    }

    /// Group the full hit set by each document's `rdf:type`, resolved to
    /// classes through the registry. Errors in the grouping query produce an
    /// empty result.
    pub fn get_hit_counts(
        &self,
        manager: &IndexManager,
        store: &MetadataStore,
        registry: &Registry,
    ) -> Vec<HitCount> {
        let hits = self.get_hits(manager, 0, 0);
        if hits.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = hits.iter().map(|hit| hit.service_id.to_string()).collect();
        let sparql = format!(
            "SELECT ?type (COUNT(?s) AS ?count) WHERE {{ \
             ?s <{}id> ?id ; <{}> ?type . FILTER(?id IN ({})) }} \
             GROUP BY ?type ORDER BY ?type",
            constants::PREFIX_TRACKER,
            constants::RDF_TYPE,
            ids.join(", ")
        );

        let solutions = match store.query(&sparql) {
            Ok(QueryResults::Solutions(solutions)) => solutions,
            Ok(_) => return Vec::new(),
            Err(e) => {
                tracing::warn!("hit count query failed: {e}");
                return Vec::new();
            }
        };

        let mut counts = Vec::new();
        for solution in solutions {
            let Ok(solution) = solution else {
                return Vec::new();
            };

            let type_uri = match solution.get("type") {
                Some(Term::NamedNode(node)) => node.as_str().to_string(),
                _ => continue,
            };
            let count = match solution.get("count") {
                Some(Term::Literal(literal)) => literal.value().parse().unwrap_or(0),
                _ => 0,
            };

            if let Some(class) = registry.class_by_uri(&type_uri) {
                counts.push(HitCount { class, count });
            }
        }

        counts
    }

    fn service_matches(&self, service_type_id: u32) -> bool {
        match &self.services {
            Some(services) => services.contains(&service_type_id),
            None => true,
        }
    }

    fn node_hits(&self, node: &TreeNode, manager: &IndexManager) -> IndexMap<u32, HitScore> {
        match node {
            TreeNode::Leaf(term) => self.leaf_hits(term, manager),
            TreeNode::And(left, right) => compose(
                Operator::And,
                self.node_hits(left, manager),
                self.node_hits(right, manager),
            ),
            TreeNode::Or(left, right) => compose(
                Operator::Or,
                self.node_hits(left, manager),
                self.node_hits(right, manager),
            ),
        }
    }

    fn leaf_hits(&self, term: &str, manager: &IndexManager) -> IndexMap<u32, HitScore> {
        let mut result = IndexMap::new();
        let mut slots_checked = HashSet::new();

        let slots: Vec<usize> = match &self.services {
            Some(services) => services
                .iter()
                .filter_map(|id| manager.slot_for_service(*id))
                .collect(),
            None => manager.slots().collect(),
        };

        for slot in slots {
            // Services may share an index; read each bucket only once
            if !slots_checked.insert(slot) {
                continue;
            }

            let Some(index) = manager.index_at(slot) else {
                continue;
            };
            let Some(items) = index.word_hits(term) else {
                continue;
            };

            let idf = 1.0 / items.len() as f32;
            for item in items {
                if self.service_matches(item.service_type_id) {
                    result.insert(
                        item.id,
                        HitScore {
                            service_type_id: item.service_type_id,
                            score: idf_score(item.score, idf),
                        },
                    );
                }
            }
        }

        result
    }
}

fn idf_score(raw_score: u32, idf: f32) -> u32 {
    let score = idf * raw_score as f32 * SCORE_MULTIPLIER;
    if score > 1.0 {
        score.round() as u32
    } else {
        1
    }
}

fn compose(
    op: Operator,
    left: IndexMap<u32, HitScore>,
    right: IndexMap<u32, HitScore>,
) -> IndexMap<u32, HitScore> {
    // Iterate the smaller table
    let (small, large) = if left.len() < right.len() {
        (left, right)
    } else {
        (right, left)
    };

    match op {
        Operator::Or => {
            let mut dest = large;
            for (id, hit) in small {
                match dest.entry(id) {
                    Entry::Occupied(mut entry) => entry.get_mut().score += hit.score,
                    Entry::Vacant(entry) => {
                        entry.insert(hit);
                    }
                }
            }
            dest
        }
        Operator::And => {
            let mut dest = IndexMap::new();
            for (id, hit) in small {
                if let Some(other) = large.get(&id) {
                    dest.insert(
                        id,
                        HitScore {
                            service_type_id: hit.service_type_id,
                            score: hit.score + other.score,
                        },
                    );
                }
            }
            dest
        }
    }
}

/// Two-step parse: shunting-yard into reverse polish notation, then tree
/// assembly. The reserved operators are the lowercase tokens `and` and `or`
/// only; everything else is a search term.
fn parse(query: &str, config: &SearchConfig, language: &Language) -> Option<TreeNode> {
    let mut queue: Vec<RpnItem> = Vec::new();
    let mut op_stack: Vec<Operator> = Vec::new();
    let mut last_element_is_term = false;

    fn push_operator(op: Operator, queue: &mut Vec<RpnItem>, op_stack: &mut Vec<Operator>) {
        while let Some(top) = op_stack.last() {
            if top.precedence() >= op.precedence() {
                queue.push(RpnItem::Op(op_stack.pop().unwrap()));
            } else {
                break;
            }
        }
        op_stack.push(op);
    }

    for token in query.split_whitespace() {
        match token {
            "and" => {
                push_operator(Operator::And, &mut queue, &mut op_stack);
                last_element_is_term = false;
            }
            "or" => {
                push_operator(Operator::Or, &mut queue, &mut op_stack);
                last_element_is_term = false;
            }
            _ => {
                let Some(term) = normalize_term(
                    token,
                    language,
                    config.max_word_length,
                    config.min_word_length,
                ) else {
                    // Terms that normalize away are dropped entirely
                    continue;
                };

                if last_element_is_term {
                    // Two adjacent terms mean an implicit "and"
                    push_operator(Operator::And, &mut queue, &mut op_stack);
                }
                queue.push(RpnItem::Term(term));
                last_element_is_term = true;
            }
        }
    }

    while let Some(op) = op_stack.pop() {
        queue.push(RpnItem::Op(op));
    }

    // Assemble the binary tree from the notation, oldest item first
    let mut nodes: Vec<TreeNode> = Vec::new();
    for item in queue {
        match item {
            RpnItem::Term(term) => nodes.push(TreeNode::Leaf(term)),
            RpnItem::Op(op) => {
                let right = nodes.pop()?;
                let left = nodes.pop()?;
                nodes.push(match op {
                    Operator::And => TreeNode::And(Box::new(left), Box::new(right)),
                    Operator::Or => TreeNode::Or(Box::new(left), Box::new(right)),
                });
            }
        }
    }

    nodes.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::index::InvertedIndex;

    fn scenario_manager() -> IndexManager {
        let mut index = InvertedIndex::new();
        index.add("foo", 1, 1, 10);
        index.add("foo", 2, 1, 5);
        index.add("bar", 1, 1, 3);

        let mut manager = IndexManager::new();
        manager.register(Arc::new(index), &[1]);
        manager
    }

    fn tree(query: &str) -> QueryTree {
        QueryTree::new(query, &SearchConfig::default(), &Language::new(), None)
    }

    #[test]
    fn test_and_intersects() {
        let manager = scenario_manager();
        let query = tree("foo and bar");

        assert_eq!(query.get_hit_count(&manager), 1);

        let hits = query.get_hits(&manager, 0, 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].service_id, 1);
        // foo: 1/2 * 10 * 100000; bar: 1/1 * 3 * 100000
        assert_eq!(hits[0].score, 500_000 + 300_000);
    }

    #[test]
    fn test_implicit_and_matches_explicit() {
        let manager = scenario_manager();
        let explicit = tree("foo and bar");
        let implicit = tree("foo bar");

        assert_eq!(explicit.words(), implicit.words());
        assert_eq!(
            explicit.get_hits(&manager, 0, 0),
            implicit.get_hits(&manager, 0, 0)
        );
    }

    #[test]
    fn test_or_unions_and_ranks() {
        let manager = scenario_manager();
        let query = tree("foo or bar");

        assert_eq!(query.get_hit_count(&manager), 2);

        let hits = query.get_hits(&manager, 0, 0);
        assert_eq!(hits.len(), 2);
        // Document 1 combines both terms and ranks first
        assert_eq!(hits[0].service_id, 1);
        assert_eq!(hits[0].score, 800_000);
        assert_eq!(hits[1].service_id, 2);
        assert_eq!(hits[1].score, 250_000);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let mut index = InvertedIndex::new();
        index.add("foo", 1, 1, 1);
        index.add("bar", 2, 1, 1);
        index.add("baz", 2, 1, 1);

        let mut manager = IndexManager::new();
        manager.register(Arc::new(index), &[1]);

        // foo or (bar and baz)
        let query = tree("foo or bar and baz");
        let hits = query.get_hits(&manager, 0, 0);
        let mut ids: Vec<u32> = hits.iter().map(|h| h.service_id).collect();
        ids.sort();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn test_offset_and_limit() {
        let manager = scenario_manager();
        let query = tree("foo or bar");

        assert_eq!(query.get_hits(&manager, 0, 1).len(), 1);
        assert_eq!(query.get_hits(&manager, 1, 0).len(), 1);
        assert_eq!(query.get_hits(&manager, 1, 0)[0].service_id, 2);
        assert_eq!(query.get_hits(&manager, 5, 0).len(), 0);
    }

    #[test]
    fn test_scores_are_at_least_one() {
        let mut index = InvertedIndex::new();
        // Zero raw score still scores 1
        index.add("foo", 1, 1, 0);
        let mut manager = IndexManager::new();
        manager.register(Arc::new(index), &[1]);

        let hits = tree("foo").get_hits(&manager, 0, 0);
        assert_eq!(hits[0].score, 1);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let manager = scenario_manager();
        let query = tree("foo or bar");

        let first = query.get_hits(&manager, 0, 0);
        for _ in 0..3 {
            assert_eq!(query.get_hits(&manager, 0, 0), first);
        }
    }

    #[test]
    fn test_stable_ordering_for_equal_scores() {
        let mut index = InvertedIndex::new();
        index.add("foo", 3, 1, 4);
        index.add("foo", 1, 1, 4);
        index.add("foo", 2, 1, 4);

        let mut manager = IndexManager::new();
        manager.register(Arc::new(index), &[1]);

        let hits = tree("foo").get_hits(&manager, 0, 0);
        let ids: Vec<u32> = hits.iter().map(|h| h.service_id).collect();
        // Equal scores keep posting order
        assert_eq!(ids, [3, 1, 2]);
    }

    #[test]
    fn test_set_query_rebuilds_the_tree() {
        let manager = scenario_manager();
        let mut query = tree("foo and bar");
        assert_eq!(query.get_hit_count(&manager), 1);

        query.set_query("foo or bar");
        assert_eq!(query.query(), "foo or bar");
        assert_eq!(query.get_hit_count(&manager), 2);
    }

    #[test]
    fn test_operator_only_query_is_empty() {
        let query = tree("and or and");
        assert!(query.is_empty());
        assert_eq!(query.get_hit_count(&scenario_manager()), 0);
        assert!(query.get_hits(&scenario_manager(), 0, 0).is_empty());
    }

    #[test]
    fn test_operators_are_case_sensitive() {
        // "AND" is a search term, not an operator; it normalizes to "and"
        let query = tree("foo AND bar");
        assert_eq!(query.words(), ["foo", "and", "bar"]);
    }

    #[test]
    fn test_stop_words_drop_out() {
        let query = tree("the foo");
        assert_eq!(query.words(), ["foo"]);
    }

    #[test]
    fn test_words_in_order() {
        let query = tree("foo or bar and baz");
        assert_eq!(query.words(), ["foo", "bar", "baz"]);
    }

    #[test]
    fn test_service_filtering() {
        let mut index = InvertedIndex::new();
        index.add("foo", 1, 1, 10);
        index.add("foo", 2, 2, 10);

        let mut manager = IndexManager::new();
        manager.register(Arc::new(index), &[1, 2]);

        let query = QueryTree::new(
            "foo",
            &SearchConfig::default(),
            &Language::new(),
            Some(vec![2]),
        );
        let hits = query.get_hits(&manager, 0, 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].service_id, 2);
        assert_eq!(hits[0].service_type_id, 2);
    }
}
