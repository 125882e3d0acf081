//! Schema entities - classes, properties, namespaces and ontology descriptors
//!
//! These are plain records populated by the loaders at construction time and
//! read-only once registered. References between entities (super classes,
//! domains, ranges, index targets) are stored as URIs and resolved lazily
//! through the [`Registry`](crate::registry::Registry), so no entity ever owns
//! another one.

use smallvec::SmallVec;

/// A 64-bit backend row id. Zero is never a valid id.
pub type Rowid = i64;

/// Derive the short display name of an entity from its URI: the substring
/// after the last `#` or `/`.
fn local_name(uri: &str) -> String {
    match uri.rfind(['#', '/']) {
        Some(pos) => uri[pos + 1..].to_string(),
        None => uri.to_string(),
    }
}

/// A class in the loaded schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Class {
    uri: String,
    name: String,
    id: Option<Rowid>,
    notify: bool,
    super_classes: SmallVec<[String; 4]>,
    domain_indexes: SmallVec<[String; 4]>,
    ontology_path: Option<String>,
    definition_line: u64,
    definition_column: u64,
}

impl Class {
    pub fn new() -> Self {
        Class::default()
    }

    /// Set the URI of this class. Also derives the short display name.
    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
        self.name = local_name(uri);
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_id(&mut self, id: Rowid) {
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<Rowid> {
        self.id
    }

    pub fn set_notify(&mut self, notify: bool) {
        self.notify = notify;
    }

    pub fn notify(&self) -> bool {
        self.notify
    }

    /// Append a super class reference. Deduplication is the caller's job;
    /// the order of additions is preserved.
    pub fn add_super_class(&mut self, class_uri: &str) {
        self.super_classes.push(class_uri.to_string());
    }

    pub fn super_classes(&self) -> &[String] {
        &self.super_classes
    }

    /// Append a domain index property reference. The matching reverse link
    /// on the property is maintained by the loaders.
    pub fn add_domain_index(&mut self, property_uri: &str) {
        self.domain_indexes.push(property_uri.to_string());
    }

    pub fn domain_indexes(&self) -> &[String] {
        &self.domain_indexes
    }

    pub fn set_ontology_path(&mut self, path: &str) {
        self.ontology_path = Some(path.to_string());
    }

    pub fn ontology_path(&self) -> Option<&str> {
        self.ontology_path.as_deref()
    }

    pub fn set_definition_line(&mut self, line: u64) {
        self.definition_line = line;
    }

    pub fn definition_line(&self) -> u64 {
        self.definition_line
    }

    pub fn set_definition_column(&mut self, column: u64) {
        self.definition_column = column;
    }

    pub fn definition_column(&self) -> u64 {
        self.definition_column
    }
}

/// A property in the loaded schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    uri: String,
    name: String,
    id: Option<Rowid>,
    domain: Option<String>,
    range: Option<String>,
    multiple_values: bool,
    indexed: bool,
    secondary_index: Option<String>,
    fulltext_indexed: bool,
    weight: i32,
    is_inverse_functional: bool,
    super_properties: SmallVec<[String; 4]>,
    domain_indexes: SmallVec<[String; 4]>,
    ontology_path: Option<String>,
    definition_line: u64,
    definition_column: u64,
}

impl Default for Property {
    fn default() -> Self {
        Property {
            uri: String::new(),
            name: String::new(),
            id: None,
            domain: None,
            range: None,
            // Properties are multi-valued until nrl:maxCardinality 1 says otherwise
            multiple_values: true,
            indexed: false,
            secondary_index: None,
            fulltext_indexed: false,
            weight: 1,
            is_inverse_functional: false,
            super_properties: SmallVec::new(),
            domain_indexes: SmallVec::new(),
            ontology_path: None,
            definition_line: 0,
            definition_column: 0,
        }
    }
}

impl Property {
    pub fn new() -> Self {
        Property::default()
    }

    /// Set the URI of this property. Also derives the short display name.
    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
        self.name = local_name(uri);
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_id(&mut self, id: Rowid) {
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<Rowid> {
        self.id
    }

    pub fn set_domain(&mut self, class_uri: &str) {
        self.domain = Some(class_uri.to_string());
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn set_range(&mut self, class_uri: &str) {
        self.range = Some(class_uri.to_string());
    }

    pub fn range(&self) -> Option<&str> {
        self.range.as_deref()
    }

    pub fn set_multiple_values(&mut self, multiple_values: bool) {
        self.multiple_values = multiple_values;
    }

    pub fn multiple_values(&self) -> bool {
        self.multiple_values
    }

    pub fn set_indexed(&mut self, indexed: bool) {
        self.indexed = indexed;
    }

    pub fn indexed(&self) -> bool {
        self.indexed
    }

    pub fn set_secondary_index(&mut self, property_uri: &str) {
        self.secondary_index = Some(property_uri.to_string());
    }

    pub fn secondary_index(&self) -> Option<&str> {
        self.secondary_index.as_deref()
    }

    pub fn set_fulltext_indexed(&mut self, fulltext_indexed: bool) {
        self.fulltext_indexed = fulltext_indexed;
    }

    pub fn fulltext_indexed(&self) -> bool {
        self.fulltext_indexed
    }

    pub fn set_weight(&mut self, weight: i32) {
        self.weight = weight;
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn set_is_inverse_functional(&mut self, value: bool) {
        self.is_inverse_functional = value;
    }

    pub fn is_inverse_functional(&self) -> bool {
        self.is_inverse_functional
    }

    pub fn add_super_property(&mut self, property_uri: &str) {
        self.super_properties.push(property_uri.to_string());
    }

    pub fn super_properties(&self) -> &[String] {
        &self.super_properties
    }

    /// Reverse link of [`Class::add_domain_index`]
    pub fn add_domain_index(&mut self, class_uri: &str) {
        self.domain_indexes.push(class_uri.to_string());
    }

    pub fn domain_indexes(&self) -> &[String] {
        &self.domain_indexes
    }

    pub fn set_ontology_path(&mut self, path: &str) {
        self.ontology_path = Some(path.to_string());
    }

    pub fn ontology_path(&self) -> Option<&str> {
        self.ontology_path.as_deref()
    }

    pub fn set_definition_line(&mut self, line: u64) {
        self.definition_line = line;
    }

    pub fn definition_line(&self) -> u64 {
        self.definition_line
    }

    pub fn set_definition_column(&mut self, column: u64) {
        self.definition_column = column;
    }

    pub fn definition_column(&self) -> u64 {
        self.definition_column
    }

    /// Location of the defining triple, in `path:line:column` form.
    pub fn definition_location(&self) -> String {
        format!(
            "{}:{}:{}",
            self.ontology_path.as_deref().unwrap_or("<unknown>"),
            self.definition_line,
            self.definition_column
        )
    }
}

/// A namespace declaration with its short prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    uri: String,
    prefix: Option<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = Some(prefix.to_string());
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

/// An ontology descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ontology {
    uri: String,
}

impl Ontology {
    pub fn new() -> Self {
        Ontology::default()
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_derivation() {
        let mut class = Class::new();
        class.set_uri("http://example.org/ns#Document");
        assert_eq!(class.name(), "Document");

        class.set_uri("http://example.org/ns/Folder");
        assert_eq!(class.name(), "Folder");

        class.set_uri("plain");
        assert_eq!(class.name(), "plain");
    }

    #[test]
    fn test_property_defaults() {
        let prop = Property::new();
        assert!(prop.multiple_values());
        assert!(!prop.indexed());
        assert!(!prop.fulltext_indexed());
        assert!(!prop.is_inverse_functional());
        assert_eq!(prop.weight(), 1);
        assert!(prop.domain().is_none());
        assert!(prop.range().is_none());
    }

    #[test]
    fn test_super_class_order_preserved() {
        let mut class = Class::new();
        class.set_uri("http://example.org/ns#C");
        class.add_super_class("http://example.org/ns#B");
        class.add_super_class("http://example.org/ns#A");
        assert_eq!(
            class.super_classes(),
            &["http://example.org/ns#B", "http://example.org/ns#A"]
        );
    }
}
