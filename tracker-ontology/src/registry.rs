//! The registry of schema entities
//!
//! Owns every loaded [`Class`], [`Property`], [`Namespace`] and [`Ontology`]
//! and keys them by URI, short name and backend row id. Lookups hand out
//! `Arc` clones so query code can hold on to entities without borrowing the
//! registry. A registry is built once by a loader and is read-only
//! afterwards.
//!
//! A registry can also be backed by previously dumped key-value tables
//! instead of loaded entities; in that mode entities are materialized from
//! the tables on first lookup and cached, making them indistinguishable from
//! loaded ones.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::entities::{Class, Namespace, Ontology, Property, Rowid};
use crate::error::SchemaResult;

/// A single value in the persisted registry tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl SchemaValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            SchemaValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            SchemaValue::Str(value) => Some(value),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[String]> {
        match self {
            SchemaValue::List(values) => Some(values),
            _ => None,
        }
    }
}

fn table_key(uri: &str, predicate: &str) -> String {
    format!("{uri}#{predicate}")
}

/// Extract the distinct entity URIs out of a `uri#predicate`-keyed table.
/// Keys sharing a URI sort next to each other, so consecutive deduplication
/// is enough.
fn table_uris(table: &BTreeMap<String, SchemaValue>) -> Vec<String> {
    let mut uris: Vec<String> = Vec::new();
    for key in table.keys() {
        if let Some((uri, _)) = key.rsplit_once('#') {
            if uris.last().map(String::as_str) != Some(uri) {
                uris.push(uri.to_string());
            }
        }
    }
    uris
}

/// The serialized form of a registry: one key-value table per entity kind,
/// keyed `uri#predicate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedTables {
    pub namespaces: BTreeMap<String, SchemaValue>,
    pub classes: BTreeMap<String, SchemaValue>,
    pub properties: BTreeMap<String, SchemaValue>,
}

impl PersistedTables {
    fn namespace_value(&self, uri: &str, predicate: &str) -> Option<&SchemaValue> {
        self.namespaces.get(&table_key(uri, predicate))
    }

    fn class_value(&self, uri: &str, predicate: &str) -> Option<&SchemaValue> {
        self.classes.get(&table_key(uri, predicate))
    }

    fn property_value(&self, uri: &str, predicate: &str) -> Option<&SchemaValue> {
        self.properties.get(&table_key(uri, predicate))
    }
}

/// The in-memory schema: keyed containers for every entity kind plus fast
/// paths for the three hottest properties.
#[derive(Default)]
pub struct Registry {
    classes: RwLock<Vec<Arc<Class>>>,
    properties: RwLock<Vec<Arc<Property>>>,
    namespaces: RwLock<Vec<Arc<Namespace>>>,
    ontologies: Vec<Arc<Ontology>>,

    class_uris: DashMap<String, Arc<Class>>,
    property_uris: DashMap<String, Arc<Property>>,
    namespace_uris: DashMap<String, Arc<Namespace>>,
    ontology_uris: HashMap<String, Arc<Ontology>>,

    id_uri_pairs: HashMap<Rowid, String>,

    rdf_type: Option<Arc<Property>>,
    nrl_added: Option<Arc<Property>>,
    nrl_modified: Option<Arc<Property>>,

    persisted: Option<PersistedTables>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Build a registry backed by previously dumped tables. Entities are
    /// materialized lazily as lookups miss the primary maps.
    pub fn from_persisted(tables: PersistedTables) -> Self {
        Registry {
            persisted: Some(tables),
            ..Registry::default()
        }
    }

    /// Load a persisted registry from a file written by [`Registry::write_to`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> SchemaResult<Self> {
        let data = fs::read_to_string(path)?;
        let tables: PersistedTables = serde_json::from_str(&data)?;
        Ok(Registry::from_persisted(tables))
    }

    pub fn add_class(&mut self, class: Class) {
        let class = Arc::new(class);
        if !class.uri().is_empty() {
            self.class_uris
                .insert(class.uri().to_string(), Arc::clone(&class));
        }
        self.classes.get_mut().push(class);
    }

    pub fn add_property(&mut self, property: Property) {
        let property = Arc::new(property);

        match property.uri() {
            constants::RDF_TYPE => self.rdf_type = Some(Arc::clone(&property)),
            constants::NRL_ADDED => self.nrl_added = Some(Arc::clone(&property)),
            constants::NRL_MODIFIED => self.nrl_modified = Some(Arc::clone(&property)),
            _ => {}
        }

        // Properties resolve both by URI and by short name
        self.property_uris
            .insert(property.uri().to_string(), Arc::clone(&property));
        self.property_uris
            .insert(property.name().to_string(), Arc::clone(&property));
        self.properties.get_mut().push(property);
    }

    pub fn add_namespace(&mut self, namespace: Namespace) {
        let namespace = Arc::new(namespace);
        self.namespace_uris
            .insert(namespace.uri().to_string(), Arc::clone(&namespace));
        self.namespaces.get_mut().push(namespace);
    }

    pub fn add_ontology(&mut self, ontology: Ontology) {
        let ontology = Arc::new(ontology);
        self.ontology_uris
            .insert(ontology.uri().to_string(), Arc::clone(&ontology));
        self.ontologies.push(ontology);
    }

    pub fn add_id_uri_pair(&mut self, id: Rowid, uri: &str) {
        self.id_uri_pairs.insert(id, uri.to_string());
    }

    pub fn uri_by_id(&self, id: Rowid) -> Option<&str> {
        self.id_uri_pairs.get(&id).map(String::as_str)
    }

    pub fn class_by_uri(&self, uri: &str) -> Option<Arc<Class>> {
        if let Some(class) = self.class_uris.get(uri) {
            return Some(Arc::clone(&class));
        }
        self.materialize_class(uri)
    }

    pub fn property_by_uri(&self, uri: &str) -> Option<Arc<Property>> {
        if let Some(property) = self.property_uris.get(uri) {
            return Some(Arc::clone(&property));
        }
        if let Some(property) = self.materialize_property(uri) {
            return Some(property);
        }
        // Prefixed names resolve too, when the matching namespace is known
        if let Some(expanded) = self.expand_prefixed(uri) {
            if let Some(property) = self.property_uris.get(&expanded) {
                return Some(Arc::clone(&property));
            }
            return self.materialize_property(&expanded);
        }
        None
    }

    pub fn namespace_by_uri(&self, uri: &str) -> Option<Arc<Namespace>> {
        if let Some(namespace) = self.namespace_uris.get(uri) {
            return Some(Arc::clone(&namespace));
        }
        self.materialize_namespace(uri)
    }

    pub fn ontology_by_uri(&self, uri: &str) -> Option<Arc<Ontology>> {
        self.ontology_uris.get(uri).map(Arc::clone)
    }

    /// All classes, in registration order (or alphabetical after [`sort`]).
    /// On a persisted registry the first enumeration materializes every
    /// entry.
    ///
    /// [`sort`]: Registry::sort
    pub fn classes(&self) -> Vec<Arc<Class>> {
        {
            let classes = self.classes.read();
            if !classes.is_empty() || self.persisted.is_none() {
                return classes.clone();
            }
        }

        let mut classes = self.classes.write();
        if classes.is_empty() {
            if let Some(tables) = &self.persisted {
                for uri in table_uris(&tables.classes) {
                    if let Some(class) = self.class_by_uri(&uri) {
                        classes.push(class);
                    }
                }
            }
        }
        classes.clone()
    }

    pub fn properties(&self) -> Vec<Arc<Property>> {
        {
            let properties = self.properties.read();
            if !properties.is_empty() || self.persisted.is_none() {
                return properties.clone();
            }
        }

        let mut properties = self.properties.write();
        if properties.is_empty() {
            if let Some(tables) = &self.persisted {
                for uri in table_uris(&tables.properties) {
                    if let Some(property) = self.property_by_uri(&uri) {
                        properties.push(property);
                    }
                }
            }
        }
        properties.clone()
    }

    pub fn namespaces(&self) -> Vec<Arc<Namespace>> {
        {
            let namespaces = self.namespaces.read();
            if !namespaces.is_empty() || self.persisted.is_none() {
                return namespaces.clone();
            }
        }

        let mut namespaces = self.namespaces.write();
        if namespaces.is_empty() {
            if let Some(tables) = &self.persisted {
                for uri in table_uris(&tables.namespaces) {
                    if let Some(namespace) = self.namespace_by_uri(&uri) {
                        namespaces.push(namespace);
                    }
                }
            }
        }
        namespaces.clone()
    }

    pub fn ontologies(&self) -> Vec<Arc<Ontology>> {
        self.ontologies.clone()
    }

    /// Fast path for `rdf:type`
    pub fn rdf_type(&self) -> Option<Arc<Property>> {
        self.rdf_type
            .clone()
            .or_else(|| self.persisted_property_fast_path(constants::RDF_TYPE))
    }

    /// Fast path for `nrl:added`
    pub fn nrl_added(&self) -> Option<Arc<Property>> {
        self.nrl_added
            .clone()
            .or_else(|| self.persisted_property_fast_path(constants::NRL_ADDED))
    }

    /// Fast path for `nrl:modified`
    pub fn nrl_modified(&self) -> Option<Arc<Property>> {
        self.nrl_modified
            .clone()
            .or_else(|| self.persisted_property_fast_path(constants::NRL_MODIFIED))
    }

    /// Order the class sequence alphabetically by name
    pub fn sort(&mut self) {
        self.classes
            .get_mut()
            .sort_by(|a, b| a.name().cmp(b.name()));
    }

    /// Resolve the domain of a property to its class
    pub fn domain_of(&self, property: &Property) -> Option<Arc<Class>> {
        property.domain().and_then(|uri| self.class_by_uri(uri))
    }

    /// Resolve the range of a property to its class
    pub fn range_of(&self, property: &Property) -> Option<Arc<Class>> {
        property.range().and_then(|uri| self.class_by_uri(uri))
    }

    /// Resolve the super classes of a class, in declaration order
    pub fn super_classes_of(&self, class: &Class) -> Vec<Arc<Class>> {
        class
            .super_classes()
            .iter()
            .filter_map(|uri| self.class_by_uri(uri))
            .collect()
    }

    /// Check that every property has both a domain and a range. Domain and
    /// range may arrive as separate triples after the property declaration,
    /// so this runs once a whole load pass is finished.
    pub fn verify_completeness(&self) -> SchemaResult<()> {
        for property in self.properties() {
            let missing = if property.domain().is_none() {
                Some("domain")
            } else if property.range().is_none() {
                Some("range")
            } else {
                None
            };

            if let Some(missing) = missing {
                return Err(crate::error::SchemaError::IncompletePropertyDefinition {
                    location: property.definition_location(),
                    property: property.name().to_string(),
                    missing,
                });
            }
        }
        Ok(())
    }

    /// Serialize the registry into its persisted key-value tables
    pub fn dump(&self) -> PersistedTables {
        let mut tables = PersistedTables::default();

        for namespace in self.namespaces() {
            let uri = namespace.uri();
            if let Some(prefix) = namespace.prefix() {
                tables.namespaces.insert(
                    table_key(uri, "prefix"),
                    SchemaValue::Str(prefix.to_string()),
                );
            }
        }

        for class in self.classes() {
            let uri = class.uri();
            if let Some(id) = class.id() {
                tables
                    .classes
                    .insert(table_key(uri, "id"), SchemaValue::Int(id));
            }
            tables.classes.insert(
                table_key(uri, "name"),
                SchemaValue::Str(class.name().to_string()),
            );
            if !class.super_classes().is_empty() {
                tables.classes.insert(
                    table_key(uri, "super-classes"),
                    SchemaValue::List(class.super_classes().to_vec()),
                );
            }
        }

        for property in self.properties() {
            // The short-name alias shares the Arc with the URI entry; only
            // dump each property once
            let uri = property.uri();
            if let Some(id) = property.id() {
                tables
                    .properties
                    .insert(table_key(uri, "id"), SchemaValue::Int(id));
            }
            tables.properties.insert(
                table_key(uri, "name"),
                SchemaValue::Str(property.name().to_string()),
            );
            if let Some(domain) = property.domain() {
                tables.properties.insert(
                    table_key(uri, "domain"),
                    SchemaValue::Str(domain.to_string()),
                );
            }
            if let Some(range) = property.range() {
                tables
                    .properties
                    .insert(table_key(uri, "range"), SchemaValue::Str(range.to_string()));
            }
            if !property.multiple_values() {
                tables
                    .properties
                    .insert(table_key(uri, "max-cardinality"), SchemaValue::Int(1));
            }
            if property.is_inverse_functional() {
                tables
                    .properties
                    .insert(table_key(uri, "inverse-functional"), SchemaValue::Bool(true));
            }
            if property.fulltext_indexed() {
                tables
                    .properties
                    .insert(table_key(uri, "fulltext-indexed"), SchemaValue::Bool(true));
            }
            if !property.domain_indexes().is_empty() {
                tables.properties.insert(
                    table_key(uri, "domain-indexes"),
                    SchemaValue::List(property.domain_indexes().to_vec()),
                );
            }
        }

        tables
    }

    /// Write the persisted tables to a file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> SchemaResult<()> {
        let tables = self.dump();
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &tables)?;
        Ok(())
    }

    fn materialize_class(&self, uri: &str) -> Option<Arc<Class>> {
        let tables = self.persisted.as_ref()?;
        tables.class_value(uri, "name")?;

        let mut class = Class::new();
        class.set_uri(uri);
        if let Some(id) = tables.class_value(uri, "id").and_then(SchemaValue::as_int) {
            class.set_id(id);
        }
        if let Some(supers) = tables
            .class_value(uri, "super-classes")
            .and_then(SchemaValue::as_list)
        {
            for super_uri in supers {
                class.add_super_class(super_uri);
            }
        }

        let class = Arc::new(class);
        self.class_uris
            .insert(uri.to_string(), Arc::clone(&class));
        Some(class)
    }

    fn materialize_property(&self, uri: &str) -> Option<Arc<Property>> {
        let tables = self.persisted.as_ref()?;
        tables.property_value(uri, "name")?;

        let mut property = Property::new();
        property.set_uri(uri);
        if let Some(id) = tables
            .property_value(uri, "id")
            .and_then(SchemaValue::as_int)
        {
            property.set_id(id);
        }
        if let Some(domain) = tables
            .property_value(uri, "domain")
            .and_then(SchemaValue::as_str)
        {
            property.set_domain(domain);
        }
        if let Some(range) = tables
            .property_value(uri, "range")
            .and_then(SchemaValue::as_str)
        {
            property.set_range(range);
        }
        if let Some(cardinality) = tables
            .property_value(uri, "max-cardinality")
            .and_then(SchemaValue::as_int)
        {
            property.set_multiple_values(cardinality != 1);
        }
        if tables.property_value(uri, "inverse-functional").is_some() {
            property.set_is_inverse_functional(true);
        }
        if tables.property_value(uri, "fulltext-indexed").is_some() {
            property.set_fulltext_indexed(true);
        }
        if let Some(indexes) = tables
            .property_value(uri, "domain-indexes")
            .and_then(SchemaValue::as_list)
        {
            for class_uri in indexes {
                property.add_domain_index(class_uri);
            }
        }

        let property = Arc::new(property);
        self.property_uris
            .insert(uri.to_string(), Arc::clone(&property));
        self.property_uris
            .insert(property.name().to_string(), Arc::clone(&property));
        Some(property)
    }

    fn materialize_namespace(&self, uri: &str) -> Option<Arc<Namespace>> {
        let tables = self.persisted.as_ref()?;
        let prefix = tables
            .namespace_value(uri, "prefix")
            .and_then(SchemaValue::as_str)?;

        let mut namespace = Namespace::new();
        namespace.set_uri(uri);
        namespace.set_prefix(prefix);

        let namespace = Arc::new(namespace);
        self.namespace_uris
            .insert(uri.to_string(), Arc::clone(&namespace));
        Some(namespace)
    }

    fn persisted_property_fast_path(&self, uri: &str) -> Option<Arc<Property>> {
        if self.persisted.is_some() {
            self.property_by_uri(uri)
        } else {
            None
        }
    }

    /// Expand a `prefix:localname` form through the registered namespaces
    fn expand_prefixed(&self, name: &str) -> Option<String> {
        if name.contains("://") {
            return None;
        }
        let (prefix, local) = name.split_once(':')?;
        for namespace in self.namespaces() {
            if namespace.prefix() == Some(prefix) {
                return Some(format!("{}{}", namespace.uri(), local));
            }
        }
        None
    }
}
