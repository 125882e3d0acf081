//! Service and field descriptors
//!
//! Legacy-shape per-service metadata consulted by the query layer: which
//! database a service lives in, whether it has full text or thumbnails,
//! which metadata fields are key, and how mime types map onto services.

pub mod manager;

use serde::{Deserialize, Serialize};

pub use manager::ServiceManager;

/// Which database a service's data lives in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbType {
    #[default]
    Unknown,
    Data,
    Index,
    Common,
    Content,
    Email,
    Files,
    Xesam,
    Cache,
    User,
}

/// Data type of a metadata field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Keyword,
    Index,
    Fulltext,
    #[default]
    String,
    Integer,
    Double,
    Date,
    Blob,
    Struct,
    Link,
}

/// A configurable service descriptor
#[derive(Debug, Clone)]
pub struct Service {
    id: i32,
    name: String,
    parent: Option<String>,
    property_prefix: Option<String>,
    content_metadata: Option<String>,
    key_metadata: Vec<String>,
    db_type: DbType,
    enabled: bool,
    embedded: bool,
    has_metadata: bool,
    has_full_text: bool,
    has_thumbs: bool,
    show_service_files: bool,
    show_service_directories: bool,
}

impl Service {
    pub fn new(id: i32, name: &str) -> Self {
        Service {
            id,
            name: name.to_string(),
            parent: None,
            property_prefix: None,
            content_metadata: None,
            key_metadata: Vec::new(),
            db_type: DbType::Data,
            enabled: true,
            embedded: false,
            has_metadata: false,
            has_full_text: false,
            has_thumbs: false,
            show_service_files: false,
            show_service_directories: false,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_parent(&mut self, parent: &str) {
        self.parent = Some(parent.to_string());
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_property_prefix(&mut self, prefix: &str) {
        self.property_prefix = Some(prefix.to_string());
    }

    pub fn property_prefix(&self) -> Option<&str> {
        self.property_prefix.as_deref()
    }

    pub fn set_content_metadata(&mut self, name: &str) {
        self.content_metadata = Some(name.to_string());
    }

    /// Name of the property holding the full text body
    pub fn content_metadata(&self) -> Option<&str> {
        self.content_metadata.as_deref()
    }

    pub fn set_key_metadata<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_metadata = names.into_iter().map(Into::into).collect();
    }

    pub fn key_metadata(&self) -> &[String] {
        &self.key_metadata
    }

    pub fn set_db_type(&mut self, db_type: DbType) {
        self.db_type = db_type;
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_embedded(&mut self, embedded: bool) {
        self.embedded = embedded;
    }

    pub fn embedded(&self) -> bool {
        self.embedded
    }

    pub fn set_has_metadata(&mut self, value: bool) {
        self.has_metadata = value;
    }

    pub fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    pub fn set_has_full_text(&mut self, value: bool) {
        self.has_full_text = value;
    }

    pub fn has_full_text(&self) -> bool {
        self.has_full_text
    }

    pub fn set_has_thumbs(&mut self, value: bool) {
        self.has_thumbs = value;
    }

    pub fn has_thumbs(&self) -> bool {
        self.has_thumbs
    }

    pub fn set_show_service_files(&mut self, value: bool) {
        self.show_service_files = value;
    }

    pub fn show_service_files(&self) -> bool {
        self.show_service_files
    }

    pub fn set_show_service_directories(&mut self, value: bool) {
        self.show_service_directories = value;
    }

    pub fn show_service_directories(&self) -> bool {
        self.show_service_directories
    }
}

/// A metadata field descriptor
#[derive(Debug, Clone)]
pub struct Field {
    id: i32,
    name: String,
    field_name: String,
    data_type: DataType,
    weight: i32,
    embedded: bool,
    multiple_values: bool,
    delimited: bool,
    filtered: bool,
    store_metadata: bool,
    child_ids: Vec<i32>,
}

impl Field {
    pub fn new(id: i32, name: &str, field_name: &str) -> Self {
        Field {
            id,
            name: name.to_string(),
            field_name: field_name.to_string(),
            data_type: DataType::String,
            weight: 1,
            embedded: true,
            multiple_values: false,
            delimited: false,
            filtered: true,
            store_metadata: false,
            child_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn set_weight(&mut self, weight: i32) {
        self.weight = weight;
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn set_embedded(&mut self, embedded: bool) {
        self.embedded = embedded;
    }

    pub fn embedded(&self) -> bool {
        self.embedded
    }

    pub fn set_multiple_values(&mut self, value: bool) {
        self.multiple_values = value;
    }

    pub fn multiple_values(&self) -> bool {
        self.multiple_values
    }

    pub fn set_delimited(&mut self, value: bool) {
        self.delimited = value;
    }

    pub fn delimited(&self) -> bool {
        self.delimited
    }

    pub fn set_filtered(&mut self, value: bool) {
        self.filtered = value;
    }

    pub fn filtered(&self) -> bool {
        self.filtered
    }

    pub fn set_store_metadata(&mut self, value: bool) {
        self.store_metadata = value;
    }

    pub fn store_metadata(&self) -> bool {
        self.store_metadata
    }

    pub fn add_child_id(&mut self, id: i32) {
        self.child_ids.push(id);
    }

    pub fn child_ids(&self) -> &[i32] {
        &self.child_ids
    }
}
