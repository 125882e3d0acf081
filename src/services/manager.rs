//! The service manifest manager
//!
//! Keyed containers over the configured services and fields: lookup by name
//! (case insensitive) and id, mime type resolution with an ordered prefix
//! fallback, and the per-service parent chain.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::services::{DataType, DbType, Field, Service};

/// Fallback service for mime types nothing claims
const OTHER_SERVICE: &str = "Other";

#[derive(Default)]
pub struct ServiceManager {
    services: Vec<Arc<Service>>,
    by_name: HashMap<String, Arc<Service>>,
    by_id: HashMap<i32, Arc<Service>>,
    mime_map: HashMap<String, i32>,
    mime_prefixes: Vec<(String, i32)>,
    fields: HashMap<String, Arc<Field>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        ServiceManager::default()
    }

    /// Register a service with the mime types and mime prefixes it claims.
    /// Prefixes are consulted in registration order.
    pub fn add_service(&mut self, service: Service, mimes: &[String], mime_prefixes: &[String]) {
        let id = service.id();
        let service = Arc::new(service);

        self.by_name
            .insert(service.name().to_lowercase(), Arc::clone(&service));
        self.by_id.insert(id, Arc::clone(&service));
        self.services.push(service);

        for mime in mimes {
            self.mime_map.insert(mime.clone(), id);
        }
        for prefix in mime_prefixes {
            self.mime_prefixes.push((prefix.clone(), id));
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields
            .insert(field.name().to_string(), Arc::new(field));
    }

    /// Enabled services, in registration order. Disabled services stay out
    /// of the default listing but remain reachable by explicit id or name.
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services
            .iter()
            .filter(|s| s.enabled())
            .cloned()
            .collect()
    }

    /// Every registered service, enabled or not
    pub fn all_services(&self) -> &[Arc<Service>] {
        &self.services
    }

    pub fn service_by_name(&self, name: &str) -> Option<Arc<Service>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    pub fn service_by_id(&self, id: i32) -> Option<Arc<Service>> {
        self.by_id.get(&id).cloned()
    }

    pub fn service_name_by_id(&self, id: i32) -> Option<String> {
        self.service_by_id(id).map(|s| s.name().to_string())
    }

    pub fn id_for_service(&self, name: &str) -> Option<i32> {
        self.service_by_name(name).map(|s| s.id())
    }

    pub fn is_valid_service(&self, name: &str) -> bool {
        self.id_for_service(name).is_some()
    }

    /// Resolve a mime type to a service name: the exact map first, then the
    /// ordered prefix list, then `"Other"`.
    pub fn service_for_mime(&self, mime: &str) -> String {
        if let Some(id) = self.mime_map.get(mime) {
            if let Some(name) = self.service_name_by_id(*id) {
                return name;
            }
        }

        for (prefix, id) in &self.mime_prefixes {
            if mime.starts_with(prefix.as_str()) {
                if let Some(name) = self.service_name_by_id(*id) {
                    return name;
                }
            }
        }

        OTHER_SERVICE.to_string()
    }

    pub fn parent_service(&self, name: &str) -> Option<String> {
        self.service_by_name(name)
            .and_then(|s| s.parent().map(str::to_string))
    }

    pub fn parent_service_by_id(&self, id: i32) -> Option<String> {
        self.service_by_id(id)
            .and_then(|s| s.parent().map(str::to_string))
    }

    pub fn parent_id_for_service_id(&self, id: i32) -> Option<i32> {
        let parent = self.parent_service_by_id(id)?;
        self.id_for_service(&parent)
    }

    /// The database a service's data belongs to. Email-ish services have
    /// their own database.
    pub fn db_for_service(&self, name: &str) -> DbType {
        let lower = name.to_lowercase();
        if lower.starts_with("emails") || lower.starts_with("attachments") {
            DbType::Email
        } else {
            DbType::Data
        }
    }

    pub fn is_service_embedded(&self, name: &str) -> bool {
        self.service_by_name(name).is_some_and(|s| s.embedded())
    }

    pub fn has_metadata(&self, name: &str) -> bool {
        self.service_by_name(name).is_some_and(|s| s.has_metadata())
    }

    pub fn has_thumbnails(&self, name: &str) -> bool {
        self.service_by_name(name).is_some_and(|s| s.has_thumbs())
    }

    pub fn has_text(&self, name: &str) -> bool {
        self.service_by_name(name).is_some_and(|s| s.has_full_text())
    }

    pub fn show_service_files(&self, name: &str) -> bool {
        self.service_by_name(name)
            .is_some_and(|s| s.show_service_files())
    }

    pub fn show_service_directories(&self, name: &str) -> bool {
        self.service_by_name(name)
            .is_some_and(|s| s.show_service_directories())
    }

    /// Position of a metadata field in the service's key metadata list,
    /// 0 when absent
    pub fn metadata_position(&self, service_name: &str, meta_name: &str) -> usize {
        let Some(service) = self.service_by_name(service_name) else {
            return 0;
        };

        service
            .key_metadata()
            .iter()
            .position(|name| name.eq_ignore_ascii_case(meta_name))
            .unwrap_or(0)
    }

    pub fn field_by_name(&self, name: &str) -> Option<Arc<Field>> {
        self.fields.get(name).cloned()
    }

    /// Load a manager from a TOML manifest file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a manager from TOML manifest text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Manifest =
            toml::from_str(content).map_err(|e| ServiceError::ManifestParse(e.to_string()))?;

        let mut manager = ServiceManager::new();

        for entry in manifest.services {
            let mut service = Service::new(entry.id, &entry.name);
            if let Some(parent) = &entry.parent {
                service.set_parent(parent);
            }
            if let Some(prefix) = &entry.property_prefix {
                service.set_property_prefix(prefix);
            }
            if let Some(content_metadata) = &entry.content_metadata {
                service.set_content_metadata(content_metadata);
            }
            service.set_key_metadata(entry.key_metadata.clone());
            service.set_db_type(entry.db_type);
            service.set_enabled(entry.enabled);
            service.set_embedded(entry.embedded);
            service.set_has_metadata(entry.has_metadata);
            service.set_has_full_text(entry.has_full_text);
            service.set_has_thumbs(entry.has_thumbs);
            service.set_show_service_files(entry.show_service_files);
            service.set_show_service_directories(entry.show_service_directories);

            manager.add_service(service, &entry.mimes, &entry.mime_prefixes);
        }

        for entry in manifest.fields {
            let mut field = Field::new(entry.id, &entry.name, &entry.field_name);
            field.set_data_type(entry.data_type);
            field.set_weight(entry.weight);
            field.set_embedded(entry.embedded);
            field.set_multiple_values(entry.multiple_values);
            field.set_delimited(entry.delimited);
            field.set_filtered(entry.filtered);
            field.set_store_metadata(entry.store_metadata);
            for child in entry.child_ids {
                field.add_child_id(child);
            }
            manager.add_field(field);
        }

        Ok(manager)
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "service")]
    services: Vec<ManifestService>,
    #[serde(default, rename = "field")]
    fields: Vec<ManifestField>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ManifestService {
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
    mimes: Vec<String>,
    mime_prefixes: Vec<String>,
}

impl Default for ManifestService {
    fn default() -> Self {
        ManifestService {
            id: 0,
            name: String::new(),
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
            mimes: Vec::new(),
            mime_prefixes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ManifestField {
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

impl Default for ManifestField {
    fn default() -> Self {
        ManifestField {
            id: 0,
            name: String::new(),
            field_name: String::new(),
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
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[[service]]
id = 1
name = "Files"
db_type = "Files"
has_full_text = true
mimes = ["text/plain"]
mime_prefixes = ["text/"]

[[service]]
id = 2
name = "Images"
parent = "Files"
has_thumbs = true
mimes = ["image/png", "image/jpeg"]
mime_prefixes = ["image/"]

[[service]]
id = 3
name = "Development"
parent = "Files"
enabled = false

[[field]]
id = 1
name = "File:Name"
field_name = "name"
data_type = "Index"
weight = 10
"#;

    fn manager() -> ServiceManager {
        ServiceManager::from_toml_str(MANIFEST).unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let manager = manager();
        assert_eq!(manager.id_for_service("files"), Some(1));
        assert_eq!(manager.id_for_service("FILES"), Some(1));
        assert_eq!(manager.id_for_service("nope"), None);
    }

    #[test]
    fn test_mime_resolution() {
        let manager = manager();
        // Exact match wins over prefixes
        assert_eq!(manager.service_for_mime("image/png"), "Images");
        // Prefixes are consulted in registration order
        assert_eq!(manager.service_for_mime("text/x-rust"), "Files");
        assert_eq!(manager.service_for_mime("image/webp"), "Images");
        // Everything else is Other
        assert_eq!(manager.service_for_mime("application/x-thing"), "Other");
    }

    #[test]
    fn test_parent_chain() {
        let manager = manager();
        assert_eq!(manager.parent_service("Images"), Some("Files".to_string()));
        assert_eq!(manager.parent_id_for_service_id(2), Some(1));
        assert_eq!(manager.parent_id_for_service_id(1), None);
    }

    #[test]
    fn test_disabled_services_hidden_but_resolvable() {
        let manager = manager();
        let listed: Vec<String> = manager
            .services()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(listed, ["Files", "Images"]);

        // Still reachable explicitly
        assert!(manager.service_by_id(3).is_some());
        assert!(manager.service_by_name("Development").is_some());
        assert_eq!(manager.all_services().len(), 3);
    }

    #[test]
    fn test_db_type_heuristic() {
        let manager = manager();
        assert_eq!(manager.db_for_service("EmailAttachments"), DbType::Data);
        assert_eq!(manager.db_for_service("Emails"), DbType::Email);
        assert_eq!(manager.db_for_service("attachments"), DbType::Email);
        assert_eq!(manager.db_for_service("Files"), DbType::Data);
    }

    #[test]
    fn test_fields() {
        let manager = manager();
        let field = manager.field_by_name("File:Name").unwrap();
        assert_eq!(field.field_name(), "name");
        assert_eq!(field.data_type(), DataType::Index);
        assert_eq!(field.weight(), 10);
    }

    #[test]
    fn test_flags() {
        let manager = manager();
        assert!(manager.has_text("Files"));
        assert!(!manager.has_text("Images"));
        assert!(manager.has_thumbnails("Images"));
    }
}
