//! The writeback module contract and the compile-time module registry
//!
//! Modules are registered statically: each one declares the rdf:types it
//! claims, optionally the content types it can handle, and a factory for
//! fresh writeback instances. The controller instantiates a module once per
//! matching task.

use std::sync::Arc;

use crate::storage::MetadataStore;
use crate::writeback::{playlist, xmp, Cancellation, WritebackRows};

/// One writeback instance, created per task
pub trait Writeback: Send {
    /// Apply the request rows to the target. Returns whether the update
    /// succeeded. Implementations check `cancellation` between discrete
    /// steps and bail out cleanly when it is set.
    fn update_metadata(
        &mut self,
        rows: &WritebackRows,
        store: &MetadataStore,
        cancellation: &Cancellation,
    ) -> bool;
}

/// A registered writeback module
#[derive(Clone)]
pub struct WritebackModuleDesc {
    pub name: &'static str,
    /// Class URIs this module claims, matched literally against request
    /// rdf:types (short `nfo:` forms)
    pub rdf_types: &'static [&'static str],
    /// Content types a file-oriented module handles; empty means no mime
    /// based short-circuiting
    pub content_types: &'static [&'static str],
    /// Factory for a fresh writeback instance
    pub create: Arc<dyn Fn() -> Box<dyn Writeback> + Send + Sync>,
}

impl std::fmt::Debug for WritebackModuleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritebackModuleDesc")
            .field("name", &self.name)
            .field("rdf_types", &self.rdf_types)
            .field("content_types", &self.content_types)
            .finish()
    }
}

/// The statically registered modules
pub fn builtin_modules() -> Vec<WritebackModuleDesc> {
    vec![xmp::module(), playlist::module()]
}

/// Whether any of the module's claimed types occurs in the request's types
pub fn rdf_types_match(module_types: &[&str], rdf_types: &[String]) -> bool {
    rdf_types
        .iter()
        .any(|requested| module_types.iter().any(|claimed| claimed == requested))
}
