//! Writeback: propagating metadata edits back to the files they describe
//!
//! A single controller hosts a dedicated event loop, accepts writeback
//! requests over its message surface, matches each request's rdf:types
//! against the registered modules and runs the matching updates on worker
//! threads under cancellation. The controller shuts the process down after a
//! configurable stretch of idleness.

pub mod controller;
pub mod file;
pub mod module;
pub mod playlist;
pub mod xmp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use controller::{Controller, ControllerOptions, WritebackAck, WritebackHandle};
pub use module::{builtin_modules, Writeback, WritebackModuleDesc};

/// Rows of a writeback request. Each row is `[url, predicate, value, ...]`;
/// the first column is the `nie:url` of the file the update targets.
pub type WritebackRows = Vec<Vec<String>>;

/// Advisory cancellation handle carried by every writeback task. Modules
/// check it between discrete update steps and complete cleanly when it is
/// set.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Completion record posted back for every dispatched task
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub module: String,
    pub subject: String,
    pub success: bool,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_sticky() {
        let cancellation = Cancellation::new();
        assert!(!cancellation.is_cancelled());

        let clone = cancellation.clone();
        clone.cancel();
        assert!(cancellation.is_cancelled());
    }
}
