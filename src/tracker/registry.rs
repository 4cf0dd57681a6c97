//! The tag registry.

use std::sync::Arc;

use crate::fault::{debug_message, fatal};
use crate::sync::mutex::Mutex;

use super::tag::{Tag, TagStats};

/// Registry of all live allocation tags.
///
/// One tracker per engine instance. Tags are created and destroyed
/// explicitly; [`MemoryTracker::shutdown`] verifies every tag was destroyed.
/// The registry lock only covers tag creation and destruction splicing,
/// never allocation itself.
pub struct MemoryTracker {
    tags: Mutex<Vec<Arc<Tag>>>,
}

impl MemoryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(Vec::new()),
        }
    }

    /// Create and register a new tag.
    pub fn create_tag(&self, name: &str) -> Arc<Tag> {
        let tag = Arc::new(Tag::new(name));
        self.tags.lock().push(Arc::clone(&tag));
        tag
    }

    /// Destroy a tag, freeing anything still allocated in it.
    ///
    /// With `leaks_are_errors`, every allocation still live is reported with
    /// its source site and the call is fatal. The caller must hand back its
    /// last reference: a tag still referenced elsewhere (a container built
    /// on it, a clone kept in a subsystem) cannot be destroyed.
    pub fn destroy_tag(&self, tag: Arc<Tag>, leaks_are_errors: bool) {
        let removed = {
            let mut tags = self.tags.lock();
            let Some(position) = tags.iter().position(|entry| Arc::ptr_eq(entry, &tag)) else {
                drop(tags);
                fatal!(
                    "MemoryTracker::destroy_tag",
                    "tag {} is not registered with this tracker",
                    tag.display_name()
                );
            };
            tags.swap_remove(position)
        };
        // Expected holders: `tag` and `removed`.
        if Arc::strong_count(&tag) > 2 {
            fatal!(
                "MemoryTracker::destroy_tag",
                "tag {} is still referenced and cannot be destroyed",
                tag.display_name()
            );
        }
        let leak_count = tag.release_all(leaks_are_errors);
        if leaks_are_errors && leak_count > 0 {
            fatal!(
                "MemoryTracker::destroy_tag",
                "{} memory leaks in tag {}, see the debug message log",
                leak_count,
                tag.display_name()
            );
        }
        drop(removed);
    }

    /// Number of live tags.
    pub fn live_tag_count(&self) -> usize {
        self.tags.lock().len()
    }

    /// Snapshot of every live tag.
    pub fn stats(&self) -> TrackerStats {
        let tags = self.tags.lock();
        TrackerStats {
            tags: tags.iter().map(|tag| tag.stats()).collect(),
        }
    }

    /// Tear the tracker down. Fatal while any tag is still registered.
    pub fn shutdown(self) {
        let live = self.live_tag_count();
        if live != 0 {
            fatal!(
                "MemoryTracker::shutdown",
                "{} memory tags were not destroyed",
                live
            );
        }
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        let live = self.tags.lock().len();
        if live != 0 {
            debug_message!("memory tracker dropped with {} live tags", live);
        }
    }
}

/// Point-in-time snapshot of a whole tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStats {
    /// One entry per live tag, in registration order.
    pub tags: Vec<TagStats>,
}
