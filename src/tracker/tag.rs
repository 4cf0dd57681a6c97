//! A named allocation tag and its tracked allocations.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;

use crate::error::AllocError;
use crate::fault::{debug_message, fatal};
use crate::sync::mutex::Mutex;
use crate::util::layout::align_up;
use crate::util::text::bounded_name;

use super::SourceSite;

/// Internal allocation granularity in bytes. Requested sizes are rounded up
/// to this before reaching the system allocator; a resize that stays within
/// the same granule is a complete no-op.
const GRANULE: usize = 16;

/// Metadata for one live allocation, keyed by its payload address.
#[derive(Debug, Clone, Copy)]
struct Allocation {
    /// Requested (unrounded) size in bytes.
    size: usize,
    /// Layout handed to the system allocator.
    layout: Layout,
    /// Call site that made (or last resized) the allocation.
    site: SourceSite,
}

/// Side table and byte total, guarded by the tag's own mutex.
struct TagState {
    allocations: HashMap<usize, Allocation>,
    total_bytes: usize,
}

/// A named grouping of allocations sharing tracking and lifetime
/// bookkeeping.
///
/// Tags are created through [`MemoryTracker::create_tag`] and shared as
/// `Arc<Tag>`. Each tag serializes its own side table with its own lock, so
/// unrelated tags allocate concurrently without contention. The lock is held
/// across the underlying system call: the table must change atomically with
/// the call's outcome.
///
/// Passing a pointer that did not come from this tag to [`Tag::release`],
/// [`Tag::resize`] or [`Tag::allocation_size`] is a caller bug and fatal.
///
/// [`MemoryTracker::create_tag`]: super::MemoryTracker::create_tag
pub struct Tag {
    name: String,
    state: Mutex<TagState>,
}

impl Tag {
    /// Longest tag name kept; longer names are truncated on a character
    /// boundary.
    pub const MAX_NAME_LEN: usize = 63;

    pub(super) fn new(name: &str) -> Self {
        Self {
            name: bounded_name(name, Self::MAX_NAME_LEN),
            state: Mutex::new(TagState {
                allocations: HashMap::new(),
                total_bytes: 0,
            }),
        }
    }

    /// The tag's name, possibly empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(unnamed)"
        } else {
            &self.name
        }
    }

    /// Allocate `size` bytes, 8-byte aligned, or 16-byte aligned when
    /// `align16`.
    ///
    /// A `size` of zero is legal and returns a distinct valid pointer.
    /// Returns the typed exhaustion error when the system allocator fails;
    /// [`Tag::alloc`] escalates the same condition to a fatal report.
    pub fn try_alloc(
        &self,
        size: usize,
        align16: bool,
        site: SourceSite,
    ) -> Result<NonNull<u8>, AllocError> {
        let layout = payload_layout(size, align16, site);
        let mut state = self.state.lock();
        // SAFETY: `layout` always has a nonzero, granule-rounded size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            return Err(AllocError::OutOfMemory { requested: size });
        };
        state
            .allocations
            .insert(ptr.as_ptr() as usize, Allocation { size, layout, site });
        state.total_bytes += size;
        Ok(ptr)
    }

    /// Allocate `size` bytes; exhaustion is fatal.
    pub fn alloc(&self, size: usize, align16: bool, site: SourceSite) -> NonNull<u8> {
        match self.try_alloc(size, align16, site) {
            Ok(ptr) => ptr,
            Err(_) => fatal!(
                "Tag::alloc",
                "failed to allocate {} bytes in tag {} at {}",
                size,
                self.display_name(),
                site
            ),
        }
    }

    /// Resize the allocation behind `ptr` to `new_size` bytes, updating
    /// `ptr` in place when the block moves.
    ///
    /// A resize that stays within the same internal granule does nothing at
    /// all. Resizing the same pointer from two threads at once is a caller
    /// contract violation; this call does not serialize that.
    pub fn try_resize(
        &self,
        ptr: &mut NonNull<u8>,
        new_size: usize,
        site: SourceSite,
    ) -> Result<(), AllocError> {
        let mut state = self.state.lock();
        let key = ptr.as_ptr() as usize;
        let Some(&old) = state.allocations.get(&key) else {
            drop(state);
            fatal!(
                "Tag::resize",
                "pointer {:p} at {} was not allocated from tag {}",
                ptr.as_ptr(),
                site,
                self.display_name()
            );
        };
        let new_layout = payload_layout(new_size, old.layout.align() == 16, site);
        if new_layout.size() == old.layout.size() {
            // Same granule, the block is already large enough.
            return Ok(());
        }
        // SAFETY: the side table proves `ptr` was allocated by this tag with
        // `old.layout`; realloc preserves the layout's alignment.
        let raw = unsafe { alloc::realloc(ptr.as_ptr(), old.layout, new_layout.size()) };
        let Some(moved) = NonNull::new(raw) else {
            return Err(AllocError::OutOfMemory {
                requested: new_size,
            });
        };
        state.allocations.remove(&key);
        state.allocations.insert(
            moved.as_ptr() as usize,
            Allocation {
                size: new_size,
                layout: new_layout,
                site,
            },
        );
        state.total_bytes = state.total_bytes - old.size + new_size;
        *ptr = moved;
        Ok(())
    }

    /// Resize the allocation behind `ptr`; exhaustion is fatal.
    pub fn resize(&self, ptr: &mut NonNull<u8>, new_size: usize, site: SourceSite) {
        if self.try_resize(ptr, new_size, site).is_err() {
            fatal!(
                "Tag::resize",
                "failed to resize to {} bytes in tag {} at {}",
                new_size,
                self.display_name(),
                site
            );
        }
    }

    /// Release an allocation made from this tag.
    pub fn release(&self, ptr: NonNull<u8>) {
        let mut state = self.state.lock();
        let Some(allocation) = state.allocations.remove(&(ptr.as_ptr() as usize)) else {
            drop(state);
            fatal!(
                "Tag::release",
                "pointer {:p} was not allocated from tag {}",
                ptr.as_ptr(),
                self.display_name()
            );
        };
        state.total_bytes -= allocation.size;
        // SAFETY: the side table entry proves `ptr` came from this tag with
        // `allocation.layout`.
        unsafe { alloc::dealloc(ptr.as_ptr(), allocation.layout) };
    }

    /// The requested size of the allocation behind `ptr`.
    pub fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let state = self.state.lock();
        if let Some(allocation) = state.allocations.get(&(ptr.as_ptr() as usize)) {
            return allocation.size;
        }
        drop(state);
        fatal!(
            "Tag::allocation_size",
            "pointer {:p} was not allocated from tag {}",
            ptr.as_ptr(),
            self.display_name()
        )
    }

    /// Total requested bytes currently live in this tag.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    /// Number of live allocations in this tag.
    pub fn live_allocations(&self) -> usize {
        self.state.lock().allocations.len()
    }

    /// Point-in-time snapshot of this tag.
    pub fn stats(&self) -> TagStats {
        let state = self.state.lock();
        TagStats {
            name: self.name.clone(),
            total_bytes: state.total_bytes,
            live_allocations: state.allocations.len(),
        }
    }

    /// Free everything still allocated, reporting each leak when asked.
    /// Returns the number of allocations that were still live.
    pub(super) fn release_all(&self, report_leaks: bool) -> usize {
        let mut state = self.state.lock();
        let count = state.allocations.len();
        for (&address, allocation) in state.allocations.iter() {
            if report_leaks {
                debug_message!(
                    "leak in tag {} at {} ({} bytes)",
                    self.display_name(),
                    allocation.site,
                    allocation.size
                );
            }
            // SAFETY: every table entry was allocated by this tag with its
            // recorded layout.
            unsafe { alloc::dealloc(address as *mut u8, allocation.layout) };
        }
        state.allocations.clear();
        state.total_bytes = 0;
        count
    }
}

impl Drop for Tag {
    fn drop(&mut self) {
        self.release_all(false);
    }
}

/// Build the system-allocator layout for a payload: granule-rounded size
/// (minimum one granule so zero-size allocations get distinct addresses),
/// 8-byte alignment, 16 when requested.
fn payload_layout(size: usize, align16: bool, site: SourceSite) -> Layout {
    if size > isize::MAX as usize - GRANULE {
        fatal!("Tag::alloc", "allocation of {} bytes at {} is too large", size, site);
    }
    let rounded = align_up(size.max(1), GRANULE);
    let align = if align16 { 16 } else { 8 };
    match Layout::from_size_align(rounded, align) {
        Ok(layout) => layout,
        Err(_) => fatal!(
            "Tag::alloc",
            "invalid allocation of {} bytes at {}",
            size,
            site
        ),
    }
}

/// Point-in-time snapshot of one tag's tracked allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStats {
    /// Tag name, possibly empty.
    pub name: String,
    /// Total requested bytes currently live.
    pub total_bytes: usize,
    /// Number of live allocations.
    pub live_allocations: usize,
}

#[cfg(test)]
mod tests {
    use crate::site;
    use crate::tracker::MemoryTracker;

    #[test]
    fn test_alloc_tracks_bytes_and_count() {
        let tracker = MemoryTracker::new();
        let tag = tracker.create_tag("test");

        let a = tag.alloc(100, false, site!());
        let b = tag.alloc(50, false, site!());
        assert_eq!(tag.total_bytes(), 150);
        assert_eq!(tag.live_allocations(), 2);

        tag.release(a);
        assert_eq!(tag.total_bytes(), 50);
        tag.release(b);
        assert_eq!(tag.total_bytes(), 0);
        assert_eq!(tag.live_allocations(), 0);

        tracker.destroy_tag(tag, true);
        tracker.shutdown();
    }

    #[test]
    fn test_zero_size_allocations_are_distinct() {
        let tracker = MemoryTracker::new();
        let tag = tracker.create_tag("zero");

        let a = tag.alloc(0, false, site!());
        let b = tag.alloc(0, false, site!());
        assert_ne!(a, b);
        assert_eq!(tag.allocation_size(a), 0);
        assert_eq!(tag.total_bytes(), 0);

        tag.release(a);
        tag.release(b);
        tracker.destroy_tag(tag, true);
        tracker.shutdown();
    }

    #[test]
    fn test_resize_moves_data() {
        let tracker = MemoryTracker::new();
        let tag = tracker.create_tag("resize");

        let mut ptr = tag.alloc(16, false, site!());
        // SAFETY: 16 writable bytes were just allocated.
        unsafe {
            for offset in 0..16 {
                *ptr.as_ptr().add(offset) = offset as u8;
            }
        }
        tag.resize(&mut ptr, 4096, site!());
        assert_eq!(tag.allocation_size(ptr), 4096);
        // SAFETY: the first 16 bytes survive the move.
        unsafe {
            for offset in 0..16 {
                assert_eq!(*ptr.as_ptr().add(offset), offset as u8);
            }
        }

        tag.release(ptr);
        tracker.destroy_tag(tag, true);
        tracker.shutdown();
    }

    #[test]
    fn test_long_names_truncate() {
        let tracker = MemoryTracker::new();
        let tag = tracker.create_tag(&"x".repeat(200));
        assert_eq!(tag.name().len(), super::Tag::MAX_NAME_LEN);
        tracker.destroy_tag(tag, true);
        tracker.shutdown();
    }

    #[test]
    #[should_panic]
    fn test_query_of_foreign_pointer_is_fatal() {
        let tracker = MemoryTracker::new();
        let tag = tracker.create_tag("a");
        let other = tracker.create_tag("b");
        let ptr = other.alloc(8, false, site!());
        tag.allocation_size(ptr);
    }
}
