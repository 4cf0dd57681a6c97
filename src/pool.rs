//! Generational slot pools with stable locators.
//!
//! A [`Pool`] hands out [`Locator`]s: slot index plus a generation counter.
//! Freed slots are reused in place, bumping the generation so every locator
//! issued before the reuse stops matching. Entry metadata and element
//! payload live in two parallel [`PagedArray`]s, keeping the bookkeeping
//! compact and the payload densely packed for bulk scans.

use std::mem::MaybeUninit;
use std::sync::Arc;

use crate::fault::fatal;
use crate::paged::PagedArray;
use crate::tracker::{SourceSite, Tag};

/// Free-list terminator.
const NO_FREE: u32 = u32::MAX;

/// Handle to a pool slot: entry index plus the generation observed at
/// allocation. Goes stale the moment the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    index: u32,
    generation: u32,
}

impl Locator {
    /// A locator that never names a live slot.
    pub const fn dangling() -> Self {
        Self {
            index: u32::MAX,
            generation: u32::MAX,
        }
    }

    /// The raw slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation observed when the slot was allocated.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::dangling()
    }
}

/// Per-slot bookkeeping. A slot is live exactly when `next_free` points at
/// itself; free slots chain onward through `next_free` instead.
#[derive(Clone, Copy)]
struct Entry {
    generation: u32,
    next_free: u32,
}

/// Generational slot pool over tag-tracked storage.
///
/// Mutation takes `&mut self`; share an instance across threads only behind
/// external synchronization.
pub struct Pool<T> {
    entries: PagedArray<Entry>,
    elements: PagedArray<MaybeUninit<T>>,
    first_free: u32,
    live: usize,
}

impl<T> Pool<T> {
    /// Create an empty pool whose backing arrays use pieces of
    /// `1 << piece_len_log2` slots.
    pub fn new(tag: Arc<Tag>, piece_len_log2: u32, site: SourceSite) -> Self {
        Self {
            entries: PagedArray::new(Arc::clone(&tag), piece_len_log2, site),
            elements: PagedArray::new(tag, piece_len_log2, site),
            first_free: NO_FREE,
            live: 0,
        }
    }

    /// Pre-allocate backing storage for `count` slots.
    pub fn reserve(&mut self, count: usize) {
        self.entries.reserve(count);
        self.elements.reserve(count);
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no element is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total slots ever created, live or free.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn live_entry(&self, locator: Locator) -> Option<&Entry> {
        let entry = self.entries.get(locator.index as usize)?;
        (entry.next_free == locator.index && entry.generation == locator.generation)
            .then_some(entry)
    }

    /// Whether `locator` still names a live element.
    pub fn contains(&self, locator: Locator) -> bool {
        self.live_entry(locator).is_some()
    }

    /// Store `value` in a free slot, returning its locator.
    ///
    /// Pops the free list when it is non-empty; otherwise appends a fresh
    /// entry and payload slot to both backing arrays.
    pub fn insert(&mut self, value: T) -> Locator {
        let locator = if self.first_free != NO_FREE {
            let index = self.first_free;
            let entry = match self.entries.get_mut(index as usize) {
                Some(entry) => entry,
                None => fatal!("Pool::insert", "corrupt free list head {}", index),
            };
            entry.generation = entry.generation.wrapping_add(1);
            self.first_free = entry.next_free;
            entry.next_free = index;
            Locator {
                index,
                generation: entry.generation,
            }
        } else {
            if self.entries.len() >= u32::MAX as usize {
                fatal!(
                    "Pool::insert",
                    "too many elements allocated, maximum {}",
                    u32::MAX
                );
            }
            let index = self.entries.len() as u32;
            let entry = self.entries.push(Entry {
                generation: 0,
                next_free: index,
            });
            let generation = entry.generation;
            self.elements.push(MaybeUninit::uninit());
            Locator { index, generation }
        };
        match self.elements.get_mut(locator.index as usize) {
            // The slot is logically uninitialized either way, so writing
            // cannot leak a live value.
            Some(slot) => {
                slot.write(value);
            }
            None => fatal!("Pool::insert", "missing payload slot {}", locator.index),
        }
        self.live += 1;
        locator
    }

    /// Shared access to the element for `locator`, `None` once it expired.
    ///
    /// This is the expected way to test whether a handle is still alive;
    /// unlike [`Pool::remove`], an expired locator here is not an error.
    pub fn get(&self, locator: Locator) -> Option<&T> {
        self.live_entry(locator)?;
        let slot = self.elements.get(locator.index as usize)?;
        // SAFETY: the slot is live, hence initialized.
        Some(unsafe { slot.assume_init_ref() })
    }

    /// Exclusive access to the element for `locator`, `None` once it
    /// expired.
    pub fn get_mut(&mut self, locator: Locator) -> Option<&mut T> {
        self.live_entry(locator)?;
        let slot = self.elements.get_mut(locator.index as usize)?;
        // SAFETY: the slot is live, hence initialized.
        Some(unsafe { slot.assume_init_mut() })
    }

    /// Release the slot for `locator`, returning its value.
    ///
    /// A stale or unknown locator is a caller bug and fatal; use
    /// [`Pool::get`] or [`Pool::contains`] to test liveness instead.
    pub fn remove(&mut self, locator: Locator) -> T {
        if !self.contains(locator) {
            fatal!(
                "Pool::remove",
                "locator {}v{} does not name a live element",
                locator.index,
                locator.generation
            );
        }
        let index = locator.index;
        let entry = match self.entries.get_mut(index as usize) {
            Some(entry) => entry,
            None => fatal!("Pool::remove", "missing entry {}", index),
        };
        entry.next_free = self.first_free;
        self.first_free = index;
        self.live -= 1;
        let slot = match self.elements.get_mut(index as usize) {
            Some(slot) => slot,
            None => fatal!("Pool::remove", "missing payload slot {}", index),
        };
        // SAFETY: the slot was live until this call; reading moves the value
        // out and the slot is now off the live set.
        unsafe { slot.assume_init_read() }
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        for index in 0..self.entries.len() {
            let live = match self.entries.get(index) {
                Some(entry) => entry.next_free as usize == index,
                None => false,
            };
            if live {
                if let Some(slot) = self.elements.get_mut(index) {
                    // SAFETY: live slots hold initialized values that were
                    // not dropped yet.
                    unsafe { slot.assume_init_drop() };
                }
            }
        }
    }
}
