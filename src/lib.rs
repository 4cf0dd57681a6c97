//! # tagmem
//!
//! Leak-tracked, tag-grouped memory management primitives for Rust game
//! engines.
//!
//! ## Components
//!
//! - [`MemoryTracker`] / [`Tag`] - tag-grouped allocation with per-tag byte
//!   totals, source-site leak reports and fatal leak checking
//! - [`PagedArray`] - paged two-level growable array that never moves
//!   existing elements
//! - [`Pool`] - generational slot pool with stable, validity-checked
//!   locators
//! - [`BuddyIndexAllocator`] - power-of-two sub-allocation of logical index
//!   ranges
//!
//! ## Failure model
//!
//! Resource exhaustion is a value: the `try_*` entry points return
//! [`AllocError`], the plain entry points escalate the same condition to a
//! fatal report. Contract violations (foreign pointers, stale locators,
//! misaligned indices, leaky teardown with leak checking on) are always
//! fatal; the one deliberate exception is [`Pool::get`], where an expired
//! locator is the normal `None`.
//!
//! ## Quick start
//!
//! ```rust
//! use tagmem::{site, MemoryTracker, Pool};
//!
//! let tracker = MemoryTracker::new();
//! let tag = tracker.create_tag("world");
//!
//! {
//!     let mut pool: Pool<[f32; 3]> = Pool::new(tag.clone(), 6, site!());
//!     let position = pool.insert([0.0, 1.0, 0.0]);
//!     assert!(pool.get(position).is_some());
//!     pool.remove(position);
//!     assert!(pool.get(position).is_none());
//! }
//!
//! tracker.destroy_tag(tag, true);
//! tracker.shutdown();
//! ```

pub mod buddy;
pub mod paged;
pub mod pool;
pub mod tracker;

mod error;
mod fault;
mod sync;
mod util;

pub use buddy::BuddyIndexAllocator;
pub use error::AllocError;
pub use paged::PagedArray;
pub use pool::{Locator, Pool};
pub use tracker::{MemoryTracker, SourceSite, Tag, TagStats, TrackerStats};
