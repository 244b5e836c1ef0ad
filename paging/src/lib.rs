//! # Paging
//!
//! The demand-paged virtual memory subsystem: physical frames with
//! second-chance (CLOCK) replacement, best-effort block reservations that
//! gate dispatch, and a file-backed store for evicted page contents.
//!
//! ## Philosophy
//!
//! - **The memory lock owns the metadata**: frame table, block list, page
//!   tables, resident values and counters all mutate under one lock, so the
//!   invariants (frame conservation, page-table/frame-table agreement) hold
//!   at every observation point.
//! - **No I/O under the lock**: eviction serializes page contents into an
//!   [`EvictedPage`] buffer that the caller flushes to the backing store
//!   after releasing the lock; page-in data is likewise read before the lock
//!   is taken.
//! - **Counters are monotone** and readable at any time.

pub mod backing_store;
pub mod blocks;
pub mod frame;
pub mod manager;

pub use backing_store::{BackingStore, StoreError, StoreRecord};
pub use blocks::BlockList;
pub use frame::{Frame, FrameTable};
pub use manager::{EvictedPage, MemoryError, MemoryManager, PageEntry};
