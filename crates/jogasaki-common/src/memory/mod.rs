//! Memory resources for Jogasaki.
//!
//! - **PagePool**: paged memory resource handing out numbered fixed-size pages
//! - **LifoArena**: stack-like scratch allocator with checkpoint/rewind
//!
//! ```text
//!   PagePool (shared, thread-safe)          LifoArena (per statement)
//!   ┌────┬────┬────┬────┐                   ┌──────────┬──────────┐
//!   │ #0 │ #1 │ #2 │ .. │ ─ acquire ─▶      │ page 0   │ page 1   │
//!   └────┴────┴────┴────┘                   │ ███████░ │ ███░░░░░ │
//!        ▲        release                   └──────────┴──────────┘
//!        └───────────────                         ▲ checkpoint / rewind
//! ```

mod lifo_arena;
mod page_pool;

pub use lifo_arena::{ArenaSlice, Checkpoint, LifoArena};
pub use page_pool::{Page, PagePool, PagePoolStats};
