//! Object runtime for the VM core.
//!
//! The core interacts with this crate only through [`ObjectRuntime`] and
//! [`Collector`]. [`Heap`] is the reference implementation.

mod console;
mod error;
mod heap;
mod render;
mod runtime;
mod tags;

pub use console::Console;
pub use error::{MatchFailure, ObjectError};
pub use heap::{GcStats, Heap, HeapSettings};
pub use runtime::{Collector, ObjectRuntime, RootProvider, RootRange};
pub use tags::{tag_hash, tag_name, MAX_TAG_LEN};
