//! Storage for setback.
//!
//! Engine state persistence (`StateStore`) and event store adapters
//! (`EventSource`, `EventSink`), each with file-based and in-memory backends.

pub mod events;
pub mod file;
pub mod memory;
pub mod traits;

pub use events::{DocumentEventStore, JsonlEventStore, ProjectEventStore};
pub use file::FileStateStore;
pub use memory::{MemoryEventStore, MemoryStateStore};
pub use traits::{EventSink, EventSource, StateStore};
