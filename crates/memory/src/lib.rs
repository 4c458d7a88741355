//! Profile store implementations for PocketMed.

pub mod in_memory;

pub use in_memory::InMemoryProfileStore;
