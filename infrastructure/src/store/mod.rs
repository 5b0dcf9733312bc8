//! Run store adapters

mod memory;

pub use memory::MemoryRunStore;
