//! Timing store implementations for the vmscale harness
//!
//! Two [`TimingStore`](vmscale_interfaces::TimingStore) backends: a plain
//! in-memory map for tests and ephemeral runs, and a file-backed JSON store
//! with an explicit open/flush/close session so timing data survives across
//! runs and feeds report assembly.

pub mod file;
pub mod memory;

pub use file::FileTimingStore;
pub use memory::MemoryTimingStore;
