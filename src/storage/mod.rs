//! On-disk bookkeeping for the cache root

pub mod index;
pub mod sidecar;

pub use index::{clear, scan, usage, CachedFile, Tier};
pub use sidecar::{HashIndex, HashSidecar};
