//! Core domain types

pub mod hash;
pub mod response;

pub use hash::{ContentHash, HashAlgorithm};
pub use response::{ByteStream, Response};
