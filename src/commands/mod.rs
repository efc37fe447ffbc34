//! # Command Implementations
//!
//! Each submodule handles one CLI command.

pub mod clean;
pub mod fetch;
pub mod hash;
pub mod ls;
