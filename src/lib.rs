//! # hubcache
//!
//! Async resource layer for running hub-hosted models: request deduplication,
//! a file cache with an optional content-addressed tier keyed by SHA-256, and
//! a worker channel that carries pipeline calls and their callbacks across an
//! execution-context boundary.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod hub;
pub mod storage;
pub mod ui;
pub mod worker;

pub use error::{Error, Result};
