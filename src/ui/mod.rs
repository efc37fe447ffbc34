//! # User Interface
//!
//! Colored terminal output, progress lines and clickable file links.

pub mod log;

pub use log::{debug, error, format_bytes, header, info, path_link, progress, progress_done, success, warn, Log};
