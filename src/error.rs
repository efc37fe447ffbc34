//! Error taxonomy shared by the cache tiers and the worker channel

use std::sync::Arc;
use thiserror::Error;

/// Result type for cache and channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library.
///
/// Cloneable so a single rejection can be handed to every caller waiting on
/// the same shared future.
#[derive(Error, Debug, Clone)]
pub enum Error {
	/// Resource is missing and the caller did not require it
	#[error("Resource not found: {0}")]
	NotFound(String),

	/// Caller required the resource and the hub refused it
	#[error("{}: \"{url}\"", status_message(*.status))]
	Fatal { status: u16, url: String },

	/// Optional storage tier is absent or inaccessible
	#[error("Storage unavailable: {0}")]
	StorageUnavailable(String),

	/// Fetch failed before a response arrived
	#[error("Network error: {0}")]
	TransientNetwork(String),

	/// Task failed on the other side of the worker channel
	#[error("{0}")]
	RemoteExecution(String),

	/// Cache key cannot be mapped inside the cache root
	#[error("Invalid cache key: {0}")]
	InvalidKey(String),

	/// Message arrived that the channel state does not allow
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// Peer hung up while calls were outstanding
	#[error("Worker channel closed")]
	ChannelClosed,

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("IO error: {0}")]
	Io(Arc<std::io::Error>),
}

impl Error {
	/// Whether this error came from the network before any response
	pub fn is_transient(&self) -> bool {
		matches!(self, Error::TransientNetwork(_))
	}
}

/// Human-readable text for hub status codes
pub fn status_message(status: u16) -> &'static str {
	match status {
		400 => "Bad request error occurred while trying to load file",
		401 => "Unauthorized access to file",
		403 => "Forbidden access to file",
		404 => "Could not locate file",
		408 => "Request timeout error occurred while trying to load file",
		500 => "Internal server error error occurred while trying to load file",
		502 => "Bad gateway error occurred while trying to load file",
		503 => "Service unavailable error occurred while trying to load file",
		504 => "Gateway timeout error occurred while trying to load file",
		_ => "An error occurred while trying to load file",
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::Io(Arc::new(e))
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Serialization(e.to_string())
	}
}

impl From<reqwest::Error> for Error {
	fn from(e: reqwest::Error) -> Self {
		Error::TransientNetwork(e.to_string())
	}
}
