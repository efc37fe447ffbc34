//! # Cache Tiers
//!
//! Every tier speaks the same two-method contract ([`Cache::lookup`] and
//! [`Cache::put`]) so tiers can be stacked or swapped. [`PromiseCache`] sits
//! in front of them and collapses concurrent requests for one key.

pub mod content;
pub mod file;
pub mod layered;
pub mod promise;

pub use content::{BlobStorage, BlobWriter, ContentAddressableStore, DirectoryBlobStorage};
pub use file::{FileCache, FileEntry};
pub use layered::LayeredCache;
pub use promise::PromiseCache;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::Response;
use crate::error::Result;

/// Download progress reported after each chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressInfo {
	/// Percentage in [0, 100], 0 when the total is unknown
	pub progress: f64,
	pub loaded: u64,
	pub total: u64,
}

impl ProgressInfo {
	pub fn new(loaded: u64, total: u64) -> Self {
		let progress = if total > 0 {
			(loaded as f64 / total as f64 * 100.0).min(100.0)
		} else {
			0.0
		};
		Self { progress, loaded, total }
	}
}

pub type ProgressCallback = dyn Fn(ProgressInfo) + Send + Sync;

/// Storage tier addressed by a string key (a URL or a relative path)
#[async_trait]
pub trait Cache: Send + Sync {
	/// Returns the cached response, or `None` when the key is not stored
	async fn lookup(&self, key: &str) -> Result<Option<Response>>;

	/// Stores the response body under `key`
	async fn put(&self, key: &str, response: Response, progress: Option<&ProgressCallback>) -> Result<()>;

	/// Tier name for logging
	fn name(&self) -> &'static str;
}
