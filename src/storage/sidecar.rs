//! Hash sidecar format and I/O
//!
//! Remembers the content hash last seen for a raw pointer URL so offline
//! lookups can still find content-addressed blobs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::{HASH_SIDECAR_DIR, SIDECAR_EXT};
use crate::core::ContentHash;
use crate::error::{Error, Result};
use crate::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, Deserialize)]
pub struct HashSidecar {
	version: String,
	url: String,
	hash: ContentHash,
	saved_at: i64,
}

impl HashSidecar {
	pub fn new(url: &str, hash: ContentHash) -> Self {
		Self {
			version: VERSION.to_string(),
			url: url.to_string(),
			hash,
			saved_at: Utc::now().timestamp(),
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn hash(&self) -> &ContentHash {
		&self.hash
	}

	pub fn is_current_version(&self) -> bool {
		self.version == VERSION
	}
}

/// Save sidecar to disk
pub async fn save(sidecar: &HashSidecar, cache_dir: &Path) -> Result<()> {
	let path = build_path(cache_dir, &sidecar.url);

	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).await?;
	}

	let bytes = rmp_serde::to_vec(sidecar).map_err(|e| Error::Serialization(e.to_string()))?;
	fs::write(&path, bytes).await?;

	Ok(())
}

/// Load sidecar from disk
pub async fn load(path: &Path) -> Result<HashSidecar> {
	let bytes = fs::read(path).await?;
	rmp_serde::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Build sidecar path from the URL it describes
pub fn build_path(cache_dir: &Path, url: &str) -> PathBuf {
	cache_dir
		.join(HASH_SIDECAR_DIR)
		.join(format!("{:016x}.{}", xxh3_64(url.as_bytes()), SIDECAR_EXT))
}

/// Best-effort `raw_url -> hash` side cache; never returns an error
#[derive(Debug, Clone)]
pub struct HashIndex {
	cache_dir: PathBuf,
}

impl HashIndex {
	pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
		Self { cache_dir: cache_dir.into() }
	}

	pub async fn get(&self, url: &str) -> Option<ContentHash> {
		let path = build_path(&self.cache_dir, url);
		match load(&path).await {
			// Two URLs may share an xxh3 bucket
			Ok(sidecar) if sidecar.url == url => Some(sidecar.hash),
			Ok(_) => None,
			Err(e) => {
				ui::debug(&format!("No stored hash for {}: {}", url, e));
				None
			}
		}
	}

	pub async fn put(&self, url: &str, hash: &ContentHash) {
		let sidecar = HashSidecar::new(url, hash.clone());
		if let Err(e) = save(&sidecar, &self.cache_dir).await {
			ui::debug(&format!("Failed to persist hash for {}: {}", url, e));
		}
	}
}
