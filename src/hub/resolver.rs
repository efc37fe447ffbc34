//! Content hash discovery through hub pointer files
//!
//! A hub URL `.../resolve/<ref>/<path>` has a sibling `.../raw/<ref>/<path>`
//! that serves the LFS pointer text containing `oid sha256:<hex>`.

use std::sync::Arc;
use url::Url;

use super::Fetcher;
use crate::core::ContentHash;
use crate::storage::HashIndex;
use crate::ui;

const POINTER_PREFIX: &str = "oid sha256:";

pub struct ContentHashResolver {
	fetcher: Arc<dyn Fetcher>,
	side_cache: Option<HashIndex>,
}

impl ContentHashResolver {
	pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
		Self { fetcher, side_cache: None }
	}

	pub fn with_side_cache(mut self, index: HashIndex) -> Self {
		self.side_cache = Some(index);
		self
	}

	/// Network first, falling back to the last persisted hash.
	///
	/// Returns `None` without fetching when the URL has no `/resolve/<ref>/` part.
	pub async fn resolve(&self, url: &str) -> Option<ContentHash> {
		let raw_url = raw_pointer_url(url)?;

		let response = match self.fetcher.fetch(&raw_url).await {
			Ok(response) if response.ok() => response,
			Ok(response) => {
				ui::debug(&format!("Pointer fetch returned {} for {}", response.status(), raw_url));
				return self.persisted(&raw_url).await;
			}
			Err(e) => {
				ui::debug(&format!("Pointer fetch failed for {}: {}", raw_url, e));
				return self.persisted(&raw_url).await;
			}
		};

		let text = match response.text().await {
			Ok(text) => text,
			Err(e) => {
				ui::debug(&format!("Pointer body failed for {}: {}", raw_url, e));
				return self.persisted(&raw_url).await;
			}
		};

		let hash = parse_pointer(&text)?;
		if let Some(index) = &self.side_cache {
			index.put(&raw_url, &hash).await;
		}
		Some(hash)
	}

	async fn persisted(&self, raw_url: &str) -> Option<ContentHash> {
		match &self.side_cache {
			Some(index) => index.get(raw_url).await,
			None => None,
		}
	}
}

/// Rewrite `.../resolve/<ref>/<path>` to `.../raw/<ref>/<path>`
pub fn raw_pointer_url(url: &str) -> Option<String> {
	let mut parsed = Url::parse(url).ok()?;
	let mut segments: Vec<String> = parsed.path_segments()?.map(str::to_string).collect();

	let at = segments.iter().enumerate().position(|(i, segment)| {
		segment == "resolve"
			&& segments.get(i + 1).is_some_and(|r| !r.is_empty())
			&& segments.get(i + 2).is_some_and(|p| !p.is_empty())
	})?;

	segments[at] = "raw".to_string();
	parsed.set_path(&format!("/{}", segments.join("/")));
	Some(parsed.to_string())
}

/// Find the `oid sha256:<hex>` line of a pointer file
pub fn parse_pointer(text: &str) -> Option<ContentHash> {
	text.lines()
		.filter_map(|line| line.trim().strip_prefix(POINTER_PREFIX))
		.find_map(ContentHash::sha256)
}
