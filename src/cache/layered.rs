//! File tier with an optional content-addressed accelerator in front

use async_trait::async_trait;

use super::{Cache, ContentAddressableStore, FileCache, ProgressCallback};
use crate::core::Response;
use crate::error::Result;
use crate::ui;

pub struct LayeredCache {
	files: FileCache,
	content: Option<ContentAddressableStore>,
}

impl LayeredCache {
	pub fn new(files: FileCache) -> Self {
		Self { files, content: None }
	}

	pub fn with_content_store(mut self, store: ContentAddressableStore) -> Self {
		self.content = Some(store);
		self
	}

	pub fn files(&self) -> &FileCache {
		&self.files
	}

	fn content_store(&self) -> Option<&ContentAddressableStore> {
		self.content.as_ref().filter(|store| store.is_available())
	}
}

#[async_trait]
impl Cache for LayeredCache {
	async fn lookup(&self, key: &str) -> Result<Option<Response>> {
		if let Some(store) = self.content_store() {
			match store.lookup(key).await {
				Ok(Some(response)) => return Ok(Some(response)),
				Ok(None) => {}
				Err(e) => ui::debug(&format!("Content store lookup failed for {}: {}", key, e)),
			}
		}

		self.files.lookup(key).await
	}

	/// File tier errors propagate; mirroring into the content store is best-effort
	async fn put(&self, key: &str, response: Response, progress: Option<&ProgressCallback>) -> Result<()> {
		self.files.put(key, response, progress).await?;

		let Some(store) = self.content_store() else {
			return Ok(());
		};

		match self.files.lookup(key).await {
			Ok(Some(stored)) => {
				if let Err(e) = store.put(key, stored, None).await {
					ui::debug(&format!("Content store write skipped for {}: {}", key, e));
				}
			}
			Ok(None) => ui::debug(&format!("File tier lost {} before mirroring", key)),
			Err(e) => ui::debug(&format!("File tier re-read failed for {}: {}", key, e)),
		}

		Ok(())
	}

	fn name(&self) -> &'static str {
		"layered"
	}
}
