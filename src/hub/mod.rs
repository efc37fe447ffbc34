//! # Model Hub Access
//!
//! Resolves model files through the cache tiers, falling back to the network,
//! with concurrent requests for the same file collapsed into one download.

pub mod fetch;
pub mod resolver;

pub use fetch::{Fetcher, HttpFetcher};
pub use resolver::{parse_pointer, raw_pointer_url, ContentHashResolver};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;

use crate::cache::{
	Cache, ContentAddressableStore, DirectoryBlobStorage, FileCache, LayeredCache, ProgressCallback,
	ProgressInfo, PromiseCache,
};
use crate::config::{Settings, DEFAULT_REVISION};
use crate::core::Response;
use crate::error::{Error, Result};
use crate::storage::HashIndex;
use crate::ui;

/// Per-request options for [`Hub::get_file`]
#[derive(Clone)]
pub struct FileOptions {
	pub revision: String,
	/// Missing files become errors instead of `None`
	pub fatal: bool,
	pub progress: Option<Arc<ProgressCallback>>,
}

impl Default for FileOptions {
	fn default() -> Self {
		Self {
			revision: DEFAULT_REVISION.to_string(),
			fatal: true,
			progress: None,
		}
	}
}

impl FileOptions {
	pub fn optional() -> Self {
		Self { fatal: false, ..Self::default() }
	}

	pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
		self.revision = revision.into();
		self
	}

	pub fn with_progress<F>(mut self, callback: F) -> Self
	where
		F: Fn(ProgressInfo) + Send + Sync + 'static,
	{
		self.progress = Some(Arc::new(callback));
		self
	}
}

/// Outcome shared by every caller waiting on one URL
#[derive(Debug, Clone)]
enum Fetched {
	/// In the cache tiers; read back from there on every request
	Stored,
	/// Downloaded without a cache to keep it in
	Found(Bytes),
	/// Definitive miss status, or `None` when remote access is off
	Missing(Option<u16>),
}

/// Statuses that say the file is absent or refused, as opposed to a server hiccup
fn is_definitive_miss(status: u16) -> bool {
	matches!(status, 401 | 403 | 404 | 410)
}

pub struct Hub {
	settings: Settings,
	fetcher: Arc<dyn Fetcher>,
	cache: Option<Arc<dyn Cache>>,
	requests: PromiseCache<Fetched>,
}

impl Hub {
	/// Hub with the cache tiers the settings ask for
	pub fn new(settings: Settings, fetcher: Arc<dyn Fetcher>) -> Self {
		let cache = build_cache(&settings, &fetcher);
		Self {
			settings,
			fetcher,
			cache,
			requests: PromiseCache::new(),
		}
	}

	pub fn from_env() -> Result<Self> {
		Ok(Self::new(Settings::from_env(), Arc::new(HttpFetcher::new()?)))
	}

	/// Replace the cache tiers built from settings
	pub fn with_cache(mut self, cache: Option<Arc<dyn Cache>>) -> Self {
		self.cache = cache;
		self
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
		self.cache.as_ref()
	}

	pub fn remote_url(&self, model_id: &str, revision: &str, file: &str) -> String {
		let host = self.settings.remote_host.trim_end_matches('/');
		format!(
			"{}/{}/resolve/{}/{}",
			host,
			model_id.trim_matches('/'),
			revision.replace('/', "%2F"),
			file.trim_start_matches('/')
		)
	}

	/// Fetch a model file, serving it from cache when possible.
	///
	/// Returns `Ok(None)` for a missing file unless `options.fatal` is set.
	pub async fn get_file(&self, model_id: &str, file: &str, options: &FileOptions) -> Result<Option<Bytes>> {
		let url = self.remote_url(model_id, &options.revision, file);

		// A stored file can vanish from disk; the second pass fetches it again
		for _ in 0..2 {
			let fetched = match self.fetch_shared(&url, options).await {
				Ok(fetched) => fetched,
				Err(Error::Fatal { .. }) if !options.fatal => return Ok(None),
				Err(e) => return Err(e),
			};

			match fetched {
				Fetched::Stored => {
					if let Some(bytes) = self.read_cached(&url).await? {
						return Ok(Some(bytes));
					}
					ui::debug(&format!("Cached file disappeared: {}", url));
					self.requests.remove(&url);
				}
				Fetched::Found(bytes) => {
					// Only the cache tiers keep file contents alive
					self.requests.remove(&url);
					return Ok(Some(bytes));
				}
				Fetched::Missing(_) if !options.fatal => return Ok(None),
				Fetched::Missing(Some(status)) => return Err(Error::Fatal { status, url }),
				Fetched::Missing(None) => return Err(offline_miss(&url)),
			}
		}

		Err(Error::NotFound(format!("{} (removed from the cache while loading)", url)))
	}

	async fn fetch_shared(&self, url: &str, options: &FileOptions) -> Result<Fetched> {
		let fetcher = self.fetcher.clone();
		let cache = self.cache.clone();
		let allow_remote = self.settings.allow_remote;
		let progress = options.progress.clone();
		let target = url.to_string();

		self.requests
			.get_or_create(url, move || async move {
				load(fetcher, cache, allow_remote, target, progress).await
			})
			.await
	}

	async fn read_cached(&self, url: &str) -> Result<Option<Bytes>> {
		let Some(cache) = &self.cache else {
			return Ok(None);
		};
		match cache.lookup(url).await? {
			Some(hit) => Ok(Some(hit.bytes().await?)),
			None => Ok(None),
		}
	}

	/// Fetch and parse a JSON file
	pub async fn get_json(
		&self,
		model_id: &str,
		file: &str,
		options: &FileOptions,
	) -> Result<Option<serde_json::Value>> {
		match self.get_file(model_id, file, options).await? {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}
}

fn build_cache(settings: &Settings, fetcher: &Arc<dyn Fetcher>) -> Option<Arc<dyn Cache>> {
	if !settings.use_file_cache {
		return None;
	}

	let mut layered = LayeredCache::new(FileCache::new(&settings.cache_dir));

	if settings.use_content_store {
		let resolver = ContentHashResolver::new(fetcher.clone())
			.with_side_cache(HashIndex::new(&settings.cache_dir));
		let storage = DirectoryBlobStorage::new(&settings.cache_dir);
		layered = layered.with_content_store(ContentAddressableStore::new(
			Arc::new(resolver),
			Arc::new(storage),
		));
	}

	Some(Arc::new(layered))
}

async fn load(
	fetcher: Arc<dyn Fetcher>,
	cache: Option<Arc<dyn Cache>>,
	allow_remote: bool,
	url: String,
	progress: Option<Arc<ProgressCallback>>,
) -> Result<Fetched> {
	if let Some(cache) = &cache {
		match cache.lookup(&url).await {
			Ok(Some(_)) => {
				ui::debug(&format!("Cache hit ({}): {}", cache.name(), url));
				return Ok(Fetched::Stored);
			}
			Ok(None) => ui::debug(&format!("Cache miss: {}", url)),
			Err(e) => ui::debug(&format!("Cache lookup failed for {}: {}", url, e)),
		}
	}

	if !allow_remote {
		return Ok(Fetched::Missing(None));
	}

	let response = match checked(fetcher.fetch(&url).await?, &url)? {
		Ok(response) => response,
		Err(missing) => return Ok(missing),
	};

	let Some(cache) = &cache else {
		return read_with_progress(response, progress.as_deref()).await.map(Fetched::Found);
	};

	match cache.put(&url, response, progress.as_deref()).await {
		Ok(()) => return Ok(Fetched::Stored),
		Err(e) => ui::warn(&format!("Failed to cache {}: {}", url, e)),
	}

	// The first body went into the failed cache write
	let response = match checked(fetcher.fetch(&url).await?, &url)? {
		Ok(response) => response,
		Err(missing) => return Ok(missing),
	};
	read_with_progress(response, progress.as_deref()).await.map(Fetched::Found)
}

/// Sort a response into usable, memoizable miss, or retryable error
fn checked(response: Response, url: &str) -> Result<std::result::Result<Response, Fetched>> {
	let status = response.status();
	if response.ok() {
		Ok(Ok(response))
	} else if is_definitive_miss(status) {
		Ok(Err(Fetched::Missing(Some(status))))
	} else {
		Err(Error::Fatal { status, url: url.to_string() })
	}
}

fn offline_miss(url: &str) -> Error {
	Error::NotFound(format!("{} (remote access disabled and not cached locally)", url))
}

async fn read_with_progress(response: Response, progress: Option<&ProgressCallback>) -> Result<Bytes> {
	let total = response.content_length().unwrap_or(0);
	let mut buffer = BytesMut::with_capacity(response.capacity_hint());
	let mut body = response.into_body();

	while let Some(chunk) = body.next().await {
		buffer.extend_from_slice(&chunk?);
		if let Some(report) = progress {
			report(ProgressInfo::new(buffer.len() as u64, total));
		}
	}

	Ok(buffer.freeze())
}
