//! Content-addressed blob tier
//!
//! Blobs are stored under their SHA-256. Lookups go through the hub's pointer
//! files to learn a URL's hash, so the same weights shared by several
//! repositories are stored once. This tier is optional: every failure on the
//! lookup path reads as a miss.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::file::PartialFile;
use super::{Cache, ProgressCallback, ProgressInfo};
use crate::config::{self, BLOB_DIR};
use crate::core::{ByteStream, ContentHash, Response};
use crate::error::{Error, Result};
use crate::hub::ContentHashResolver;
use crate::ui;

pub type BlobWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Storage capability handing out per-hash read and write handles
#[async_trait]
pub trait BlobStorage: Send + Sync {
	/// Whether the backing store can be used in this environment
	fn is_available(&self) -> bool;

	async fn open(&self, hash: &ContentHash) -> Result<ByteStream>;

	/// Create-capable handle; the blob becomes visible only once the handle is shut down
	async fn create(&self, hash: &ContentHash) -> Result<BlobWriter>;

	async fn remove(&self, hash: &ContentHash) -> Result<()>;
}

/// Blobs on the local filesystem at `<root>/blobs/<algorithm>/<hex>`
#[derive(Debug, Clone)]
pub struct DirectoryBlobStorage {
	root: PathBuf,
}

impl DirectoryBlobStorage {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
		self.root
			.join(BLOB_DIR)
			.join(hash.algorithm().dir_name())
			.join(hash.value())
	}
}

#[async_trait]
impl BlobStorage for DirectoryBlobStorage {
	fn is_available(&self) -> bool {
		let dir = self.root.join(BLOB_DIR);
		dir.is_dir() || std::fs::create_dir_all(&dir).is_ok()
	}

	async fn open(&self, hash: &ContentHash) -> Result<ByteStream> {
		let path = self.blob_path(hash);
		let file = fs::File::open(&path)
			.await
			.map_err(|e| Error::StorageUnavailable(format!("{}: {}", path.display(), e)))?;
		Ok(super::file::read_file(file))
	}

	async fn create(&self, hash: &ContentHash) -> Result<BlobWriter> {
		let path = self.blob_path(hash);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}
		let partial = PartialFile::new(path);
		let file = fs::File::create(partial.temp()).await?;
		Ok(Box::new(BlobFile { file, partial: Some(partial) }))
	}

	async fn remove(&self, hash: &ContentHash) -> Result<()> {
		match fs::remove_file(self.blob_path(hash)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// Writes into a temporary file; shutdown renames it to the blob path,
/// dropping the handle first discards it
struct BlobFile {
	file: fs::File,
	partial: Option<PartialFile>,
}

impl AsyncWrite for BlobFile {
	fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
		Pin::new(&mut self.get_mut().file).poll_write(cx, buf)
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.get_mut().file).poll_flush(cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		ready!(Pin::new(&mut this.file).poll_shutdown(cx))?;
		if let Some(partial) = this.partial.take() {
			partial.commit_blocking()?;
		}
		Poll::Ready(Ok(()))
	}
}

pub struct ContentAddressableStore {
	resolver: Arc<ContentHashResolver>,
	storage: Arc<dyn BlobStorage>,
}

impl ContentAddressableStore {
	pub fn new(resolver: Arc<ContentHashResolver>, storage: Arc<dyn BlobStorage>) -> Self {
		Self { resolver, storage }
	}

	/// Check before relying on this tier
	pub fn is_available(&self) -> bool {
		self.storage.is_available()
	}
}

#[async_trait]
impl Cache for ContentAddressableStore {
	async fn lookup(&self, url: &str) -> Result<Option<Response>> {
		let Some(hash) = self.resolver.resolve(url).await else {
			return Ok(None);
		};

		match self.storage.open(&hash).await {
			Ok(body) => {
				ui::debug(&format!("Content store hit: {} ({})", url, hash.short()));
				let content_type = config::content_type_for(std::path::Path::new(url));
				Ok(Some(Response::from_stream(body).with_content_type(content_type)))
			}
			Err(e) => {
				ui::debug(&format!("Content store miss for {}: {}", hash, e));
				Ok(None)
			}
		}
	}

	/// Hashes the body itself; the URL plays no part in where it lands
	async fn put(&self, url: &str, response: Response, progress: Option<&ProgressCallback>) -> Result<()> {
		let bytes = response.bytes().await?;
		let hash = ContentHash::of(&bytes);

		let mut writer = self.storage.create(&hash).await?;
		// A handle dropped before shutdown discards its partial blob
		writer.write_all(&bytes).await?;
		writer.shutdown().await?;

		if let Some(report) = progress {
			let total = bytes.len() as u64;
			report(ProgressInfo::new(total, total));
		}

		ui::debug(&format!("Stored {} as {}", url, hash));
		Ok(())
	}

	fn name(&self) -> &'static str {
		"content"
	}
}
