//! Path-addressed file tier

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{Cache, ProgressCallback, ProgressInfo};
use crate::config::{self, CHUNK_SIZE};
use crate::core::{ByteStream, Response};
use crate::error::{Error, Result};
use crate::ui;

/// Cache rooted at a directory; keys map to paths below it
#[derive(Debug, Clone)]
pub struct FileCache {
	root: PathBuf,
}

impl FileCache {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Map a key to a path under the root.
	///
	/// URL keys drop the scheme, query and fragment and keep `host/path`.
	/// Empty keys and keys with `..` segments are rejected.
	pub fn path_for(&self, key: &str) -> Result<PathBuf> {
		let relative = match key.split_once("://") {
			Some((_, rest)) => rest.split(['?', '#']).next().unwrap_or_default(),
			None => key,
		};

		let mut path = self.root.clone();
		let mut depth = 0;

		for part in relative.split(['/', '\\']) {
			match part {
				"" | "." => continue,
				".." => return Err(Error::InvalidKey(key.to_string())),
				part => {
					path.push(part.replace(':', "_"));
					depth += 1;
				}
			}
		}

		if depth == 0 {
			return Err(Error::InvalidKey(key.to_string()));
		}

		Ok(path)
	}

	/// Entry for `key`; metadata is read now, the body only when requested
	pub fn entry(&self, key: &str) -> Result<FileEntry> {
		Ok(FileEntry::open(self.path_for(key)?))
	}

	pub async fn remove(&self, key: &str) -> Result<bool> {
		let path = self.path_for(key)?;
		match fs::remove_file(&path).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

#[async_trait]
impl Cache for FileCache {
	async fn lookup(&self, key: &str) -> Result<Option<Response>> {
		let entry = self.entry(key)?;
		if !entry.exists() {
			return Ok(None);
		}

		ui::debug(&format!("File cache hit: {}", entry.path().display()));
		Ok(Some(entry.into_response()))
	}

	/// Streams into a temporary sibling and renames it into place once complete
	async fn put(&self, key: &str, response: Response, progress: Option<&ProgressCallback>) -> Result<()> {
		let path = self.path_for(key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let partial = PartialFile::new(path);
		let total = response.content_length().unwrap_or(0);
		let written = write_body(partial.temp(), response.into_body(), total, progress).await;
		match written {
			Ok(loaded) => {
				let path = partial.commit().await?;
				ui::debug(&format!("Cached {} ({} bytes)", path.display(), loaded));
				Ok(())
			}
			Err(e) => {
				ui::debug(&format!("Discarded partial download of {}: {}", key, e));
				Err(e)
			}
		}
	}

	fn name(&self) -> &'static str {
		"file"
	}
}

async fn write_body(
	path: &Path,
	mut body: ByteStream,
	total: u64,
	progress: Option<&ProgressCallback>,
) -> Result<u64> {
	let mut file = fs::File::create(path).await?;
	let mut loaded = 0u64;

	while let Some(chunk) = body.next().await {
		let chunk = chunk?;
		file.write_all(&chunk).await?;
		loaded += chunk.len() as u64;

		if let Some(report) = progress {
			report(ProgressInfo::new(loaded, total));
		}
	}

	file.flush().await?;
	Ok(loaded)
}

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Temporary file that becomes `target` on commit and is deleted otherwise,
/// including when the writing future is dropped midway
#[derive(Debug)]
pub(crate) struct PartialFile {
	temp: PathBuf,
	target: PathBuf,
	committed: bool,
}

impl PartialFile {
	pub(crate) fn new(target: PathBuf) -> Self {
		let name = target
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		let temp = target.with_file_name(format!(
			".{}.{}-{}.part",
			name,
			std::process::id(),
			PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed)
		));
		Self { temp, target, committed: false }
	}

	pub(crate) fn temp(&self) -> &Path {
		&self.temp
	}

	pub(crate) async fn commit(mut self) -> Result<PathBuf> {
		fs::rename(&self.temp, &self.target).await?;
		self.committed = true;
		Ok(self.target.clone())
	}

	/// For poll-based writers that cannot await
	pub(crate) fn commit_blocking(mut self) -> std::io::Result<()> {
		std::fs::rename(&self.temp, &self.target)?;
		self.committed = true;
		Ok(())
	}
}

impl Drop for PartialFile {
	fn drop(&mut self) {
		if !self.committed {
			let _ = std::fs::remove_file(&self.temp);
		}
	}
}

/// A cached file and its metadata
#[derive(Debug, Clone)]
pub struct FileEntry {
	path: PathBuf,
	exists: bool,
	status: u16,
	headers: HeaderMap,
}

impl FileEntry {
	pub fn open(path: PathBuf) -> Self {
		let mut headers = HeaderMap::new();

		let (exists, status) = match std::fs::metadata(&path) {
			Ok(meta) if meta.is_file() => {
				headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.len()));
				headers.insert(
					CONTENT_TYPE,
					HeaderValue::from_static(config::content_type_for(&path)),
				);
				(true, 200)
			}
			_ => (false, 404),
		};

		Self { path, exists, status, headers }
	}

	pub fn exists(&self) -> bool {
		self.exists
	}

	pub fn status(&self) -> u16 {
		self.status
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	pub fn content_length(&self) -> Option<u64> {
		self.headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE)?.to_str().ok()
	}

	/// Lazy body: the file is opened on first poll and closed when the stream drops
	pub fn body(&self) -> ByteStream {
		read_path(self.path.clone())
	}

	pub fn into_response(self) -> Response {
		let body = read_path(self.path);
		Response::new(self.status, self.headers, body)
	}

	pub async fn bytes(&self) -> Result<Bytes> {
		if !self.exists {
			return Err(Error::NotFound(self.path.display().to_string()));
		}
		let data = fs::read(&self.path).await?;
		Ok(Bytes::from(data))
	}
}

enum ReadState {
	Pending(PathBuf),
	Open(fs::File),
}

async fn read_chunk(state: ReadState) -> Result<Option<(Bytes, ReadState)>> {
	let mut file = match state {
		ReadState::Pending(path) => fs::File::open(&path).await?,
		ReadState::Open(file) => file,
	};

	let mut buffer = BytesMut::zeroed(CHUNK_SIZE);
	let n = file.read(&mut buffer).await?;
	if n == 0 {
		return Ok(None);
	}

	buffer.truncate(n);
	Ok(Some((buffer.freeze(), ReadState::Open(file))))
}

/// Stream a file that is opened on first poll
pub(crate) fn read_path(path: PathBuf) -> ByteStream {
	stream::try_unfold(ReadState::Pending(path), read_chunk).boxed()
}

/// Stream an already opened file
pub(crate) fn read_file(file: fs::File) -> ByteStream {
	stream::try_unfold(ReadState::Open(file), read_chunk).boxed()
}
