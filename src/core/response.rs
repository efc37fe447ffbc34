//! Uniform response value passed between fetchers and cache tiers

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};

use crate::config::CHUNK_SIZE;
use crate::error::Result;

/// Upper bound on buffer space reserved from an untrusted content-length
const MAX_PREALLOCATION: u64 = (CHUNK_SIZE * 16) as u64;

/// Chunked body; dropping it closes the underlying source
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

pub struct Response {
	status: u16,
	headers: HeaderMap,
	body: Option<ByteStream>,
}

impl Response {
	pub fn new(status: u16, headers: HeaderMap, body: ByteStream) -> Self {
		Self { status, headers, body: Some(body) }
	}

	/// Response with no body (e.g. a 404 from the hub)
	pub fn empty(status: u16) -> Self {
		Self { status, headers: HeaderMap::new(), body: None }
	}

	/// 200 response over an in-memory buffer
	pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
		let bytes = bytes.into();
		let mut headers = HeaderMap::new();
		headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len() as u64));
		Self::new(200, headers, stream::once(async move { Ok(bytes) }).boxed())
	}

	/// 200 response over a stream of unknown length
	pub fn from_stream(body: ByteStream) -> Self {
		Self::new(200, HeaderMap::new(), body)
	}

	pub fn with_status(mut self, status: u16) -> Self {
		self.status = status;
		self
	}

	pub fn with_content_type(mut self, content_type: &str) -> Self {
		if let Ok(value) = HeaderValue::from_str(content_type) {
			self.headers.insert(CONTENT_TYPE, value);
		}
		self
	}

	pub fn status(&self) -> u16 {
		self.status
	}

	pub fn ok(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	pub fn content_length(&self) -> Option<u64> {
		self.headers
			.get(CONTENT_LENGTH)?
			.to_str()
			.ok()?
			.parse()
			.ok()
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE)?.to_str().ok()
	}

	/// Initial buffer size for draining the body; the header only ever shrinks it
	pub fn capacity_hint(&self) -> usize {
		self.content_length().unwrap_or(0).min(MAX_PREALLOCATION) as usize
	}

	pub fn into_body(self) -> ByteStream {
		self.body.unwrap_or_else(|| stream::empty().boxed())
	}

	/// Drain the body into memory
	pub async fn bytes(self) -> Result<Bytes> {
		let capacity = self.capacity_hint();
		let mut body = self.into_body();
		let mut buffer = BytesMut::with_capacity(capacity);

		while let Some(chunk) = body.next().await {
			buffer.extend_from_slice(&chunk?);
		}

		Ok(buffer.freeze())
	}

	pub async fn text(self) -> Result<String> {
		let bytes = self.bytes().await?;
		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}
}

impl std::fmt::Debug for Response {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Response")
			.field("status", &self.status)
			.field("headers", &self.headers)
			.field("has_body", &self.body.is_some())
			.finish()
	}
}
