// Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use hubcache::core::Response;
use hubcache::hub::Fetcher;
use hubcache::{Error, Result};

#[derive(Clone)]
enum Route {
	Body(u16, Vec<u8>),
	Offline,
}

/// In-memory hub: unknown URLs answer 404
#[derive(Default)]
pub struct MockFetcher {
	routes: Mutex<HashMap<String, Route>>,
	calls: Mutex<Vec<String>>,
	delay: Option<Duration>,
}

impl MockFetcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_delay(delay: Duration) -> Self {
		Self { delay: Some(delay), ..Self::default() }
	}

	pub fn route(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
		self.routes
			.lock()
			.unwrap()
			.insert(url.to_string(), Route::Body(status, body.into()));
	}

	pub fn offline(&self, url: &str) {
		self.routes.lock().unwrap().insert(url.to_string(), Route::Offline);
	}

	pub fn calls(&self) -> usize {
		self.calls.lock().unwrap().len()
	}

	pub fn calls_for(&self, url: &str) -> usize {
		self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
	}
}

#[async_trait]
impl Fetcher for MockFetcher {
	async fn fetch(&self, url: &str) -> Result<Response> {
		self.calls.lock().unwrap().push(url.to_string());

		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}

		let route = self.routes.lock().unwrap().get(url).cloned();
		match route {
			Some(Route::Body(status, body)) => Ok(Response::from_bytes(body).with_status(status)),
			Some(Route::Offline) => Err(Error::TransientNetwork(format!("offline: {}", url))),
			None => Ok(Response::empty(404)),
		}
	}
}

/// Streamed response; `total` becomes the content-length header
pub fn chunked(chunks: Vec<Result<Vec<u8>>>, total: Option<u64>) -> Response {
	let mut headers = HeaderMap::new();
	if let Some(total) = total {
		headers.insert(CONTENT_LENGTH, HeaderValue::from(total));
	}

	let body = stream::iter(chunks.into_iter().map(|chunk| chunk.map(Bytes::from))).boxed();
	Response::new(200, headers, body)
}

/// Delivers `first`, then never yields again; `total` is what the header claims
pub fn stalled(first: Vec<u8>, total: u64) -> Response {
	let mut headers = HeaderMap::new();
	headers.insert(CONTENT_LENGTH, HeaderValue::from(total));

	let body = stream::iter(vec![Ok(Bytes::from(first))]).chain(stream::pending()).boxed();
	Response::new(200, headers, body)
}

/// LFS pointer text for `content`
pub fn pointer_for(content: &[u8]) -> String {
	let hash = hubcache::core::ContentHash::of(content);
	format!(
		"version https://git-lfs.github.com/spec/v1\noid sha256:{}\nsize {}\n",
		hash.value(),
		content.len()
	)
}
