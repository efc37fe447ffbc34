//! Network capability used by the resolver and the hub

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;

use crate::config;
use crate::core::Response;
use crate::error::{Error, Result};
use crate::ui;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch bytes for a URL. A non-success status is a response, not an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
	async fn fetch(&self, url: &str) -> Result<Response>;
}

/// reqwest-backed fetcher that attaches the hub access token
pub struct HttpFetcher {
	client: Client,
	token: Option<String>,
}

impl HttpFetcher {
	pub fn new() -> Result<Self> {
		let client = Client::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| Error::TransientNetwork(e.to_string()))?;

		Ok(Self {
			client,
			token: config::access_token(),
		})
	}

	pub fn with_token(mut self, token: Option<String>) -> Self {
		self.token = token;
		self
	}
}

#[async_trait]
impl Fetcher for HttpFetcher {
	async fn fetch(&self, url: &str) -> Result<Response> {
		let mut request = self.client.get(url);
		if let Some(token) = &self.token {
			request = request.bearer_auth(token);
		}

		ui::debug(&format!("GET {}", url));
		let response = request.send().await?;

		let status = response.status().as_u16();
		let headers = response.headers().clone();
		let body = response.bytes_stream().map_err(Error::from).boxed();

		Ok(Response::new(status, headers, body))
	}
}
