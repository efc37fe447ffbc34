//! Hash command - resolve the content hash of a hub URL

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use crate::config;
use crate::hub::{raw_pointer_url, ContentHashResolver, HttpFetcher};
use crate::storage::HashIndex;
use crate::ui;

pub async fn run(url: &str) -> Result<()> {
	if raw_pointer_url(url).is_none() {
		ui::warn("URL has no /resolve/<ref>/ segment; nothing to resolve");
		return Ok(());
	}

	let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
	let resolver = ContentHashResolver::new(Arc::new(fetcher))
		.with_side_cache(HashIndex::new(config::cache_dir()));

	match resolver.resolve(url).await {
		Some(hash) => {
			println!("{} {}", hash.algorithm().as_str().bright_blue().bold(), hash.value());
		}
		None => ui::warn("No content hash available (not an LFS file, or offline with nothing stored)"),
	}

	Ok(())
}
