//! Fetch command - download a model file through the cache

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::FileCache;
use crate::config::Settings;
use crate::hub::{FileOptions, HttpFetcher, Hub};
use crate::ui;

#[derive(Debug, Clone)]
pub struct FetchArgs {
	pub model_id: String,
	pub file: String,
	pub revision: String,
	pub optional: bool,
	pub no_cache: bool,
	pub content_store: bool,
	pub offline: bool,
	pub output: Option<PathBuf>,
}

pub async fn run(args: &FetchArgs) -> Result<()> {
	let mut settings = Settings::from_env();
	settings.use_file_cache = !args.no_cache;
	settings.use_content_store = args.content_store;
	if args.offline {
		settings.allow_remote = false;
	}

	let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
	let hub = Hub::new(settings, Arc::new(fetcher));
	let url = hub.remote_url(&args.model_id, &args.revision, &args.file);

	ui::info(&format!("Fetching {} from {}", args.file, args.model_id));
	ui::debug(&format!("URL: {}", url));

	let reported = Arc::new(AtomicBool::new(false));
	let progress_flag = reported.clone();
	let label = args.file.clone();

	let mut options = FileOptions::default()
		.with_revision(&args.revision)
		.with_progress(move |info| {
			progress_flag.store(true, Ordering::Relaxed);
			ui::progress(&label, &info);
		});
	options.fatal = !args.optional;

	let start = Instant::now();
	let fetched = hub.get_file(&args.model_id, &args.file, &options).await;
	if reported.load(Ordering::Relaxed) {
		ui::progress_done();
	}

	let Some(bytes) = fetched.with_context(|| format!("Failed to fetch {}", args.file))? else {
		ui::warn(&format!("{} not found in {}", args.file, args.model_id));
		return Ok(());
	};

	ui::success(&format!(
		"Fetched {} ({}) in {:.2}s",
		args.file,
		ui::format_bytes(bytes.len() as u64),
		start.elapsed().as_secs_f32()
	));

	if hub.settings().use_file_cache {
		let cached = FileCache::new(&hub.settings().cache_dir).entry(&url)?;
		if cached.exists() {
			ui::info(&format!("Cached at {}", ui::path_link(cached.path(), 80)));
		}
	}

	if let Some(output) = &args.output {
		if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent)
				.await
				.with_context(|| format!("Failed to create {}", parent.display()))?;
		}
		tokio::fs::write(output, &bytes)
			.await
			.with_context(|| format!("Failed to write {}", output.display()))?;
		ui::success(&format!("Wrote {}", ui::path_link(output, 80)));
	}

	Ok(())
}
