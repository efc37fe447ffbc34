//! Application configuration and constants

use std::path::PathBuf;
use std::sync::OnceLock;

static CUSTOM_CACHE_DIR: OnceLock<PathBuf> = OnceLock::new();
static ACCESS_TOKEN: OnceLock<String> = OnceLock::new();

// === Hub ===
pub const DEFAULT_REMOTE_HOST: &str = "https://huggingface.co/";
pub const DEFAULT_REVISION: &str = "main";
pub const TOKEN_ENV_VARS: &[&str] = &["HF_TOKEN", "HF_ACCESS_TOKEN"];

// === Storage ===
pub const CACHE_DIR_NAME: &str = "hubcache";
pub const HASH_SIDECAR_DIR: &str = ".hashes";
pub const BLOB_DIR: &str = "blobs";
pub const SIDECAR_EXT: &str = "msgpack";
pub const CHUNK_SIZE: usize = 65536; // 64KB

// === Content Types ===
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const CONTENT_TYPES: &[(&str, &str)] = &[
	("txt", "text/plain"),
	("html", "text/html"),
	("css", "text/css"),
	("js", "text/javascript"),
	("json", "application/json"),
	("png", "image/png"),
	("jpg", "image/jpeg"),
	("jpeg", "image/jpeg"),
	("gif", "image/gif"),
];

pub fn set_cache_dir(path: PathBuf) {
	let _ = CUSTOM_CACHE_DIR.set(path);
}

pub fn set_access_token(token: impl Into<String>) {
	let _ = ACCESS_TOKEN.set(token.into());
}

/// Bearer token for hub requests (in-process override, then HF_TOKEN, then HF_ACCESS_TOKEN)
pub fn access_token() -> Option<String> {
	if let Some(token) = ACCESS_TOKEN.get() {
		return Some(token.clone());
	}

	TOKEN_ENV_VARS
		.iter()
		.filter_map(|name| std::env::var(name).ok())
		.find(|value| !value.trim().is_empty())
}

/// Cache root (custom dir, HUBCACHE_DIR, platform cache dir, or ./.hubcache)
pub fn cache_dir() -> PathBuf {
	if let Some(custom) = CUSTOM_CACHE_DIR.get() {
		crate::ui::debug(&format!("Using custom cache dir: {}", custom.display()));
		return custom.clone();
	}

	if let Ok(env_path) = std::env::var("HUBCACHE_DIR") {
		crate::ui::debug(&format!("Using HUBCACHE_DIR: {}", env_path));
		return PathBuf::from(env_path);
	}

	dirs::cache_dir()
		.map(|d| d.join(CACHE_DIR_NAME))
		.unwrap_or_else(|| PathBuf::from(format!(".{}", CACHE_DIR_NAME)))
}

/// Content type for a path, looked up by extension
pub fn content_type_for(path: &std::path::Path) -> &'static str {
	let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
		return DEFAULT_CONTENT_TYPE;
	};

	CONTENT_TYPES
		.iter()
		.find(|(e, _)| e.eq_ignore_ascii_case(ext))
		.map(|(_, ty)| *ty)
		.unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Runtime settings for hub access and cache tiers
#[derive(Debug, Clone)]
pub struct Settings {
	pub remote_host: String,
	pub allow_remote: bool,
	pub use_file_cache: bool,
	pub use_content_store: bool,
	pub cache_dir: PathBuf,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			remote_host: DEFAULT_REMOTE_HOST.to_string(),
			allow_remote: true,
			use_file_cache: true,
			use_content_store: false,
			cache_dir: cache_dir(),
		}
	}
}

impl Settings {
	/// Defaults with HUBCACHE_REMOTE_HOST and HUBCACHE_OFFLINE applied
	pub fn from_env() -> Self {
		let mut settings = Self::default();

		if let Ok(host) = std::env::var("HUBCACHE_REMOTE_HOST") {
			settings.remote_host = host;
		}
		if let Ok(offline) = std::env::var("HUBCACHE_OFFLINE") {
			settings.allow_remote = !matches!(offline.as_str(), "1" | "true" | "yes");
		}

		settings
	}

	pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
		self.cache_dir = dir;
		self
	}

	pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
		self.remote_host = host.into();
		self
	}
}
