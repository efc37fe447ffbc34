//! Cache directory discovery and cleanup

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{BLOB_DIR, HASH_SIDECAR_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
	File,
	Blob,
	HashSidecar,
}

impl Tier {
	pub fn label(&self) -> &'static str {
		match self {
			Tier::File => "file",
			Tier::Blob => "blob",
			Tier::HashSidecar => "hash",
		}
	}
}

#[derive(Debug, Clone)]
pub struct CachedFile {
	pub path: PathBuf,
	pub relative: PathBuf,
	pub size: u64,
	pub modified: Option<DateTime<Local>>,
	pub tier: Tier,
}

/// Scan the cache root for stored files, sorted by relative path
pub fn scan(root: &Path) -> Vec<CachedFile> {
	let mut results: Vec<CachedFile> = WalkDir::new(root)
		.into_iter()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_type().is_file())
		.filter_map(|entry| {
			let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
			let meta = entry.metadata().ok()?;

			Some(CachedFile {
				path: entry.path().to_path_buf(),
				tier: tier_of(&relative),
				relative,
				size: meta.len(),
				modified: meta.modified().ok().map(DateTime::<Local>::from),
			})
		})
		.collect();

	results.sort_by(|a, b| a.relative.cmp(&b.relative));
	results
}

/// Total bytes per tier
pub fn usage(files: &[CachedFile]) -> Vec<(Tier, usize, u64)> {
	[Tier::File, Tier::Blob, Tier::HashSidecar]
		.into_iter()
		.map(|tier| {
			let matching = files.iter().filter(|f| f.tier == tier);
			let count = matching.clone().count();
			let bytes = matching.map(|f| f.size).sum();
			(tier, count, bytes)
		})
		.filter(|(_, count, _)| *count > 0)
		.collect()
}

/// Remove everything under the root, keeping the root itself
pub fn clear(root: &Path) -> std::io::Result<usize> {
	let Ok(entries) = fs::read_dir(root) else {
		return Ok(0);
	};

	let mut removed = 0;
	for entry in entries.filter_map(|e| e.ok()) {
		let path = entry.path();
		if path.is_dir() {
			removed += WalkDir::new(&path)
				.into_iter()
				.filter_map(|e| e.ok())
				.filter(|e| e.file_type().is_file())
				.count();
			fs::remove_dir_all(&path)?;
		} else {
			fs::remove_file(&path)?;
			removed += 1;
		}
	}

	Ok(removed)
}

fn tier_of(relative: &Path) -> Tier {
	match relative.components().next().and_then(|c| c.as_os_str().to_str()) {
		Some(HASH_SIDECAR_DIR) => Tier::HashSidecar,
		Some(BLOB_DIR) => Tier::Blob,
		_ => Tier::File,
	}
}
