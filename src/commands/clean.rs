//! Clean command - empty the cache directory

use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::config;
use crate::storage;
use crate::ui;

pub fn run(auto_confirm: bool) -> Result<()> {
	let root = config::cache_dir();
	ui::info(&format!("Scanning: {}", root.display()));

	let files = storage::scan(&root);
	if files.is_empty() {
		ui::success("Cache is already empty");
		return Ok(());
	}

	let total: u64 = files.iter().map(|f| f.size).sum();
	ui::warn(&format!("Found {} cached files ({})", files.len(), ui::format_bytes(total)));

	if !auto_confirm {
		print!("\nDelete them? [y/N]: ");
		io::stdout().flush()?;

		let mut input = String::new();
		io::stdin().read_line(&mut input)?;

		if !input.trim().eq_ignore_ascii_case("y") {
			ui::info("Cancelled");
			return Ok(());
		}
	}

	let removed = storage::clear(&root).with_context(|| format!("Failed to clean {}", root.display()))?;
	ui::success(&format!("Removed {} files", removed));

	Ok(())
}
