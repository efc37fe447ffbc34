//! Ls command - list cached files

use anyhow::Result;
use colored::Colorize;

use crate::config;
use crate::storage;
use crate::ui;

pub fn run() -> Result<()> {
	let root = config::cache_dir();
	ui::info(&format!("Cache: {}", root.display()));

	let files = storage::scan(&root);
	if files.is_empty() {
		ui::success("Cache is empty");
		return Ok(());
	}

	for file in &files {
		let modified = file
			.modified
			.map(|m| m.format("%Y-%m-%d %H:%M").to_string())
			.unwrap_or_else(|| "-".to_string());

		println!(
			"  {:<5} {:>10}  {}  {}",
			file.tier.label().yellow(),
			ui::format_bytes(file.size),
			modified.dimmed(),
			file.relative.display()
		);
	}

	ui::header("Usage");
	for (tier, count, bytes) in storage::usage(&files) {
		println!(
			"  {} {} files, {}",
			format!("{}:", tier.label()).bright_blue(),
			count,
			ui::format_bytes(bytes)
		);
	}
	println!();

	Ok(())
}
