//! Unified logging system

use chrono::Local;
use colored::*;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::ProgressInfo;

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub struct Log;

impl Log {
	pub fn set_verbose(enabled: bool) {
		VERBOSE.store(enabled, Ordering::Relaxed);
	}

	pub fn is_verbose() -> bool {
		VERBOSE.load(Ordering::Relaxed)
	}
}

pub fn info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue().bold(), msg.bright_white());
}

pub fn success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_white());
}

pub fn warn(msg: &str) {
	println!("{} {}", "⚠".bright_yellow().bold(), msg.bright_white());
}

pub fn error(msg: &str) {
	eprintln!("{} {}", "✗".bright_red().bold(), msg.bright_white());
}

/// Timestamped, only printed with --verbose
pub fn debug(msg: &str) {
	if Log::is_verbose() {
		let time = Local::now().format("%H:%M:%S%.3f").to_string();
		println!("{} {} {}", "⚙".bright_black().bold(), time.dimmed(), msg.dimmed());
	}
}

pub fn header(text: &str) {
	println!("\n{}", format!("─── {} ───", text).bright_blue().bold());
}

/// Rewrites the current terminal line with download progress
pub fn progress(label: &str, info: &ProgressInfo) {
	let detail = if info.total > 0 {
		format!(
			"{:>5.1}% {} / {}",
			info.progress,
			format_bytes(info.loaded),
			format_bytes(info.total)
		)
	} else {
		format_bytes(info.loaded)
	};

	print!("\r{} {} {}", "↓".bright_blue().bold(), label.bright_white(), detail.dimmed());
	let _ = std::io::stdout().flush();
}

/// Ends a progress line started with [`progress`]
pub fn progress_done() {
	println!();
}

pub fn format_bytes(bytes: u64) -> String {
	const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

	let mut value = bytes as f64;
	let mut unit = 0;
	while value >= 1024.0 && unit < UNITS.len() - 1 {
		value /= 1024.0;
		unit += 1;
	}

	if unit == 0 {
		format!("{} {}", bytes, UNITS[0])
	} else {
		format!("{:.1} {}", value, UNITS[unit])
	}
}

/// Clickable file path (OSC 8 terminal hyperlink)
pub fn path_link(path: &std::path::Path, max_len: usize) -> String {
	let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

	let uri = if cfg!(windows) {
		let path_str = absolute.to_string_lossy();
		let cleaned = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
		format!("file:///{}", cleaned.replace('\\', "/"))
	} else {
		format!("file://{}", absolute.display())
	};

	let display = path.to_string_lossy();
	let display_name = if display.chars().count() > max_len {
		let tail: String = display.chars().rev().take(max_len.saturating_sub(3)).collect();
		format!("...{}", tail.chars().rev().collect::<String>())
	} else {
		display.to_string()
	};

	format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", uri, display_name)
}
