use clap::builder::styling::{AnsiColor, Style, Styles};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

fn styles() -> Styles {
	Styles::styled()
		.header(Style::new().bold().fg_color(Some(AnsiColor::Blue.into())))
		.usage(Style::new().bold().fg_color(Some(AnsiColor::Blue.into())))
		.literal(Style::new().fg_color(Some(AnsiColor::Blue.into())))
		.placeholder(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
		.valid(Style::new().fg_color(Some(AnsiColor::Blue.into())))
		.invalid(Style::new().fg_color(Some(AnsiColor::Red.into())))
}

#[derive(Parser, Debug)]
#[command(
	name = "hubcache",
	author,
	version,
	about = "Model hub file cache with content-addressed storage",
	styles = styles(),
	disable_help_subcommand = true,
	after_help = format!(
		"{title}
  {bin} {fetch}  {fetch_args}   {fetch_desc}
  {bin} {hash}   {hash_args}  {hash_desc}
  {bin} {ls}     {ls_args}                              {ls_desc}
  {bin} {clean}  {clean_args}                           {clean_desc}",
		title = "Examples:".bright_blue().bold(),
		bin = "hubcache".bright_blue(),
		fetch = "fetch".yellow(),
		fetch_args = "Xenova/bert-base-uncased config.json",
		fetch_desc = "Download through the cache".dimmed(),
		hash = "hash".yellow(),
		hash_args = "https://huggingface.co/<repo>/resolve/main/<file>",
		hash_desc = "Show content hash".dimmed(),
		ls = "ls".yellow(),
		ls_args = "",
		ls_desc = "List cached files".dimmed(),
		clean = "clean".yellow(),
		clean_args = "-y",
		clean_desc = "Empty the cache".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	/// Cache directory (default: HUBCACHE_DIR or the platform cache dir)
	#[arg(short = 'c', long = "cache-dir", global = true, value_name = "DIR")]
	pub cache_dir: Option<PathBuf>,

	/// Hub access token (default: HF_TOKEN)
	#[arg(long = "token", global = true, value_name = "TOKEN")]
	pub token: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Download a model file through the cache
	Fetch {
		/// Model repository id (e.g. Xenova/bert-base-uncased)
		#[arg(value_name = "MODEL")]
		model_id: String,

		/// File path inside the repository
		#[arg(value_name = "FILE")]
		file: String,

		/// Branch, tag or commit
		#[arg(short = 'r', long = "revision", default_value = "main")]
		revision: String,

		/// Treat a missing file as a normal outcome
		#[arg(long = "optional")]
		optional: bool,

		/// Skip the file cache
		#[arg(long = "no-cache")]
		no_cache: bool,

		/// Also store the file in the content-addressed blob tier
		#[arg(long = "content-store")]
		content_store: bool,

		/// Never touch the network
		#[arg(long = "offline")]
		offline: bool,

		/// Write the file here as well
		#[arg(short = 'o', long = "output", value_name = "PATH")]
		output: Option<PathBuf>,
	},

	/// Resolve the SHA-256 content hash of a hub file URL
	Hash {
		/// URL of the form .../resolve/<ref>/<path>
		#[arg(value_name = "URL")]
		url: String,
	},

	/// List cached files
	Ls,

	/// Delete everything in the cache directory
	Clean {
		/// Skip the confirmation prompt
		#[arg(short = 'y', long = "yes")]
		auto_confirm: bool,
	},

	/// Show help for a subcommand
	Help {
		/// Subcommand name
		subcommand: Option<String>,
	},
}
