//! hubcache - model hub file cache
//!
//! Downloads model files through a local file cache with an optional
//! content-addressed blob tier, and inspects or empties that cache.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use hubcache::cli::{Cli, Command};
use hubcache::commands::{self, fetch::FetchArgs};
use hubcache::config;
use hubcache::ui::{self, Log};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();

	Log::set_verbose(cli.verbose);
	if let Some(dir) = cli.cache_dir.clone() {
		config::set_cache_dir(dir);
	}
	if let Some(token) = cli.token.clone() {
		config::set_access_token(token);
	}

	if let Err(e) = run(cli.command).await {
		ui::error(&format!("{:#}", e));
		std::process::exit(1);
	}
}

async fn run(command: Command) -> Result<()> {
	match command {
		Command::Fetch {
			model_id,
			file,
			revision,
			optional,
			no_cache,
			content_store,
			offline,
			output,
		} => {
			let args = FetchArgs {
				model_id,
				file,
				revision,
				optional,
				no_cache,
				content_store,
				offline,
				output,
			};
			commands::fetch::run(&args).await
		}
		Command::Hash { url } => commands::hash::run(&url).await,
		Command::Ls => commands::ls::run(),
		Command::Clean { auto_confirm } => commands::clean::run(auto_confirm),
		Command::Help { subcommand } => {
			let mut cmd = Cli::command();
			if let Some(name) = subcommand {
				if let Some(sub) = cmd.find_subcommand_mut(&name) {
					sub.print_help()?;
					return Ok(());
				}
				ui::warn(&format!("Unknown subcommand: {}", name));
			}
			cmd.print_help()?;
			Ok(())
		}
	}
}
