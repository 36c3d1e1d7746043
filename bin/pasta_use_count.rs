/// Produces a comma-separated listing of PASTA data entity downloads
/// for a period, within a scope or a single package.
use std::error::Error;
use std::io;

use clap::Parser;
use tracing::info;

use pasta_util::cli::{CommonArgs, ScopeArgs};
use pasta_util::endpoints::PastaEndpoints;
use pasta_util::fetch::Fetcher;
use pasta_util::report::write_use_count_csv;
use pasta_util::summary::Summarizer;

#[derive(Parser, Debug)]
#[command(name = "pasta_use_count")]
#[command(about = "Produce comma-separated-value files for data entity downloads to standard output")]
struct Args {
  #[command(flatten)]
  scope: ScopeArgs,
  #[command(flatten)]
  common: CommonArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();
  let config = args.common.init()?;
  let window = args.scope.window()?;
  let authorization = args.scope.authorization()?;

  let fetcher = Fetcher::http(Some(authorization), config.max_retries)?;
  let endpoints = PastaEndpoints::new(&config.base_url)?;
  let summarizer = Summarizer::new(&fetcher, &endpoints, &config, &window);
  let tree = summarizer.build_report(&args.scope.selection())?;

  let stdout = io::stdout();
  let mut out = stdout.lock();
  let rows = write_use_count_csv(&tree, &mut out)?;
  info!("-- {} entities with downloads between {} and {}", rows, tree.from_time, tree.to_time);
  Ok(())
}
