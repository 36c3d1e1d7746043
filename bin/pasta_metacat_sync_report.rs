/// Compares a Metacat harvest list with PASTA holdings and reports, per docid,
/// whether PASTA has the current revision, an older one, or none at all.
use std::error::Error;
use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::info;

use pasta_util::cli::CommonArgs;
use pasta_util::config::RevisionPolicy;
use pasta_util::endpoints::PastaEndpoints;
use pasta_util::fetch::Fetcher;
use pasta_util::harvest::parse_harvest_list;
use pasta_util::reconcile::Reconciler;
use pasta_util::sync::{write_sync_report, SyncOutput};

#[derive(Parser, Debug)]
#[command(name = "pasta_metacat_sync_report")]
#[command(about = "Compare a metacat harvestlist with PASTA holdings")]
struct Args {
  /// URL of the EML harvest list (asked for when omitted)
  #[arg(short = 'l', value_name = "harvestListUrl")]
  harvest_list_url: Option<String>,
  /// csv (default): every package; urlList: missing or outdated; urlListUpdate: outdated; urlListNew: missing
  #[arg(long = "outputtype", short = 'o', value_enum)]
  output: Option<SyncOutput>,
  /// Use the numerically largest PASTA revision instead of the last one listed
  #[arg(long)]
  strict_revisions: bool,
  #[command(flatten)]
  common: CommonArgs,
}

fn ask(question: &str) -> io::Result<String> {
  eprintln!("{}", question);
  io::stderr().flush()?;
  let mut answer = String::new();
  io::stdin().lock().read_line(&mut answer)?;
  Ok(answer.trim().to_string())
}

fn ask_output() -> io::Result<SyncOutput> {
  loop {
    let answer = ask(
      "What output do you want (csv, urlList, urlListUpdate or urlListNew) (blank for CSV)?",
    )?;
    match SyncOutput::from_answer(&answer) {
      Some(output) => return Ok(output),
      None => eprintln!("{:?} is not one of the output types", answer),
    }
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();
  let mut config = args.common.init()?;
  if args.strict_revisions {
    config.revision_policy = RevisionPolicy::NumericMax;
  }

  let (harvest_list_url, output) = match args.harvest_list_url {
    Some(url) => (url, args.output.unwrap_or(SyncOutput::Csv)),
    None => {
      let url = ask("What is the URL of the EML harvestList you wish to check?")?;
      let output = match args.output {
        Some(output) => output,
        None => ask_output()?,
      };
      (url, output)
    },
  };

  // harvest lists and package probes are public; no credentials needed
  let fetcher = Fetcher::http(None, config.max_retries)?;
  let endpoints = PastaEndpoints::new(&config.base_url)?;

  info!("-- fetching harvest list {}", harvest_list_url);
  let payload = fetcher.fetch_text(&harvest_list_url, config.listing_timeout())?;
  let documents = parse_harvest_list(&payload)?;
  info!("-- checking {} harvest list documents against PASTA", documents.len());

  let reconciler = Reconciler::new(&fetcher, &endpoints, &config);
  let stdout = io::stdout();
  let mut out = stdout.lock();
  write_sync_report(&reconciler, &documents, output, &mut out)?;
  Ok(())
}
