/// Loops through PASTA datasets within a scope and reports their downloads,
/// as raw XML or as one HTML page per dataset contact (printed, written to a
/// directory, or mailed).
use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use pasta_util::cli::{CommonArgs, ScopeArgs};
use pasta_util::endpoints::PastaEndpoints;
use pasta_util::fetch::Fetcher;
use pasta_util::report::{
  default_report_dir, deliver_per_contact, read_mail_list, report_xml, write_mail_list, CreateMode,
  Delivery, MailxMailer, XsltProcessor,
};
use pasta_util::summary::Summarizer;

const DEFAULT_STYLESHEET: &str = "PASTAsummary.xsl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputType {
  Html,
  Xml,
}

#[derive(Parser, Debug)]
#[command(name = "pasta_summary")]
#[command(about = "Produce reports on data usage for specified scope by contact")]
struct Args {
  #[command(flatten)]
  scope: ScopeArgs,
  #[arg(long = "outputtype", short = 'o', value_enum, default_value = "html")]
  output: OutputType,
  #[arg(long = "create", short = 'c', value_enum, default_value = "list")]
  create: CreateMode,
  /// Directory for --create=directory (default: ./PASTAReport_<timestamp>)
  #[arg(long = "createdir", short = 'd')]
  create_dir: Option<PathBuf>,
  /// File of email addresses (one per line) to send reports to instead of the dataset contacts
  #[arg(long = "maillist", short = 'm')]
  mail_list: Option<PathBuf>,
  /// Only write the sorted contact addresses to this file; no other output is produced
  #[arg(long = "genmaillist", short = 'g')]
  gen_mail_list: Option<PathBuf>,
  /// XSLT stylesheet turning the report into a contact's HTML page
  #[arg(long, short = 's', default_value = DEFAULT_STYLESHEET)]
  stylesheet: PathBuf,
  #[command(flatten)]
  common: CommonArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();
  let config = args.common.init()?;
  let window = args.scope.window()?;
  // read up front so a bad path fails before the long walk over the scope
  let mail_list = match &args.mail_list {
    Some(path) => Some(read_mail_list(path)?),
    None => None,
  };
  let authorization = args.scope.authorization()?;

  let fetcher = Fetcher::http(Some(authorization), config.max_retries)?;
  let endpoints = PastaEndpoints::new(&config.base_url)?;
  let summarizer = Summarizer::new(&fetcher, &endpoints, &config, &window);
  let tree = summarizer.build_report(&args.scope.selection())?;

  if let Some(path) = &args.gen_mail_list {
    write_mail_list(path, &tree.contacts())?;
    info!("List of contact emails written to {}", path.display());
    return Ok(());
  }

  let xml = report_xml(&tree)?;
  if args.output == OutputType::Xml {
    println!("{}", xml);
    return Ok(());
  }

  let recipients = mail_list.unwrap_or_else(|| tree.contacts());
  info!("-- email list: {:?}", recipients);
  let transform = XsltProcessor::new(args.stylesheet);
  let mailer = MailxMailer::default();
  let stdout = io::stdout();
  let mut out = stdout.lock();
  let mut delivery = match args.create {
    CreateMode::List => Delivery::List(&mut out),
    CreateMode::Directory => Delivery::Directory(args.create_dir.unwrap_or_else(default_report_dir)),
    CreateMode::Email => Delivery::Email(&mailer),
  };
  let tally = deliver_per_contact(&xml, &recipients, &transform, &mut delivery)?;
  if tally.failed > 0 {
    warn!("-- {} of {} reports were not delivered", tally.failed, recipients.len());
  }
  info!("-- delivered {} reports", tally.delivered);
  Ok(())
}
