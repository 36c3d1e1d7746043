use std::path::PathBuf;

use clap::Args;

use crate::auth::{resolve_authorization, DEFAULT_AUTH_FILE};
use crate::config::{PastaConfig, TimeWindow};
use crate::error::PastaResult;
use crate::summary::PackageSelection;

#[derive(Args, Debug)]
pub struct CommonArgs {
  /// JSON configuration file (falls back to $PASTA_CONFIG)
  #[arg(long)]
  pub config: Option<PathBuf>,
  /// Suppress progress messages during processing
  #[arg(long, short = 'q')]
  pub quiet: bool,
  /// Log queries, status codes and raw payloads
  #[arg(long)]
  pub debug: bool,
}

impl CommonArgs {
  pub fn init(&self) -> PastaResult<PastaConfig> {
    crate::logging::init(self.quiet, self.debug);
    let mut config = PastaConfig::load(self.config.as_deref())?;
    config.debug |= self.debug;
    Ok(config)
  }
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
  /// PASTA scope for the report, e.g. knb-lter-vcr
  #[arg(value_name = "PASTAscope")]
  pub scope: String,
  /// User id for login
  #[arg(long = "userid", short = 'u')]
  pub user_id: Option<String>,
  /// Password for login
  #[arg(long = "password", short = 'p')]
  pub password: Option<String>,
  /// Authorization file whose first line is a `Basic ...` value
  #[arg(long = "authfile", short = 'a', default_value = DEFAULT_AUTH_FILE)]
  pub auth_file: PathBuf,
  /// PASTA identifier (default: every identifier in the scope)
  #[arg(long, short = 'i')]
  pub identifier: Option<u64>,
  /// PASTA revision (default: every revision, most recent first)
  #[arg(long, short = 'r')]
  pub revision: Option<u64>,
  /// Start of the window, e.g. 2013-12-30 or 2013-11-18T13:05:00 (default: 31 days ago)
  #[arg(long = "fromdate", short = 'f')]
  pub from_date: Option<String>,
  /// End of the window (default: now; an empty value leaves it open)
  #[arg(long = "todate", short = 't')]
  pub to_date: Option<String>,
}

impl ScopeArgs {
  pub fn selection(&self) -> PackageSelection {
    PackageSelection {
      scope: self.scope.clone(),
      identifier: self.identifier.map(|i| i.to_string()),
      revision: self.revision.map(|r| r.to_string()),
    }
  }

  pub fn window(&self) -> PastaResult<TimeWindow> {
    TimeWindow::from_args(self.from_date.clone(), self.to_date.clone())
  }

  pub fn authorization(&self) -> PastaResult<String> {
    resolve_authorization(
      self.user_id.as_deref(),
      self.password.as_deref(),
      &self.auth_file,
    )
  }
}
