use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::{PastaError, PastaResult};

pub const PASTA_BASE_URL: &str = "https://pasta.lternet.edu";
pub const TECH_SUPPORT_ADDRESS: &str = "tech-support@lternet.edu";
pub const CONFIG_ENV_VAR: &str = "PASTA_CONFIG";
pub const PASTA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DEFAULT_WINDOW_DAYS: i64 = 31;

/// How the "current" revision is chosen from an identifier's revision listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionPolicy {
  /// Trust the last token of the listing, as PASTA orders revisions ascending.
  #[default]
  LastListed,
  /// Take the numerically largest revision regardless of listing order.
  NumericMax,
}

/// Run settings shared by the report binaries. Read from an optional JSON file
/// (`--config` or `PASTA_CONFIG`), then overridden by command-line flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PastaConfig {
  pub base_url: String,
  pub listing_timeout_secs: u64,
  pub audit_timeout_secs: u64,
  pub max_retries: usize,
  pub revision_policy: RevisionPolicy,
  pub parallel: bool,
  pub excluded_contact: String,
  pub debug: bool,
}

impl Default for PastaConfig {
  fn default() -> Self {
    PastaConfig {
      base_url: PASTA_BASE_URL.to_string(),
      listing_timeout_secs: 60,
      audit_timeout_secs: 160,
      max_retries: 3,
      revision_policy: RevisionPolicy::LastListed,
      parallel: false,
      excluded_contact: TECH_SUPPORT_ADDRESS.to_string(),
      debug: false,
    }
  }
}

impl PastaConfig {
  /// Read a JSON config file; absent keys keep their defaults.
  pub fn from_file(path: &Path) -> PastaResult<Self> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
      .map_err(|e| PastaError::Config(format!("{}: {}", path.display(), e)))
  }

  /// Explicit path first, then `PASTA_CONFIG`, then the built-in defaults.
  pub fn load(explicit: Option<&Path>) -> PastaResult<Self> {
    if let Some(path) = explicit {
      return Self::from_file(path);
    }
    match env::var(CONFIG_ENV_VAR) {
      Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
      _ => Ok(Self::default()),
    }
  }

  pub fn listing_timeout(&self) -> Duration {
    Duration::from_secs(self.listing_timeout_secs)
  }

  pub fn audit_timeout(&self) -> Duration {
    Duration::from_secs(self.audit_timeout_secs)
  }
}

/// The `[from, to)` audit window. `to == None` means "through now" and is left off the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
  pub from: String,
  pub to: Option<String>,
}

impl TimeWindow {
  /// The last 31 days, ending at the current local time.
  pub fn default_window() -> Self {
    let now = Local::now();
    let from = now - ChronoDuration::days(DEFAULT_WINDOW_DAYS);
    TimeWindow {
      from: from.format(PASTA_TIME_FORMAT).to_string(),
      to: Some(now.format(PASTA_TIME_FORMAT).to_string()),
    }
  }

  /// Fill in user-supplied bounds over the default window. An empty `to` drops the upper bound.
  pub fn from_args(from: Option<String>, to: Option<String>) -> PastaResult<Self> {
    let default = Self::default_window();
    let from = match from {
      Some(from) => validate_date(from)?,
      None => default.from,
    };
    let to = match to {
      Some(to) if to.trim().is_empty() => None,
      Some(to) => Some(validate_date(to)?),
      None => default.to,
    };
    Ok(TimeWindow { from, to })
  }

  pub fn to_or_empty(&self) -> &str {
    self.to.as_deref().unwrap_or_default()
  }
}

/// PASTA takes a bare date or a local date-time, with or without seconds.
pub fn is_pasta_date(value: &str) -> bool {
  NaiveDateTime::parse_from_str(value, PASTA_TIME_FORMAT).is_ok()
    || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
    || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn validate_date(value: String) -> PastaResult<String> {
  let trimmed = value.trim();
  if is_pasta_date(trimmed) {
    Ok(trimmed.to_string())
  } else {
    Err(PastaError::Config(format!(
      "expecting a date like 2013-12-30 or 2013-11-18T13:05:00, got {:?}",
      value
    )))
  }
}
