use tracing::debug;

use crate::config::{PastaConfig, RevisionPolicy};
use crate::endpoints::PastaEndpoints;
use crate::error::PastaResult;
use crate::fetch::Fetcher;
use crate::model::{DatasetKey, ReconciliationResult, ReconciliationStatus};

/// Pick the "current" revision out of an identifier's revision listing.
pub fn latest_revision(listing: &[String], policy: RevisionPolicy) -> Option<String> {
  let last = listing.last()?;
  match policy {
    RevisionPolicy::LastListed => Some(last.clone()),
    RevisionPolicy::NumericMax => listing
      .iter()
      .filter_map(|rev| rev.parse::<u64>().ok().map(|n| (n, rev)))
      .max_by_key(|(n, _)| *n)
      .map(|(_, rev)| rev.clone())
      .or_else(|| Some(last.clone())),
  }
}

/// Compares harvested package revisions with what PASTA holds.
pub struct Reconciler<'a> {
  fetcher: &'a Fetcher,
  endpoints: &'a PastaEndpoints,
  config: &'a PastaConfig,
}

impl<'a> Reconciler<'a> {
  pub fn new(fetcher: &'a Fetcher, endpoints: &'a PastaEndpoints, config: &'a PastaConfig) -> Self {
    Reconciler {
      fetcher,
      endpoints,
      config,
    }
  }

  /// Three probes, in order: the exact revision, the identifier's revision listing, nothing.
  ///
  /// Only "not found" answers move on to the next probe; any other failure is returned
  /// to the caller. An unspecified revision skips the exact probe and resolves to the
  /// latest listed revision, reported as `Current`.
  pub fn reconcile(
    &self,
    scope: &str,
    identifier: &str,
    harvested_revision: Option<&str>,
  ) -> PastaResult<ReconciliationResult> {
    let key = DatasetKey::new(scope, identifier, harvested_revision);
    let requested_revision = harvested_revision.map(str::to_string);

    if let Some(revision) = harvested_revision {
      let url = self.endpoints.package(scope, identifier, revision);
      match self.fetcher.fetch(&url, self.config.listing_timeout()) {
        Ok(_) => {
          return Ok(ReconciliationResult {
            key,
            requested_revision,
            status: ReconciliationStatus::Current,
            source_url: url,
          })
        },
        Err(e) if e.is_not_found() => debug!("-- {} is not in PASTA", key),
        Err(e) => return Err(e),
      }
    }

    let url = self.endpoints.revision_listing(scope, identifier);
    let status = match self.fetcher.fetch_listing(&url, self.config.listing_timeout()) {
      Ok(listing) => match latest_revision(&listing, self.config.revision_policy) {
        Some(current) => match harvested_revision {
          Some(_) => ReconciliationStatus::NeedsUpgrade(current),
          None => {
            return Ok(ReconciliationResult {
              key: key.with_revision(&current),
              requested_revision,
              status: ReconciliationStatus::Current,
              source_url: url,
            })
          },
        },
        None => ReconciliationStatus::NotFound,
      },
      Err(e) if e.is_not_found() => ReconciliationStatus::NotFound,
      Err(e) => return Err(e),
    };
    Ok(ReconciliationResult {
      key,
      requested_revision,
      status,
      source_url: url,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::PastaError;
  use crate::fetch::{Response, Transport};
  use std::collections::HashMap;
  use std::time::Duration;

  struct Canned(HashMap<String, u16>, HashMap<String, &'static str>);

  impl Transport for Canned {
    fn get(&self, url: &str, _auth: Option<&str>, _timeout: Duration) -> PastaResult<Response> {
      if url.contains("broken") {
        return Err(PastaError::Connection {
          url: url.to_string(),
          reason: "refused".into(),
        });
      }
      let status = self.0.get(url).copied().unwrap_or(404);
      let body = self.1.get(url).copied().unwrap_or_default();
      Ok(Response {
        status,
        body: body.as_bytes().to_vec(),
      })
    }
  }

  const BASE: &str = "https://pasta.test";

  fn reconcile_with(
    pages: &[(&str, u16, &'static str)],
    policy: RevisionPolicy,
    scope: &str,
    rev: Option<&str>,
  ) -> PastaResult<ReconciliationResult> {
    let statuses: HashMap<String, u16> = pages
      .iter()
      .map(|(u, s, _)| (format!("{}{}", BASE, u), *s))
      .collect();
    let bodies: HashMap<String, &'static str> = pages
      .iter()
      .map(|(u, _, b)| (format!("{}{}", BASE, u), *b))
      .collect();
    let fetcher = Fetcher::new(Box::new(Canned(statuses, bodies)), None, 0);
    let endpoints = PastaEndpoints::new(BASE).unwrap();
    let config = PastaConfig {
      revision_policy: policy,
      ..PastaConfig::default()
    };
    Reconciler::new(&fetcher, &endpoints, &config).reconcile(scope, "7", rev)
  }

  #[test]
  fn exact_revision_is_current() {
    let result = reconcile_with(
      &[("/package/eml/s/7/3", 200, "")],
      RevisionPolicy::LastListed,
      "s",
      Some("3"),
    )
    .unwrap();
    assert_eq!(result.status, ReconciliationStatus::Current);
    assert_eq!(result.current_revision(), Some("3"));
    assert_eq!(result.source_url, "https://pasta.test/package/eml/s/7/3");
  }

  #[test]
  fn last_listed_revision_wins_even_out_of_order() {
    let pages = [("/package/eml/s/7", 200, "1 10 2")];
    let result = reconcile_with(&pages, RevisionPolicy::LastListed, "s", Some("3")).unwrap();
    assert_eq!(result.status, ReconciliationStatus::NeedsUpgrade("2".into()));

    let result = reconcile_with(&pages, RevisionPolicy::NumericMax, "s", Some("3")).unwrap();
    assert_eq!(result.status, ReconciliationStatus::NeedsUpgrade("10".into()));
  }

  #[test]
  fn both_probes_missing_is_not_found() {
    let result = reconcile_with(&[], RevisionPolicy::LastListed, "s", Some("3")).unwrap();
    assert_eq!(result.status, ReconciliationStatus::NotFound);
    assert_eq!(result.current_revision(), None);
  }

  #[test]
  fn empty_listing_is_not_found() {
    let result = reconcile_with(
      &[("/package/eml/s/7", 200, "\n")],
      RevisionPolicy::LastListed,
      "s",
      Some("3"),
    )
    .unwrap();
    assert_eq!(result.status, ReconciliationStatus::NotFound);
  }

  #[test]
  fn unspecified_revision_resolves_to_latest() {
    let result = reconcile_with(
      &[("/package/eml/s/7", 200, "1 2 3")],
      RevisionPolicy::LastListed,
      "s",
      None,
    )
    .unwrap();
    assert_eq!(result.status, ReconciliationStatus::Current);
    assert_eq!(result.key.revision.as_deref(), Some("3"));
    assert_eq!(result.requested_revision, None);
  }

  #[test]
  fn network_errors_propagate() {
    let result = reconcile_with(&[], RevisionPolicy::LastListed, "broken", Some("1"));
    assert!(matches!(result, Err(PastaError::Connection { .. })));
  }

  #[test]
  fn server_errors_propagate() {
    let result = reconcile_with(
      &[("/package/eml/s/7/3", 500, "")],
      RevisionPolicy::LastListed,
      "s",
      Some("3"),
    );
    assert!(matches!(result, Err(PastaError::Status { status: 500, .. })));
  }

  #[test]
  fn numeric_max_ignores_junk_tokens() {
    let listing: Vec<String> = ["4", "x", "12"].iter().map(|s| s.to_string()).collect();
    assert_eq!(
      latest_revision(&listing, RevisionPolicy::NumericMax).as_deref(),
      Some("12")
    );
    let junk: Vec<String> = vec!["a".into(), "b".into()];
    assert_eq!(
      latest_revision(&junk, RevisionPolicy::NumericMax).as_deref(),
      Some("b")
    );
    assert_eq!(latest_revision(&[], RevisionPolicy::LastListed), None);
  }
}
