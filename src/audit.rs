use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{PastaConfig, TimeWindow};
use crate::endpoints::PastaEndpoints;
use crate::error::{PastaError, PastaResult};
use crate::fetch::Fetcher;
use crate::model::{AuditRecord, DatasetKey, EntityRef, UsageAggregate, UserCount};
use crate::xml::{child_text, descendants, parse_document, root};

/// Failed authorizations are access attempts, not usage.
pub const UNAUTHORIZED_STATUS: &str = "401";
/// Always reported, even with no downloads.
pub const PUBLIC_USER: &str = "public";

pub fn parse_audit_records(payload: &str) -> PastaResult<Vec<AuditRecord>> {
  let doc = parse_document(payload)?;
  let root = root(&doc)?;
  let mut records = Vec::new();
  // the root itself may be a lone record
  let mut nodes = descendants(root, &doc, "auditRecord");
  if root.get_name() == "auditRecord" {
    nodes.insert(0, root);
  }
  for node in nodes {
    records.push(AuditRecord {
      entry_time: child_text(node, "entryTime").unwrap_or_default(),
      user: child_text(node, "user").unwrap_or_default(),
      response_status: child_text(node, "responseStatus").unwrap_or_default(),
    });
  }
  Ok(records)
}

/// Fold audit records into per-user download counts.
///
/// Records with a 401 response are dropped. `public` is seeded at zero, and the
/// ranking is by count descending with ties left in first-seen order.
pub fn tally(records: &[AuditRecord]) -> UsageAggregate {
  let mut per_user = vec![UserCount {
    user: PUBLIC_USER.to_string(),
    count: 0,
  }];
  let mut slots: HashMap<&str, usize> = HashMap::new();
  slots.insert(PUBLIC_USER, 0);
  let mut total = 0;

  for record in records
    .iter()
    .filter(|r| r.response_status != UNAUTHORIZED_STATUS)
  {
    total += 1;
    let slot = *slots.entry(record.user.as_str()).or_insert_with(|| {
      per_user.push(UserCount {
        user: record.user.clone(),
        count: 0,
      });
      per_user.len() - 1
    });
    per_user[slot].count += 1;
  }
  // stable sort keeps the encounter order among equal counts
  per_user.sort_by(|a, b| b.count.cmp(&a.count));
  UsageAggregate { total, per_user }
}

/// What came back from an entity's audit query.
#[derive(Debug)]
pub enum AuditOutcome {
  Records(Vec<AuditRecord>),
  /// The audit history could not be read. Reported as zero downloads.
  Unavailable(PastaError),
}

impl AuditOutcome {
  pub fn into_aggregate(self) -> UsageAggregate {
    match self {
      AuditOutcome::Records(records) => tally(&records),
      AuditOutcome::Unavailable(_) => UsageAggregate::default(),
    }
  }
}

pub struct UsageAggregator<'a> {
  fetcher: &'a Fetcher,
  endpoints: &'a PastaEndpoints,
  config: &'a PastaConfig,
}

impl<'a> UsageAggregator<'a> {
  pub fn new(fetcher: &'a Fetcher, endpoints: &'a PastaEndpoints, config: &'a PastaConfig) -> Self {
    UsageAggregator {
      fetcher,
      endpoints,
      config,
    }
  }

  fn fetch_records(&self, query: &str) -> PastaResult<Vec<AuditRecord>> {
    let payload = self.fetcher.fetch_text(query, self.config.audit_timeout())?;
    if self.config.debug {
      debug!("audit payload for {}:\n{}", query, payload);
    }
    parse_audit_records(&payload)
  }

  /// Data-download audit records for one resource in the window.
  pub fn audit_entity(&self, resource_id: &str, window: &TimeWindow) -> AuditOutcome {
    let query = self.endpoints.audit_report(resource_id, window, true);
    match self.fetch_records(&query) {
      Ok(records) => AuditOutcome::Records(records),
      Err(e) => {
        if e.is_not_found() {
          debug!("-- no audit history for {}", resource_id);
        } else {
          warn!("-- audit report for {} unavailable: {}", resource_id, e);
        }
        AuditOutcome::Unavailable(e)
      },
    }
  }

  pub fn aggregate(&self, resource_id: &str, window: &TimeWindow) -> UsageAggregate {
    self.audit_entity(resource_id, window).into_aggregate()
  }

  pub fn aggregate_entity(&self, entity: &EntityRef, window: &TimeWindow) -> UsageAggregate {
    let revision = entity.key.revision.as_deref().unwrap_or_default();
    let resource_id = self.endpoints.entity(&entity.key, revision, &entity.entity_id);
    self.aggregate(&resource_id, window)
  }

  /// Every audit record for the version's metadata, unfiltered. Errors propagate.
  pub fn metadata_download_count(
    &self,
    key: &DatasetKey,
    revision: &str,
    window: &TimeWindow,
  ) -> PastaResult<usize> {
    let resource_id = self.endpoints.metadata(key, revision);
    let query = self.endpoints.audit_report(&resource_id, window, false);
    Ok(self.fetch_records(&query)?.len())
  }
}
