use std::fmt;

/// A dataset package (scope, identifier) and optionally one revision of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
  pub scope: String,
  pub identifier: String,
  /// `None` means "resolve to the latest revision".
  pub revision: Option<String>,
}

impl DatasetKey {
  pub fn new(scope: &str, identifier: &str, revision: Option<&str>) -> Self {
    DatasetKey {
      scope: scope.to_string(),
      identifier: identifier.to_string(),
      revision: revision.map(str::to_string),
    }
  }

  pub fn with_revision(&self, revision: &str) -> Self {
    DatasetKey {
      revision: Some(revision.to_string()),
      ..self.clone()
    }
  }

  /// `scope.identifier.revision`, or `scope.identifier` when unversioned.
  pub fn package_id(&self) -> String {
    match &self.revision {
      Some(rev) => format!("{}.{}.{}", self.scope, self.identifier, rev),
      None => format!("{}.{}", self.scope, self.identifier),
    }
  }
}

impl fmt::Display for DatasetKey {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.revision {
      Some(rev) => write!(f, "{}/{}/{}", self.scope, self.identifier, rev),
      None => write!(f, "{}/{}", self.scope, self.identifier),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationStatus {
  Current,
  NeedsUpgrade(String),
  NotFound,
}

impl ReconciliationStatus {
  pub fn label(&self) -> &'static str {
    match self {
      ReconciliationStatus::Current => "Current_revision_in_PASTA",
      ReconciliationStatus::NeedsUpgrade(_) => "Needs_upgrade",
      ReconciliationStatus::NotFound => "not_in_PASTA",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
  /// The probed package; for `Current` its revision is the one PASTA holds.
  pub key: DatasetKey,
  pub requested_revision: Option<String>,
  pub status: ReconciliationStatus,
  /// The PASTA url whose answer decided the status.
  pub source_url: String,
}

impl ReconciliationResult {
  /// The revision PASTA currently holds, if it holds the package at all.
  pub fn current_revision(&self) -> Option<&str> {
    match &self.status {
      ReconciliationStatus::Current => self.key.revision.as_deref(),
      ReconciliationStatus::NeedsUpgrade(rev) => Some(rev),
      ReconciliationStatus::NotFound => None,
    }
  }
}

/// One data entity (file) of a dataset version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
  pub key: DatasetKey,
  pub entity_id: String,
  pub entity_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
  pub entry_time: String,
  pub user: String,
  pub response_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCount {
  pub user: String,
  pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageAggregate {
  pub total: usize,
  /// Ranked by count, highest first.
  pub per_user: Vec<UserCount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUsage {
  pub entity: EntityRef,
  pub usage: UsageAggregate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
  pub key: DatasetKey,
  pub title: String,
  pub contacts: Vec<String>,
  pub metadata_download_count: usize,
  pub entities: Vec<EntityUsage>,
}

impl PackageSummary {
  pub fn package_id(&self) -> String {
    self.key.package_id()
  }

  pub fn data_download_total(&self) -> usize {
    self.entities.iter().map(|e| e.usage.total).sum()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTree {
  pub from_time: String,
  pub to_time: String,
  pub summaries: Vec<PackageSummary>,
}

impl ReportTree {
  /// Every contact address in the report, sorted and de-duplicated.
  pub fn contacts(&self) -> Vec<String> {
    let mut contacts: Vec<String> = self
      .summaries
      .iter()
      .flat_map(|s| s.contacts.iter().cloned())
      .collect();
    contacts.sort();
    contacts.dedup();
    contacts
  }
}
