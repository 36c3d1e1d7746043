use std::io::Write;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::error::PastaResult;
use crate::harvest::HarvestDocument;
use crate::model::{ReconciliationResult, ReconciliationStatus};
use crate::reconcile::Reconciler;

pub const SYNC_CSV_HEADER: &str = "packageId,pastaStatus,currentPastaRevision,emlUrl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncOutput {
  /// One row per docid with its PASTA status.
  #[value(name = "csv")]
  Csv,
  /// Metadata URLs of packages missing from PASTA or older there.
  #[value(name = "urlList")]
  UrlList,
  /// Metadata URLs of packages PASTA holds at an older revision.
  #[value(name = "urlListUpdate")]
  UrlListUpdate,
  /// Metadata URLs of packages PASTA does not hold at all.
  #[value(name = "urlListNew")]
  UrlListNew,
}

impl SyncOutput {
  /// A typed-in output name; blank means csv.
  pub fn from_answer(answer: &str) -> Option<SyncOutput> {
    let answer = answer.trim();
    if answer.is_empty() {
      return Some(SyncOutput::Csv);
    }
    <SyncOutput as ValueEnum>::from_str(answer, false).ok()
  }

  fn lists(&self, status: &ReconciliationStatus) -> bool {
    match self {
      SyncOutput::Csv => false,
      SyncOutput::UrlList => *status != ReconciliationStatus::Current,
      SyncOutput::UrlListUpdate => matches!(status, ReconciliationStatus::NeedsUpgrade(_)),
      SyncOutput::UrlListNew => *status == ReconciliationStatus::NotFound,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTally {
  pub current: usize,
  pub needs_upgrade: usize,
  pub not_found: usize,
  pub failed: usize,
}

impl SyncTally {
  fn count(&mut self, status: &ReconciliationStatus) {
    match status {
      ReconciliationStatus::Current => self.current += 1,
      ReconciliationStatus::NeedsUpgrade(_) => self.needs_upgrade += 1,
      ReconciliationStatus::NotFound => self.not_found += 1,
    }
  }
}

pub fn csv_row(result: &ReconciliationResult, document_url: &str) -> String {
  let package_id = match &result.requested_revision {
    Some(rev) => result.key.with_revision(rev).package_id(),
    None => result.key.package_id(),
  };
  format!(
    "{},{},{},{}",
    package_id,
    result.status.label(),
    result.current_revision().unwrap_or("none"),
    document_url
  )
}

/// Reconcile every docid of the harvest list and write the chosen report to `out`.
/// A docid that cannot be reconciled is logged and skipped.
pub fn write_sync_report<W: Write>(
  reconciler: &Reconciler,
  documents: &[HarvestDocument],
  output: SyncOutput,
  out: &mut W,
) -> PastaResult<SyncTally> {
  let mut tally = SyncTally::default();
  if output == SyncOutput::Csv {
    writeln!(out, "{}", SYNC_CSV_HEADER)?;
  }
  for document in documents {
    for docid in &document.docids {
      let result = match reconciler.reconcile(
        &docid.scope,
        &docid.identifier,
        docid.revision.as_deref(),
      ) {
        Ok(result) => result,
        Err(e) => {
          warn!("-- skipping {}: {}", docid, e);
          tally.failed += 1;
          continue;
        },
      };
      tally.count(&result.status);
      if output == SyncOutput::Csv {
        writeln!(out, "{}", csv_row(&result, &document.document_url))?;
      } else if output.lists(&result.status) {
        writeln!(out, "{}", document.document_url)?;
      }
    }
  }
  out.flush()?;
  info!(
    "-- {} current, {} need upgrade, {} not in PASTA, {} failed",
    tally.current, tally.needs_upgrade, tally.not_found, tally.failed
  );
  Ok(tally)
}
