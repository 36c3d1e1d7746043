use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::audit::UsageAggregator;
use crate::config::{PastaConfig, TimeWindow};
use crate::eml::EmlSummary;
use crate::endpoints::PastaEndpoints;
use crate::error::PastaResult;
use crate::fetch::Fetcher;
use crate::model::{DatasetKey, EntityRef, EntityUsage, PackageSummary, ReportTree};

/// Which packages a run covers. Unset identifier means the whole scope,
/// unset revision means every revision of each identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSelection {
  pub scope: String,
  pub identifier: Option<String>,
  pub revision: Option<String>,
}

/// Accumulates package summaries in the order they were produced.
#[derive(Debug, Default)]
pub struct ReportBuilder {
  tree: ReportTree,
}

impl ReportBuilder {
  pub fn new(window: &TimeWindow) -> Self {
    ReportBuilder {
      tree: ReportTree {
        from_time: window.from.clone(),
        to_time: window.to_or_empty().to_string(),
        summaries: Vec::new(),
      },
    }
  }

  pub fn push(&mut self, summary: PackageSummary) -> &mut Self {
    self.tree.summaries.push(summary);
    self
  }

  pub fn len(&self) -> usize {
    self.tree.summaries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tree.summaries.is_empty()
  }

  pub fn finish(self) -> ReportTree {
    self.tree
  }
}

pub struct Summarizer<'a> {
  fetcher: &'a Fetcher,
  endpoints: &'a PastaEndpoints,
  config: &'a PastaConfig,
  window: &'a TimeWindow,
}

impl<'a> Summarizer<'a> {
  pub fn new(
    fetcher: &'a Fetcher,
    endpoints: &'a PastaEndpoints,
    config: &'a PastaConfig,
    window: &'a TimeWindow,
  ) -> Self {
    Summarizer {
      fetcher,
      endpoints,
      config,
      window,
    }
  }

  fn aggregator(&self) -> UsageAggregator<'a> {
    UsageAggregator::new(self.fetcher, self.endpoints, self.config)
  }

  pub fn identifiers(&self, selection: &PackageSelection) -> PastaResult<Vec<String>> {
    match &selection.identifier {
      Some(id) => Ok(vec![id.clone()]),
      None => self.fetcher.fetch_listing(
        &self.endpoints.scope_listing(&selection.scope),
        self.config.listing_timeout(),
      ),
    }
  }

  /// Revisions to report for one identifier, most recent first.
  pub fn revisions(&self, scope: &str, identifier: &str, revision: Option<&str>) -> PastaResult<Vec<String>> {
    match revision {
      Some(rev) => Ok(vec![rev.to_string()]),
      None => {
        let mut listing = self.fetcher.fetch_listing(
          &self.endpoints.revision_listing(scope, identifier),
          self.config.listing_timeout(),
        )?;
        listing.reverse();
        Ok(listing)
      },
    }
  }

  /// Title, contacts, metadata downloads and per-entity usage of one package version.
  pub fn summarize_version(&self, key: &DatasetKey) -> PastaResult<PackageSummary> {
    let revision = key.revision.as_deref().unwrap_or_default();
    let eml_url = self.endpoints.metadata(key, revision);
    let eml_payload = self.fetcher.fetch_text(&eml_url, self.config.listing_timeout())?;
    if self.config.debug {
      debug!("metadata for {}:\n{}", key, eml_payload);
    }
    let eml = EmlSummary::parse(&eml_payload, &self.config.excluded_contact)?;

    let aggregator = self.aggregator();
    let metadata_download_count = aggregator.metadata_download_count(key, revision, self.window)?;

    let entity_ids = self.fetcher.fetch_listing(
      &self.endpoints.data_listing(key, revision),
      self.config.listing_timeout(),
    )?;
    let entities: Vec<EntityRef> = entity_ids
      .into_iter()
      .enumerate()
      .map(|(position, entity_id)| EntityRef {
        key: key.clone(),
        entity_id,
        entity_name: eml.entity_name(position).to_string(),
      })
      .collect();

    let usage = |entity: &EntityRef| EntityUsage {
      entity: entity.clone(),
      usage: aggregator.aggregate_entity(entity, self.window),
    };
    // indexed collection keeps the listing order either way
    let entities: Vec<EntityUsage> = if self.config.parallel {
      entities.par_iter().map(usage).collect()
    } else {
      entities.iter().map(usage).collect()
    };

    Ok(PackageSummary {
      key: key.clone(),
      title: eml.title,
      contacts: eml.contacts,
      metadata_download_count,
      entities,
    })
  }

  /// Summarize every selected package version. A failing identifier or version is
  /// logged and skipped; only a failing scope listing aborts the run.
  pub fn build_report(&self, selection: &PackageSelection) -> PastaResult<ReportTree> {
    let mut builder = ReportBuilder::new(self.window);
    for identifier in self.identifiers(selection)? {
      let revisions = match self.revisions(&selection.scope, &identifier, selection.revision.as_deref()) {
        Ok(revisions) => revisions,
        Err(e) => {
          warn!("-- skipping {}/{}: {}", selection.scope, identifier, e);
          continue;
        },
      };
      for revision in revisions {
        let key = DatasetKey::new(&selection.scope, &identifier, Some(&revision));
        info!("-- processing package: {}", key);
        match self.summarize_version(&key) {
          Ok(summary) => {
            builder.push(summary);
          },
          Err(e) => warn!("-- skipping package {}: {}", key, e),
        }
      }
    }
    info!("-- summarized {} package versions", builder.len());
    Ok(builder.finish())
  }
}
