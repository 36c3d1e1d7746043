use reqwest::Url;

use crate::config::TimeWindow;
use crate::error::{PastaError, PastaResult};
use crate::model::DatasetKey;

/// URL builder for the handful of PASTA endpoints the reports touch.
#[derive(Debug, Clone)]
pub struct PastaEndpoints {
  base: String,
  audit_report: Url,
}

impl PastaEndpoints {
  pub fn new(base_url: &str) -> PastaResult<Self> {
    let base = base_url.trim_end_matches('/').to_string();
    let audit_report = Url::parse(&format!("{}/audit/report", base))
      .map_err(|e| PastaError::Config(format!("invalid base url {:?}: {}", base_url, e)))?;
    Ok(PastaEndpoints { base, audit_report })
  }

  /// `/package/eml/{scope}`: identifiers in a scope.
  pub fn scope_listing(&self, scope: &str) -> String {
    format!("{}/package/eml/{}", self.base, scope)
  }

  /// `/package/eml/{scope}/{id}`: revisions of an identifier.
  pub fn revision_listing(&self, scope: &str, identifier: &str) -> String {
    format!("{}/package/eml/{}/{}", self.base, scope, identifier)
  }

  /// `/package/eml/{scope}/{id}/{rev}`: one exact package version.
  pub fn package(&self, scope: &str, identifier: &str, revision: &str) -> String {
    format!("{}/package/eml/{}/{}/{}", self.base, scope, identifier, revision)
  }

  pub fn metadata(&self, key: &DatasetKey, revision: &str) -> String {
    format!(
      "{}/package/metadata/eml/{}/{}/{}",
      self.base, key.scope, key.identifier, revision
    )
  }

  pub fn data_listing(&self, key: &DatasetKey, revision: &str) -> String {
    format!(
      "{}/package/data/eml/{}/{}/{}",
      self.base, key.scope, key.identifier, revision
    )
  }

  pub fn entity(&self, key: &DatasetKey, revision: &str, entity_id: &str) -> String {
    format!("{}/{}", self.data_listing(key, revision), entity_id)
  }

  /// Audit records for `resource_id` inside `window`; `read_entity` restricts to data downloads.
  pub fn audit_report(&self, resource_id: &str, window: &TimeWindow, read_entity: bool) -> String {
    let mut url = self.audit_report.clone();
    {
      let mut query = url.query_pairs_mut();
      if read_entity {
        query.append_pair("serviceMethod", "readDataEntity");
      }
      query.append_pair("resourceId", resource_id);
      query.append_pair("fromTime", &window.from);
      if let Some(to) = &window.to {
        query.append_pair("toTime", to);
      }
    }
    url.into()
  }
}
