use crate::error::PastaResult;
use crate::xml::{child, children, child_text, descendants, parse_document, root};

/// The bits of an EML metadata document a usage report needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmlSummary {
  pub title: String,
  pub contacts: Vec<String>,
  /// Every `entityName` in document order; PASTA lists entity ids in the same order.
  pub entity_names: Vec<String>,
}

impl EmlSummary {
  pub fn parse(payload: &str, excluded_contact: &str) -> PastaResult<Self> {
    let doc = parse_document(payload)?;
    let root = root(&doc)?;
    let dataset = child(root, "dataset");

    let title = dataset
      .and_then(|d| child_text(d, "title"))
      .unwrap_or_default();
    let contacts = dataset
      .map(|d| {
        children(d, "contact")
          .into_iter()
          .filter_map(|c| child_text(c, "electronicMailAddress"))
          .filter(|address| !address.is_empty() && address != excluded_contact)
          .collect()
      })
      .unwrap_or_default();
    let entity_names = descendants(root, &doc, "entityName")
      .into_iter()
      .map(|n| n.get_content().trim().to_string())
      .collect();

    Ok(EmlSummary {
      title,
      contacts,
      entity_names,
    })
  }

  pub fn entity_name(&self, position: usize) -> &str {
    self
      .entity_names
      .get(position)
      .map(String::as_str)
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EML: &str = r#"<?xml version="1.0"?>
<eml:eml xmlns:eml="eml://ecoinformatics.org/eml-2.1.1" packageId="knb-lter-vcr.26.15">
  <dataset>
    <title>Hog Island Bird Survey</title>
    <contact><electronicMailAddress>jhp7e@virginia.edu</electronicMailAddress></contact>
    <contact><electronicMailAddress>tech-support@lternet.edu</electronicMailAddress></contact>
    <contact><positionName>Information Manager</positionName></contact>
    <dataTable><entityName>birds.csv</entityName></dataTable>
    <otherEntity><entityName>map.zip</entityName></otherEntity>
  </dataset>
</eml:eml>"#;

  #[test]
  fn reads_title_contacts_and_entities() {
    let eml = EmlSummary::parse(EML, "tech-support@lternet.edu").unwrap();
    assert_eq!(eml.title, "Hog Island Bird Survey");
    assert_eq!(eml.contacts, vec!["jhp7e@virginia.edu"]);
    assert_eq!(eml.entity_names, vec!["birds.csv", "map.zip"]);
    assert_eq!(eml.entity_name(1), "map.zip");
    assert_eq!(eml.entity_name(7), "");
  }
}
