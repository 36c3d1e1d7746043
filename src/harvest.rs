use crate::error::PastaResult;
use crate::model::DatasetKey;
use crate::xml::{child_text, children, descendants, parse_document, root};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestDocument {
  pub document_url: String,
  pub docids: Vec<DatasetKey>,
}

/// Every `document` with its `documentURL` and `docid` children, in list order.
pub fn parse_harvest_list(payload: &str) -> PastaResult<Vec<HarvestDocument>> {
  let doc = parse_document(payload)?;
  let root = root(&doc)?;
  let mut documents = children(root, "document");
  if documents.is_empty() {
    documents = descendants(root, &doc, "document");
  }

  Ok(
    documents
      .into_iter()
      .map(|document| HarvestDocument {
        document_url: child_text(document, "documentURL").unwrap_or_default(),
        docids: children(document, "docid")
          .into_iter()
          .map(|docid| DatasetKey {
            scope: child_text(docid, "scope").unwrap_or_default(),
            identifier: child_text(docid, "identifier").unwrap_or_default(),
            revision: child_text(docid, "revision").filter(|r| !r.is_empty()),
          })
          .collect(),
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_documents_and_docids() {
    let payload = r#"<?xml version="1.0"?>
<hrv:harvestList xmlns:hrv="eml://ecoinformatics.org/harvestList">
  <document>
    <docid><scope>knb-lter-vcr</scope><identifier>26</identifier><revision>15</revision></docid>
    <documentType>eml://ecoinformatics.org/eml-2.1.0</documentType>
    <documentURL>http://www.vcrlter.virginia.edu/eml/VCR97019.xml</documentURL>
  </document>
  <document>
    <docid><scope>knb-lter-vcr</scope><identifier>27</identifier></docid>
    <documentURL>http://www.vcrlter.virginia.edu/eml/VCR97020.xml</documentURL>
  </document>
</hrv:harvestList>"#;
    let documents = parse_harvest_list(payload).unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(
      documents[0].document_url,
      "http://www.vcrlter.virginia.edu/eml/VCR97019.xml"
    );
    assert_eq!(
      documents[0].docids,
      vec![DatasetKey::new("knb-lter-vcr", "26", Some("15"))]
    );
    assert_eq!(documents[1].docids[0].revision, None);
  }
}
