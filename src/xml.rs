use libxml::parser::{Parser, ParserOptions};
use libxml::readonly::RoNode;
use libxml::tree::Document;

use crate::error::{PastaError, PastaResult};

pub fn parse_document(payload: &str) -> PastaResult<Document> {
  if payload.trim().is_empty() {
    return Err(PastaError::Parse("empty document".to_string()));
  }
  let parser = Parser::default();
  let options = ParserOptions {
    recover: false,
    ..ParserOptions::default()
  };
  parser
    .parse_string_with_options(payload, options)
    .map_err(|e| PastaError::Parse(format!("{:?}", e)))
}

pub fn root(doc: &Document) -> PastaResult<RoNode> {
  doc
    .get_root_readonly()
    .ok_or_else(|| PastaError::Parse("document has no root element".to_string()))
}

/// All elements with the given local name below `node`, namespaces ignored.
pub fn descendants(node: RoNode, doc: &Document, local_name: &str) -> Vec<RoNode> {
  node
    .findnodes(&format!(".//*[local-name()='{}']", local_name), doc)
    .unwrap_or_default()
}

pub fn children(node: RoNode, local_name: &str) -> Vec<RoNode> {
  node
    .get_child_elements()
    .into_iter()
    .filter(|child| child.get_name() == local_name)
    .collect()
}

pub fn child(node: RoNode, local_name: &str) -> Option<RoNode> {
  children(node, local_name).into_iter().next()
}

/// Trimmed text of the first `local_name` child, if there is one.
pub fn child_text(node: RoNode, local_name: &str) -> Option<String> {
  child(node, local_name).map(|c| c.get_content().trim().to_string())
}
