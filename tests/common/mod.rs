#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pasta_util::config::{PastaConfig, TimeWindow};
use pasta_util::endpoints::PastaEndpoints;
use pasta_util::fetch::{Fetcher, Response, Transport};
use pasta_util::{PastaError, PastaResult};

pub const BASE: &str = "https://pasta.test";

#[derive(Default)]
struct Pages {
  bodies: HashMap<String, (u16, String)>,
  transient_failures: HashMap<String, usize>,
  calls: Vec<String>,
}

/// An in-memory PASTA: fixed answers per url, 404 for everything else.
#[derive(Clone, Default)]
pub struct MemoryTransport {
  pages: Arc<Mutex<Pages>>,
}

impl MemoryTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn page(&self, url: &str, body: &str) -> &Self {
    self.status(url, 200, body)
  }

  pub fn status(&self, url: &str, status: u16, body: &str) -> &Self {
    self
      .pages
      .lock()
      .unwrap()
      .bodies
      .insert(url.to_string(), (status, body.to_string()));
    self
  }

  /// Time out `count` times on `url` before answering.
  pub fn flaky(&self, url: &str, count: usize) -> &Self {
    self
      .pages
      .lock()
      .unwrap()
      .transient_failures
      .insert(url.to_string(), count);
    self
  }

  pub fn calls(&self) -> Vec<String> {
    self.pages.lock().unwrap().calls.clone()
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self.calls().iter().filter(|c| c.as_str() == url).count()
  }

  pub fn fetcher(&self, max_retries: usize) -> Fetcher {
    Fetcher::new(Box::new(self.clone()), Some("Basic dGVzdA==".into()), max_retries)
  }
}

impl Transport for MemoryTransport {
  fn get(&self, url: &str, _auth: Option<&str>, _timeout: Duration) -> PastaResult<Response> {
    let mut pages = self.pages.lock().unwrap();
    pages.calls.push(url.to_string());
    if let Some(left) = pages.transient_failures.get_mut(url) {
      if *left > 0 {
        *left -= 1;
        return Err(PastaError::Timeout(url.to_string()));
      }
    }
    let (status, body) = pages
      .bodies
      .get(url)
      .cloned()
      .unwrap_or((404, String::new()));
    Ok(Response {
      status,
      body: body.into_bytes(),
    })
  }
}

pub fn url(path: &str) -> String {
  format!("{}{}", BASE, path)
}

pub fn endpoints() -> PastaEndpoints {
  PastaEndpoints::new(BASE).unwrap()
}

pub fn config() -> PastaConfig {
  PastaConfig {
    base_url: BASE.to_string(),
    ..PastaConfig::default()
  }
}

pub fn window() -> TimeWindow {
  TimeWindow {
    from: "2014-01-01T00:00:00".into(),
    to: Some("2014-02-01T00:00:00".into()),
  }
}

pub fn audit_xml(records: &[(&str, &str)]) -> String {
  let mut xml = String::from("<?xml version=\"1.0\"?>\n<auditReport>\n");
  for (i, (user, status)) in records.iter().enumerate() {
    xml.push_str(&format!(
      "  <auditRecord><oid>{}</oid><entryTime>2014-01-0{}T10:00:00</entryTime><user>{}</user><responseStatus>{}</responseStatus></auditRecord>\n",
      i,
      i % 9 + 1,
      user,
      status
    ));
  }
  xml.push_str("</auditReport>\n");
  xml
}
