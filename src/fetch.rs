use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::error::{PastaError, PastaResult};

pub const USER_AGENT: &str = "pasta-util (https://pasta.lternet.edu)";

/// A raw HTTP answer, before any status classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub body: Vec<u8>,
}

/// One blocking GET. Implementations report network trouble as
/// `Timeout`/`Connection` and leave every HTTP status to the caller.
pub trait Transport: Send + Sync {
  fn get(&self, url: &str, auth: Option<&str>, timeout: Duration) -> PastaResult<Response>;
}

pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  pub fn new() -> PastaResult<Self> {
    let client = Client::builder()
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| PastaError::Config(format!("could not build http client: {}", e)))?;
    Ok(Self::with_client(client))
  }

  pub fn with_client(client: Client) -> Self {
    HttpTransport { client }
  }
}

fn network_error(url: &str, err: reqwest::Error) -> PastaError {
  if err.is_timeout() {
    PastaError::Timeout(url.to_string())
  } else {
    PastaError::Connection {
      url: url.to_string(),
      reason: err.to_string(),
    }
  }
}

impl Transport for HttpTransport {
  fn get(&self, url: &str, auth: Option<&str>, timeout: Duration) -> PastaResult<Response> {
    let mut request = self.client.get(url).timeout(timeout);
    if let Some(auth) = auth {
      request = request.header(AUTHORIZATION, auth);
    }
    let resp = request.send().map_err(|e| network_error(url, e))?;
    let status = resp.status().as_u16();
    let body = resp.bytes().map_err(|e| network_error(url, e))?;
    Ok(Response {
      status,
      body: body.to_vec(),
    })
  }
}

/// Run `op` once, then retry it up to `max_retries` more times while it fails transiently.
/// There is no delay between attempts. Non-transient errors are returned immediately.
pub fn retry_with_limit<T, F>(max_retries: usize, what: &str, mut op: F) -> PastaResult<T>
where
  F: FnMut() -> PastaResult<T>,
{
  let mut retries = 0;
  loop {
    match op() {
      Err(e) if e.is_transient() && retries < max_retries => {
        retries += 1;
        warn!("-- retrying url request {} ({} of {}): {}", what, retries, max_retries, e);
      },
      other => return other,
    }
  }
}

/// A successfully fetched (2xx) resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
  pub status: u16,
  pub body: Vec<u8>,
}

impl Fetched {
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  /// PASTA answers listings as whitespace-delimited plain text.
  pub fn listing(&self) -> Vec<String> {
    split_listing(&self.text())
  }
}

pub fn split_listing(text: &str) -> Vec<String> {
  text.split_whitespace().map(str::to_string).collect()
}

pub struct Fetcher {
  transport: Box<dyn Transport>,
  auth: Option<String>,
  max_retries: usize,
}

impl Fetcher {
  pub fn new(transport: Box<dyn Transport>, auth: Option<String>, max_retries: usize) -> Self {
    Fetcher {
      transport,
      auth,
      max_retries,
    }
  }

  /// The production fetcher over HTTP.
  pub fn http(auth: Option<String>, max_retries: usize) -> PastaResult<Self> {
    Ok(Self::new(Box::new(HttpTransport::new()?), auth, max_retries))
  }

  pub fn fetch(&self, url: &str, timeout: Duration) -> PastaResult<Fetched> {
    debug!("GET {}", url);
    let resp = retry_with_limit(self.max_retries, url, || {
      self.transport.get(url, self.auth.as_deref(), timeout)
    })?;
    debug!("{} answered with http status {}", url, resp.status);
    match resp.status {
      200..=299 => Ok(Fetched {
        status: resp.status,
        body: resp.body,
      }),
      404 | 410 => Err(PastaError::NotFound(url.to_string())),
      status => Err(PastaError::Status {
        url: url.to_string(),
        status,
      }),
    }
  }

  pub fn fetch_text(&self, url: &str, timeout: Duration) -> PastaResult<String> {
    Ok(self.fetch(url, timeout)?.text())
  }

  pub fn fetch_listing(&self, url: &str, timeout: Duration) -> PastaResult<Vec<String>> {
    Ok(self.fetch(url, timeout)?.listing())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;
  use std::net::TcpListener;
  use std::sync::{Arc, Mutex};
  use std::thread;

  struct Flaky {
    script: Mutex<VecDeque<PastaResult<Response>>>,
    seen_auth: Mutex<Vec<Option<String>>>,
  }

  impl Flaky {
    fn new(script: Vec<PastaResult<Response>>) -> Self {
      Flaky {
        script: Mutex::new(script.into()),
        seen_auth: Mutex::new(Vec::new()),
      }
    }
  }

  impl Transport for Flaky {
    fn get(&self, url: &str, auth: Option<&str>, _timeout: Duration) -> PastaResult<Response> {
      self.seen_auth.lock().unwrap().push(auth.map(str::to_string));
      self
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(PastaError::Timeout(url.to_string())))
    }
  }

  fn timeout() -> PastaResult<Response> {
    Err(PastaError::Timeout("http://x".into()))
  }

  fn ok(body: &str) -> PastaResult<Response> {
    Ok(Response {
      status: 200,
      body: body.as_bytes().to_vec(),
    })
  }

  #[test]
  fn three_failures_then_success_uses_three_retries() {
    let mut attempts = 0;
    let result = retry_with_limit(3, "test", || {
      attempts += 1;
      if attempts <= 3 {
        Err(PastaError::Timeout("u".into()))
      } else {
        Ok(attempts)
      }
    });
    assert_eq!(result.unwrap(), 4);
    assert_eq!(attempts, 4);
  }

  #[test]
  fn fourth_failure_surfaces() {
    let mut attempts = 0;
    let result: PastaResult<()> = retry_with_limit(3, "test", || {
      attempts += 1;
      Err(PastaError::Connection {
        url: "u".into(),
        reason: "refused".into(),
      })
    });
    assert!(matches!(result, Err(PastaError::Connection { .. })));
    assert_eq!(attempts, 4);
  }

  #[test]
  fn non_transient_errors_are_not_retried() {
    let mut attempts = 0;
    let result: PastaResult<()> = retry_with_limit(3, "test", || {
      attempts += 1;
      Err(PastaError::Parse("bad".into()))
    });
    assert!(result.is_err());
    assert_eq!(attempts, 1);
  }

  #[test]
  fn fetcher_retries_transport_until_the_listing_arrives() {
    let transport = Flaky::new(vec![timeout(), timeout(), ok("1 2 3")]);
    let fetcher = Fetcher::new(Box::new(transport), Some("Basic abc".into()), 3);
    let listing = fetcher
      .fetch_listing("http://x", Duration::from_secs(1))
      .unwrap();
    assert_eq!(listing, vec!["1", "2", "3"]);
  }

  #[test]
  fn not_found_is_distinct_and_not_retried() {
    for status in [404, 410] {
      let flaky = Arc::new(Flaky::new(vec![Ok(Response {
        status,
        body: Vec::new(),
      })]));
      let fetcher = Fetcher::new(Box::new(Shared(flaky.clone())), None, 3);
      let err = fetcher.fetch("http://x", Duration::from_secs(1)).unwrap_err();
      assert!(matches!(err, PastaError::NotFound(_)), "{}: {:?}", status, err);
      assert_eq!(flaky.seen_auth.lock().unwrap().len(), 1);
    }
  }

  #[test]
  fn server_errors_become_status_errors() {
    let transport = Flaky::new(vec![Ok(Response {
      status: 500,
      body: Vec::new(),
    })]);
    let fetcher = Fetcher::new(Box::new(transport), None, 3);
    let err = fetcher.fetch("http://x", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, PastaError::Status { status: 500, .. }));
  }

  struct Shared(Arc<Flaky>);

  impl Transport for Shared {
    fn get(&self, url: &str, auth: Option<&str>, timeout: Duration) -> PastaResult<Response> {
      self.0.get(url, auth, timeout)
    }
  }

  #[test]
  fn auth_header_is_sent_on_every_attempt() {
    let flaky = Arc::new(Flaky::new(vec![timeout(), ok("")]));
    let fetcher = Fetcher::new(
      Box::new(Shared(flaky.clone())),
      Some("Basic xyz".into()),
      3,
    );
    fetcher.fetch("http://x", Duration::from_secs(1)).unwrap();
    let seen = flaky.seen_auth.lock().unwrap().clone();
    assert_eq!(seen, vec![Some("Basic xyz".to_string()); 2]);
  }

  fn local_transport() -> HttpTransport {
    let client = Client::builder().no_proxy().build().unwrap();
    HttpTransport::with_client(client)
  }

  #[test]
  fn silent_server_is_a_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    // accept, then never answer
    thread::spawn(move || {
      let held: Vec<_> = listener.incoming().take(1).collect();
      thread::sleep(Duration::from_secs(5));
      drop(held);
    });
    let err = local_transport()
      .get(&url, None, Duration::from_millis(200))
      .unwrap_err();
    assert!(matches!(err, PastaError::Timeout(ref u) if *u == url), "{:?}", err);
    assert!(err.is_transient());
  }

  #[test]
  fn refused_connection_is_a_connection_error() {
    let port = TcpListener::bind("127.0.0.1:0")
      .unwrap()
      .local_addr()
      .unwrap()
      .port();
    let url = format!("http://127.0.0.1:{}/", port);
    let err = local_transport()
      .get(&url, None, Duration::from_secs(5))
      .unwrap_err();
    assert!(matches!(err, PastaError::Connection { .. }), "{:?}", err);
    assert!(err.is_transient());
  }

  #[test]
  fn listing_splits_on_any_whitespace() {
    assert_eq!(split_listing(" 1\n2\t 10 \n"), vec!["1", "2", "10"]);
    assert!(split_listing("\n").is_empty());
  }
}
