use std::io;

use thiserror::Error;

/// Everything that can go wrong while talking to PASTA and writing reports.
#[derive(Debug, Error)]
pub enum PastaError {
  #[error("request to {0} timed out")]
  Timeout(String),
  #[error("connection error for {url}: {reason}")]
  Connection { url: String, reason: String },
  #[error("resource not found: {0}")]
  NotFound(String),
  #[error("unexpected http status {status} for {url}")]
  Status { url: String, status: u16 },
  #[error("malformed xml: {0}")]
  Parse(String),
  #[error(transparent)]
  Io(#[from] io::Error),
  #[error("configuration error: {0}")]
  Config(String),
  #[error("credentials error: {0}")]
  Credentials(String),
  #[error("stylesheet transform failed: {0}")]
  Transform(String),
  #[error("mail delivery failed: {0}")]
  Mail(String),
}

pub type PastaResult<T> = Result<T, PastaError>;

impl PastaError {
  /// Connection and timeout failures are worth another attempt; everything else is final.
  pub fn is_transient(&self) -> bool {
    matches!(self, PastaError::Timeout(_) | PastaError::Connection { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, PastaError::NotFound(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_network_errors_are_transient() {
    assert!(PastaError::Timeout("u".into()).is_transient());
    assert!(PastaError::Connection {
      url: "u".into(),
      reason: "reset".into()
    }
    .is_transient());
    assert!(!PastaError::NotFound("u".into()).is_transient());
    assert!(!PastaError::Status {
      url: "u".into(),
      status: 500
    }
    .is_transient());
    assert!(!PastaError::Parse("eof".into()).is_transient());
  }
}
