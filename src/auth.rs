use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::error::{PastaError, PastaResult};

pub const DEFAULT_AUTH_FILE: &str = "userdata.txt";

/// The LTER LDAP distinguished name PASTA expects for a user id.
pub fn distinguished_name(user_id: &str) -> String {
  format!("uid={},o=LTER,dc=ecoinformatics,dc=org", user_id)
}

pub fn basic_authorization(user_id: &str, password: &str) -> String {
  let pair = format!("{}:{}", distinguished_name(user_id), password);
  format!("Basic {}", STANDARD.encode(pair))
}

/// First line of an authorization file, verbatim. A missing or empty file yields `None`.
pub fn read_auth_file(path: &Path) -> PastaResult<Option<String>> {
  let file = match File::open(path) {
    Ok(file) => file,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };
  let mut line = String::new();
  BufReader::new(file).read_line(&mut line)?;
  let value = line.trim_end_matches(&['\r', '\n'][..]).to_string();
  Ok(if value.is_empty() { None } else { Some(value) })
}

fn required(label: &str, answer: String) -> PastaResult<String> {
  if answer.is_empty() {
    Err(PastaError::Credentials(format!("no {} given", label.to_lowercase())))
  } else {
    Ok(answer)
  }
}

fn prompt(label: &str) -> PastaResult<String> {
  eprint!("{}: ", label);
  io::stderr().flush()?;
  let mut answer = String::new();
  io::stdin().lock().read_line(&mut answer)?;
  required(label, answer.trim().to_string())
}

/// Reads from the terminal with echo turned off. The answer is taken as typed.
fn prompt_hidden(label: &str) -> PastaResult<String> {
  required(label, rpassword::prompt_password(format!("{}: ", label))?)
}

/// The `Authorization` header value for a run.
///
/// Without a user id, the auth file is tried first; otherwise the header is built
/// from the user id and password, prompting on the terminal for whatever is missing.
pub fn resolve_authorization(
  user_id: Option<&str>,
  password: Option<&str>,
  auth_file: &Path,
) -> PastaResult<String> {
  let user_id = user_id.filter(|u| !u.is_empty());
  if user_id.is_none() {
    if let Some(value) = read_auth_file(auth_file)? {
      debug!("using authorization from {}", auth_file.display());
      return Ok(value);
    }
  }
  let user_id = match user_id {
    Some(user_id) => user_id.to_string(),
    None => prompt("Username")?,
  };
  let password = match password.filter(|p| !p.is_empty()) {
    Some(password) => password.to_string(),
    None => prompt_hidden("Password")?,
  };
  Ok(basic_authorization(&user_id, &password))
}
