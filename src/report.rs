use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Local;
use clap::ValueEnum;
use libxml::tree::{Document, Node};
use tracing::{info, warn};

use crate::error::{PastaError, PastaResult};
use crate::model::{EntityUsage, PackageSummary, ReportTree};

pub const USE_COUNT_CSV_HEADER: &str =
  "Scope,Identifier,Revision,Title,Entity,DownloadCount,StartDate,EndDate";
pub const EMAIL_SUBJECT: &str = "PASTA Download Report";
pub const EMAIL_MESSAGE: &str = "The attached file has a web page summarizing downloads of datasets \n\
you are the contact for. Login at: https://portal.lternet.edu/nis/dataPackageAudit.jsp \n\
if you want the specific date and time details. \n";

fn csv_quote(text: &str) -> String {
  format!("\"{}\"", text.replace('"', "\"\""))
}

/// One row per entity with at least one download in the window.
pub fn write_use_count_csv<W: Write>(tree: &ReportTree, out: &mut W) -> PastaResult<usize> {
  writeln!(out, "{}", USE_COUNT_CSV_HEADER)?;
  let mut rows = 0;
  for summary in &tree.summaries {
    for entity in summary.entities.iter().filter(|e| e.usage.total > 0) {
      writeln!(
        out,
        "{},{},{},{},{},{},{},{}",
        summary.key.scope,
        summary.key.identifier,
        summary.key.revision.as_deref().unwrap_or_default(),
        csv_quote(&summary.title),
        entity.entity.entity_name,
        entity.usage.total,
        tree.from_time,
        tree.to_time
      )?;
      rows += 1;
    }
  }
  out.flush()?;
  Ok(rows)
}

fn xml_build<E: fmt::Debug>(e: E) -> PastaError {
  PastaError::Parse(format!("could not build report xml: {:?}", e))
}

fn add_entity(entities: &mut Node, usage: &EntityUsage) -> PastaResult<()> {
  let mut entity = entities.new_child(None, "entity").map_err(xml_build)?;
  entity
    .add_text_child(None, "entityName", &usage.entity.entity_name)
    .map_err(xml_build)?;
  entity
    .add_text_child(None, "entityId", &usage.entity.entity_id)
    .map_err(xml_build)?;
  entity
    .add_text_child(None, "entityDownloadCount", &usage.usage.total.to_string())
    .map_err(xml_build)?;
  entity
    .add_text_child(
      None,
      "entityUserCount",
      &usage.usage.per_user.len().to_string(),
    )
    .map_err(xml_build)?;
  let mut users = entity.new_child(None, "entityUsers").map_err(xml_build)?;
  for user_count in &usage.usage.per_user {
    let mut user = users.new_child(None, "entityUser").map_err(xml_build)?;
    user
      .add_text_child(None, "entityUserId", &user_count.user)
      .map_err(xml_build)?;
    user
      .add_text_child(
        None,
        "entityUserDownloadCount",
        &user_count.count.to_string(),
      )
      .map_err(xml_build)?;
  }
  Ok(())
}

fn add_summary(root: &mut Node, summary: &PackageSummary) -> PastaResult<()> {
  let mut node = root.new_child(None, "pastaSummary").map_err(xml_build)?;
  node
    .add_text_child(None, "packageId", &summary.package_id())
    .map_err(xml_build)?;
  node
    .add_text_child(None, "title", &summary.title)
    .map_err(xml_build)?;
  let mut contacts = node.new_child(None, "contacts").map_err(xml_build)?;
  for address in &summary.contacts {
    let mut contact = contacts.new_child(None, "contact").map_err(xml_build)?;
    contact
      .add_text_child(None, "electronicMailAddress", address)
      .map_err(xml_build)?;
  }
  node
    .add_text_child(
      None,
      "metadataDownloadCount",
      &summary.metadata_download_count.to_string(),
    )
    .map_err(xml_build)?;
  let mut entities = node.new_child(None, "entities").map_err(xml_build)?;
  for usage in &summary.entities {
    add_entity(&mut entities, usage)?;
  }
  node
    .add_text_child(
      None,
      "dataDownloadTotalCount",
      &summary.data_download_total().to_string(),
    )
    .map_err(xml_build)?;
  Ok(())
}

/// The canonical `pastaSummaries` document every output format is derived from.
pub fn report_xml(tree: &ReportTree) -> PastaResult<String> {
  let mut doc = Document::new().map_err(xml_build)?;
  let mut root = Node::new("pastaSummaries", None, &doc).map_err(xml_build)?;
  doc.set_root_element(&root);
  root
    .add_text_child(None, "fromTime", &tree.from_time)
    .map_err(xml_build)?;
  root
    .add_text_child(None, "toTime", &tree.to_time)
    .map_err(xml_build)?;
  for summary in &tree.summaries {
    add_summary(&mut root, summary)?;
  }
  Ok(doc.to_string())
}

/// Turns the report XML into one contact's HTML page.
pub trait ReportTransform {
  fn transform(&self, xml: &str, contact: &str) -> PastaResult<String>;
}

/// Runs an external `xsltproc` with the stylesheet and a `contactEmail` string parameter.
pub struct XsltProcessor {
  pub program: String,
  pub stylesheet: PathBuf,
}

impl XsltProcessor {
  pub fn new(stylesheet: PathBuf) -> Self {
    XsltProcessor {
      program: "xsltproc".to_string(),
      stylesheet,
    }
  }
}

impl ReportTransform for XsltProcessor {
  fn transform(&self, xml: &str, contact: &str) -> PastaResult<String> {
    let mut child = Command::new(&self.program)
      .arg("--stringparam")
      .arg("contactEmail")
      .arg(contact)
      .arg(&self.stylesheet)
      .arg("-")
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| PastaError::Transform(format!("could not run {}: {}", self.program, e)))?;
    // stdin is closed before waiting so the child sees end of input
    let written = match child.stdin.take() {
      Some(mut stdin) => stdin.write_all(xml.as_bytes()),
      None => Ok(()),
    };
    let output = child.wait_with_output()?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
      return Err(PastaError::Transform(format!(
        "{} exited with {}: {}",
        self.program,
        output.status,
        stderr.trim()
      )));
    }
    if let Err(e) = written {
      return Err(PastaError::Transform(format!(
        "could not feed the report to {}: {}: {}",
        self.program,
        e,
        stderr.trim()
      )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

/// Sends one HTML report as an attachment.
pub trait Mailer {
  fn send(&self, address: &str, attachment: &Path, message: &str) -> PastaResult<()>;
}

pub struct MailxMailer {
  pub program: String,
  pub subject: String,
}

impl Default for MailxMailer {
  fn default() -> Self {
    MailxMailer {
      program: "mailx".to_string(),
      subject: EMAIL_SUBJECT.to_string(),
    }
  }
}

impl Mailer for MailxMailer {
  fn send(&self, address: &str, attachment: &Path, message: &str) -> PastaResult<()> {
    let mut child = Command::new(&self.program)
      .arg("-s")
      .arg(&self.subject)
      .arg("-a")
      .arg(attachment)
      .arg(address)
      .stdin(Stdio::piped())
      .spawn()
      .map_err(|e| PastaError::Mail(format!("could not run {}: {}", self.program, e)))?;
    if let Some(mut stdin) = child.stdin.take() {
      stdin.write_all(message.as_bytes())?;
    }
    let status = child.wait()?;
    if status.success() {
      Ok(())
    } else {
      Err(PastaError::Mail(format!(
        "{} exited with {} for {}",
        self.program, status, address
      )))
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CreateMode {
  /// Print every contact's page to stdout.
  List,
  /// Write one `<address>.html` per contact into a directory.
  Directory,
  /// Mail every contact their page.
  Email,
}

pub enum Delivery<'a> {
  List(&'a mut dyn Write),
  Directory(PathBuf),
  Email(&'a dyn Mailer),
}

/// `jane@x.org` becomes `jane_at_x.org.html`.
pub fn contact_file_name(address: &str) -> String {
  format!("{}.html", address.trim().replace('@', "_at_"))
}

pub fn default_report_dir() -> PathBuf {
  PathBuf::from(format!(
    "./PASTAReport_{}",
    Local::now().format("%Y%m%d%H%M")
  ))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryTally {
  pub delivered: usize,
  pub failed: usize,
}

fn deliver_one(
  xml: &str,
  address: &str,
  transform: &dyn ReportTransform,
  delivery: &mut Delivery,
) -> PastaResult<()> {
  let html = transform.transform(xml, address)?;
  match delivery {
    Delivery::List(out) => {
      writeln!(out, "{}", html)?;
      out.flush()?;
    },
    Delivery::Directory(dir) => {
      let mut file = File::create(dir.join(contact_file_name(address)))?;
      file.write_all(html.as_bytes())?;
      file.flush()?;
    },
    Delivery::Email(mailer) => {
      let mut attachment = tempfile::Builder::new()
        .prefix("pasta_report_")
        .suffix(".html")
        .tempfile()?;
      attachment.write_all(html.as_bytes())?;
      attachment.flush()?;
      mailer.send(address, attachment.path(), EMAIL_MESSAGE)?;
    },
  }
  Ok(())
}

/// Transform the same report XML once per recipient and hand it to the delivery sink.
///
/// A recipient whose page cannot be rendered or mailed is logged and counted as
/// failed; the remaining recipients are still served. I/O errors on the sink abort.
pub fn deliver_per_contact(
  xml: &str,
  recipients: &[String],
  transform: &dyn ReportTransform,
  delivery: &mut Delivery,
) -> PastaResult<DeliveryTally> {
  if let Delivery::Directory(dir) = delivery {
    fs::create_dir_all(&*dir)?;
  }
  let mut tally = DeliveryTally::default();
  for address in recipients {
    info!("-- processing {}", address);
    match deliver_one(xml, address, transform, delivery) {
      Ok(()) => tally.delivered += 1,
      Err(e @ (PastaError::Transform(_) | PastaError::Mail(_))) => {
        warn!("-- no report delivered to {}: {}", address, e);
        tally.failed += 1;
      },
      Err(e) => return Err(e),
    }
  }
  Ok(tally)
}

/// Recipient addresses, one per line; blank lines are ignored.
pub fn read_mail_list(path: &Path) -> PastaResult<Vec<String>> {
  let reader = BufReader::new(File::open(path)?);
  let mut addresses = Vec::new();
  for line in reader.lines() {
    let line = line?;
    let address = line.trim();
    if !address.is_empty() {
      addresses.push(address.to_string());
    }
  }
  Ok(addresses)
}

pub fn write_mail_list(path: &Path, contacts: &[String]) -> PastaResult<()> {
  let mut file = File::create(path)?;
  for contact in contacts {
    writeln!(file, "{}", contact)?;
  }
  file.flush()?;
  Ok(())
}
