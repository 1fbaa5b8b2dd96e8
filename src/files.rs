//! FileBundle builder: normalizes raw uploaded documents into the canonical
//! `{assignment, resources}` structure with text/base64 encoding tags.
//!
//! The first uploaded file is always the assignment; the remainder are
//! resources. Plain-text-like files (.txt, .md, text/plain) are stored as
//! text; everything else is carried as base64 and tagged with a media type
//! inferred from the file extension at prompt-assembly time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::{FileAsset, FileBundle, FileEncoding};
use crate::error::SessionError;

/// One file as received from the client, before normalization.
/// `encoding` may be omitted; it is then inferred from the file name.
#[derive(Clone, Debug, Deserialize)]
pub struct RawUpload {
  pub name: String,
  pub content: String,
  #[serde(default)]
  pub encoding: Option<FileEncoding>,
  #[serde(default)]
  pub mime: Option<String>,
}

/// True for files whose content is stored (and prompted) as plain text.
fn is_text_like(name: &str, mime: Option<&str>) -> bool {
  if mime == Some("text/plain") {
    return true;
  }
  let lower = name.to_ascii_lowercase();
  lower.ends_with(".txt") || lower.ends_with(".md")
}

fn normalize_one(raw: RawUpload) -> Result<FileAsset, SessionError> {
  let encoding = raw.encoding.unwrap_or_else(|| {
    if is_text_like(&raw.name, raw.mime.as_deref()) {
      FileEncoding::Text
    } else {
      FileEncoding::Base64
    }
  });

  if encoding == FileEncoding::Base64 {
    // Reject payloads that would later fail inside the provider adapter.
    if BASE64.decode(raw.content.as_bytes()).is_err() {
      warn!(target: "mastery_backend", name = %raw.name, "Rejecting upload: content is not valid base64");
      return Err(SessionError::InvalidUpload(format!(
        "file '{}' is not valid base64",
        raw.name
      )));
    }
  }

  Ok(FileAsset {
    name: raw.name,
    content: raw.content,
    encoding,
  })
}

/// Build a `FileBundle` from uploads, in upload order.
/// Fails when the list is empty (a level request without an assignment is a
/// precondition failure, so we refuse to build the bundle at all).
#[instrument(level = "info", skip(uploads), fields(count = uploads.len()))]
pub fn build_bundle(uploads: Vec<RawUpload>) -> Result<FileBundle, SessionError> {
  let mut iter = uploads.into_iter();
  let assignment = match iter.next() {
    Some(first) => normalize_one(first)?,
    None => {
      return Err(SessionError::InvalidUpload(
        "at least one file (the assignment) is required".into(),
      ))
    }
  };

  let mut resources = Vec::new();
  for raw in iter {
    resources.push(normalize_one(raw)?);
  }

  debug!(
    target: "mastery_backend",
    assignment = %assignment.name,
    resources = resources.len(),
    "File bundle built"
  );
  Ok(FileBundle {
    assignment,
    resources,
  })
}

/// Best-guess media type from the file extension.
/// Office formats are generally not accepted inline by the multi-part
/// backend; they still get a tag so the degradation is visible in logs.
pub fn media_type_for(filename: &str) -> &'static str {
  let extension = filename
    .rsplit('.')
    .next()
    .map(|e| e.to_ascii_lowercase())
    .unwrap_or_default();
  match extension.as_str() {
    "pdf" => "application/pdf",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "webp" => "image/webp",
    "heic" => "image/heic",
    "heif" => "image/heif",
    "mp3" => "audio/mpeg",
    "wav" => "audio/wav",
    "mp4" => "video/mp4",
    "txt" => "text/plain",
    "md" => "text/markdown",
    "html" => "text/html",
    "css" => "text/css",
    "js" => "text/javascript",
    "json" => "application/json",
    "csv" => "text/csv",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "ppt" => "application/vnd.ms-powerpoint",
    "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "rtf" => "application/rtf",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn upload(name: &str, content: &str) -> RawUpload {
    RawUpload {
      name: name.into(),
      content: content.into(),
      encoding: None,
      mime: None,
    }
  }

  #[test]
  fn first_file_is_the_assignment() {
    let bundle = build_bundle(vec![
      upload("task.md", "# Task"),
      upload("notes.txt", "notes"),
    ])
    .unwrap();
    assert_eq!(bundle.assignment.name, "task.md");
    assert_eq!(bundle.assignment.encoding, FileEncoding::Text);
    assert_eq!(bundle.resources.len(), 1);
    assert_eq!(bundle.resources[0].name, "notes.txt");
  }

  #[test]
  fn empty_upload_is_rejected() {
    assert!(matches!(
      build_bundle(vec![]),
      Err(SessionError::InvalidUpload(_))
    ));
  }

  #[test]
  fn binary_files_must_carry_valid_base64() {
    let ok = build_bundle(vec![upload("slides.pdf", "aGVsbG8=")]).unwrap();
    assert_eq!(ok.assignment.encoding, FileEncoding::Base64);

    let bad = build_bundle(vec![upload("slides.pdf", "not base64 at all!!")]);
    assert!(matches!(bad, Err(SessionError::InvalidUpload(_))));
  }

  #[test]
  fn media_types_follow_the_extension() {
    assert_eq!(media_type_for("report.PDF"), "application/pdf");
    assert_eq!(media_type_for("photo.jpeg"), "image/jpeg");
    assert_eq!(media_type_for("mystery.bin"), "application/octet-stream");
    assert_eq!(media_type_for("noextension"), "application/octet-stream");
  }
}
