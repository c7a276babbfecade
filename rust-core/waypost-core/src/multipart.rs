//! # Multipart Body Parser
//!
//! Decodes `multipart/form-data` bodies (RFC 7578 framing) into plain fields
//! and uploaded files. Used for PUT requests, whose bodies HTTP runtimes do not
//! populate on their own.
//!
//! Parsing is lenient: a part with broken headers is skipped and the rest of
//! the body is still read.

use crate::form::parse_urlencoded_bytes;
use serde::Serialize;
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upload stored successfully
pub const UPLOAD_OK: u8 = 0;
/// File input was submitted without a file
pub const UPLOAD_ERR_NO_FILE: u8 = 4;
/// Temporary file could not be written
pub const UPLOAD_ERR_CANT_WRITE: u8 = 7;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Descriptor of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Client-supplied file name
    pub name: String,
    /// Where the content was stored
    pub tmp_path: PathBuf,
    /// Content length in bytes
    pub size: u64,
    /// Lower-cased MIME type
    pub mime_type: String,
    /// Upload status code (`UPLOAD_OK` on success)
    pub error: u8,
}

impl UploadedFile {
    /// Whether the content was stored
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error == UPLOAD_OK
    }

    /// Remove the temporary file
    ///
    /// Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for any other failure from the removal.
    pub fn discard(&self) -> Result<()> {
        if !self.is_ok() {
            return Ok(());
        }
        match std::fs::remove_file(&self.tmp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Remove the temporary files of every stored upload
///
/// Failures are logged and do not stop the sweep.
pub fn cleanup_uploads<'a>(files: impl IntoIterator<Item = &'a UploadedFile>) {
    for file in files {
        if let Err(e) = file.discard() {
            warn!(path = %file.tmp_path.display(), error = %e, "Failed to remove upload");
        }
    }
}

/// Decoded form body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    /// Plain field values
    pub fields: HashMap<String, String>,
    /// Uploaded files by field name
    pub files: HashMap<String, UploadedFile>,
}

/// Parse a multipart body, writing uploads below `upload_dir`
///
/// The boundary is the first line of the body. A body without one is decoded
/// as `application/x-www-form-urlencoded` instead.
pub fn parse_multipart(body: &[u8], upload_dir: &Path) -> FormData {
    let mut form = FormData::default();

    let boundary = match find(body, b"\r\n") {
        Some(end) if end > 0 => &body[..end],
        _ => {
            debug!("No multipart boundary, decoding as urlencoded");
            form.fields = parse_urlencoded_bytes(body);
            return form;
        }
    };

    for raw_part in split(body, boundary).into_iter().skip(1) {
        if raw_part.starts_with(b"--") {
            break;
        }
        let Some(part) = Part::parse(raw_part) else {
            debug!("Skipping malformed multipart part");
            continue;
        };

        match part.filename {
            Some(filename) => {
                if form.files.contains_key(&part.name) {
                    continue;
                }
                let file = store_upload(&filename, part.mime_type, part.content, upload_dir);
                form.files.insert(part.name, file);
            }
            None => {
                let value = String::from_utf8_lossy(part.content).into_owned();
                form.fields.insert(part.name, value);
            }
        }
    }

    form
}

struct Part<'a> {
    name: String,
    filename: Option<String>,
    mime_type: Option<String>,
    content: &'a [u8],
}

impl<'a> Part<'a> {
    fn parse(raw: &'a [u8]) -> Option<Self> {
        let raw = raw.strip_prefix(b"\r\n").unwrap_or(raw);
        let split_at = find(raw, b"\r\n\r\n")?;
        let head = std::str::from_utf8(&raw[..split_at]).ok()?;
        let content = &raw[split_at + 4..];
        let content = content.strip_suffix(b"\r\n").unwrap_or(content);

        let mut headers = HashMap::new();
        for line in head.split("\r\n") {
            let (name, value) = line.split_once(':')?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let params = disposition_params(headers.get("content-disposition")?);
        let name = params.get("name")?.clone();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name,
            filename: params.get("filename").cloned(),
            mime_type: headers.get("content-type").map(|t| t.to_ascii_lowercase()),
            content,
        })
    }
}

/// `key="value"` parameters of a `Content-Disposition` header
///
/// Semicolons inside quoted values do not split.
fn disposition_params(value: &str) -> HashMap<String, String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);

    pieces
        .iter()
        .skip(1)
        .filter_map(|piece| {
            let (key, value) = piece.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key.trim().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

fn store_upload(filename: &str, mime: Option<String>, content: &[u8], dir: &Path) -> UploadedFile {
    let mime_type = mime.unwrap_or_else(|| FALLBACK_MIME.to_string());

    if filename.is_empty() {
        return UploadedFile {
            name: String::new(),
            tmp_path: PathBuf::new(),
            size: 0,
            mime_type,
            error: UPLOAD_ERR_NO_FILE,
        };
    }

    let stem: String = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(32)
        .collect();
    let (tmp_path, error) = match write_upload(&stem, content, dir) {
        Ok(path) => (path, UPLOAD_OK),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to store upload");
            (PathBuf::new(), UPLOAD_ERR_CANT_WRITE)
        }
    };

    UploadedFile {
        name: filename.to_string(),
        tmp_path,
        size: content.len() as u64,
        mime_type,
        error,
    }
}

/// Write into a fresh, exclusively created, owner-only temp file and keep it
fn write_upload(stem: &str, content: &[u8], dir: &Path) -> std::io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("waypost-{stem}-"))
        .tempfile_in(dir)?;
    file.write_all(content)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(pos) = find(rest, delimiter) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    parts.push(rest);
    parts
}
