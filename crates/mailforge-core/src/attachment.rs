//! Attachment model and MIME part framing.

use crate::error::{Error, Result};
use mailforge_mime::{Headers, TransferEncoding, encoding};
use std::fs;
use std::path::Path;

/// Content type used when none is known for an attachment.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An email attachment.
///
/// Content bytes are fixed at construction; the encoder only ever reads
/// them. Identical bytes and filename always produce an identical encoded
/// part.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Filename presented to the recipient.
    pub filename: String,
    /// MIME content type; empty means unknown.
    pub content_type: String,
    /// Caller-supplied part header overrides.
    pub headers: Headers,
    content: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from in-memory bytes.
    #[must_use]
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            headers: Headers::new(),
            content,
        }
    }

    /// Creates an attachment by reading a file, guessing the content type
    /// from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentRead`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|source| Error::AttachmentRead {
            path: path.display().to_string(),
            source,
        })?;

        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = content_type_for_path(path);

        Ok(Self::from_bytes(filename, content_type, content))
    }

    /// Returns the attachment content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Part headers for this attachment: the caller's overrides plus
    /// defaults for everything not already supplied. The Content-Type is
    /// driven by the attachment's own content type, defaulting to
    /// `application/octet-stream`.
    #[must_use]
    pub(crate) fn part_headers(&self) -> Headers {
        let mut headers = self.headers.clone();

        let content_type = if self.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            &self.content_type
        };
        headers.set("Content-Type", content_type);

        if headers.get("Content-Disposition").is_none() {
            headers.set(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            );
        }
        if headers.get("Content-ID").is_none() {
            headers.set("Content-ID", format!("<{}>", self.filename));
        }
        if headers.get("Content-Transfer-Encoding").is_none() {
            headers.set(
                "Content-Transfer-Encoding",
                TransferEncoding::Base64.to_string(),
            );
        }

        headers
    }

    /// Writes the base64 part body, wrapped to RFC 2045 line lengths.
    pub(crate) fn write_body(&self, out: &mut Vec<u8>) {
        encoding::encode_base64_wrapped(&self.content, out);
    }
}

/// Guesses a content type from a file extension; empty when unknown.
fn content_type_for_path(path: &Path) -> String {
    let Some(extension) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return String::new();
    };

    match extension.as_str() {
        "txt" | "log" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "",
    }
    .to_string()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_part_headers() {
        let attachment = Attachment::from_bytes("data.bin", "", vec![1, 2, 3]);
        let headers = attachment.part_headers();

        assert_eq!(headers.get("Content-Type"), Some("application/octet-stream"));
        assert_eq!(
            headers.get("Content-Disposition"),
            Some("attachment; filename=\"data.bin\"")
        );
        assert_eq!(headers.get("Content-ID"), Some("<data.bin>"));
        assert_eq!(headers.get("Content-Transfer-Encoding"), Some("base64"));
    }

    #[test]
    fn test_caller_headers_not_overwritten() {
        let mut attachment = Attachment::from_bytes("data.bin", "application/pdf", Vec::new());
        attachment
            .headers
            .set("Content-Disposition", "inline; filename=\"data.bin\"");
        attachment.headers.set("Content-ID", "<custom-id>");

        let headers = attachment.part_headers();
        assert_eq!(headers.get("Content-Type"), Some("application/pdf"));
        assert_eq!(
            headers.get("Content-Disposition"),
            Some("inline; filename=\"data.bin\"")
        );
        assert_eq!(headers.get("Content-ID"), Some("<custom-id>"));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = Attachment::from_bytes("same.bin", "", b"same bytes".to_vec());
        let b = Attachment::from_bytes("same.bin", "", b"same bytes".to_vec());

        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        a.write_body(&mut out_a);
        b.write_body(&mut out_b);

        assert_eq!(out_a, out_b);
        assert_eq!(a.part_headers().to_string(), b.part_headers().to_string());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(b"file content").unwrap();

        let attachment = Attachment::from_file(file.path()).unwrap();
        assert_eq!(attachment.content(), b"file content");
        assert_eq!(attachment.content_type, "text/plain");
        assert!(attachment.filename.ends_with(".txt"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Attachment::from_file("/nonexistent/missing.bin").unwrap_err();
        assert!(matches!(err, Error::AttachmentRead { .. }));
    }
}
