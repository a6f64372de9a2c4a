//! MIME message structure and raw-message parsing.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// How a part participates in the message: displayable content or an
/// attached file.
#[derive(Debug, Clone)]
pub enum PartKind {
    /// Displayable content with its content type.
    Inline {
        /// Effective content type of the part.
        content_type: ContentType,
    },
    /// An attached file; the filename may be absent.
    Attachment {
        /// Filename from the Content-Disposition header, if any.
        filename: Option<String>,
    },
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Classifies the part as inline content or an attachment, based on its
    /// Content-Disposition header.
    ///
    /// # Errors
    ///
    /// Returns an error if an inline part carries an invalid content type.
    pub fn kind(&self) -> Result<PartKind> {
        if let Some(disposition) = self.headers.get("content-disposition") {
            let token = disposition.split(';').next().unwrap_or_default().trim();
            if token.eq_ignore_ascii_case("attachment") {
                return Ok(PartKind::Attachment {
                    filename: self.filename(),
                });
            }
        }

        Ok(PartKind::Inline {
            content_type: self.content_type()?,
        })
    }

    /// Extracts the filename from the Content-Disposition header.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let disposition = self.headers.get("content-disposition")?;
        for param in disposition.split(';').skip(1) {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("filename") {
                    let value = value.trim().trim_matches('"');
                    if value.is_empty() {
                        return None;
                    }
                    return Some(decode_rfc2047(value).unwrap_or_else(|_| value.to_string()));
                }
            }
        }
        None
    }

    /// Parses the child parts of a nested multipart part.
    ///
    /// Returns an empty list for non-multipart parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type is invalid, the boundary
    /// parameter is missing, or the nested structure cannot be split.
    pub fn child_parts(&self) -> Result<Vec<Self>> {
        let content_type = self.content_type()?;
        if !content_type.is_multipart() {
            return Ok(Vec::new());
        }
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        split_multipart(&self.body, boundary)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => {
                let body_str = String::from_utf8_lossy(&self.body);
                // Remove whitespace for lenient parsing
                let cleaned: String = body_str.chars().filter(|c| !c.is_whitespace()).collect();
                decode_base64(&cleaned)
            }
            TransferEncoding::QuotedPrintable => {
                let body_str = String::from_utf8_lossy(&self.body);
                decode_quoted_printable(&body_str)
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }
}

/// Parsed MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Creates a single-part message.
    #[must_use]
    pub const fn single_part(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body: Some(body),
        }
    }

    /// Creates a multipart message.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Part>) -> Self {
        Self {
            headers,
            parts,
            body: None,
        }
    }

    /// Parses a raw message: header block, then either a single body or
    /// multipart content split on the declared boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the header block is malformed, a multipart
    /// message is missing its boundary, or the multipart structure cannot
    /// be split.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (headers, body) = split_entity(raw)?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            let parts = split_multipart(&body, boundary)?;
            Ok(Self::multipart(headers, parts))
        } else {
            Ok(Self::single_part(headers, body))
        }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }
}

/// Splits a raw entity into its header block and body bytes.
///
/// A missing blank-line separator is treated as a headers-only entity.
fn split_entity(raw: &[u8]) -> Result<(Headers, Vec<u8>)> {
    let (head, body) = match find_body_split(raw) {
        Some((head, body)) => (head, body),
        None => (raw, &[][..]),
    };

    let head_text = String::from_utf8_lossy(head);
    let headers = Headers::parse(&head_text)?;
    Ok((headers, body.to_vec()))
}

/// Finds the blank line separating headers from body.
fn find_body_split(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((&raw[..pos], &raw[pos + 4..]));
    }
    raw.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (&raw[..pos], &raw[pos + 2..]))
}

/// Splits a multipart body on `--boundary` delimiter lines (RFC 2046).
///
/// Content before the first delimiter (the preamble) and after the closing
/// `--boundary--` (the epilogue) is discarded. A body with a missing closing
/// delimiter still yields the parts seen so far.
pub(crate) fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");

    let mut segments: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = trim_line_ending(line);
        if trimmed == closing.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            break;
        }
        if trimmed == delimiter.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(segment) = &mut current {
            segment.extend_from_slice(line);
        }
    }
    if let Some(segment) = current.take() {
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(Error::InvalidMultipart(format!(
            "no {delimiter} delimiter found"
        )));
    }

    segments.into_iter().map(parse_part_segment).collect()
}

/// Parses one delimiter-bounded segment into a part.
fn parse_part_segment(mut segment: Vec<u8>) -> Result<Part> {
    // The line ending before the next delimiter belongs to the delimiter.
    if segment.ends_with(b"\r\n") {
        segment.truncate(segment.len() - 2);
    } else if segment.ends_with(b"\n") {
        segment.truncate(segment.len() - 1);
    }

    let (headers, body) = split_entity(&segment)?;
    Ok(Part::new(headers, body))
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
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

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_parse_single_part() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test\r\n",
            "Date: Mon, 6 Jul 2026 10:30:00 +0000\r\n",
            "\r\n",
            "Hello, World!"
        );

        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.to(), Some("recipient@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(message.date(), Some("Mon, 6 Jul 2026 10:30:00 +0000"));
        assert_eq!(message.body.as_deref(), Some(&b"Hello, World!"[..]));
        assert!(message.parts.is_empty());
    }

    #[test]
    fn test_parse_multipart() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=xyz\r\n",
            "\r\n",
            "preamble is ignored\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Part one\r\n",
            "--xyz\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Part two</p>\r\n",
            "--xyz--\r\n",
            "epilogue is ignored\r\n"
        );

        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.parts[0].body, b"Part one");
        assert_eq!(message.parts[1].body, b"<p>Part two</p>");
    }

    #[test]
    fn test_parse_multipart_missing_boundary_param() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\nbody\r\n--x--\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_parse_multipart_without_delimiters() {
        let raw = b"Content-Type: multipart/mixed; boundary=xyz\r\n\r\nno parts here\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_parse_unclosed_multipart_is_forgiving() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=xyz\r\n",
            "\r\n",
            "--xyz\r\n",
            "\r\n",
            "dangling part"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.parts[0].body, b"dangling part");
    }

    #[test]
    fn test_part_kind_classification() {
        let mut inline = Headers::new();
        inline.add("Content-Type", "text/plain; charset=utf-8");
        let part = Part::new(inline, b"hi".to_vec());
        assert!(matches!(
            part.kind().unwrap(),
            PartKind::Inline { content_type } if content_type.is_text_plain()
        ));

        let mut attached = Headers::new();
        attached.add("Content-Disposition", "attachment; filename=\"notes.txt\"");
        let part = Part::new(attached, Vec::new());
        assert!(matches!(
            part.kind().unwrap(),
            PartKind::Attachment { filename: Some(name) } if name == "notes.txt"
        ));
    }

    #[test]
    fn test_part_filename_absent() {
        let mut headers = Headers::new();
        headers.add("Content-Disposition", "attachment");
        let part = Part::new(headers, Vec::new());
        assert!(part.filename().is_none());
        assert!(matches!(
            part.kind().unwrap(),
            PartKind::Attachment { filename: None }
        ));
    }

    #[test]
    fn test_part_decode_base64_body() {
        let mut headers = Headers::new();
        headers.add("Content-Transfer-Encoding", "base64");
        let part = Part::new(headers, b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n".to_vec());
        assert_eq!(part.decode_body().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_part_decode_quoted_printable_body() {
        let mut headers = Headers::new();
        headers.add("Content-Transfer-Encoding", "quoted-printable");
        let part = Part::new(headers, b"H=C3=A9llo".to_vec());
        assert_eq!(part.body_text().unwrap(), "Héllo");
    }

    #[test]
    fn test_nested_multipart_child_parts() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain body\r\n",
            "--inner--\r\n",
            "\r\n",
            "--outer--\r\n"
        );

        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts.len(), 1);

        let children = message.parts[0].child_parts().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].body, b"plain body");
    }
}
