//! Incoming message decoding.
//!
//! Turns raw fetched mail data into a structured [`IncomingMessage`],
//! bounding both the number of MIME parts walked and the amount of content
//! read so malformed or adversarial messages cannot cause unbounded work.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mailforge_mime::{Address, Headers, Message, Part, PartKind, encoding};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

/// Body shown when only envelope metadata was available.
const NO_BODY_PLACEHOLDER: &str = "(Message body not available)";

/// Body shown when no displayable content was found.
const NO_CONTENT_PLACEHOLDER: &str = "(No content found)";

/// Subject used when the header is absent or undecodable.
const NO_SUBJECT_PLACEHOLDER: &str = "(No subject)";

/// Body shown when part content could not be decoded.
const READ_ERROR_PLACEHOLDER: &str = "(Error reading content)";

/// Marker appended to content cut off at the read limit.
const TRUNCATION_MARKER: &str = "\n\n[... Message truncated due to size ...]";

/// Bytes reserved below the read limit so the marker fits within it.
const TRUNCATION_HEADROOM: usize = 256;

/// Which body section of a fetched message a byte buffer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BodySection {
    /// The full raw message.
    Full,
    /// The TEXT-specifier section.
    Text,
    /// Any other section, by its specifier.
    Other(String),
}

/// Raw mail data handed over by the external transport: zero or more body
/// sections plus optional envelope metadata.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    /// Body sections in the order the transport produced them.
    pub sections: Vec<(BodySection, Vec<u8>)>,
    /// Envelope metadata, when the fetch included it.
    pub envelope: Option<Envelope>,
}

impl FetchedMessage {
    /// Creates an empty fetched message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body section.
    #[must_use]
    pub fn section(mut self, section: BodySection, data: Vec<u8>) -> Self {
        self.sections.push((section, data));
        self
    }

    /// Attaches envelope metadata.
    #[must_use]
    pub fn envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }
}

/// Summary metadata fetched independently of the message body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Date header, when present.
    pub date: Option<DateTime<Utc>>,
    /// Subject header, when present.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<EnvelopeAddress>,
    /// To addresses.
    pub to: Vec<EnvelopeAddress>,
}

/// Email address from envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeAddress {
    /// Display name.
    pub name: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl EnvelopeAddress {
    /// Returns the full email address when both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(mailbox), Some(host)) => Some(format!("{mailbox}@{host}")),
            _ => None,
        }
    }
}

impl fmt::Display for EnvelopeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.as_deref(), self.email()) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (None, Some(email)) => write!(f, "{email}"),
            (Some(name), None) => write!(f, "{name}"),
            (None, None) => Ok(()),
        }
    }
}

/// Bounds applied while decoding one message.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Maximum number of MIME parts walked.
    pub max_parts: usize,
    /// Maximum bytes of content read for the body.
    pub max_read_size: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_parts: 20,
            max_read_size: 1024 * 1024, // 1 MiB, sized for interactive display
        }
    }
}

/// An email message decoded from fetched raw data.
///
/// `body` is never empty: it holds real content, an envelope-only
/// placeholder, truncated content with a visible marker, or a fixed
/// "no content" marker. Attachment content is never retained, only names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Formatted sender address.
    pub from: String,
    /// Formatted recipient address list.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message date.
    pub date: DateTime<Utc>,
    /// Plain text body.
    pub body: String,
    /// Attachment filenames.
    pub attachments: Vec<String>,
}

impl IncomingMessage {
    /// Decodes a fetched message with the default bounds.
    ///
    /// # Errors
    ///
    /// See [`IncomingMessage::parse_with_limits`].
    pub fn parse(fetched: &FetchedMessage) -> Result<Self> {
        Self::parse_with_limits(fetched, DecodeLimits::default())
    }

    /// Decodes a fetched message.
    ///
    /// A message without body sections still decodes when envelope metadata
    /// is present. Header problems are recovered with defaults; only a
    /// missing body with no envelope, or broken MIME framing, fail the
    /// decode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyMessage`] if there is neither body data nor an
    /// envelope, [`Error::NoBodyFound`] if no section can be located, or
    /// [`Error::Malformed`] if the raw message cannot be parsed.
    pub fn parse_with_limits(fetched: &FetchedMessage, limits: DecodeLimits) -> Result<Self> {
        if fetched.sections.is_empty() {
            return fetched
                .envelope
                .as_ref()
                .map(Self::from_envelope)
                .ok_or(Error::EmptyMessage);
        }

        let raw = find_body_section(fetched).ok_or(Error::NoBodyFound)?;
        let entity = Message::parse(raw).map_err(|e| Error::Malformed(e.to_string()))?;

        let mut message = Self::from_headers(&entity.headers);
        extract_body_and_attachments(&entity, limits, &mut message);
        Ok(message)
    }

    /// Builds a minimal message from envelope metadata alone.
    fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            from: envelope
                .from
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
            to: format_envelope_list(&envelope.to),
            subject: envelope.subject.clone().unwrap_or_default(),
            date: envelope.date.unwrap_or_else(Utc::now),
            body: NO_BODY_PLACEHOLDER.to_string(),
            attachments: Vec::new(),
        }
    }

    /// Extracts the top-level headers, recovering each failure with a
    /// default rather than aborting the decode.
    fn from_headers(headers: &Headers) -> Self {
        let subject = headers
            .get("subject")
            .and_then(|raw| encoding::decode_rfc2047(raw.trim()).ok())
            .unwrap_or_else(|| NO_SUBJECT_PLACEHOLDER.to_string());

        let date = headers
            .get("date")
            .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
            .map_or_else(Utc::now, |parsed| parsed.with_timezone(&Utc));

        Self {
            from: decode_address_field(headers, "from"),
            to: decode_address_field(headers, "to"),
            subject,
            date,
            body: String::new(),
            attachments: Vec::new(),
        }
    }
}

/// Locates the body reader: the full raw section if present, then the TEXT
/// section, then any available section as last resort.
fn find_body_section(fetched: &FetchedMessage) -> Option<&[u8]> {
    for wanted in [BodySection::Full, BodySection::Text] {
        if let Some((_, data)) = fetched.sections.iter().find(|(section, _)| *section == wanted) {
            return Some(data);
        }
    }
    fetched.sections.first().map(|(_, data)| data.as_slice())
}

/// Parses an address-list header, falling back to an empty field.
fn decode_address_field(headers: &Headers, name: &str) -> String {
    let Some(value) = headers.get(name) else {
        return String::new();
    };
    match Address::parse_list(value) {
        Ok(list) => Address::format_list(&list),
        Err(e) => {
            warn!(field = name, error = %e, "failed to parse address header");
            String::new()
        }
    }
}

/// Walks the MIME parts in document order, taking the first non-empty
/// `text/plain` inline part as the body and recording attachment names.
///
/// The walk visits at most `limits.max_parts` parts and stops entirely once
/// a body is found; later parts, HTML included, are never consulted.
fn extract_body_and_attachments(entity: &Message, limits: DecodeLimits, message: &mut IncomingMessage) {
    let mut body = String::new();
    let mut attachments: Vec<String> = Vec::new();

    let mut queue: VecDeque<Part> = VecDeque::new();
    if let Some(raw) = &entity.body {
        queue.push_back(Part::new(entity.headers.clone(), raw.clone()));
    } else {
        queue.extend(entity.parts.iter().cloned());
    }

    let mut visited = 0;
    while let Some(part) = queue.pop_front() {
        if visited >= limits.max_parts {
            break;
        }
        visited += 1;

        // Nested multiparts contribute their children to the walk.
        if part.content_type().is_ok_and(|ct| ct.is_multipart()) {
            match part.child_parts() {
                Ok(children) => {
                    for child in children.into_iter().rev() {
                        queue.push_front(child);
                    }
                }
                Err(e) => warn!(error = %e, "skipping unreadable nested multipart"),
            }
            continue;
        }

        match part.kind() {
            Ok(PartKind::Inline { content_type }) => {
                if content_type.is_text_plain() && body.is_empty() {
                    body = read_bounded(&part, limits);
                    if !body.is_empty() {
                        break;
                    }
                }
            }
            Ok(PartKind::Attachment { filename }) => {
                attachments.push(filename.unwrap_or_else(|| "unknown-attachment".to_string()));
            }
            Err(e) => warn!(error = %e, "skipping part with invalid headers"),
        }
    }

    message.body = body;
    message.attachments = attachments;

    if message.body.is_empty() {
        message.body = NO_CONTENT_PLACEHOLDER.to_string();
    }
}

/// Reads a part's decoded content, bounded by the configured maximum.
///
/// Content at or over the limit is cut below it and marked as truncated, so
/// the returned body never exceeds the configured maximum.
fn read_bounded(part: &Part, limits: DecodeLimits) -> String {
    let decoded = match part.decode_body() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "failed to decode part content");
            return READ_ERROR_PLACEHOLDER.to_string();
        }
    };

    if decoded.len() >= limits.max_read_size {
        let keep = limits.max_read_size.saturating_sub(TRUNCATION_HEADROOM);
        let mut body = String::from_utf8_lossy(&decoded[..keep]).into_owned();
        body.push_str(TRUNCATION_MARKER);
        return body;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// Formats an envelope address list, joined with `", "`.
fn format_envelope_list(addresses: &[EnvelopeAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
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
    use crate::attachment::Attachment;
    use crate::outgoing::OutgoingMessage;

    fn full_message(raw: impl Into<Vec<u8>>) -> FetchedMessage {
        FetchedMessage::new().section(BodySection::Full, raw.into())
    }

    fn named(name: Option<&str>, mailbox: &str, host: &str) -> EnvelopeAddress {
        EnvelopeAddress {
            name: name.map(ToString::to_string),
            mailbox: Some(mailbox.to_string()),
            host: Some(host.to_string()),
        }
    }

    #[test]
    fn test_empty_message_fails() {
        assert!(matches!(
            IncomingMessage::parse(&FetchedMessage::new()),
            Err(Error::EmptyMessage)
        ));
    }

    #[test]
    fn test_envelope_only_fallback() {
        let envelope = Envelope {
            date: None,
            subject: Some("Envelope subject".to_string()),
            from: vec![named(Some("Alice"), "alice", "example.com")],
            to: vec![
                named(None, "bob", "example.com"),
                named(Some("Carol"), "carol", "example.com"),
            ],
        };
        let fetched = FetchedMessage::new().envelope(envelope);

        let message = IncomingMessage::parse(&fetched).unwrap();
        assert_eq!(message.from, "Alice <alice@example.com>");
        assert_eq!(message.to, "bob@example.com, Carol <carol@example.com>");
        assert_eq!(message.subject, "Envelope subject");
        assert_eq!(message.body, "(Message body not available)");
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: bob@example.com\r\n",
            "Subject: Hello\r\n",
            "Date: Mon, 6 Jul 2026 10:30:00 +0000\r\n",
            "Content-Type: text/plain; charset=UTF-8\r\n",
            "\r\n",
            "Plain body text."
        );

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.from, "Alice <alice@example.com>");
        assert_eq!(message.to, "bob@example.com");
        assert_eq!(message.subject, "Hello");
        assert_eq!(message.date.to_rfc2822(), "Mon, 6 Jul 2026 10:30:00 +0000");
        assert_eq!(message.body, "Plain body text.");
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_body_section_priority() {
        let text_only = concat!(
            "Content-Type: text/plain\r\n",
            "\r\n",
            "from the TEXT section"
        );
        let full = concat!(
            "Content-Type: text/plain\r\n",
            "\r\n",
            "from the full section"
        );

        let fetched = FetchedMessage::new()
            .section(BodySection::Text, text_only.into())
            .section(BodySection::Full, full.into());
        let message = IncomingMessage::parse(&fetched).unwrap();
        assert_eq!(message.body, "from the full section");

        let fetched = FetchedMessage::new()
            .section(BodySection::Other("2.1".to_string()), text_only.into())
            .section(BodySection::Text, full.into());
        let message = IncomingMessage::parse(&fetched).unwrap();
        assert_eq!(message.body, "from the full section");
    }

    #[test]
    fn test_malformed_framing_fails() {
        let fetched = full_message("this is not a header block\r\n\r\nbody");
        assert!(matches!(
            IncomingMessage::parse(&fetched),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_header_defaults() {
        let raw = concat!(
            "From: broken <<>\r\n",
            "Date: not a date\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "content"
        );

        let before = Utc::now();
        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        let after = Utc::now();

        assert_eq!(message.from, ""); // fail-soft, never aborts the decode
        assert_eq!(message.subject, "(No subject)");
        assert!(message.date >= before - chrono::Duration::seconds(1));
        assert!(message.date <= after + chrono::Duration::seconds(1));
        assert_eq!(message.body, "content");
    }

    #[test]
    fn test_encoded_subject_is_decoded() {
        let raw = concat!(
            "Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "x"
        );
        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.subject, "Grüße");
    }

    #[test]
    fn test_plain_text_preferred_over_html() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=alt\r\n",
            "\r\n",
            "--alt\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain wins\r\n",
            "--alt\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html loses</p>\r\n",
            "--alt--\r\n"
        );

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.body, "plain wins");
        assert!(!message.body.contains("html"));
    }

    #[test]
    fn test_attachment_names_recorded_without_content() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=mix\r\n",
            "\r\n",
            "--mix\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "Content-Type: application/pdf\r\n",
            "\r\n",
            "%PDF-fake-bytes\r\n",
            "--mix\r\n",
            "Content-Disposition: attachment\r\n",
            "Content-Type: application/octet-stream\r\n",
            "\r\n",
            "mystery\r\n",
            "--mix\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "body text\r\n",
            "--mix--\r\n"
        );

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.attachments, vec!["report.pdf", "unknown-attachment"]);
        assert_eq!(message.body, "body text");
        assert!(!message.body.contains("%PDF"));
    }

    #[test]
    fn test_no_content_placeholder() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=mix\r\n",
            "\r\n",
            "--mix\r\n",
            "Content-Disposition: attachment; filename=\"only.bin\"\r\n",
            "\r\n",
            "data\r\n",
            "--mix--\r\n"
        );

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.body, "(No content found)");
        assert_eq!(message.attachments, vec!["only.bin"]);
    }

    #[test]
    fn test_part_walk_is_bounded() {
        let mut raw = String::from("Content-Type: multipart/mixed; boundary=mix\r\n\r\n");
        for i in 0..100 {
            raw.push_str("--mix\r\n");
            raw.push_str(&format!(
                "Content-Disposition: attachment; filename=\"file-{i}.bin\"\r\n\r\nx\r\n"
            ));
        }
        raw.push_str("--mix\r\nContent-Type: text/plain\r\n\r\nburied body\r\n--mix--\r\n");

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        // The walk gave up before reaching the buried text part.
        assert_eq!(message.body, "(No content found)");
        assert_eq!(message.attachments.len(), 20);
    }

    #[test]
    fn test_truncation_marker_and_bound() {
        let limits = DecodeLimits {
            max_parts: 20,
            max_read_size: 1024,
        };
        let raw = format!(
            "Content-Type: text/plain\r\n\r\n{}",
            "a".repeat(4096)
        );

        let message =
            IncomingMessage::parse_with_limits(&full_message(raw), limits).unwrap();
        assert!(message.body.ends_with("[... Message truncated due to size ...]"));
        assert!(message.body.len() <= limits.max_read_size);
    }

    #[test]
    fn test_undecodable_content_yields_read_error_placeholder() {
        let raw = concat!(
            "Content-Type: text/plain\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "!!!! not base64 !!!!"
        );

        let message = IncomingMessage::parse(&full_message(raw)).unwrap();
        assert_eq!(message.body, "(Error reading content)");
    }

    #[test]
    fn test_round_trip_with_encoder() {
        let outgoing = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("Round trip")
            .text_body("The quick brown fox\njumps over the lazy dog.");

        let raw = outgoing.encode().unwrap();
        let message = IncomingMessage::parse(&full_message(raw)).unwrap();

        assert_eq!(message.subject, "Round trip");
        assert_eq!(
            message.body,
            "The quick brown fox\r\njumps over the lazy dog."
        );
        assert_eq!(message.from, "sender@example.com");
    }

    #[test]
    fn test_round_trip_with_attachments() {
        let outgoing = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("Files")
            .text_body("Two files attached.")
            .attach(Attachment::from_bytes("a.bin", "", vec![1, 2, 3]))
            .attach(Attachment::from_bytes("b.txt", "text/plain", b"text".to_vec()));

        let raw = outgoing.encode().unwrap();
        let message = IncomingMessage::parse(&full_message(raw)).unwrap();

        assert_eq!(message.body, "Two files attached.");
        assert_eq!(message.attachments, Vec::<String>::new());
        // The walk stops at the text body; attachments after it are not
        // visited. Decoding the same message with the body part removed
        // surfaces the names instead (see the attachment tests above).
    }
}
