//! Outgoing message model and wire-format encoding.

use crate::attachment::Attachment;
use crate::error::{Error, Result};
use chrono::Utc;
use mailforge_mime::{Address, ContentType, Headers, TransferEncoding, encoding, ident};

/// Fields carrying address lists, re-serialized canonically at emission.
const ADDRESS_FIELDS: [&str; 5] = ["From", "To", "Cc", "Bcc", "Reply-To"];

/// Fields emitted verbatim (already structured MIME values).
const VERBATIM_FIELDS: [&str; 2] = ["Content-Type", "Content-Disposition"];

/// Well-known fields where caller-supplied values take precedence over
/// generated ones.
const PRESET_FIELDS: [&str; 8] = [
    "Reply-To",
    "To",
    "Cc",
    "From",
    "Subject",
    "Date",
    "Message-Id",
    "MIME-Version",
];

/// An email message to send.
///
/// The composing caller mutates the message up to encode/send time; `encode`
/// borrows it immutably and builds only call-local buffers.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Additional caller-supplied headers; values here take precedence over
    /// generated ones.
    pub headers: Headers,
    /// Sender address (exactly one).
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    pub cc: Vec<String>,
    /// BCC addresses (envelope only; never emitted as a header).
    pub bcc: Vec<String>,
    /// Reply-To addresses.
    pub reply_to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: Vec<u8>,
    /// Attachments, in order.
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Creates a new outgoing message. The sender address comes from the
    /// caller's credential store.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            headers: Headers::new(),
            from: from.into(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: String::new(),
            text: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Adds a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: impl Into<String>) -> Self {
        self.bcc.push(recipient.into());
        self
    }

    /// Adds a Reply-To address.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to.push(address.into());
        self
    }

    /// Sets the subject line.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = text.into().into_bytes();
        self
    }

    /// Adds an extra header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Reads a file and adds it as an attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentRead`] if the file cannot be read.
    pub fn attach_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.attachments.push(Attachment::from_file(path)?);
        Ok(self)
    }

    /// Encodes the message into an RFC 822/2045/2046 byte stream.
    ///
    /// Messages with attachments become `multipart/mixed`; when a text body
    /// is also present it is nested in its own `multipart/alternative`
    /// sub-part. Messages without attachments are `text/plain` with
    /// quoted-printable transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressFormat`] if an address header fails to parse,
    /// or a MIME error if identifier generation fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4096);
        let mut headers = self.format_headers()?;

        let boundary = if self.attachments.is_empty() {
            None
        } else {
            Some(ident::boundary())
        };

        match &boundary {
            Some(outer) => {
                headers.set(
                    "Content-Type",
                    ContentType::multipart_mixed(outer.clone()).to_string(),
                );
            }
            None => {
                headers.set("Content-Type", ContentType::text_plain().to_string());
                headers.set(
                    "Content-Transfer-Encoding",
                    TransferEncoding::QuotedPrintable.to_string(),
                );
            }
        }

        write_header_block(&mut buf, &headers)?;
        buf.extend_from_slice(b"\r\n");

        match &boundary {
            None => {
                if !self.text.is_empty() {
                    buf.extend_from_slice(encoding::encode_quoted_printable(&self.text).as_bytes());
                }
            }
            Some(outer) => {
                let mut first = true;

                if !self.text.is_empty() {
                    let inner = ident::boundary();
                    let mut alternative = Headers::new();
                    alternative.set(
                        "Content-Type",
                        ContentType::multipart_alternative(inner.clone()).to_string(),
                    );
                    open_part(&mut buf, outer, first, &alternative)?;
                    first = false;

                    let mut text_headers = Headers::new();
                    text_headers.set("Content-Type", ContentType::text_plain().to_string());
                    text_headers.set(
                        "Content-Transfer-Encoding",
                        TransferEncoding::QuotedPrintable.to_string(),
                    );
                    open_part(&mut buf, &inner, true, &text_headers)?;
                    buf.extend_from_slice(encoding::encode_quoted_printable(&self.text).as_bytes());
                    close_multipart(&mut buf, &inner);
                }

                for attachment in &self.attachments {
                    open_part(&mut buf, outer, first, &attachment.part_headers())?;
                    first = false;
                    attachment.write_body(&mut buf);
                }

                close_multipart(&mut buf, outer);
            }
        }

        Ok(buf)
    }

    /// Assembles the top-level header set: caller-supplied values first,
    /// then generated defaults for anything still missing.
    fn format_headers(&self) -> Result<Headers> {
        let mut headers = Headers::new();

        for field in PRESET_FIELDS {
            for value in self.headers.get_all(field) {
                headers.add(field, value);
            }
        }

        if headers.get("Reply-To").is_none() {
            let reply_to = sanitize_addresses(&self.reply_to);
            if !reply_to.is_empty() {
                headers.set("Reply-To", reply_to.join(", "));
            }
        }
        if headers.get("To").is_none() {
            let to = sanitize_addresses(&self.to);
            if !to.is_empty() {
                headers.set("To", to.join(", "));
            }
        }
        if headers.get("Cc").is_none() {
            let cc = sanitize_addresses(&self.cc);
            if !cc.is_empty() {
                headers.set("Cc", cc.join(", "));
            }
        }
        if headers.get("Subject").is_none() {
            let subject = sanitize_header(&self.subject);
            if !subject.is_empty() {
                headers.set("Subject", subject);
            }
        }
        if headers.get("Message-Id").is_none() {
            headers.set("Message-Id", ident::message_id()?);
        }
        // Date and From are required headers.
        if headers.get("From").is_none() {
            headers.set("From", self.from.clone());
        }
        if headers.get("Date").is_none() {
            headers.set("Date", Utc::now().to_rfc2822());
        }
        if headers.get("MIME-Version").is_none() {
            headers.set("MIME-Version", "1.0");
        }

        for (name, values) in self.headers.entries() {
            if headers.get(&name).is_none() {
                for value in values {
                    headers.add(name.clone(), value.clone());
                }
            }
        }

        Ok(headers)
    }
}

/// Emits one `Field: value\r\n` line per header value, applying the
/// per-field encoding rules.
fn write_header_block(buf: &mut Vec<u8>, headers: &Headers) -> Result<()> {
    for (name, values) in headers.entries() {
        for value in values {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(encode_header_value(&name, value)?.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }
    Ok(())
}

/// Applies the emission rule for one header value: structured MIME fields
/// verbatim, address fields parsed and re-serialized canonically, everything
/// else RFC 2047-encoded when needed.
fn encode_header_value(name: &str, value: &str) -> Result<String> {
    if VERBATIM_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        return Ok(value.to_string());
    }

    if ADDRESS_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        let list = Address::parse_list(value).map_err(|e| Error::AddressFormat {
            address: value.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(Address::format_list(&list));
    }

    encoding::encode_rfc2047(value, "UTF-8").map_err(Error::from)
}

/// Opens a new part: delimiter line, part headers, blank line.
fn open_part(buf: &mut Vec<u8>, boundary: &str, first: bool, headers: &Headers) -> Result<()> {
    if !first {
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"--");
    buf.extend_from_slice(boundary.as_bytes());
    buf.extend_from_slice(b"\r\n");
    write_header_block(buf, headers)?;
    buf.extend_from_slice(b"\r\n");
    Ok(())
}

/// Writes the closing delimiter of a multipart body.
fn close_multipart(buf: &mut Vec<u8>, boundary: &str) {
    buf.extend_from_slice(b"\r\n--");
    buf.extend_from_slice(boundary.as_bytes());
    buf.extend_from_slice(b"--\r\n");
}

/// Folds CR/LF out of a header value so it cannot smuggle extra lines.
fn sanitize_header(value: &str) -> String {
    value
        .trim()
        .replace("\r\n", " ")
        .replace('\n', " ")
        .replace('\r', " ")
}

/// Trims address entries and drops empty ones.
pub(crate) fn sanitize_addresses(addresses: &[String]) -> Vec<String> {
    addresses
        .iter()
        .map(|addr| addr.trim())
        .filter(|addr| !addr.is_empty())
        .map(ToString::to_string)
        .collect()
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
    use mailforge_mime::Message;

    fn encoded_text(msg: &OutgoingMessage) -> String {
        String::from_utf8(msg.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_encode_plain_text_message() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("Greetings")
            .text_body("Hello there!");

        let text = encoded_text(&msg);
        assert!(text.contains("From: sender@example.com\r\n"));
        assert!(text.contains("To: recipient@example.com\r\n"));
        assert!(text.contains("Subject: Greetings\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(text.contains("Mime-Version: 1.0\r\n"));
        assert!(text.contains("Message-Id: <"));
        assert!(text.contains("Date: "));
        assert!(text.ends_with("\r\n\r\nHello there!"));
    }

    #[test]
    fn test_encode_uses_crlf_throughout() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .text_body("line one\nline two");

        let raw = msg.encode().unwrap();
        let text = String::from_utf8(raw).unwrap();
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_encode_preserves_caller_headers() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .header("Date", "Thu, 01 Jan 2026 00:00:00 +0000")
            .header("X-Mailer", "mailforge");

        let text = encoded_text(&msg);
        assert!(text.contains("Date: Thu, 01 Jan 2026 00:00:00 +0000\r\n"));
        assert!(text.contains("X-Mailer: mailforge\r\n"));
    }

    #[test]
    fn test_encode_canonicalizes_addresses() {
        let msg = OutgoingMessage::new("  Jane Doe <jane@example.com>  ")
            .to("john@example.com")
            .to("Bob <bob@example.com>");

        let text = encoded_text(&msg);
        assert!(text.contains("From: Jane Doe <jane@example.com>\r\n"));
        assert!(text.contains("To: john@example.com, Bob <bob@example.com>\r\n"));
    }

    #[test]
    fn test_encode_rejects_malformed_address() {
        let msg = OutgoingMessage::new("not-an-address").to("recipient@example.com");
        assert!(matches!(
            msg.encode(),
            Err(Error::AddressFormat { .. })
        ));
    }

    #[test]
    fn test_encode_non_ascii_subject() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("Grüße aus Köln");

        let text = encoded_text(&msg);
        assert!(text.contains("Subject: =?UTF-8?B?"));
    }

    #[test]
    fn test_encode_sanitizes_subject_line_breaks() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("evil\r\nX-Injected: yes");

        let text = encoded_text(&msg);
        assert!(text.contains("Subject: evil X-Injected: yes\r\n"));
        assert!(!text.contains("\r\nX-Injected:"));
    }

    #[test]
    fn test_encode_omits_bcc_header() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .bcc("hidden@example.com");

        assert!(!encoded_text(&msg).contains("hidden@example.com"));
    }

    #[test]
    fn test_encode_with_attachment_builds_multipart_mixed() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .subject("With file")
            .text_body("See attachment.")
            .attach(Attachment::from_bytes("data.bin", "", vec![0u8; 200]));

        let raw = msg.encode().unwrap();
        let message = Message::parse(&raw).unwrap();

        let content_type = message.content_type().unwrap();
        assert!(content_type.is_multipart());
        assert_eq!(content_type.sub_type, "mixed");
        assert_eq!(message.parts.len(), 2);

        // The text body is nested in its own multipart/alternative sub-part.
        let alternative = message.parts[0].content_type().unwrap();
        assert_eq!(alternative.sub_type, "alternative");
        let children = message.parts[0].child_parts().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].body_text().unwrap(), "See attachment.");

        let attachment = &message.parts[1];
        assert_eq!(
            attachment.headers.get("Content-Type"),
            Some("application/octet-stream")
        );
        assert_eq!(attachment.decode_body().unwrap(), vec![0u8; 200]);
    }

    #[test]
    fn test_encode_attachment_lines_within_limit() {
        for size in [0usize, 1, 56, 57, 58, 1000] {
            let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let msg = OutgoingMessage::new("sender@example.com")
                .to("recipient@example.com")
                .attach(Attachment::from_bytes("blob.bin", "", content.clone()));

            let raw = msg.encode().unwrap();
            let message = Message::parse(&raw).unwrap();
            let body = String::from_utf8(message.parts[0].body.clone()).unwrap();

            for line in body.split_terminator("\r\n") {
                assert!(line.len() <= 76, "overlong line at size {size}: {line:?}");
            }
            assert_eq!(message.parts[0].decode_body().unwrap(), content);
        }
    }

    #[test]
    fn test_encode_attachment_only_message() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("recipient@example.com")
            .attach(Attachment::from_bytes("a.txt", "text/plain", b"abc".to_vec()));

        let raw = msg.encode().unwrap();
        let message = Message::parse(&raw).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(
            message.parts[0].headers.get("Content-Disposition"),
            Some("attachment; filename=\"a.txt\"")
        );
    }
}
