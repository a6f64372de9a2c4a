//! Send-time validation and the transport handoff seam.

use crate::error::{Error, Result};
use crate::outgoing::{OutgoingMessage, sanitize_addresses};
use mailforge_mime::Address;
use tracing::debug;

/// Delivery seam for the external mail transport.
///
/// The codec assumes nothing about the protocol behind this trait: it hands
/// over a canonical sender address, the merged recipient list, and the
/// encoded byte stream, and the transport does the rest. Constructing a
/// transport and passing it in keeps delivery free of global state.
pub trait MailTransport {
    /// Delivers an encoded message to the given recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails; the codec surfaces it unchanged.
    fn deliver(&mut self, from: &str, recipients: &[String], raw: &[u8]) -> Result<()>;
}

/// Validates a message immediately before transport handoff.
///
/// The message must be present, carry at least one recipient across
/// To/Cc/Bcc, and every address (sender included) must parse. Any invalid
/// address fails the entire send; there is no partial delivery.
///
/// # Errors
///
/// Returns [`Error::MissingMessage`], [`Error::NoRecipients`], or
/// [`Error::AddressFormat`].
pub fn validate_for_send(message: Option<&OutgoingMessage>) -> Result<()> {
    let message = message.ok_or(Error::MissingMessage)?;
    merged_recipients(message).map(|_| ())
}

/// Validates, encodes, and hands the message to the transport.
///
/// # Errors
///
/// Returns a validation error before any transport I/O, an encode error, or
/// whatever the transport reports.
pub fn send_message(
    transport: &mut dyn MailTransport,
    message: Option<&OutgoingMessage>,
) -> Result<()> {
    let message = message.ok_or(Error::MissingMessage)?;
    let recipients = merged_recipients(message)?;
    let sender = parse_address(&message.from)?.email().to_string();

    let raw = message.encode()?;

    debug!(
        from = %sender,
        recipients = recipients.len(),
        bytes = raw.len(),
        "handing message to transport"
    );
    transport.deliver(&sender, &recipients, &raw)
}

/// One-call convenience for a plain text message to a single recipient.
///
/// # Errors
///
/// Returns any error `send_message` would.
pub fn quick_send(
    transport: &mut dyn MailTransport,
    from: impl Into<String>,
    to: impl Into<String>,
    subject: impl Into<String>,
    body: impl Into<String>,
) -> Result<()> {
    let message = OutgoingMessage::new(from)
        .to(to)
        .subject(subject)
        .text_body(body);
    send_message(transport, Some(&message))
}

/// Merges To, Cc, and Bcc into the transport recipient list, in that order,
/// as canonical bare addresses.
///
/// Duplicates across the three lists are passed through unchanged.
fn merged_recipients(message: &OutgoingMessage) -> Result<Vec<String>> {
    let mut entries = sanitize_addresses(&message.to);
    entries.extend(sanitize_addresses(&message.cc));
    entries.extend(sanitize_addresses(&message.bcc));

    if entries.is_empty() {
        return Err(Error::NoRecipients);
    }

    parse_address(&message.from)?;

    let mut recipients = Vec::with_capacity(entries.len());
    for entry in entries {
        recipients.push(parse_address(&entry)?.email().to_string());
    }
    Ok(recipients)
}

fn parse_address(input: &str) -> Result<Address> {
    Address::parse(input).map_err(|e| Error::AddressFormat {
        address: input.to_string(),
        reason: e.to_string(),
    })
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

    /// Transport double that records what it was handed.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        deliveries: Vec<(String, Vec<String>, Vec<u8>)>,
    }

    impl MailTransport for RecordingTransport {
        fn deliver(&mut self, from: &str, recipients: &[String], raw: &[u8]) -> Result<()> {
            self.deliveries
                .push((from.to_string(), recipients.to_vec(), raw.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_validate_missing_message() {
        assert!(matches!(
            validate_for_send(None),
            Err(Error::MissingMessage)
        ));
    }

    #[test]
    fn test_validate_no_recipients() {
        let msg = OutgoingMessage::new("sender@example.com");
        assert!(matches!(
            validate_for_send(Some(&msg)),
            Err(Error::NoRecipients)
        ));
    }

    #[test]
    fn test_validate_succeeds_without_subject() {
        let msg = OutgoingMessage::new("sender@example.com").to("recipient@example.com");
        assert!(validate_for_send(Some(&msg)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_recipient() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("good@example.com")
            .cc("not-an-address");
        assert!(matches!(
            validate_for_send(Some(&msg)),
            Err(Error::AddressFormat { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_sender() {
        let msg = OutgoingMessage::new("nope").to("recipient@example.com");
        assert!(matches!(
            validate_for_send(Some(&msg)),
            Err(Error::AddressFormat { .. })
        ));
    }

    #[test]
    fn test_send_merges_recipients_keeping_duplicates() {
        let msg = OutgoingMessage::new("sender@example.com")
            .to("a@example.com")
            .cc("Bee <b@example.com>")
            .bcc("a@example.com");

        let mut transport = RecordingTransport::default();
        send_message(&mut transport, Some(&msg)).unwrap();

        let (from, recipients, raw) = &transport.deliveries[0];
        assert_eq!(from, "sender@example.com");
        assert_eq!(recipients, &["a@example.com", "b@example.com", "a@example.com"]);
        let raw = std::str::from_utf8(raw).unwrap();
        assert!(raw.contains("From: sender@example.com\r\n"));
    }

    #[test]
    fn test_send_does_not_reach_transport_on_invalid_message() {
        let msg = OutgoingMessage::new("sender@example.com");
        let mut transport = RecordingTransport::default();
        assert!(send_message(&mut transport, Some(&msg)).is_err());
        assert!(transport.deliveries.is_empty());
    }

    #[test]
    fn test_quick_send() {
        let mut transport = RecordingTransport::default();
        quick_send(
            &mut transport,
            "sender@example.com",
            "recipient@example.com",
            "Hi",
            "Short note.",
        )
        .unwrap();

        assert_eq!(transport.deliveries.len(), 1);
        let raw = String::from_utf8(transport.deliveries[0].2.clone()).unwrap();
        assert!(raw.contains("Subject: Hi\r\n"));
        assert!(raw.ends_with("Short note."));
    }
}
