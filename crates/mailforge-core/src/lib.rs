//! # mailforge-core
//!
//! Message models and the MIME mail codec: outgoing message encoding,
//! incoming message decoding, and send-time validation.
//!
//! The codec is synchronous and free of shared state; each encode or decode
//! call owns only the buffers it builds. Network transport and credential
//! storage are external collaborators — the transport is injected through
//! the [`MailTransport`] trait, and the authenticated sender address is
//! passed to [`OutgoingMessage::new`].
//!
//! ## Sending
//!
//! ```ignore
//! use mailforge_core::{Attachment, OutgoingMessage, send_message};
//!
//! let message = OutgoingMessage::new("me@example.com")
//!     .to("you@example.com")
//!     .subject("Quarterly report")
//!     .text_body("Attached.")
//!     .attach(Attachment::from_file("report.pdf")?);
//!
//! send_message(&mut transport, Some(&message))?;
//! ```
//!
//! ## Decoding
//!
//! ```ignore
//! use mailforge_core::{BodySection, FetchedMessage, IncomingMessage};
//!
//! let fetched = FetchedMessage::new().section(BodySection::Full, raw_bytes);
//! let message = IncomingMessage::parse(&fetched)?;
//! println!("{}: {}", message.from, message.subject);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod error;
mod incoming;
mod outgoing;
mod send;

pub use attachment::Attachment;
pub use error::{Error, Result};
pub use incoming::{
    BodySection, DecodeLimits, Envelope, EnvelopeAddress, FetchedMessage, IncomingMessage,
};
pub use outgoing::OutgoingMessage;
pub use send::{MailTransport, quick_send, send_message, validate_for_send};
