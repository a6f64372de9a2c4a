//! # mailforge-mime
//!
//! MIME message parsing and generation primitives for email.
//!
//! ## Features
//!
//! - **Raw-message parsing**: Header blocks, multipart splitting, nested
//!   parts
//! - **Encoding/Decoding**: Base64 (plain and RFC 2045 line-wrapped),
//!   Quoted-Printable, RFC 2047 header encoding
//! - **Addresses**: Parsing and canonical serialization of mailbox lists
//! - **Identifiers**: Message-ID and multipart boundary generation
//!
//! ## Quick Start
//!
//! ### Parsing MIME Messages
//!
//! ```ignore
//! use mailforge_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! println!("Subject: {}", message.subject().unwrap_or("(no subject)"));
//! ```
//!
//! ### Encoding
//!
//! ```ignore
//! use mailforge_mime::encoding::{encode_base64_wrapped, encode_quoted_printable};
//!
//! let mut part_body = Vec::new();
//! encode_base64_wrapped(b"attachment bytes", &mut part_body);
//!
//! let text = encode_quoted_printable("Héllo, Wørld!".as_bytes());
//! ```
//!
//! ### Addresses and Identifiers
//!
//! ```ignore
//! use mailforge_mime::{Address, ident};
//!
//! let list = Address::parse_list("Alice <alice@example.com>, bob@example.com")?;
//! let header_value = Address::format_list(&list);
//!
//! let message_id = ident::message_id()?;
//! let boundary = ident::boundary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;
pub mod ident;

pub use address::Address;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, PartKind, TransferEncoding};
