//! Error types for the core codec.

use thiserror::Error;

/// Errors that can occur while encoding, validating, or decoding messages.
#[derive(Debug, Error)]
pub enum Error {
    /// No message was supplied to validate or send.
    #[error("Cannot send a missing message")]
    MissingMessage,

    /// The message has no recipient in To, Cc, or Bcc.
    #[error("Message must have at least one recipient")]
    NoRecipients,

    /// An address failed to parse at encode or send time.
    #[error("Invalid address {address:?}: {reason}")]
    AddressFormat {
        /// The offending address value.
        address: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// An attachment source could not be read.
    #[error("Cannot read attachment {path}: {source}")]
    AttachmentRead {
        /// Path of the unreadable source.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A fetched message carried neither body data nor envelope metadata.
    #[error("Message has no body parts")]
    EmptyMessage,

    /// No body section could be located in a fetched message.
    #[error("No message body found")]
    NoBodyFound,

    /// The raw message's header or MIME framing is structurally broken.
    #[error("Failed to parse message: {0}")]
    Malformed(String),

    /// MIME-level failure while generating a message.
    #[error("MIME error: {0}")]
    Mime(#[from] mailforge_mime::Error),

    /// The injected transport reported a delivery failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
