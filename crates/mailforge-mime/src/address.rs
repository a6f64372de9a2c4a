//! Email address parsing and formatting.

use crate::encoding::{decode_rfc2047, encode_rfc2047};
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox: optional display name plus a `local@domain` address.
///
/// Displaying an `Address` yields the canonical serialization (`Name
/// <local@domain>` or the bare address), with display names quoted or RFC
/// 2047-encoded as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    name: Option<String>,
    email: String,
}

impl Address {
    /// Creates an address without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is structurally invalid.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        Self::validate(&email)?;
        Ok(Self { name: None, email })
    }

    /// Creates an address with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is structurally invalid.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        Self::validate(&email)?;
        Ok(Self {
            name: Some(name.into()),
            email,
        })
    }

    /// Parses a single address: `Name <a@b>`, `<a@b>`, or `a@b`.
    ///
    /// RFC 2047-encoded display names are decoded; a name that fails to
    /// decode is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or the address part is
    /// structurally invalid.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".to_string()));
        }

        let Some(open) = input.rfind('<') else {
            return Self::new(input);
        };

        let close = input
            .rfind('>')
            .filter(|close| *close > open)
            .ok_or_else(|| Error::InvalidAddress(format!("Unclosed angle bracket: {input}")))?;

        let email = input[open + 1..close].trim().to_string();
        Self::validate(&email)?;

        let raw_name = input[..open].trim().trim_matches('"').trim();
        let name = if raw_name.is_empty() {
            None
        } else {
            Some(decode_rfc2047(raw_name).unwrap_or_else(|_| raw_name.to_string()))
        };

        Ok(Self { name, email })
    }

    /// Parses a comma-separated address list, skipping empty entries.
    ///
    /// # Errors
    ///
    /// Returns an error on the first entry that fails to parse.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        input
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Serializes an address list, joined with `", "`.
    #[must_use]
    pub fn format_list(addresses: &[Self]) -> String {
        addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns the bare `local@domain` address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Validates a bare email address (structural validation).
    fn validate(email: &str) -> Result<()> {
        if email.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".to_string()));
        }

        if email.contains(|c: char| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {email}"
            )));
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {email}"
            )));
        }

        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {email}"
            )));
        }

        Ok(())
    }
}

/// True when a display name can be emitted without quoting.
fn is_plain_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "{}", self.email),
            Some(name) if !name.is_ascii() => {
                let encoded =
                    encode_rfc2047(name, "UTF-8").unwrap_or_else(|_| name.clone());
                write!(f, "{encoded} <{}>", self.email)
            }
            Some(name) if is_plain_name(name) => write!(f, "{name} <{}>", self.email),
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.email)
            }
        }
    }
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
    fn test_parse_bare_address() {
        let addr = Address::parse("user@example.com").unwrap();
        assert_eq!(addr.email(), "user@example.com");
        assert!(addr.name().is_none());
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_parse_named_address() {
        let addr = Address::parse("John Doe <john@example.com>").unwrap();
        assert_eq!(addr.email(), "john@example.com");
        assert_eq!(addr.name(), Some("John Doe"));
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = Address::parse("\"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(addr.name(), Some("Doe, John"));
        assert_eq!(addr.to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_parse_encoded_name() {
        let addr = Address::parse("=?utf-8?B?SMOpbMOobmU=?= <helene@example.com>").unwrap();
        assert_eq!(addr.name(), Some("Hélène"));
        assert!(addr.to_string().starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_parse_angle_only() {
        let addr = Address::parse("<user@example.com>").unwrap();
        assert_eq!(addr.email(), "user@example.com");
        assert!(addr.name().is_none());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("userexample.com").is_err());
        assert!(Address::parse("@example.com").is_err());
        assert!(Address::parse("user@").is_err());
        assert!(Address::parse("a@b@c").is_err());
        assert!(Address::parse("Name <user@>").is_err());
        assert!(Address::parse("Name <user@example.com").is_err());
    }

    #[test]
    fn test_parse_list() {
        let list = Address::parse_list("a@example.com, Bob <b@example.com>, ,").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            Address::format_list(&list),
            "a@example.com, Bob <b@example.com>"
        );
    }

    #[test]
    fn test_parse_list_fails_fast() {
        assert!(Address::parse_list("good@example.com, bad").is_err());
    }

    #[test]
    fn test_constructors() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.to_string(), "user@example.com");

        let addr = Address::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");

        assert!(Address::new("no-at-sign").is_err());
        assert!(Address::with_name("Name", "user example@com").is_err());
    }
}
