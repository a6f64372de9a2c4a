//! MIME header handling.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Collection of email headers.
///
/// Lookup is case-insensitive; a field may carry multiple values. Wire
/// emission produces one `Field: value` line per value, CRLF-terminated, in
/// sorted field order so output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.insert(name, vec![value]);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.headers.remove(&name.to_lowercase());
    }

    /// Returns `(canonical name, values)` pairs sorted by field name.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, &[String])> {
        let mut entries: Vec<_> = self
            .headers
            .iter()
            .map(|(name, values)| (canonical_name(name), values.as_slice()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    /// Returns an iterator over all `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Parses headers from raw text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///  continuation line
    /// ```
    ///
    /// An empty line ends the header block.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is neither a `name: value` field nor a
    /// continuation of the previous field.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_none() {
                    return Err(Error::InvalidHeader(line.to_string()));
                }
                current_value.push(' ');
                current_value.push_str(line.trim());
                continue;
            }

            // Save previous header if exists
            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim().to_string());
                current_value.clear();
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::InvalidHeader(line.to_string()));
            };
            current_name = Some(name.trim().to_string());
            current_value = value.trim().to_string();
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        Ok(headers)
    }
}

/// Canonicalizes a field name (`content-type` -> `Content-Type`).
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in self.entries() {
            for value in values {
                write!(f, "{name}: {value}\r\n")?;
            }
        }
        Ok(())
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("To", "charlie@example.com");
        assert_eq!(headers.get_all("To").len(), 1);
        assert_eq!(headers.get("To"), Some("charlie@example.com"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        assert!(headers.get("Subject").is_some());

        headers.remove("Subject");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("this line has no colon\r\n").is_err());
        assert!(Headers::parse(" starts with continuation\r\n").is_err());
    }

    #[test]
    fn test_headers_display_is_crlf_wire_format() {
        let mut headers = Headers::new();
        headers.add("from", "sender@example.com");
        headers.add("mime-version", "1.0");

        let s = headers.to_string();
        assert_eq!(s, "From: sender@example.com\r\nMime-Version: 1.0\r\n");
    }

    #[test]
    fn test_headers_entries_sorted_with_canonical_names() {
        let mut headers = Headers::new();
        headers.add("subject", "hi");
        headers.add("content-transfer-encoding", "base64");

        let entries = headers.entries();
        assert_eq!(entries[0].0, "Content-Transfer-Encoding");
        assert_eq!(entries[1].0, "Subject");
    }

    #[test]
    fn test_headers_iter() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        let mut count = 0;
        for (name, value) in headers.iter() {
            assert!(!name.is_empty());
            assert!(!value.is_empty());
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
