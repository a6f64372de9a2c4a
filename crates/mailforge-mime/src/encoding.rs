//! MIME transfer encodings.
//!
//! Supports Base64 (plain and RFC 2045 line-wrapped), Quoted-Printable, and
//! RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length per RFC 2045.
pub const MAX_LINE_LENGTH: usize = 76;

/// Raw bytes consumed per 76-character base64 line.
const BASE64_LINE_INPUT: usize = 57;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Encodes data as Base64 wrapped to 76-character lines (RFC 2045 §6.8).
///
/// Input is consumed in 57-byte chunks, each producing one CRLF-terminated
/// line. The final partial chunk is encoded and CRLF-terminated the same way;
/// empty input produces no lines.
pub fn encode_base64_wrapped(data: &[u8], out: &mut Vec<u8>) {
    for chunk in data.chunks(BASE64_LINE_INPUT) {
        out.extend_from_slice(STANDARD.encode(chunk).as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

/// Encodes content using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (`\r\n` or bare `\n`) are preserved as hard CRLF
/// breaks; everything else that is not printable ASCII is escaped. Soft line
/// breaks keep encoded lines within the RFC 2045 limit.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();
    let mut line_length = 0;

    let mut iter = data.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        // Hard line breaks pass through and reset the line counter.
        if byte == b'\r' && iter.peek() == Some(&b'\n') {
            continue;
        }
        if byte == b'\n' {
            result.push_str("\r\n");
            line_length = 0;
            continue;
        }

        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        match byte {
            // Printable ASCII except '=' and space
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(byte as char);
                line_length += 1;
            }
            // Space is kept readable unless it would land at the line end
            b' ' => {
                if line_length >= MAX_LINE_LENGTH - 1 {
                    result.push_str("=20");
                    line_length += 3;
                } else {
                    result.push(' ');
                    line_length += 1;
                }
            }
            _ => {
                result.push('=');
                let _ = write!(result, "{byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Decodes Quoted-Printable content (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'=' {
            // Soft line break
            if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
                i += 3;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'\n') {
                i += 2;
                continue;
            }

            // Hex encoded byte
            let hex = bytes.get(i + 1..i + 3).ok_or_else(|| {
                Error::InvalidEncoding("Incomplete escape sequence".to_string())
            })?;
            let hex = std::str::from_utf8(hex)
                .map_err(|_| Error::InvalidEncoding("Invalid hex digits".to_string()))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?encoding?encoded-text?=`. Plain ASCII values that
/// cannot be mistaken for an encoded word pass through unchanged.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    if text.is_ascii() && !text.contains("=?") {
        return Ok(text.to_string());
    }

    // Base64 encoded words (Q encoding is more complex)
    let encoded = encode_base64(text.as_bytes());
    Ok(format!("=?{charset}?B?{encoded}?="))
}

/// Decodes an RFC 2047 encoded header value.
///
/// Values that are not encoded words are returned unchanged.
///
/// # Errors
///
/// Returns an error if the input is a malformed encoded word.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.starts_with("=?") || !text.ends_with("?=") {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            // Quoted-Printable with underscore standing in for space
            let text_with_spaces = encoded_text.replace('_', " ");
            let decoded = decode_quoted_printable(&text_with_spaces)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_line_lengths() {
        for size in [0usize, 1, 56, 57, 58, 1000] {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut out = Vec::new();
            encode_base64_wrapped(&data, &mut out);

            let text = String::from_utf8(out.clone()).unwrap();
            let mut concatenated = String::new();
            for line in text.split_terminator("\r\n") {
                assert!(line.len() <= MAX_LINE_LENGTH, "line too long for size {size}");
                concatenated.push_str(line);
            }

            assert_eq!(decode_base64(&concatenated).unwrap(), data);
            if size == 0 {
                assert!(out.is_empty());
            } else {
                assert!(out.ends_with(b"\r\n"));
            }
        }
    }

    #[test]
    fn test_quoted_printable_encode() {
        let encoded = encode_quoted_printable(b"Hello, World!");
        assert_eq!(encoded, "Hello, World!");

        let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
        assert!(encoded.contains("=C3"));
    }

    #[test]
    fn test_quoted_printable_preserves_line_breaks() {
        let encoded = encode_quoted_printable(b"line one\r\nline two\n");
        assert_eq!(encoded, "line one\r\nline two\r\n");
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("Hello, World!").unwrap();
        assert_eq!(decoded, b"Hello, World!");

        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_incomplete_escape() {
        assert!(decode_quoted_printable("abc=4").is_err());
    }

    #[test]
    fn test_rfc2047_encode() {
        let encoded = encode_rfc2047("Hello", "UTF-8").unwrap();
        assert_eq!(encoded, "Hello"); // No encoding needed

        let encoded = encode_rfc2047("Héllo", "UTF-8").unwrap();
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_rfc2047_decode() {
        let decoded = decode_rfc2047("Hello").unwrap();
        assert_eq!(decoded, "Hello");

        let decoded = decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        let decoded = decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    proptest! {
        #[test]
        fn prop_base64_wrapped_round_trips(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let mut out = Vec::new();
            encode_base64_wrapped(&data, &mut out);

            let text = String::from_utf8(out).unwrap();
            let mut concatenated = String::new();
            for line in text.split_terminator("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
                concatenated.push_str(line);
            }
            prop_assert_eq!(decode_base64(&concatenated).unwrap(), data);
        }

        #[test]
        fn prop_quoted_printable_round_trips(text in "[ -~äöüß]{0,512}") {
            let encoded = encode_quoted_printable(text.as_bytes());
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            let decoded = decode_quoted_printable(&encoded).unwrap();
            prop_assert_eq!(decoded, text.as_bytes());
        }
    }
}
