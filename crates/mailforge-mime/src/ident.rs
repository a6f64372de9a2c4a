//! Identifier generation for outgoing messages.

use crate::error::{Error, Result};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Hostname used when the local hostname cannot be resolved.
const FALLBACK_HOSTNAME: &str = "localhost.localdomain";

/// Length of generated multipart boundaries.
const BOUNDARY_LENGTH: usize = 30;

/// Generates a practically unique Message-ID.
///
/// The identifier combines the nanosecond wall-clock timestamp, the process
/// id, a uniformly distributed non-negative 63-bit integer from the operating
/// system's secure random source, and the local hostname:
/// `<timestamp.pid.random@host>`.
///
/// # Errors
///
/// Returns an error if the secure random source is unavailable. There is no
/// fallback to a weaker source; a predictable Message-ID risks collisions.
pub fn message_id() -> Result<String> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let pid = std::process::id();

    let mut entropy = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| Error::RandomUnavailable(e.to_string()))?;
    let random = u64::from_be_bytes(entropy) >> 1;

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string());

    Ok(format!("<{nanos}.{pid}.{random}@{host}>"))
}

/// Generates a fresh multipart boundary.
#[must_use]
pub fn boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LENGTH)
        .map(char::from)
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
    use std::collections::HashSet;

    #[test]
    fn test_message_id_shape() {
        let id = message_id().unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with('>'));
        assert!(id.contains('@'));

        let local = &id[1..id.find('@').unwrap()];
        assert_eq!(local.split('.').count(), 3);
        for field in local.split('.') {
            assert!(field.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_message_ids_are_unique() {
        let ids: HashSet<String> = (0..10_000).map(|_| message_id().unwrap()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_boundary_shape() {
        let b = boundary();
        assert_eq!(b.len(), BOUNDARY_LENGTH);
        assert!(b.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(b, boundary());
    }
}
