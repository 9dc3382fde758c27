//! Request fingerprints used as cache and deduplication keys.

use std::fmt;

/// Default number of payload characters folded into a fingerprint.
pub const DEFAULT_PREFIX_CHARS: usize = 100;

/// Deterministic key for a request.
///
/// Derived from the operation kind, the locale, the payload length and a
/// bounded prefix of the payload. Two payloads of equal length sharing that
/// prefix collide; cache entries expire,
/// so a collision costs precision (a stale or foreign answer for one TTL
/// window), never consistency of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-derived key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from `kind`, `locale`, the character count of
    /// `payload` and its first `prefix_chars` characters.
    ///
    /// Truncation is by `char`, so multi-byte payloads never split a
    /// code point.
    pub fn derive(kind: &str, locale: &str, payload: &str, prefix_chars: usize) -> Self {
        let len = payload.chars().count();
        let prefix: String = payload.chars().take(prefix_chars).collect();
        Self(format!("{kind}:{locale}:{len}:{prefix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Fingerprint {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let a = Fingerprint::derive("image", "en", "abcdef", 4);
        let b = Fingerprint::derive("image", "en", "abcdef", 4);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_differs_on_kind_and_locale() {
        let base = Fingerprint::derive("image", "en", "abc", 10);
        assert_ne!(base, Fingerprint::derive("text", "en", "abc", 10));
        assert_ne!(base, Fingerprint::derive("image", "ko", "abc", 10));
    }

    #[test]
    fn payloads_sharing_prefix_collide() {
        let a = Fingerprint::derive("image", "en", "same-prefix-AAAA", 11);
        let b = Fingerprint::derive("image", "en", "same-prefix-BBBB", 11);
        assert_eq!(a, b);
    }

    #[test]
    fn payload_length_separates_shared_prefixes() {
        let a = Fingerprint::derive("image", "en", "same-prefix-A", 11);
        let b = Fingerprint::derive("image", "en", "same-prefix-AB", 11);
        assert_ne!(a, b);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let fp = Fingerprint::derive("text", "ko", "비빔밥과 김치", 3);
        assert_eq!(fp.as_str(), "text:ko:7:비빔밥");
    }
}
