//! Cache key validation.
//!
//! Keys follow the pattern `app_id|project|key`, e.g. `1000|packer|article.1234`,
//! so that different applications sharing one cache set cannot collide.
//! At least two pipe-separated segments are required.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Separator between cache key segments.
pub const KEY_SEPARATOR: char = '|';

/// Minimum number of segments a cache key must have.
pub const MIN_KEY_SEGMENTS: usize = 2;

/// Validate a cache key, returning `Ok(())` if it has at least
/// [`MIN_KEY_SEGMENTS`] pipe-separated segments.
///
/// # Examples
///
/// ```
/// use signet_types::key::validate_cache_key;
///
/// assert!(validate_cache_key("1000|packer|article.1234").is_ok());
/// assert!(validate_cache_key("app|key").is_ok());
/// assert!(validate_cache_key("no-pipe-here").is_err());
/// ```
pub fn validate_cache_key(key: &str) -> CodecResult<()> {
    let segments = key.split(KEY_SEPARATOR).count();
    if segments < MIN_KEY_SEGMENTS {
        return Err(CodecError::InvalidCacheKey {
            key: key.to_string(),
            reason: format!(
                "expected at least {MIN_KEY_SEGMENTS} '|' separated segments like \
                 \"1000|packer|article.1234\", got {segments}"
            ),
        });
    }
    Ok(())
}

/// A validated cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Validate and wrap `key`.
    pub fn parse(key: impl Into<String>) -> CodecResult<Self> {
        let key = key.into();
        validate_cache_key(&key)?;
        Ok(Self(key))
    }

    /// Build `app_id|project|subkey`. Always valid.
    pub fn from_parts(app_id: &str, project: &str, subkey: &str) -> Self {
        Self(format!("{app_id}{KEY_SEPARATOR}{project}{KEY_SEPARATOR}{subkey}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_single_segment() {
        let err = validate_cache_key("no-pipe-here").unwrap_err();
        assert!(matches!(err, CodecError::InvalidCacheKey { .. }));
        assert!(err.is_format());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_cache_key("").is_err());
    }

    #[test]
    fn accepts_two_segments_even_if_empty() {
        assert!(validate_cache_key("|").is_ok());
        assert!(validate_cache_key("a|").is_ok());
    }

    #[test]
    fn from_parts_is_valid() {
        let key = CacheKey::from_parts("1000", "packer", "article.hh.bb.oo");
        assert_eq!(key.as_str(), "1000|packer|article.hh.bb.oo");
        assert!(CacheKey::parse(key.to_string()).is_ok());
    }

    #[test]
    fn serde_rejects_invalid_key() {
        let ok: CacheKey = serde_json::from_str("\"a|b\"").unwrap();
        assert_eq!(ok.as_ref(), "a|b");
        assert!(serde_json::from_str::<CacheKey>("\"ab\"").is_err());
    }

    proptest! {
        #[test]
        fn keys_without_pipe_are_rejected(key in "[^|]{0,40}") {
            prop_assert!(validate_cache_key(&key).is_err());
        }

        #[test]
        fn keys_with_pipe_are_accepted(a in "[^|]{0,10}", b in "[^|]{0,10}") {
            let key = format!("{a}|{b}");
            prop_assert!(validate_cache_key(&key).is_ok());
        }
    }
}
