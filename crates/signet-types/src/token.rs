//! Token framing for encoded object references.
//!
//! An encoded token is `ostart:` + base64url(JSON(reference)) + `:oend`.
//! Anything starting with `http://` or `https://` is a plain URL and is
//! never decoded.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::error::{CodecError, CodecResult};
use crate::reference::ObjectReference;

/// Literal that opens every encoded token.
pub const TOKEN_START: &str = "ostart:";
/// Literal that closes every encoded token.
pub const TOKEN_END: &str = ":oend";
/// Separator used by [`encode_url_list`].
pub const URL_LIST_SEPARATOR: char = ';';

/// Encoder/decoder for object-reference tokens.
pub struct KeyCodec;

impl KeyCodec {
    /// Serialize `reference` to JSON, base64url-encode it, and wrap it
    /// in the start/end markers.
    pub fn encode(reference: &ObjectReference) -> CodecResult<String> {
        let json =
            serde_json::to_vec(reference).map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(format!("{TOKEN_START}{}{TOKEN_END}", URL_SAFE.encode(json)))
    }

    /// Decode a framed token back into its reference.
    ///
    /// If the payload is not valid base64 the raw payload is parsed as
    /// JSON instead; only a payload that is neither fails.
    pub fn decode(token: &str) -> CodecResult<ObjectReference> {
        if !is_encoded_token(token) {
            return Err(CodecError::InvalidToken(truncate(token)));
        }
        let payload = &token[TOKEN_START.len()..token.len() - TOKEN_END.len()];
        let bytes = decode_base64(payload).unwrap_or_else(|| payload.as_bytes().to_vec());
        serde_json::from_slice(&bytes).map_err(|e| CodecError::InvalidPayload(e.to_string()))
    }
}

/// Returns `true` if `s` starts with `http://` or `https://`, ignoring case.
pub fn is_plain_url(s: &str) -> bool {
    starts_with_ignore_case(s, "http://") || starts_with_ignore_case(s, "https://")
}

/// Returns `true` if `s` is longer than the marker pair and is framed by
/// exactly [`TOKEN_START`] and [`TOKEN_END`].
pub fn is_encoded_token(s: &str) -> bool {
    s.len() > TOKEN_START.len() + TOKEN_END.len()
        && s.starts_with(TOKEN_START)
        && s.ends_with(TOKEN_END)
}

/// Base64url-encode every URL and join them with `;`.
pub fn encode_url_list(urls: &[String]) -> String {
    urls.iter()
        .map(|u| URL_SAFE.encode(u.as_bytes()))
        .collect::<Vec<_>>()
        .join(&URL_LIST_SEPARATOR.to_string())
}

/// Reverse of [`encode_url_list`]. Entries that fail to decode, or decode
/// to an empty string, are dropped.
pub fn decode_url_list(joined: &str) -> Vec<String> {
    joined
        .split(URL_LIST_SEPARATOR)
        .filter_map(|part| URL_SAFE.decode(part).ok())
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .filter(|url| !url.is_empty())
        .collect()
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    if payload.is_empty() {
        return None;
    }
    URL_SAFE
        .decode(payload)
        .or_else(|_| URL_SAFE_NO_PAD.decode(payload))
        .or_else(|_| STANDARD.decode(payload))
        .ok()
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn truncate(s: &str) -> String {
    const MAX: usize = 64;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
