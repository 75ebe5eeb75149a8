//! Foundation types for Signet.
//!
//! Signet resolves opaque object tokens into time-limited signed URLs,
//! caching the signatures in a sharded key-value store. This crate holds
//! the pieces every other Signet crate shares.
//!
//! # Key Types
//!
//! - [`ObjectReference`] -- bucket/object identity carried inside a token
//! - [`KeyCodec`] -- token encode/decode with `ostart:`/`:oend` framing
//! - [`CacheKey`] -- validated `app|project|key` cache key

pub mod error;
pub mod key;
pub mod reference;
pub mod token;

pub use error::{CodecError, CodecResult};
pub use key::{validate_cache_key, CacheKey};
pub use reference::{ObjectReference, RequestParams};
pub use token::{
    decode_url_list, encode_url_list, is_encoded_token, is_plain_url, KeyCodec, TOKEN_END,
    TOKEN_START,
};
