//! Object references: where an object lives and how to ask for it.
//!
//! Also converts between references and the plain `http(s)://host/bucket/object`
//! URL form, taking the input string apart without normalising it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Extra query parameters carried into a signed URL (e.g.
/// `response-content-type`). Multi-valued, ordered by name.
pub type RequestParams = BTreeMap<String, Vec<String>>;

/// Logical identity of an object held by the backing object store.
///
/// A reference is what an encoded token carries. It is immutable once
/// decoded: resolution reads it, never rewrites it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectReference {
    pub bucket: String,
    pub object: String,
    pub host: String,
    pub region: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_hosts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_regions: Vec<String>,
    #[serde(rename = "req_params", skip_serializing_if = "BTreeMap::is_empty")]
    pub request_params: RequestParams,
    pub update_count: u32,
}

impl ObjectReference {
    /// Reference to `object` inside `bucket`, all other fields empty.
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Add one value for a request parameter, keeping earlier values.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Returns `true` when both bucket and object are set, i.e. a signed
    /// URL can be minted for this reference.
    pub fn is_resolvable(&self) -> bool {
        !self.bucket.is_empty() && !self.object.is_empty()
    }

    /// Per-object suffix used when deriving cache keys:
    /// `h<host>.b<bucket>.o<object>`.
    pub fn cache_subkey(&self) -> String {
        format!("h{}.b{}.o{}", self.host, self.bucket, self.object)
    }

    /// Unsigned `https://<host>/<bucket>/<object>` form.
    pub fn to_https(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.bucket, self.object)
    }

    /// Parse host, bucket, and object back out of an `http(s)://` URL.
    ///
    /// The object keeps its leading `/`, so
    /// `https://h/b/dir/a.png` yields object `/dir/a.png`.
    pub fn from_https(input: &str) -> CodecResult<Self> {
        let invalid = |reason: &str| CodecError::InvalidUrl {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        let rest = input
            .strip_prefix("https://")
            .or_else(|| input.strip_prefix("http://"))
            .ok_or_else(|| invalid("scheme must be http or https"))?;
        let slash = rest.find('/').ok_or_else(|| invalid("missing bucket"))?;
        let (host, path) = rest.split_at(slash);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let (bucket, object) = path[1..]
            .split_once('/')
            .ok_or_else(|| invalid("missing object path"))?;
        if bucket.is_empty() {
            return Err(invalid("missing bucket"));
        }

        Ok(Self {
            host: host.to_string(),
            bucket: bucket.to_string(),
            object: format!("/{object}"),
            ..Default::default()
        })
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}
