//! # Intercepted request model.
//!
//! [`InterceptedRequest`] is the decoded form of a `request` frame from the
//! worker. It is deserialized exactly once, at the channel boundary, and
//! shared as `Arc<InterceptedRequest>` from there on.
//!
//! ## Rules
//! - [`RequestId`] is opaque and minted by the worker; it is the sole
//!   correlation key between a request, its decision, and its receipt.
//! - Ids are never reused within a session.
//! - [`Headers`] preserves insertion order and keeps repeated names.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque unique id of one intercepted request.
///
/// Cheap to clone; compared and hashed by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Wraps an id received from the worker.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Ordered, multi-valued header list.
///
/// Names are matched case-insensitively; insertion order is preserved and
/// repeated names are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends one header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the first value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns true if at least one value exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header entries (repeated names count separately).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Credentials mode the intercepted request was issued with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    /// Never send credentials.
    Omit,
    /// Send credentials for same-origin requests only. The default.
    #[default]
    SameOrigin,
    /// Always send credentials.
    Include,
}

/// One request intercepted by the worker, decoded from a `request` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// Worker-minted correlation id.
    pub id: RequestId,
    /// Request method (`GET`, `POST`, ...).
    pub method: String,
    /// Full request url.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Headers,
    /// Request body, when one was captured.
    #[serde(default)]
    pub body: Option<String>,
    /// Credentials mode of the original request.
    #[serde(default)]
    pub credentials: Credentials,
}

impl InterceptedRequest {
    /// Creates a request with the given identity; headers, body, and
    /// credentials start at their defaults.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            body: None,
            credentials: Credentials::default(),
        }
    }

    /// Appends one header.
    #[inline]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attaches a body.
    #[inline]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the credentials mode.
    #[inline]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_keep_order_and_repeats() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/html");
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("accept"), Some("text/html"));
        assert_eq!(headers.get("Set-Cookie"), Some("a=1"));
        assert_eq!(headers.get_all("SET-COOKIE"), vec!["a=1", "b=2"]);
        assert!(headers.contains("set-COOKIE"));
        assert!(!headers.contains("authorization"));
    }

    #[test]
    fn test_request_decodes_with_defaults() {
        let frame = serde_json::json!({
            "id": "req-1",
            "method": "GET",
            "url": "https://example.test/api/users",
        });
        let request: InterceptedRequest = serde_json::from_value(frame).expect("decodes");

        assert_eq!(request.id.as_str(), "req-1");
        assert_eq!(request.method, "GET");
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
        assert_eq!(request.credentials, Credentials::SameOrigin);
    }

    #[test]
    fn test_credentials_use_kebab_case() {
        let decoded: Credentials =
            serde_json::from_str("\"same-origin\"").expect("kebab-case tag");
        assert_eq!(decoded, Credentials::SameOrigin);
        assert_eq!(
            serde_json::to_string(&Credentials::Include).expect("encodes"),
            "\"include\""
        );
    }
}
