//! # Request Model
//!
//! The per-request objects the dispatch engine reads and annotates. One
//! [`DispatchRequest`] exists per incoming request and is never shared
//! between requests; everything the pipeline learns about a request
//! (violations, published descriptor, path stack) is recorded here and not
//! on the long-lived [`ResourceInvoker`](crate::invoker::ResourceInvoker).

use crate::descriptor::HandlerDescriptor;
use crate::envelope::HeaderVec;
use crate::media::{parse_accept, MediaType};
use crate::suspend::AsyncContext;
use crate::validation::{Validator, ViolationSet};
use http::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// The resolved resource instance a handler runs against.
pub type Target = Arc<dyn Any + Send + Sync>;

/// Request identifier backed by ULID, used to correlate log lines.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse an inbound `x-request-id` when it is a valid ULID.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

/// Routing bookkeeping consumed by downstream code (link builders, sub-resource locators).
#[derive(Default)]
pub struct UriInfo {
    matching_path: String,
    matched_uris: Vec<String>,
    matched_resources: Vec<Target>,
}

impl UriInfo {
    #[must_use]
    pub fn new(matching_path: &str) -> Self {
        Self {
            matching_path: matching_path.to_string(),
            ..Self::default()
        }
    }

    /// Path portion matched so far by the router.
    #[must_use]
    pub fn matching_path(&self) -> &str {
        &self.matching_path
    }

    /// Matched URIs, most recent first.
    pub fn matched_uris(&self) -> impl ExactSizeIterator<Item = &str> + DoubleEndedIterator {
        self.matched_uris.iter().rev().map(String::as_str)
    }

    /// Matched resource instances, most recent first.
    pub fn matched_resources(&self) -> impl ExactSizeIterator<Item = &Target> + DoubleEndedIterator {
        self.matched_resources.iter().rev()
    }

    /// The resource instance matched last.
    #[must_use]
    pub fn current_resource(&self) -> Option<&Target> {
        self.matched_resources.last()
    }

    // Stored oldest first; accessors reverse.
    pub fn push_matched_uri(&mut self, uri: String) {
        self.matched_uris.push(uri);
    }

    pub fn push_current_resource(&mut self, target: Target) {
        self.matched_resources.push(target);
    }
}

impl fmt::Debug for UriInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriInfo")
            .field("matching_path", &self.matching_path)
            .field("matched_uris", &self.matched_uris)
            .field("matched_resources", &self.matched_resources.len())
            .finish()
    }
}

/// Request-scoped attributes written by the router and the pipeline.
#[derive(Default)]
pub struct RequestContext {
    /// Media type already chosen during matching, if any.
    pub chosen_media_type: Option<MediaType>,
    /// Descriptor of the endpoint handling this request. Left in place after
    /// dispatch so response-side interceptors can still read it.
    pub resource_info: Option<Arc<HandlerDescriptor>>,
    /// Violations found for this request.
    pub violations: Option<ViolationSet>,
    /// Validator that produced `violations`.
    pub validator: Option<Arc<dyn Validator>>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("chosen_media_type", &self.chosen_media_type)
            .field(
                "resource_info",
                &self.resource_info.as_ref().map(|d| d.handler_name().to_string()),
            )
            .field("violations", &self.violations)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// An incoming request after route resolution.
#[derive(Debug)]
pub struct DispatchRequest {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub headers: HeaderVec,
    pub body: Option<serde_json::Value>,
    pub uri_info: UriInfo,
    pub context: RequestContext,
    pub async_context: AsyncContext,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            headers: HeaderVec::new(),
            body: None,
            uri_info: UriInfo::new(path),
            context: RequestContext::default(),
            async_context: AsyncContext::default(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value.to_string());
        if name.eq_ignore_ascii_case("x-request-id") {
            self.request_id = RequestId::from_header_or_new(Some(value));
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Acceptable media types from `Accept`, most preferred first.
    /// Empty when the header is absent.
    #[must_use]
    pub fn acceptable_media_types(&self) -> Vec<MediaType> {
        self.get_header("accept").map(parse_accept).unwrap_or_default()
    }

    /// Parsed `Content-Type`, `None` when absent or malformed.
    #[must_use]
    pub fn content_type(&self) -> Option<MediaType> {
        self.get_header("content-type").and_then(|v| v.parse().ok())
    }
}

/// The mutable response side handed to the handler alongside the request.
#[derive(Debug, Default)]
pub struct HttpResponse {
    pub headers: HeaderVec,
}

impl HttpResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
