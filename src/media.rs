//! # Media Types
//!
//! Minimal media type model used by content negotiation. Only the parts the
//! dispatch engine needs are modelled: `type/subtype`, wildcard handling and
//! parameters (kept for display, ignored for compatibility).
//!
//! Compatibility follows the usual HTTP rule: a `*` on either side of the
//! type or subtype matches anything.
//!
//! ```rust
//! use endpoint_dispatch::media::MediaType;
//!
//! let json: MediaType = "application/json".parse().unwrap();
//! assert!(json.is_compatible(&MediaType::wildcard()));
//! assert!(!json.is_compatible(&"text/plain".parse().unwrap()));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

const WILDCARD: &str = "*";

/// Parameters beyond `q`; rarely more than one or two.
pub type MediaParams = SmallVec<[(Arc<str>, String); 2]>;

/// A parsed `type/subtype` media type.
///
/// Type and subtype are stored lower-cased so equality and compatibility
/// checks are case-insensitive per RFC 7231.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    main: Arc<str>,
    sub: Arc<str>,
    params: MediaParams,
}

/// Failure parsing a media type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypeParseError {
    input: String,
}

impl Display for MediaTypeParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid media type '{}': expected type/subtype", self.input)
    }
}

impl std::error::Error for MediaTypeParseError {}

impl MediaType {
    /// Build a media type from its parts. Parts are lower-cased.
    #[must_use]
    pub fn new(main: &str, sub: &str) -> Self {
        Self {
            main: Arc::from(main.trim().to_ascii_lowercase()),
            sub: Arc::from(sub.trim().to_ascii_lowercase()),
            params: MediaParams::new(),
        }
    }

    /// `*/*`
    #[must_use]
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// `application/octet-stream`, assumed for bodies sent without a content type.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    #[must_use]
    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.main
    }

    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.sub
    }

    #[must_use]
    pub fn params(&self) -> &[(Arc<str>, String)] {
        &self.params
    }

    /// Look up a parameter by name (case-insensitive).
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    /// True for `*/*` only.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard_type() && self.is_wildcard_subtype()
    }

    #[must_use]
    pub fn is_wildcard_type(&self) -> bool {
        &*self.main == WILDCARD
    }

    #[must_use]
    pub fn is_wildcard_subtype(&self) -> bool {
        &*self.sub == WILDCARD
    }

    /// Type/subtype compatibility allowing wildcards on either side.
    ///
    /// Symmetric: `a.is_compatible(&b) == b.is_compatible(&a)`.
    #[must_use]
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        if self.main != other.main {
            return false;
        }
        self.is_wildcard_subtype() || other.is_wildcard_subtype() || self.sub == other.sub
    }

    /// Same type and subtype, ignoring parameters.
    #[must_use]
    pub fn same_essence(&self, other: &MediaType) -> bool {
        self.main == other.main && self.sub == other.sub
    }

    /// Number of concrete components; `*/*` is 0, `text/*` is 1, `text/plain` is 2.
    fn specificity(&self) -> u8 {
        u8::from(!self.is_wildcard_type()) + u8::from(!self.is_wildcard_subtype())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MediaTypeParseError {
            input: s.to_string(),
        };
        let mut parts = s.split(';');
        let essence = parts.next().map(str::trim).unwrap_or_default();
        // A bare "*" shows up in the wild (old Java clients) and means "*/*".
        if essence == WILDCARD {
            return Ok(MediaType::wildcard());
        }
        let (main, sub) = essence.split_once('/').ok_or_else(err)?;
        if main.trim().is_empty() || sub.trim().is_empty() || sub.contains('/') {
            return Err(err());
        }
        let mut media = MediaType::new(main, sub);
        for param in parts {
            let Some((k, v)) = param.split_once('=') else {
                continue;
            };
            let k = k.trim();
            if k.is_empty() {
                continue;
            }
            media = media.with_param(k, v.trim().trim_matches('"'));
        }
        Ok(media)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)?;
        for (k, v) in &self.params {
            write!(f, ";{k}={v}")?;
        }
        Ok(())
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse an `Accept` header into media types ordered by preference.
///
/// Entries are sorted by descending `q` and then by specificity; entries
/// with equal weight keep header order (stable sort). `q=0` entries are
/// dropped and unparseable entries are skipped. The `q` parameter itself is
/// not retained on the returned types.
#[must_use]
pub fn parse_accept(header: &str) -> Vec<MediaType> {
    let mut weighted: Vec<(u16, MediaType)> = header
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| part.parse::<MediaType>().ok())
        .map(|mut media| {
            let q = media.param("q").map_or(1000, parse_quality);
            media.params.retain(|(k, _)| &**k != "q");
            (q, media)
        })
        .filter(|(q, _)| *q > 0)
        .collect();
    weighted.sort_by(|(qa, a), (qb, b)| {
        qb.cmp(qa)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    weighted.into_iter().map(|(_, media)| media).collect()
}

/// `q` values are kept in thousandths to avoid float comparisons.
fn parse_quality(raw: &str) -> u16 {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|q| (0.0..=1.0).contains(q))
        .map_or(1000, |q| (q * 1000.0).round() as u16)
}
