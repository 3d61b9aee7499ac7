//! # Response Envelope
//!
//! The normalized response produced by dispatch: status, optional entity,
//! optional media type, the annotation list writers will see and the generic
//! entity type used for writer selection.
//!
//! Handlers report their result as a [`HandlerOutcome`], a closed set of
//! shapes, so the pipeline never has to inspect runtime types to decide
//! whether a return value is already a response.

use crate::descriptor::Annotations;
use crate::media::MediaType;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage. Names are matched case-insensitively.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A response entity together with the type information writers select on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// Runtime type name of the value, e.g. `Pet`.
    pub type_name: Arc<str>,
    /// Explicit generic type carried by a generic wrapper, e.g. `Vec<Pet>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_type: Option<Arc<str>>,
    pub value: Value,
}

impl Entity {
    #[must_use]
    pub fn new(type_name: &str, value: Value) -> Self {
        Self {
            type_name: Arc::from(type_name),
            generic_type: None,
            value,
        }
    }

    /// Wrap with an explicit generic type so writer lookup does not fall back
    /// to the handler's declared return type.
    #[must_use]
    pub fn generic(type_name: &str, generic_type: &str, value: Value) -> Self {
        Self {
            type_name: Arc::from(type_name),
            generic_type: Some(Arc::from(generic_type)),
            value,
        }
    }
}

/// A complete response ready for the response-writing layer.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: HeaderVec,
    pub entity: Option<Entity>,
    pub media_type: Option<MediaType>,
    pub annotations: Option<Annotations>,
    pub generic_type: Option<Arc<str>>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            entity: None,
            media_type: None,
            annotations: None,
            generic_type: None,
        }
    }

    /// `200 OK` around an entity. A generic wrapper's type becomes the
    /// envelope's generic type.
    #[must_use]
    pub fn ok(entity: Entity) -> Self {
        let mut envelope = Self::new(200);
        envelope.generic_type = entity.generic_type.clone();
        envelope.with_entity(entity)
    }

    /// `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// Build an error envelope with a `{"error": message}` JSON body.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::new(status)
            .with_entity(Entity::new(
                "Error",
                serde_json::json!({ "error": message }),
            ))
            .with_media_type(MediaType::application_json())
    }

    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    #[must_use]
    pub fn with_media_type(mut self, media: MediaType) -> Self {
        self.media_type = Some(media);
        self
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    #[must_use]
    pub fn with_generic_type(mut self, generic_type: &str) -> Self {
        self.generic_type = Some(Arc::from(generic_type));
        self
    }

    /// Runtime type of the wrapped entity, if any.
    #[must_use]
    pub fn entity_type(&self) -> Option<&Arc<str>> {
        self.entity.as_ref().map(|e| &e.type_name)
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

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// What a handler invocation produced.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Nothing was returned.
    Void,
    /// The handler built its own response.
    Response(ResponseEnvelope),
    /// An arbitrary value to be wrapped in a `200 OK`.
    Value(Entity),
}

impl From<ResponseEnvelope> for HandlerOutcome {
    fn from(envelope: ResponseEnvelope) -> Self {
        HandlerOutcome::Response(envelope)
    }
}

impl From<Entity> for HandlerOutcome {
    fn from(entity: Entity) -> Self {
        HandlerOutcome::Value(entity)
    }
}

impl From<Option<Entity>> for HandlerOutcome {
    fn from(entity: Option<Entity>) -> Self {
        entity.map_or(HandlerOutcome::Void, HandlerOutcome::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_serializes_with_type_names() {
        let entity = Entity::generic("Vec", "Vec<Pet>", json!([{ "name": "rex" }]));
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            json!({
                "type_name": "Vec",
                "generic_type": "Vec<Pet>",
                "value": [{ "name": "rex" }]
            })
        );

        let plain = serde_json::to_value(Entity::new("Pet", json!({}))).unwrap();
        assert!(plain.get("generic_type").is_none());
    }

    #[test]
    fn test_ok_carries_generic_wrapper_type() {
        let envelope = ResponseEnvelope::ok(Entity::generic("Vec", "Vec<Pet>", json!([])));
        assert_eq!(envelope.status, 200);
        assert_eq!(envelope.generic_type.as_deref(), Some("Vec<Pet>"));

        let plain = ResponseEnvelope::ok(Entity::new("Pet", json!({})));
        assert!(plain.generic_type.is_none());
    }
}
