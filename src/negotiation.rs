//! # Content Negotiation
//!
//! Pure decisions about what an endpoint can produce and consume, and which
//! concrete media type a response should use.
//!
//! ## Response media type resolution
//!
//! The order is fixed:
//!
//! 1. A non-wildcard media type already chosen during matching wins outright.
//! 2. No `Accept` types: the first declared produced type, or `*/*`.
//! 3. No declared produced types: probe writers. Each acceptable type is
//!    tried in `Accept` order and the first one some writer can serialize the
//!    entity as is returned, else `*/*`.
//! 4. Otherwise the first declared produced type compatible with an
//!    acceptable type, iterating acceptable types in the outer loop, else `*/*`.
//!
//! `Accept` order outranks declared order in steps 3 and 4.

use crate::descriptor::HandlerDescriptor;
use crate::envelope::Entity;
use crate::media::MediaType;
use crate::provider::ProviderRegistry;
use crate::request::DispatchRequest;
use tracing::trace;

/// Negotiation view over one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ContentNegotiator<'a> {
    descriptor: &'a HandlerDescriptor,
    expects_body: bool,
}

impl<'a> ContentNegotiator<'a> {
    #[must_use]
    pub fn new(descriptor: &'a HandlerDescriptor, expects_body: bool) -> Self {
        Self {
            descriptor,
            expects_body,
        }
    }

    /// Can this endpoint answer a request accepting `accepts`?
    #[must_use]
    pub fn can_produce(&self, accepts: &[MediaType]) -> bool {
        let produces = self.descriptor.produces();
        if accepts.is_empty() || produces.is_empty() {
            return true;
        }
        accepts
            .iter()
            .any(|accept| produces.iter().any(|p| p.is_compatible(accept)))
    }

    /// Can this endpoint read a body of `content_type`?
    ///
    /// A missing content type is fine when the handler takes no body;
    /// otherwise it is treated as `application/octet-stream`.
    #[must_use]
    pub fn can_consume(&self, content_type: Option<&MediaType>) -> bool {
        let consumes = self.descriptor.consumes();
        if consumes.is_empty() || (content_type.is_none() && !self.expects_body) {
            return true;
        }
        let fallback;
        let content_type = match content_type {
            Some(ct) => ct,
            None => {
                fallback = MediaType::octet_stream();
                &fallback
            }
        };
        consumes.iter().any(|c| c.is_compatible(content_type))
    }

    /// Media type for the response to `request` carrying `entity`.
    ///
    /// Never fails: a miss resolves to `*/*` and writer selection reports
    /// the final failure.
    #[must_use]
    pub fn resolve_response_media_type(
        &self,
        request: &DispatchRequest,
        entity: Option<&Entity>,
        writers: &ProviderRegistry,
    ) -> MediaType {
        if let Some(chosen) = request
            .context
            .chosen_media_type
            .as_ref()
            .filter(|m| !m.is_wildcard())
        {
            trace!(media_type = %chosen, "using media type chosen during matching");
            return chosen.clone();
        }

        let accepts = request.acceptable_media_types();
        self.resolve_for_accepts(&accepts, entity, writers)
    }

    /// Steps 2-4 of resolution against an explicit acceptable list.
    #[must_use]
    pub fn resolve_for_accepts(
        &self,
        accepts: &[MediaType],
        entity: Option<&Entity>,
        writers: &ProviderRegistry,
    ) -> MediaType {
        let produces = self.descriptor.produces();
        if accepts.is_empty() {
            return produces.first().cloned().unwrap_or_else(MediaType::wildcard);
        }
        if produces.is_empty() {
            return self.resolve_by_writer(accepts, entity, writers);
        }
        accepts
            .iter()
            .find_map(|accept| produces.iter().find(|p| p.is_compatible(accept)))
            .cloned()
            .unwrap_or_else(MediaType::wildcard)
    }

    /// First acceptable type a registered writer can serialize `entity` as.
    #[must_use]
    pub fn resolve_by_writer(
        &self,
        accepts: &[MediaType],
        entity: Option<&Entity>,
        writers: &ProviderRegistry,
    ) -> MediaType {
        let Some(entity) = entity else {
            return MediaType::wildcard();
        };
        let generic_type = entity
            .generic_type
            .as_deref()
            .or_else(|| self.descriptor.return_type().generic_name().map(|n| &**n));
        let annotations = self.descriptor.annotations();
        accepts
            .iter()
            .find(|accept| {
                writers
                    .find_writer(&entity.type_name, generic_type, annotations, accept)
                    .is_some()
            })
            .cloned()
            .unwrap_or_else(MediaType::wildcard)
    }
}
