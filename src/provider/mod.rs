//! # Provider Module
//!
//! Extension points consulted by the dispatch engine, and the registry that
//! stores them.
//!
//! ## Provider kinds
//!
//! - **[`RequestFilter`]** - runs before the handler, may abort with a response
//! - **[`ResponseFilter`]** - runs on the outgoing response (executed by the writing layer)
//! - **[`WriterInterceptor`]** - wraps entity serialization (executed by the writing layer)
//! - **[`ReaderInterceptor`]** - wraps entity deserialization (used by parameter binders)
//! - **[`MessageBodyWriter`]** - serializes an entity for a media type; only its
//!   capability check is used here, for content negotiation
//! - **[`DynamicFeature`]** - per-endpoint configuration hook that registers
//!   extra providers into an endpoint-private registry
//!
//! ## Matching
//!
//! Providers may carry name-bindings. A provider with no bindings applies to
//! every endpoint; one with bindings applies only to endpoints whose handler
//! or group carries every bound annotation. Matching providers are ordered
//! by ascending priority, then registration order.
//!
//! ## Change notification
//!
//! Each interceptor registry keeps a list of [`RegistryListener`]s that are
//! told which [`RegistryKind`] changed after every registration. Listeners
//! are held weakly but must still unsubscribe explicitly on teardown.

mod registry;

pub use registry::{
    InterceptorRegistry, ListenerId, ProviderOptions, ProviderRegistry, RegistryKind,
    RegistryListener, DEFAULT_PRIORITY,
};

use crate::descriptor::{Annotation, HandlerDescriptor, ResourceInfo};
use crate::envelope::ResponseEnvelope;
use crate::error::FilterError;
use crate::media::MediaType;
use crate::request::DispatchRequest;
use crate::validation::ViolationSet;
use std::sync::Arc;

/// Pre-invocation hook.
pub trait RequestFilter: Send + Sync {
    /// Inspect or modify the request, or abort via [`RequestFilterContext::abort_with`].
    ///
    /// # Errors
    ///
    /// A [`FilterError`] aborts the chain and surfaces as an application fault.
    fn filter(&self, ctx: &mut RequestFilterContext<'_>) -> Result<(), FilterError>;

    /// Name used in logs and fault messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Post-invocation hook on the outgoing response.
pub trait ResponseFilter: Send + Sync {
    /// # Errors
    ///
    /// Failures are reported to the response-writing layer.
    fn filter(
        &self,
        request: &DispatchRequest,
        response: &mut ResponseEnvelope,
    ) -> Result<(), FilterError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Wraps serialization of a response entity.
pub trait WriterInterceptor: Send + Sync {
    /// # Errors
    ///
    /// Failures are reported to the response-writing layer.
    fn around_write(
        &self,
        response: &mut ResponseEnvelope,
        media: &MediaType,
    ) -> Result<(), FilterError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Wraps deserialization of a request entity.
pub trait ReaderInterceptor: Send + Sync {
    /// # Errors
    ///
    /// Failures are reported to the parameter binder that invoked it.
    fn around_read(&self, body: &mut serde_json::Value) -> Result<(), FilterError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Serializes entities. Content negotiation only asks whether it could.
pub trait MessageBodyWriter: Send + Sync {
    fn is_writeable(
        &self,
        type_name: &str,
        generic_type: Option<&str>,
        annotations: &[Annotation],
        media: &MediaType,
    ) -> bool;
}

/// Per-endpoint configuration hook, run every time an endpoint's
/// interceptor snapshot is built.
pub trait DynamicFeature: Send + Sync {
    fn configure(&self, info: ResourceInfo<'_>, ctx: &mut FeatureContext<'_>);
}

/// Registration surface handed to a [`DynamicFeature`]. Everything registered
/// here lands in the endpoint-private registry, never the global one.
pub struct FeatureContext<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> FeatureContext<'a> {
    pub(crate) fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn register_request_filter(&mut self, filter: Arc<dyn RequestFilter>, options: ProviderOptions) {
        self.registry.request_filters().register(filter, options);
    }

    pub fn register_response_filter(
        &mut self,
        filter: Arc<dyn ResponseFilter>,
        options: ProviderOptions,
    ) {
        self.registry.response_filters().register(filter, options);
    }

    pub fn register_writer_interceptor(
        &mut self,
        interceptor: Arc<dyn WriterInterceptor>,
        options: ProviderOptions,
    ) {
        self.registry
            .writer_interceptors()
            .register(interceptor, options);
    }
}

/// What a [`RequestFilter`] sees after matching.
pub struct RequestFilterContext<'a> {
    request: &'a mut DispatchRequest,
    descriptor: &'a HandlerDescriptor,
    aborted_with: Option<ResponseEnvelope>,
}

impl<'a> RequestFilterContext<'a> {
    pub(crate) fn new(request: &'a mut DispatchRequest, descriptor: &'a HandlerDescriptor) -> Self {
        Self {
            request,
            descriptor,
            aborted_with: None,
        }
    }

    #[must_use]
    pub fn request(&self) -> &DispatchRequest {
        self.request
    }

    pub fn request_mut(&mut self) -> &mut DispatchRequest {
        self.request
    }

    #[must_use]
    pub fn descriptor(&self) -> &HandlerDescriptor {
        self.descriptor
    }

    /// Violations found for the target before invocation, if validation ran.
    #[must_use]
    pub fn violations(&self) -> Option<&ViolationSet> {
        self.request.context.violations.as_ref()
    }

    /// Stop the chain and answer with `response`. The handler is not invoked.
    pub fn abort_with(&mut self, response: ResponseEnvelope) {
        self.aborted_with = Some(response);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted_with.is_some()
    }

    pub(crate) fn take_abort(&mut self) -> Option<ResponseEnvelope> {
        self.aborted_with.take()
    }
}
