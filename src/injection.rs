//! Seams to the parameter-binding and resource-lifecycle collaborators.
//!
//! Binding mechanics are opaque to the dispatch engine: it only calls
//! [`MethodInjector::invoke`], asks whether a body is expected, and on
//! teardown unsubscribes any binder that listens on the reader-interceptor
//! registry.

use crate::context::InvocationContext;
use crate::descriptor::HandlerDescriptor;
use crate::envelope::HandlerOutcome;
use crate::error::InvocationError;
use crate::provider::{ListenerId, ProviderRegistry};
use crate::request::{DispatchRequest, HttpResponse, Target};
use std::sync::Arc;

/// One injected handler parameter.
pub trait ParameterBinder: Send + Sync {
    fn name(&self) -> &str;

    /// Subscription on the global reader-interceptor registry, for binders
    /// that read the request body and track reader-interceptor changes.
    fn reader_subscription(&self) -> Option<ListenerId> {
        None
    }
}

/// Invokes the handler with injected parameters.
pub trait MethodInjector: Send + Sync {
    /// # Errors
    ///
    /// [`InvocationError`] when binding fails or the handler itself fails.
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<HandlerOutcome, InvocationError>;

    /// Whether any parameter consumes the request body.
    fn expects_body(&self) -> bool {
        false
    }

    fn params(&self) -> Vec<Arc<dyn ParameterBinder>> {
        Vec::new()
    }
}

/// Builds the [`MethodInjector`] for an endpoint.
///
/// `registry` is the endpoint-private registry providers are resolved from.
/// Binders that track reader-interceptor changes subscribe on `global`; that
/// is where [`ResourceInvoker::cleanup`](crate::ResourceInvoker::cleanup)
/// unsubscribes them.
pub trait InjectorFactory: Send + Sync {
    fn create_method_injector(
        &self,
        descriptor: &HandlerDescriptor,
        registry: &ProviderRegistry,
        global: &Arc<ProviderRegistry>,
    ) -> Arc<dyn MethodInjector>;
}

/// Produces the target instance for a request.
pub trait ResourceFactory: Send + Sync {
    /// # Errors
    ///
    /// Any failure to construct the resource.
    fn create_resource(
        &self,
        request: &DispatchRequest,
        response: &HttpResponse,
        registry: &ProviderRegistry,
    ) -> anyhow::Result<Target>;
}

/// Resource factory that always returns the same instance.
pub struct SingletonResource(pub Target);

impl ResourceFactory for SingletonResource {
    fn create_resource(
        &self,
        _request: &DispatchRequest,
        _response: &HttpResponse,
        _registry: &ProviderRegistry,
    ) -> anyhow::Result<Target> {
        Ok(Arc::clone(&self.0))
    }
}
