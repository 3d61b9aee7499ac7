//! # Interceptor Snapshot
//!
//! The resolved request filters, response filters and writer interceptors
//! for one endpoint at one point in time, together with the
//! endpoint-private registry they were resolved from.
//!
//! A snapshot is never modified after [`InterceptorSnapshot::build`]
//! returns. Reconfiguration builds a new one and publishes it with an
//! atomic pointer swap, so a request observes either the old snapshot or
//! the new one, never a mix.

use crate::descriptor::HandlerDescriptor;
use crate::provider::{
    FeatureContext, ProviderRegistry, RequestFilter, ResponseFilter, WriterInterceptor,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct InterceptorSnapshot {
    generation: u64,
    registry: Arc<ProviderRegistry>,
    request_filters: Arc<[Arc<dyn RequestFilter>]>,
    response_filters: Arc<[Arc<dyn ResponseFilter>]>,
    writer_interceptors: Arc<[Arc<dyn WriterInterceptor>]>,
}

impl InterceptorSnapshot {
    /// Derive an endpoint-private registry from `parent`, let every dynamic
    /// feature configure it for `descriptor`, then resolve all three
    /// interceptor categories against it.
    #[must_use]
    pub fn build(parent: &ProviderRegistry, descriptor: &HandlerDescriptor, generation: u64) -> Self {
        let scoped = ProviderRegistry::scoped(parent);
        let features = parent.dynamic_features();
        for feature in &features {
            let mut ctx = FeatureContext::new(&scoped);
            feature.configure(descriptor.resource_info(), &mut ctx);
        }

        let snapshot = Self {
            generation,
            request_filters: scoped.request_filters().post_match(descriptor).into(),
            response_filters: scoped.response_filters().post_match(descriptor).into(),
            writer_interceptors: scoped.writer_interceptors().post_match(descriptor).into(),
            registry: Arc::new(scoped),
        };

        debug!(
            handler_name = %descriptor.handler_name(),
            generation,
            dynamic_features = features.len(),
            request_filters = snapshot.request_filters.len(),
            response_filters = snapshot.response_filters.len(),
            writer_interceptors = snapshot.writer_interceptors.len(),
            "interceptor snapshot built"
        );
        snapshot
    }

    /// Monotonic build counter; 0 is the snapshot built at construction.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Endpoint-private registry the snapshot was resolved from.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub fn request_filters(&self) -> &[Arc<dyn RequestFilter>] {
        &self.request_filters
    }

    #[must_use]
    pub fn response_filters(&self) -> &[Arc<dyn ResponseFilter>] {
        &self.response_filters
    }

    #[must_use]
    pub fn writer_interceptors(&self) -> &[Arc<dyn WriterInterceptor>] {
        &self.writer_interceptors
    }
}

impl fmt::Debug for InterceptorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorSnapshot")
            .field("generation", &self.generation)
            .field(
                "request_filters",
                &self.request_filters.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "response_filters",
                &self.response_filters.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "writer_interceptors",
                &self.writer_interceptors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
