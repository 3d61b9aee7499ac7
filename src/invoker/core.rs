use crate::config::InvokerConfig;
use crate::context::InvocationContext;
use crate::descriptor::{Annotations, HandlerDescriptor, ReturnType};
use crate::envelope::{Entity, HandlerOutcome, ResponseEnvelope};
use crate::error::DispatchError;
use crate::injection::{InjectorFactory, MethodInjector, ResourceFactory};
use crate::media::MediaType;
use crate::negotiation::ContentNegotiator;
use crate::provider::{
    ListenerId, ProviderRegistry, RegistryKind, RegistryListener, RequestFilter,
    RequestFilterContext, ResponseFilter, WriterInterceptor,
};
use crate::request::{DispatchRequest, HttpResponse, RequestId, Target};
use crate::snapshot::InterceptorSnapshot;
use crate::stats::InvocationStats;
use crate::validation::{validate_target, Validator, ViolationSet};
use arc_swap::ArcSwap;
use http::Method;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

/// Registries whose changes trigger a snapshot rebuild.
const WATCHED_REGISTRIES: [RegistryKind; 3] = [
    RegistryKind::RequestFilters,
    RegistryKind::ResponseFilters,
    RegistryKind::WriterInterceptors,
];

/// Result of a dispatch that did not fault.
#[derive(Debug)]
pub enum Dispatched {
    /// A response to write now: a filter's abort response or the normalized handler result.
    Response(ResponseEnvelope),
    /// The handler suspended the request; the completion path will respond later.
    Suspended,
}

impl Dispatched {
    /// The envelope, if one was produced.
    #[must_use]
    pub fn into_response(self) -> Option<ResponseEnvelope> {
        match self {
            Dispatched::Response(envelope) => Some(envelope),
            Dispatched::Suspended => None,
        }
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Dispatched::Suspended)
    }
}

/// Pipeline stage, recorded on log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Matched,
    RequestFiltering,
    Validating,
    Invoking,
    Suspended,
    BuildingResponse,
    Done,
    Aborted,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Matched => "MATCHED",
            DispatchState::RequestFiltering => "REQUEST_FILTERING",
            DispatchState::Validating => "VALIDATING",
            DispatchState::Invoking => "INVOKING",
            DispatchState::Suspended => "SUSPENDED",
            DispatchState::BuildingResponse => "BUILDING_RESPONSE",
            DispatchState::Done => "DONE",
            DispatchState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Dispatch pipeline for one endpoint.
pub struct ResourceInvoker {
    descriptor: Arc<HandlerDescriptor>,
    parent: Arc<ProviderRegistry>,
    injector: Arc<dyn MethodInjector>,
    resource_factory: Option<Arc<dyn ResourceFactory>>,
    expects_body: bool,
    snapshot: ArcSwap<InterceptorSnapshot>,
    /// Serializes snapshot rebuilds; readers never take it.
    reload_lock: Mutex<()>,
    generation: AtomicU64,
    validator: Option<Arc<dyn Validator>>,
    stats: InvocationStats,
    config: InvokerConfig,
    subscriptions: Mutex<Vec<(RegistryKind, ListenerId)>>,
    cleaned_up: AtomicBool,
}

/// Builder for [`ResourceInvoker`].
pub struct ResourceInvokerBuilder {
    descriptor: HandlerDescriptor,
    registry: Arc<ProviderRegistry>,
    injector_factory: Arc<dyn InjectorFactory>,
    resource_factory: Option<Arc<dyn ResourceFactory>>,
    config: InvokerConfig,
}

impl ResourceInvokerBuilder {
    #[must_use]
    pub fn resource_factory(mut self, factory: Arc<dyn ResourceFactory>) -> Self {
        self.resource_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the initial snapshot, create the method injector, look up the
    /// validator and subscribe to the global registries.
    ///
    /// A registration that lands between resolving the snapshot and
    /// subscribing triggers one rebuild once subscribed.
    #[must_use]
    pub fn build(self) -> Arc<ResourceInvoker> {
        let ResourceInvokerBuilder {
            descriptor,
            registry,
            injector_factory,
            resource_factory,
            config,
        } = self;

        let revisions = WATCHED_REGISTRIES.map(|kind| registry.revision(kind));
        let snapshot = InterceptorSnapshot::build(&registry, &descriptor, 0);
        let injector =
            injector_factory.create_method_injector(&descriptor, snapshot.registry(), &registry);
        let expects_body = injector.expects_body();
        let validator = if config.validation {
            registry.validator(&MediaType::wildcard())
        } else {
            None
        };

        info!(
            handler_name = %descriptor.handler_name(),
            resource_class = %descriptor.resource_class(),
            methods = ?descriptor.http_methods(),
            expects_body,
            validator = validator.is_some(),
            "Resource invoker created"
        );

        let invoker = Arc::new(ResourceInvoker {
            descriptor: Arc::new(descriptor),
            parent: Arc::clone(&registry),
            injector,
            resource_factory,
            expects_body,
            snapshot: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            validator,
            stats: InvocationStats::new(),
            config,
            subscriptions: Mutex::new(Vec::with_capacity(WATCHED_REGISTRIES.len())),
            cleaned_up: AtomicBool::new(false),
        });

        let weak: Weak<ResourceInvoker> = Arc::downgrade(&invoker);
        let listener: Weak<dyn RegistryListener> = weak;
        let ids: Vec<(RegistryKind, ListenerId)> = WATCHED_REGISTRIES
            .iter()
            .map(|&kind| (kind, registry.subscribe(kind, Weak::clone(&listener))))
            .collect();
        *invoker.subscriptions.lock() = ids;

        let missed = WATCHED_REGISTRIES
            .iter()
            .zip(revisions)
            .find(|&(&kind, seen)| registry.revision(kind) != seen);
        if let Some((&kind, _)) = missed {
            debug!(
                handler_name = %invoker.descriptor.handler_name(),
                registry = %kind,
                "registry changed during construction"
            );
            invoker.rebuild_snapshot(kind);
        }

        invoker
    }
}

impl ResourceInvoker {
    #[must_use]
    pub fn builder(
        descriptor: HandlerDescriptor,
        registry: Arc<ProviderRegistry>,
        injector_factory: Arc<dyn InjectorFactory>,
    ) -> ResourceInvokerBuilder {
        ResourceInvokerBuilder {
            descriptor,
            registry,
            injector_factory,
            resource_factory: None,
            config: InvokerConfig::default(),
        }
    }

    /// Create the target through the resource factory, then dispatch.
    ///
    /// # Errors
    ///
    /// [`DispatchError::ResourceCreation`] when no factory is configured or it
    /// fails; otherwise as [`invoke_with_target`](Self::invoke_with_target).
    pub fn invoke(
        self: &Arc<Self>,
        request: &mut DispatchRequest,
        response: &mut HttpResponse,
    ) -> Result<Dispatched, DispatchError> {
        let factory = self.resource_factory.as_ref().ok_or_else(|| {
            DispatchError::ResourceCreation(anyhow::anyhow!(
                "no resource factory configured for handler '{}'",
                self.descriptor.handler_name()
            ))
        })?;
        let target = {
            let snapshot = self.snapshot.load();
            factory
                .create_resource(request, response, snapshot.registry())
                .map_err(DispatchError::ResourceCreation)?
        };
        self.invoke_with_target(request, response, target)
    }

    /// Dispatch `request` against an already resolved `target`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Filter`] when a request filter fails
    /// - [`DispatchError::Invocation`] when the handler fails
    /// - [`DispatchError::Validation`] when violations were collected; the
    ///   handler has already run
    pub fn invoke_with_target(
        self: &Arc<Self>,
        request: &mut DispatchRequest,
        response: &mut HttpResponse,
        target: Target,
    ) -> Result<Dispatched, DispatchError> {
        debug!(
            request_id = %request.request_id,
            handler_name = %self.descriptor.handler_name(),
            method = %request.method,
            path = %request.path,
            state = %DispatchState::Matched,
            "Dispatch start"
        );

        if self.config.record_stats {
            self.stats.record(request.method.as_str());
        }
        if self.descriptor.path().is_some() {
            let matched = request.uri_info.matching_path().to_string();
            request.uri_info.push_matched_uri(matched);
        }
        request.uri_info.push_current_resource(Arc::clone(&target));
        // Not cleared on exit: response-side interceptors run after dispatch returns.
        request.context.resource_info = Some(Arc::clone(&self.descriptor));

        self.invoke_on_target(request, response, &target)
    }

    fn invoke_on_target(
        self: &Arc<Self>,
        request: &mut DispatchRequest,
        response: &mut HttpResponse,
        target: &Target,
    ) -> Result<Dispatched, DispatchError> {
        let request_id = request.request_id;
        let snapshot = self.snapshot.load_full();

        if let Some(validator) = &self.validator {
            let violations = validate_target(validator.as_ref(), target);
            trace!(
                request_id = %request_id,
                violations = violations.len(),
                "Target validated before filtering"
            );
            request.context.violations = Some(violations);
            request.context.validator = Some(Arc::clone(validator));
        }

        debug!(
            request_id = %request_id,
            state = %DispatchState::RequestFiltering,
            filters = snapshot.request_filters().len(),
            generation = snapshot.generation(),
            "Running request filters"
        );
        {
            let mut ctx = RequestFilterContext::new(request, &self.descriptor);
            for (idx, filter) in snapshot.request_filters().iter().enumerate() {
                if let Err(source) = filter.filter(&mut ctx) {
                    error!(
                        request_id = %request_id,
                        filter = filter.name(),
                        filter_idx = idx,
                        error = %source,
                        "Request filter failed"
                    );
                    return Err(DispatchError::Filter {
                        filter: filter.name().to_string(),
                        source,
                    });
                }
                if let Some(mut aborted) = ctx.take_abort() {
                    info!(
                        request_id = %request_id,
                        filter = filter.name(),
                        filter_idx = idx,
                        status = aborted.status,
                        state = %DispatchState::Aborted,
                        "Request filter aborted dispatch"
                    );
                    if aborted.annotations.is_none() {
                        aborted.annotations = Some(Arc::clone(self.descriptor.annotations()));
                    }
                    return Ok(Dispatched::Response(aborted));
                }
            }
        }

        debug!(
            request_id = %request_id,
            state = %DispatchState::Invoking,
            "Invoking handler"
        );
        let outcome = {
            let mut ctx = InvocationContext::new(request, response, target, &self.descriptor);
            self.injector.invoke(&mut ctx)
        };
        let outcome = outcome.map_err(|e| {
            warn!(
                request_id = %request_id,
                handler_name = %self.descriptor.handler_name(),
                error = %e,
                "Handler invocation failed"
            );
            DispatchError::Invocation(e)
        })?;

        if let Some(violations) = request
            .context
            .violations
            .as_ref()
            .filter(|v| !v.is_empty())
        {
            self.log_violations(request_id, violations);
            return Err(DispatchError::Validation(violations.clone()));
        }

        if let Some(async_response) = request.async_context.async_response() {
            async_response.set_annotations(Arc::clone(self.descriptor.annotations()));
            async_response.set_writer_interceptors(snapshot.writer_interceptors().to_vec());
            async_response.set_response_filters(snapshot.response_filters().to_vec());
            async_response.set_invoker(Arc::clone(self));
            info!(
                request_id = %request_id,
                handler_name = %self.descriptor.handler_name(),
                state = %DispatchState::Suspended,
                "Request suspended, response deferred"
            );
            return Ok(Dispatched::Suspended);
        }

        let envelope = self.complete(outcome);
        debug!(
            request_id = %request_id,
            status = envelope.status,
            state = %DispatchState::Done,
            "Dispatch complete"
        );
        Ok(Dispatched::Response(envelope))
    }

    fn log_violations(&self, request_id: RequestId, violations: &ViolationSet) {
        warn!(
            request_id = %request_id,
            handler_name = %self.descriptor.handler_name(),
            state = %DispatchState::Validating,
            violations = violations.len(),
            "Validation failed after invocation"
        );
        for violation in violations.iter().take(self.config.log_violations) {
            debug!(
                request_id = %request_id,
                path = %violation.path,
                message = %violation.message,
                "Constraint violation"
            );
        }
    }

    /// Normalize a handler outcome into a response envelope.
    ///
    /// Also used by the asynchronous completion path through the invoker
    /// reference attached at suspension.
    #[must_use]
    pub fn complete(&self, outcome: HandlerOutcome) -> ResponseEnvelope {
        trace!(state = %DispatchState::BuildingResponse, "Building response");
        let annotations = self.descriptor.annotations();
        if matches!(self.descriptor.return_type(), ReturnType::Void) {
            return ResponseEnvelope::no_content().with_annotations(Arc::clone(annotations));
        }
        match outcome {
            HandlerOutcome::Void => {
                ResponseEnvelope::no_content().with_annotations(Arc::clone(annotations))
            }
            HandlerOutcome::Response(mut envelope) => {
                self.fill_response_metadata(&mut envelope);
                envelope
            }
            HandlerOutcome::Value(entity) => {
                let mut envelope = ResponseEnvelope::ok(entity);
                self.fill_response_metadata(&mut envelope);
                envelope
            }
        }
    }

    /// Default missing annotations and generic entity type.
    fn fill_response_metadata(&self, envelope: &mut ResponseEnvelope) {
        if envelope.annotations.is_none() {
            envelope.annotations = Some(Arc::clone(self.descriptor.annotations()));
        }
        if envelope.generic_type.is_none() {
            envelope.generic_type = match self.descriptor.return_type() {
                ReturnType::Response => envelope.entity_type().cloned(),
                declared => declared.generic_name().cloned(),
            };
        }
    }

    /// Rebuild and publish the interceptor snapshot.
    fn rebuild_snapshot(&self, trigger: RegistryKind) {
        let _guard = self.reload_lock.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = InterceptorSnapshot::build(&self.parent, &self.descriptor, generation);
        self.snapshot.store(Arc::new(snapshot));
        info!(
            handler_name = %self.descriptor.handler_name(),
            registry = %trigger,
            generation,
            "hot-reload: interceptor snapshot replaced"
        );
    }

    /// Unsubscribe from every registry this invoker or its parameter binders
    /// listen on. Idempotent.
    pub fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for (kind, id) in &subscriptions {
            self.parent.unsubscribe(*kind, *id);
        }
        let mut param_listeners = 0usize;
        for param in self.injector.params() {
            if let Some(id) = param.reader_subscription() {
                if self
                    .parent
                    .unsubscribe(RegistryKind::ReaderInterceptors, id)
                {
                    param_listeners += 1;
                }
            }
        }
        info!(
            handler_name = %self.descriptor.handler_name(),
            registries = subscriptions.len(),
            param_listeners,
            "Resource invoker cleaned up"
        );
    }

    /// Can this endpoint answer a request accepting `accepts`?
    #[must_use]
    pub fn does_produce(&self, accepts: &[MediaType]) -> bool {
        self.negotiator().can_produce(accepts)
    }

    /// Can this endpoint read a body of `content_type`?
    #[must_use]
    pub fn does_consume(&self, content_type: Option<&MediaType>) -> bool {
        self.negotiator().can_consume(content_type)
    }

    /// Media type to write `entity` with for `request`.
    #[must_use]
    pub fn resolve_content_type(
        &self,
        request: &DispatchRequest,
        entity: Option<&Entity>,
    ) -> MediaType {
        let snapshot = self.snapshot.load();
        self.negotiator()
            .resolve_response_media_type(request, entity, snapshot.registry())
    }

    fn negotiator(&self) -> ContentNegotiator<'_> {
        ContentNegotiator::new(&self.descriptor, self.expects_body)
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<HandlerDescriptor> {
        &self.descriptor
    }

    /// Per-method invocation counters.
    #[must_use]
    pub fn stats(&self) -> &InvocationStats {
        &self.stats
    }

    /// The snapshot new requests will use.
    #[must_use]
    pub fn snapshot(&self) -> Arc<InterceptorSnapshot> {
        self.snapshot.load_full()
    }

    #[must_use]
    pub fn request_filters(&self) -> Vec<Arc<dyn RequestFilter>> {
        self.snapshot.load().request_filters().to_vec()
    }

    #[must_use]
    pub fn response_filters(&self) -> Vec<Arc<dyn ResponseFilter>> {
        self.snapshot.load().response_filters().to_vec()
    }

    #[must_use]
    pub fn writer_interceptors(&self) -> Vec<Arc<dyn WriterInterceptor>> {
        self.snapshot.load().writer_interceptors().to_vec()
    }

    #[must_use]
    pub fn generic_return_type(&self) -> &ReturnType {
        self.descriptor.return_type()
    }

    #[must_use]
    pub fn resource_class(&self) -> &str {
        self.descriptor.resource_class()
    }

    #[must_use]
    pub fn method_annotations(&self) -> &Annotations {
        self.descriptor.annotations()
    }

    #[must_use]
    pub fn http_methods(&self) -> &[Method] {
        self.descriptor.http_methods()
    }

    #[must_use]
    pub fn produces(&self) -> &[MediaType] {
        self.descriptor.produces()
    }

    #[must_use]
    pub fn consumes(&self) -> &[MediaType] {
        self.descriptor.consumes()
    }

    #[must_use]
    pub fn expects_body(&self) -> bool {
        self.expects_body
    }

    #[must_use]
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }
}

impl RegistryListener for ResourceInvoker {
    fn on_registry_updated(&self, kind: RegistryKind) {
        if self.cleaned_up.load(Ordering::Acquire) {
            return;
        }
        self.rebuild_snapshot(kind);
    }
}

impl fmt::Debug for ResourceInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceInvoker")
            .field("handler_name", &self.descriptor.handler_name())
            .field("resource_class", &self.descriptor.resource_class())
            .field("expects_body", &self.expects_body)
            .field("validator", &self.validator.is_some())
            .field("generation", &self.snapshot.load().generation())
            .finish()
    }
}
