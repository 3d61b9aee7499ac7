use super::{
    DynamicFeature, MessageBodyWriter, ReaderInterceptor, RequestFilter, ResponseFilter,
    WriterInterceptor,
};
use crate::descriptor::{Annotation, HandlerDescriptor};
use crate::media::MediaType;
use crate::validation::{Validator, ValidatorResolver};
use parking_lot::{Mutex, RwLock};
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Priority given to providers registered without one.
pub const DEFAULT_PRIORITY: i32 = 5000;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Which interceptor registry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    RequestFilters,
    ResponseFilters,
    WriterInterceptors,
    ReaderInterceptors,
}

impl Display for RegistryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryKind::RequestFilters => "request_filters",
            RegistryKind::ResponseFilters => "response_filters",
            RegistryKind::WriterInterceptors => "writer_interceptors",
            RegistryKind::ReaderInterceptors => "reader_interceptors",
        };
        f.write_str(name)
    }
}

/// Receives change notifications from an [`InterceptorRegistry`].
pub trait RegistryListener: Send + Sync {
    fn on_registry_updated(&self, kind: RegistryKind);
}

/// Handle returned by [`InterceptorRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Priority and name-bindings for a registration.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    priority: Option<i32>,
    bindings: Vec<Arc<str>>,
}

impl ProviderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower runs first.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Only apply to endpoints carrying this annotation.
    #[must_use]
    pub fn bound_to(mut self, annotation: &str) -> Self {
        self.bindings.push(Arc::from(annotation));
        self
    }
}

struct Registration<T: ?Sized> {
    provider: Arc<T>,
    priority: i32,
    bindings: Arc<[Arc<str>]>,
    seq: u64,
}

impl<T: ?Sized> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            priority: self.priority,
            bindings: Arc::clone(&self.bindings),
            seq: self.seq,
        }
    }
}

impl<T: ?Sized> Registration<T> {
    fn applies_to(&self, descriptor: &HandlerDescriptor) -> bool {
        self.bindings.iter().all(|b| descriptor.has_binding(b))
    }
}

/// Ordered providers of one kind plus the listeners interested in changes.
pub struct InterceptorRegistry<T: ?Sized> {
    kind: RegistryKind,
    entries: RwLock<Vec<Registration<T>>>,
    /// Bumped on every registration, before listeners are notified.
    revision: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn RegistryListener>)>>,
}

impl<T: ?Sized> InterceptorRegistry<T> {
    fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the entries without listeners, for endpoint-private registries.
    fn detached_copy(&self) -> Self {
        Self {
            kind: self.kind,
            entries: RwLock::new(self.entries.read().clone()),
            revision: AtomicU64::new(self.revision()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Add a provider, then notify listeners.
    pub fn register(&self, provider: Arc<T>, options: ProviderOptions) {
        let registration = Registration {
            provider,
            priority: options.priority.unwrap_or(DEFAULT_PRIORITY),
            bindings: options.bindings.into(),
            seq: NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.write().push(registration);
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.notify();
    }

    /// Number of registrations made so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Providers applicable to `descriptor`, in execution order.
    #[must_use]
    pub fn post_match(&self, descriptor: &HandlerDescriptor) -> Vec<Arc<T>> {
        let mut matched: Vec<Registration<T>> = self
            .entries
            .read()
            .iter()
            .filter(|r| r.applies_to(descriptor))
            .cloned()
            .collect();
        matched.sort_by_key(|r| (r.priority, r.seq));
        matched.into_iter().map(|r| r.provider).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Register interest in changes to this registry.
    pub fn subscribe(&self, listener: Weak<dyn RegistryListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((id, listener));
        trace!(registry = %self.kind, listener_id = id.0, "listener subscribed");
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        trace!(registry = %self.kind, listener_id = id.0, removed, "listener unsubscribed");
        removed
    }

    /// Live listeners currently subscribed.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|(_, l)| l.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        // Callbacks run outside the lock so listeners may read this registry.
        let live: Vec<Arc<dyn RegistryListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };
        debug!(registry = %self.kind, listeners = live.len(), "registry updated");
        for listener in live {
            listener.on_registry_updated(self.kind);
        }
    }
}

/// All providers visible to an endpoint.
///
/// One global instance is shared by every endpoint; each endpoint also gets
/// a private [`scoped`](ProviderRegistry::scoped) copy that dynamic features
/// add to.
pub struct ProviderRegistry {
    request_filters: InterceptorRegistry<dyn RequestFilter>,
    response_filters: InterceptorRegistry<dyn ResponseFilter>,
    writer_interceptors: InterceptorRegistry<dyn WriterInterceptor>,
    reader_interceptors: InterceptorRegistry<dyn ReaderInterceptor>,
    dynamic_features: RwLock<Vec<Arc<dyn DynamicFeature>>>,
    writers: RwLock<Vec<Arc<dyn MessageBodyWriter>>>,
    validator_resolver: RwLock<Option<Arc<dyn ValidatorResolver>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_filters: InterceptorRegistry::new(RegistryKind::RequestFilters),
            response_filters: InterceptorRegistry::new(RegistryKind::ResponseFilters),
            writer_interceptors: InterceptorRegistry::new(RegistryKind::WriterInterceptors),
            reader_interceptors: InterceptorRegistry::new(RegistryKind::ReaderInterceptors),
            dynamic_features: RwLock::new(Vec::new()),
            writers: RwLock::new(Vec::new()),
            validator_resolver: RwLock::new(None),
        }
    }

    /// Endpoint-private registry seeded with everything `parent` holds.
    /// Listeners are not copied.
    #[must_use]
    pub fn scoped(parent: &ProviderRegistry) -> Self {
        Self {
            request_filters: parent.request_filters.detached_copy(),
            response_filters: parent.response_filters.detached_copy(),
            writer_interceptors: parent.writer_interceptors.detached_copy(),
            reader_interceptors: parent.reader_interceptors.detached_copy(),
            dynamic_features: RwLock::new(parent.dynamic_features.read().clone()),
            writers: RwLock::new(parent.writers.read().clone()),
            validator_resolver: RwLock::new(parent.validator_resolver.read().clone()),
        }
    }

    #[must_use]
    pub fn request_filters(&self) -> &InterceptorRegistry<dyn RequestFilter> {
        &self.request_filters
    }

    #[must_use]
    pub fn response_filters(&self) -> &InterceptorRegistry<dyn ResponseFilter> {
        &self.response_filters
    }

    #[must_use]
    pub fn writer_interceptors(&self) -> &InterceptorRegistry<dyn WriterInterceptor> {
        &self.writer_interceptors
    }

    #[must_use]
    pub fn reader_interceptors(&self) -> &InterceptorRegistry<dyn ReaderInterceptor> {
        &self.reader_interceptors
    }

    /// Subscribe to the interceptor registry of `kind`.
    pub fn subscribe(&self, kind: RegistryKind, listener: Weak<dyn RegistryListener>) -> ListenerId {
        match kind {
            RegistryKind::RequestFilters => self.request_filters.subscribe(listener),
            RegistryKind::ResponseFilters => self.response_filters.subscribe(listener),
            RegistryKind::WriterInterceptors => self.writer_interceptors.subscribe(listener),
            RegistryKind::ReaderInterceptors => self.reader_interceptors.subscribe(listener),
        }
    }

    /// Returns `false` when `id` was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: RegistryKind, id: ListenerId) -> bool {
        match kind {
            RegistryKind::RequestFilters => self.request_filters.unsubscribe(id),
            RegistryKind::ResponseFilters => self.response_filters.unsubscribe(id),
            RegistryKind::WriterInterceptors => self.writer_interceptors.unsubscribe(id),
            RegistryKind::ReaderInterceptors => self.reader_interceptors.unsubscribe(id),
        }
    }

    /// Revision of the interceptor registry of `kind`.
    #[must_use]
    pub fn revision(&self, kind: RegistryKind) -> u64 {
        match kind {
            RegistryKind::RequestFilters => self.request_filters.revision(),
            RegistryKind::ResponseFilters => self.response_filters.revision(),
            RegistryKind::WriterInterceptors => self.writer_interceptors.revision(),
            RegistryKind::ReaderInterceptors => self.reader_interceptors.revision(),
        }
    }

    /// Live listeners on the interceptor registry of `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: RegistryKind) -> usize {
        match kind {
            RegistryKind::RequestFilters => self.request_filters.listener_count(),
            RegistryKind::ResponseFilters => self.response_filters.listener_count(),
            RegistryKind::WriterInterceptors => self.writer_interceptors.listener_count(),
            RegistryKind::ReaderInterceptors => self.reader_interceptors.listener_count(),
        }
    }

    pub fn register_request_filter(&self, filter: Arc<dyn RequestFilter>) {
        self.request_filters.register(filter, ProviderOptions::new());
    }

    pub fn register_response_filter(&self, filter: Arc<dyn ResponseFilter>) {
        self.response_filters.register(filter, ProviderOptions::new());
    }

    pub fn register_writer_interceptor(&self, interceptor: Arc<dyn WriterInterceptor>) {
        self.writer_interceptors
            .register(interceptor, ProviderOptions::new());
    }

    /// Dynamic features take effect the next time a snapshot is built.
    pub fn register_dynamic_feature(&self, feature: Arc<dyn DynamicFeature>) {
        self.dynamic_features.write().push(feature);
    }

    #[must_use]
    pub fn dynamic_features(&self) -> Vec<Arc<dyn DynamicFeature>> {
        self.dynamic_features.read().clone()
    }

    pub fn register_writer(&self, writer: Arc<dyn MessageBodyWriter>) {
        self.writers.write().push(writer);
    }

    pub fn set_validator_resolver(&self, resolver: Arc<dyn ValidatorResolver>) {
        *self.validator_resolver.write() = Some(resolver);
    }

    /// Validator for `media`, if a resolver is installed and provides one.
    #[must_use]
    pub fn validator(&self, media: &MediaType) -> Option<Arc<dyn Validator>> {
        self.validator_resolver
            .read()
            .as_ref()
            .and_then(|resolver| resolver.resolve(media))
    }

    /// First writer, in registration order, able to write the entity as `media`.
    #[must_use]
    pub fn find_writer(
        &self,
        type_name: &str,
        generic_type: Option<&str>,
        annotations: &[Annotation],
        media: &MediaType,
    ) -> Option<Arc<dyn MessageBodyWriter>> {
        self.writers
            .read()
            .iter()
            .find(|w| w.is_writeable(type_name, generic_type, annotations, media))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::provider::RequestFilterContext;
    use http::Method;
    use std::sync::atomic::AtomicUsize;

    struct Named(&'static str);

    impl RequestFilter for Named {
        fn filter(&self, _ctx: &mut RequestFilterContext<'_>) -> Result<(), FilterError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    impl RegistryListener for CountingListener {
        fn on_registry_updated(&self, _kind: RegistryKind) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn descriptor(bindings: &[&str]) -> HandlerDescriptor {
        let mut builder = HandlerDescriptor::builder("Res", "handler").method(Method::GET);
        for b in bindings {
            builder = builder.annotation(Annotation::marker(b));
        }
        builder.build().unwrap()
    }

    fn names(filters: &[Arc<dyn RequestFilter>]) -> Vec<String> {
        filters.iter().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn test_post_match_orders_by_priority_then_registration() {
        let registry = ProviderRegistry::new();
        let filters = registry.request_filters();
        filters.register(Arc::new(Named("late")), ProviderOptions::new().priority(9000));
        filters.register(Arc::new(Named("first")), ProviderOptions::new());
        filters.register(Arc::new(Named("second")), ProviderOptions::new());
        filters.register(Arc::new(Named("auth")), ProviderOptions::new().priority(1000));

        let matched = filters.post_match(&descriptor(&[]));
        assert_eq!(names(&matched), vec!["auth", "first", "second", "late"]);
    }

    #[test]
    fn test_post_match_respects_name_bindings() {
        let registry = ProviderRegistry::new();
        let filters = registry.request_filters();
        filters.register(Arc::new(Named("global")), ProviderOptions::new());
        filters.register(
            Arc::new(Named("audited")),
            ProviderOptions::new().bound_to("Audited"),
        );

        assert_eq!(names(&filters.post_match(&descriptor(&[]))), vec!["global"]);
        assert_eq!(
            names(&filters.post_match(&descriptor(&["Audited"]))),
            vec!["global", "audited"]
        );
    }

    #[test]
    fn test_listeners_notified_and_unsubscribed() {
        let registry = ProviderRegistry::new();
        let listener = Arc::new(CountingListener::default());
        let weak: Weak<dyn RegistryListener> = Arc::downgrade(&listener) as Weak<dyn RegistryListener>;
        let id = registry.request_filters().subscribe(weak);

        registry.register_request_filter(Arc::new(Named("a")));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

        assert!(registry.request_filters().unsubscribe(id));
        assert!(!registry.request_filters().unsubscribe(id));
        registry.register_request_filter(Arc::new(Named("b")));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_listeners_are_pruned() {
        let registry = ProviderRegistry::new();
        let listener = Arc::new(CountingListener::default());
        let weak: Weak<dyn RegistryListener> = Arc::downgrade(&listener) as Weak<dyn RegistryListener>;
        registry.response_filters().subscribe(weak);
        assert_eq!(registry.response_filters().listener_count(), 1);
        drop(listener);
        assert_eq!(registry.response_filters().listener_count(), 0);
    }

    #[test]
    fn test_scoped_copy_is_isolated_from_parent() {
        let parent = ProviderRegistry::new();
        parent.register_request_filter(Arc::new(Named("global")));
        let listener = Arc::new(CountingListener::default());
        let weak: Weak<dyn RegistryListener> = Arc::downgrade(&listener) as Weak<dyn RegistryListener>;
        parent.request_filters().subscribe(weak);

        let scoped = ProviderRegistry::scoped(&parent);
        scoped.register_request_filter(Arc::new(Named("private")));

        assert_eq!(parent.request_filters().len(), 1);
        assert_eq!(scoped.request_filters().len(), 2);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_revision_counts_registrations_per_kind() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.revision(RegistryKind::RequestFilters), 0);
        registry.register_request_filter(Arc::new(Named("a")));
        registry.register_request_filter(Arc::new(Named("b")));
        assert_eq!(registry.revision(RegistryKind::RequestFilters), 2);
        assert_eq!(registry.revision(RegistryKind::ResponseFilters), 0);

        let scoped = ProviderRegistry::scoped(&registry);
        scoped.register_request_filter(Arc::new(Named("private")));
        assert_eq!(scoped.revision(RegistryKind::RequestFilters), 3);
        assert_eq!(registry.revision(RegistryKind::RequestFilters), 2);
    }
}
