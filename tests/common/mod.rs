#![allow(dead_code)]

pub mod fixtures {
    use endpoint_dispatch::{
        Annotation, ConstraintViolation, DispatchRequest, Entity, FilterError, HandlerDescriptor,
        HandlerOutcome, HttpResponse, InjectorFactory, InvocationContext, InvocationError,
        ListenerId, MediaType, MessageBodyWriter, MethodInjector, ParameterBinder,
        ProviderRegistry, ReaderInterceptor, RegistryKind, RegistryListener, RequestFilter, RequestFilterContext,
        ResponseEnvelope, ResponseFilter, ReturnType, Target, Validator, WriterInterceptor,
    };
    use http::Method;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, OnceLock, Weak};

    pub type Handler =
        dyn Fn(&mut InvocationContext<'_>) -> Result<HandlerOutcome, InvocationError> + Send + Sync;

    /// Shared log of which providers ran, in order.
    #[derive(Clone, Default)]
    pub struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        pub fn push(&self, entry: &str) {
            self.0.lock().unwrap().push(entry.to_string());
        }

        pub fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Request filter that records its name and passes.
    pub struct RecordingFilter {
        pub name: String,
        pub log: CallLog,
    }

    impl RecordingFilter {
        pub fn new(name: &str, log: &CallLog) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                log: log.clone(),
            })
        }
    }

    impl RequestFilter for RecordingFilter {
        fn filter(&self, _ctx: &mut RequestFilterContext<'_>) -> Result<(), FilterError> {
            self.log.push(&self.name);
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    /// Request filter that records its name and aborts with `status`.
    pub struct AbortingFilter {
        pub name: String,
        pub status: u16,
        pub log: CallLog,
    }

    impl AbortingFilter {
        pub fn new(name: &str, status: u16, log: &CallLog) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                status,
                log: log.clone(),
            })
        }
    }

    impl RequestFilter for AbortingFilter {
        fn filter(&self, ctx: &mut RequestFilterContext<'_>) -> Result<(), FilterError> {
            self.log.push(&self.name);
            let mut response = ResponseEnvelope::error(self.status, "denied");
            response.set_header("x-aborted-by", self.name.clone());
            ctx.abort_with(response);
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    /// Request filter that fails with an I/O error.
    pub struct FailingFilter;

    impl RequestFilter for FailingFilter {
        fn filter(&self, _ctx: &mut RequestFilterContext<'_>) -> Result<(), FilterError> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "token store unreachable").into())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    pub struct NamedResponseFilter(pub &'static str);

    impl ResponseFilter for NamedResponseFilter {
        fn filter(
            &self,
            _request: &DispatchRequest,
            _response: &mut ResponseEnvelope,
        ) -> Result<(), FilterError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    pub struct NamedWriterInterceptor(pub &'static str);

    impl WriterInterceptor for NamedWriterInterceptor {
        fn around_write(
            &self,
            _response: &mut ResponseEnvelope,
            _media: &MediaType,
        ) -> Result<(), FilterError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    pub struct NamedReaderInterceptor(pub &'static str);

    impl ReaderInterceptor for NamedReaderInterceptor {
        fn around_read(&self, _body: &mut serde_json::Value) -> Result<(), FilterError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    /// Writer that serializes only `type_name` entities as `text/csv`.
    pub struct CsvWriter {
        pub type_name: &'static str,
    }

    impl MessageBodyWriter for CsvWriter {
        fn is_writeable(
            &self,
            type_name: &str,
            _generic_type: Option<&str>,
            _annotations: &[Annotation],
            media: &MediaType,
        ) -> bool {
            type_name == self.type_name && media.main_type() == "text" && media.subtype() == "csv"
        }
    }

    /// Body parameter binder that listens for reader-interceptor changes on
    /// the global registry.
    pub struct BodyParam {
        subscription: OnceLock<ListenerId>,
        reader_changes: Arc<AtomicUsize>,
    }

    impl BodyParam {
        pub fn subscribe(global: &Arc<ProviderRegistry>, reader_changes: &Arc<AtomicUsize>) -> Arc<Self> {
            let param = Arc::new(Self {
                subscription: OnceLock::new(),
                reader_changes: Arc::clone(reader_changes),
            });
            let weak: Weak<BodyParam> = Arc::downgrade(&param);
            let listener: Weak<dyn RegistryListener> = weak;
            let id = global.subscribe(RegistryKind::ReaderInterceptors, listener);
            let _ = param.subscription.set(id);
            param
        }
    }

    impl RegistryListener for BodyParam {
        fn on_registry_updated(&self, _kind: RegistryKind) {
            self.reader_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ParameterBinder for BodyParam {
        fn name(&self) -> &str {
            "body"
        }

        fn reader_subscription(&self) -> Option<ListenerId> {
            self.subscription.get().copied()
        }
    }

    /// Method injector backed by a closure.
    pub struct FnInjector {
        pub handler: Arc<Handler>,
        pub expects_body: bool,
        pub params: Vec<Arc<dyn ParameterBinder>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl MethodInjector for FnInjector {
        fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<HandlerOutcome, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.handler)(ctx)
        }

        fn expects_body(&self) -> bool {
            self.expects_body
        }

        fn params(&self) -> Vec<Arc<dyn ParameterBinder>> {
            self.params.clone()
        }
    }

    /// Injector factory handing out one [`FnInjector`] and counting handler calls.
    #[derive(Clone)]
    pub struct FnInjectorFactory {
        pub handler: Arc<Handler>,
        pub expects_body: bool,
        pub body_binder: bool,
        pub reader_changes: Arc<AtomicUsize>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FnInjectorFactory {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&mut InvocationContext<'_>) -> Result<HandlerOutcome, InvocationError>
                + Send
                + Sync
                + 'static,
        {
            Self {
                handler: Arc::new(handler),
                expects_body: false,
                body_binder: false,
                reader_changes: Arc::new(AtomicUsize::new(0)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn returning(outcome: HandlerOutcome) -> Self {
            Self::new(move |_ctx| Ok(outcome.clone()))
        }

        pub fn with_body(mut self) -> Self {
            self.expects_body = true;
            self
        }

        /// Bind the body through a [`BodyParam`] created with each injector.
        pub fn with_body_binder(mut self) -> Self {
            self.expects_body = true;
            self.body_binder = true;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Reader-interceptor change notifications seen by body binders.
        pub fn reader_changes(&self) -> usize {
            self.reader_changes.load(Ordering::SeqCst)
        }
    }

    impl InjectorFactory for FnInjectorFactory {
        fn create_method_injector(
            &self,
            _descriptor: &HandlerDescriptor,
            _registry: &ProviderRegistry,
            global: &Arc<ProviderRegistry>,
        ) -> Arc<dyn MethodInjector> {
            let mut params: Vec<Arc<dyn ParameterBinder>> = Vec::new();
            if self.body_binder {
                params.push(BodyParam::subscribe(global, &self.reader_changes));
            }
            Arc::new(FnInjector {
                handler: Arc::clone(&self.handler),
                expects_body: self.expects_body,
                params,
                calls: Arc::clone(&self.calls),
            })
        }
    }

    /// The resource instance handlers run against.
    #[derive(Debug, Default)]
    pub struct PetResource {
        pub name: String,
    }

    pub fn pet_target(name: &str) -> Target {
        Arc::new(PetResource {
            name: name.to_string(),
        })
    }

    /// Flags every [`PetResource`] with an empty name.
    pub struct PetValidator;

    impl Validator for PetValidator {
        fn validate(&self, target: &(dyn Any + Send + Sync)) -> Vec<ConstraintViolation> {
            match target.downcast_ref::<PetResource>() {
                Some(pet) if pet.name.is_empty() => {
                    vec![ConstraintViolation::new("name", "must not be empty")]
                }
                _ => Vec::new(),
            }
        }
    }

    /// `GET /pets` handler descriptor returning a typed `Pet`.
    pub fn pets_descriptor() -> HandlerDescriptor {
        HandlerDescriptor::builder("PetResource", "list_pets")
            .method(Method::GET)
            .path("/pets")
            .produces(MediaType::application_json())
            .returns(ReturnType::typed("Pet"))
            .annotation(Annotation::marker("Traced"))
            .build()
            .unwrap()
    }

    pub fn get(path: &str) -> (DispatchRequest, HttpResponse) {
        (DispatchRequest::new(Method::GET, path), HttpResponse::new())
    }

    pub fn pet_entity(name: &str) -> Entity {
        Entity::new("Pet", serde_json::json!({ "name": name }))
    }
}
