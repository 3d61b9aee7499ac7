//! # endpoint-dispatch
//!
//! **endpoint-dispatch** is the per-endpoint request dispatch engine of a
//! resource-oriented web framework. Route matching happens elsewhere; once a
//! request is matched to a handler, a [`ResourceInvoker`] drives it from
//! "matched" to either a response envelope, a suspended request, or a fault.
//!
//! ## Overview
//!
//! For every request the invoker:
//!
//! - counts the invocation per HTTP method ([`stats`])
//! - publishes the matched handler into the request context
//! - runs the endpoint's request filters, any of which may abort with a response
//! - validates the target and fails the dispatch on violations ([`validation`])
//! - invokes the handler through an injected [`MethodInjector`]
//! - attaches the response-side artifacts when the handler suspends ([`suspend`])
//! - normalizes the handler result into a [`ResponseEnvelope`]
//!
//! Content negotiation ([`negotiation`]) answers whether an endpoint can
//! produce or consume a media type and which media type a response is
//! written with.
//!
//! ## Architecture
//!
//! - **[`descriptor`]** - immutable metadata of a handler
//! - **[`provider`]** - filter/interceptor traits, the provider registries and
//!   their change notification
//! - **[`snapshot`]** - the endpoint's resolved interceptor lists
//! - **[`invoker`]** - the dispatch pipeline and hot reload
//! - **[`negotiation`]** - media type selection
//! - **[`request`]**, **[`envelope`]**, **[`context`]** - per-request data
//! - **[`injection`]** - seams to parameter binding and resource creation
//! - **[`config`]**, **[`logging`]** - runtime switches and tracing setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Router
//!     participant Invoker as ResourceInvoker
//!     participant Snapshot as InterceptorSnapshot
//!     participant Filters as Request filters
//!     participant Injector as MethodInjector
//!
//!     Router->>Invoker: invoke(request, response)
//!     Invoker->>Invoker: stats.record(method)
//!     Invoker->>Snapshot: load_full()
//!     Invoker->>Filters: filter(ctx) in priority order
//!     alt aborted
//!         Filters-->>Invoker: abort response
//!         Invoker-->>Router: Dispatched::Response
//!     else passed
//!         Invoker->>Injector: invoke(ctx)
//!         Injector-->>Invoker: HandlerOutcome
//!         Invoker-->>Router: Response / Suspended / DispatchError
//!     end
//! ```
//!
//! ### Key Architectural Patterns
//!
//! 1. **Immutable descriptor**: handler metadata never changes after build
//! 2. **Atomic snapshots**: interceptor lists are swapped with `arc-swap`, so a
//!    request sees one consistent set from entry to exit
//! 3. **Per-request state on the request**: violations and suspension state
//!    never live on the shared invoker
//! 4. **Weak listeners**: registries hold weak references to invokers and
//!    prune dead ones on notify
//!
//! ## Quick Start
//!
//! ```
//! use endpoint_dispatch::{
//!     Dispatched, DispatchRequest, HandlerDescriptor, HandlerOutcome, HttpResponse,
//!     InjectorFactory, InvocationContext, InvocationError, MethodInjector, ProviderRegistry,
//!     ResourceInvoker, ReturnType, Entity,
//! };
//! use http::Method;
//! use std::sync::Arc;
//!
//! struct Hello;
//! impl MethodInjector for Hello {
//!     fn invoke(&self, _ctx: &mut InvocationContext<'_>) -> Result<HandlerOutcome, InvocationError> {
//!         Ok(Entity::new("String", serde_json::json!("hello")).into())
//!     }
//! }
//!
//! struct HelloFactory;
//! impl InjectorFactory for HelloFactory {
//!     fn create_method_injector(
//!         &self,
//!         _descriptor: &HandlerDescriptor,
//!         _registry: &ProviderRegistry,
//!         _global: &Arc<ProviderRegistry>,
//!     ) -> Arc<dyn MethodInjector> {
//!         Arc::new(Hello)
//!     }
//! }
//!
//! let descriptor = HandlerDescriptor::builder("Greeter", "hello")
//!     .method(Method::GET)
//!     .path("/hello")
//!     .returns(ReturnType::typed("String"))
//!     .build()
//!     .unwrap();
//! let registry = Arc::new(ProviderRegistry::new());
//! let invoker = ResourceInvoker::builder(descriptor, registry, Arc::new(HelloFactory)).build();
//!
//! let mut request = DispatchRequest::new(Method::GET, "/hello");
//! let mut response = HttpResponse::new();
//! let target: endpoint_dispatch::Target = Arc::new(());
//! let dispatched = invoker
//!     .invoke_with_target(&mut request, &mut response, target)
//!     .unwrap();
//! let envelope = dispatched.into_response().unwrap();
//! assert_eq!(envelope.status, 200);
//! assert_eq!(invoker.stats().count("GET"), 1);
//! invoker.cleanup();
//! ```
//!
//! ## Runtime Considerations
//!
//! Dispatch is synchronous and runs on the caller's thread. A
//! `ResourceInvoker` is shared (`Arc`) across all threads serving its
//! endpoint; registry changes may arrive on any thread at any time.
//!
//! ## Logging
//!
//! All events go through `tracing`. Call [`logging::init_logging`] once in the
//! embedding binary; see [`logging`] for the environment variables.

pub mod config;
pub mod context;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod injection;
pub mod invoker;
pub mod logging;
pub mod media;
pub mod negotiation;
pub mod provider;
pub mod request;
pub mod snapshot;
pub mod stats;
pub mod suspend;
pub mod validation;

pub use config::InvokerConfig;
pub use context::InvocationContext;
pub use descriptor::{
    Annotation, Annotations, DescriptorError, HandlerDescriptor, HandlerDescriptorBuilder,
    ResourceInfo, ReturnType,
};
pub use envelope::{Entity, HandlerOutcome, HeaderVec, ResponseEnvelope};
pub use error::{DispatchError, FilterError, InvocationError};
pub use injection::{
    InjectorFactory, MethodInjector, ParameterBinder, ResourceFactory, SingletonResource,
};
pub use invoker::{DispatchState, Dispatched, ResourceInvoker, ResourceInvokerBuilder};
pub use media::{parse_accept, MediaType, MediaTypeParseError};
pub use negotiation::ContentNegotiator;
pub use provider::{
    DynamicFeature, FeatureContext, ListenerId, MessageBodyWriter, ProviderOptions,
    ProviderRegistry, ReaderInterceptor, RegistryKind, RegistryListener, RequestFilter,
    RequestFilterContext, ResponseFilter, WriterInterceptor,
};
pub use request::{DispatchRequest, HttpResponse, RequestContext, RequestId, Target, UriInfo};
pub use snapshot::InterceptorSnapshot;
pub use stats::InvocationStats;
pub use suspend::{AsyncContext, AsyncResponse, AttachedArtifacts};
pub use validation::{
    ConstraintViolation, FixedValidatorResolver, Validator, ValidatorResolver, ViolationSet,
};
