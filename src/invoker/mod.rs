//! # Invoker Module
//!
//! The per-endpoint dispatch pipeline. A [`ResourceInvoker`] is built once
//! per matched endpoint and shared by every request routed to it.
//!
//! ## Request Flow
//!
//! ```text
//! MATCHED ──► REQUEST_FILTERING ──► VALIDATING ──► INVOKING ──┬──► SUSPENDED
//!                   │                                          └──► BUILDING_RESPONSE ──► DONE
//!                   └──► ABORTED
//! ```
//!
//! 1. **Matched** - count the invocation, push matched URI and current
//!    resource, publish the descriptor into the request context
//! 2. **Request filtering** - validate the target (if a validator exists)
//!    and stash violations, then run request filters in order; the first
//!    abort short-circuits the rest and the handler
//! 3. **Invoking** - call the handler through the method injector
//! 4. **Validating** - any collected violation fails the dispatch
//! 5. **Suspension** - a suspended request gets the response-side artifacts
//!    attached and dispatch returns [`Dispatched::Suspended`]
//! 6. **Building response** - normalize the handler outcome into a
//!    [`ResponseEnvelope`](crate::envelope::ResponseEnvelope)
//!
//! ## Concurrency
//!
//! The descriptor is immutable. Interceptors live in an
//! [`InterceptorSnapshot`](crate::snapshot::InterceptorSnapshot) behind an
//! `ArcSwap`: each request loads it once at entry and uses that snapshot to
//! the end, so a concurrent hot reload never changes the filters of a
//! request already in flight. Per-request state lives on the request.
//!
//! ## Hot reload
//!
//! The invoker subscribes to the global request-filter, response-filter and
//! writer-interceptor registries. Any change rebuilds the snapshot from
//! scratch (dynamic features included) and swaps it in. Call
//! [`ResourceInvoker::cleanup`] when the endpoint is undeployed.

mod core;

pub use core::{DispatchState, Dispatched, ResourceInvoker, ResourceInvokerBuilder};
