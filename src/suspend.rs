//! # Request Suspension
//!
//! A handler may suspend its request instead of returning a result; the
//! response is then produced later by an asynchronous completion path.
//!
//! The dispatch engine's part in this is deliberately small. When it sees a
//! suspended request after invocation it attaches what the completion path
//! will need to the pending [`AsyncResponse`]:
//!
//! - the handler's annotations,
//! - the resolved writer interceptors and response filters,
//! - a back-reference to the [`ResourceInvoker`] so the completion path can
//!   run the same response-building step ([`ResourceInvoker::complete`]).
//!
//! It then returns [`Dispatched::Suspended`](crate::invoker::Dispatched) and
//! stops. Timeouts, cancellation and flushing belong to the completion path.

use crate::descriptor::Annotations;
use crate::invoker::ResourceInvoker;
use crate::provider::{ResponseFilter, WriterInterceptor};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Artifacts attached at suspension time.
#[derive(Clone, Default)]
pub struct AttachedArtifacts {
    pub annotations: Option<Annotations>,
    pub writer_interceptors: Vec<Arc<dyn WriterInterceptor>>,
    pub response_filters: Vec<Arc<dyn ResponseFilter>>,
    pub invoker: Option<Arc<ResourceInvoker>>,
}

/// Pending response for a suspended request.
///
/// Shared between the handler (which keeps it to resume later) and the
/// request's [`AsyncContext`].
#[derive(Default)]
pub struct AsyncResponse {
    artifacts: Mutex<AttachedArtifacts>,
}

impl AsyncResponse {
    pub fn set_annotations(&self, annotations: Annotations) {
        self.artifacts.lock().annotations = Some(annotations);
    }

    pub fn set_writer_interceptors(&self, interceptors: Vec<Arc<dyn WriterInterceptor>>) {
        self.artifacts.lock().writer_interceptors = interceptors;
    }

    pub fn set_response_filters(&self, filters: Vec<Arc<dyn ResponseFilter>>) {
        self.artifacts.lock().response_filters = filters;
    }

    pub fn set_invoker(&self, invoker: Arc<ResourceInvoker>) {
        self.artifacts.lock().invoker = Some(invoker);
    }

    /// Copy of everything attached so far.
    #[must_use]
    pub fn artifacts(&self) -> AttachedArtifacts {
        self.artifacts.lock().clone()
    }

    /// The invoker that dispatched the suspended request, once attached.
    #[must_use]
    pub fn invoker(&self) -> Option<Arc<ResourceInvoker>> {
        self.artifacts.lock().invoker.clone()
    }
}

impl fmt::Debug for AsyncResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artifacts = self.artifacts.lock();
        f.debug_struct("AsyncResponse")
            .field("annotations", &artifacts.annotations)
            .field("writer_interceptors", &artifacts.writer_interceptors.len())
            .field("response_filters", &artifacts.response_filters.len())
            .field("invoker", &artifacts.invoker.is_some())
            .finish()
    }
}

/// Per-request suspension state.
#[derive(Debug, Default)]
pub struct AsyncContext {
    response: Option<Arc<AsyncResponse>>,
}

impl AsyncContext {
    /// Suspend the request. Calling it twice returns the same pending response.
    pub fn suspend(&mut self) -> Arc<AsyncResponse> {
        Arc::clone(self.response.get_or_insert_with(Arc::default))
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.response.is_some()
    }

    #[must_use]
    pub fn async_response(&self) -> Option<&Arc<AsyncResponse>> {
        self.response.as_ref()
    }
}
