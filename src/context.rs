//! Per-request invocation state.
//!
//! An [`InvocationContext`] is created on the stack when dispatch reaches the
//! handler and dropped when dispatch returns (or hands off at suspension).
//! It only borrows per-request data, so nothing in it can leak onto the
//! shared [`ResourceInvoker`](crate::invoker::ResourceInvoker).

use crate::descriptor::HandlerDescriptor;
use crate::request::{DispatchRequest, HttpResponse, Target};
use crate::suspend::AsyncResponse;
use crate::validation::ConstraintViolation;
use std::any::Any;
use std::sync::Arc;

pub struct InvocationContext<'a> {
    pub request: &'a mut DispatchRequest,
    pub response: &'a mut HttpResponse,
    target: &'a Target,
    descriptor: &'a HandlerDescriptor,
}

impl<'a> InvocationContext<'a> {
    pub(crate) fn new(
        request: &'a mut DispatchRequest,
        response: &'a mut HttpResponse,
        target: &'a Target,
        descriptor: &'a HandlerDescriptor,
    ) -> Self {
        Self {
            request,
            response,
            target,
            descriptor,
        }
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        self.target
    }

    /// Downcast the target to its concrete resource type.
    #[must_use]
    pub fn target_as<T: Any>(&self) -> Option<&T> {
        (**self.target).downcast_ref::<T>()
    }

    #[must_use]
    pub fn descriptor(&self) -> &HandlerDescriptor {
        self.descriptor
    }

    /// Record a violation found while binding or running the handler.
    /// Any recorded violation fails the dispatch once the handler returns.
    pub fn add_violation(&mut self, violation: ConstraintViolation) {
        self.request
            .context
            .violations
            .get_or_insert_with(Default::default)
            .push(violation);
    }

    /// Suspend the request; the returned handle stays valid after dispatch returns.
    pub fn suspend(&mut self) -> Arc<AsyncResponse> {
        self.request.async_context.suspend()
    }
}
