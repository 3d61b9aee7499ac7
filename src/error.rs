//! # Dispatch Errors
//!
//! Faults raised synchronously from dispatch. Nothing here is retried or
//! recovered locally; the response-writing layer maps each variant to an
//! HTTP error response (see [`DispatchError::status_hint`]).
//!
//! A content negotiation miss is not an error: it resolves to `*/*` and
//! writer selection reports the final failure.

use crate::validation::ViolationSet;
use std::error::Error as StdError;
use std::fmt;

/// Failure raised by a request filter while filtering.
#[derive(Debug)]
pub enum FilterError {
    /// Recoverable I/O failure (reading a header source, a token store, ...).
    Io(std::io::Error),
    /// The filter refused the request without composing a response itself.
    Rejected(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Io(e) => write!(f, "I/O failure: {e}"),
            FilterError::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

impl StdError for FilterError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            FilterError::Io(e) => Some(e),
            FilterError::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(e: std::io::Error) -> Self {
        FilterError::Io(e)
    }
}

/// Failure raised by the handler or while binding its parameters.
#[derive(Debug)]
pub enum InvocationError {
    /// The handler itself failed.
    Handler(anyhow::Error),
    /// A parameter could not be bound from the request.
    Binding { param: String, message: String },
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::Handler(e) => write!(f, "handler failed: {e}"),
            InvocationError::Binding { param, message } => {
                write!(f, "failed to bind parameter '{param}': {message}")
            }
        }
    }
}

impl StdError for InvocationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            InvocationError::Handler(e) => Some(e.as_ref()),
            InvocationError::Binding { .. } => None,
        }
    }
}

impl From<anyhow::Error> for InvocationError {
    fn from(e: anyhow::Error) -> Self {
        InvocationError::Handler(e)
    }
}

/// Fault surfaced from [`ResourceInvoker::invoke`](crate::invoker::ResourceInvoker::invoke).
#[derive(Debug)]
pub enum DispatchError {
    /// A request filter failed; the chain was aborted. Application-level fault.
    Filter { filter: String, source: FilterError },
    /// Constraint violations were found. Raised after the handler ran.
    Validation(ViolationSet),
    /// The handler failed. Application-level fault.
    Invocation(InvocationError),
    /// The target instance could not be created.
    ResourceCreation(anyhow::Error),
}

impl DispatchError {
    /// Conventional HTTP status for a fault mapper.
    #[must_use]
    pub fn status_hint(&self) -> u16 {
        match self {
            DispatchError::Validation(_) => 400,
            DispatchError::Invocation(InvocationError::Binding { .. }) => 400,
            DispatchError::Filter { .. }
            | DispatchError::Invocation(InvocationError::Handler(_))
            | DispatchError::ResourceCreation(_) => 500,
        }
    }

    /// Violations carried by a validation fault.
    #[must_use]
    pub fn violations(&self) -> Option<&ViolationSet> {
        match self {
            DispatchError::Validation(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Filter { filter, source } => {
                write!(f, "request filter '{filter}' failed: {source}")
            }
            DispatchError::Validation(set) => write!(f, "validation failed: {set}"),
            DispatchError::Invocation(e) => write!(f, "invocation failed: {e}"),
            DispatchError::ResourceCreation(e) => {
                write!(f, "failed to create resource instance: {e}")
            }
        }
    }
}

impl StdError for DispatchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DispatchError::Filter { source, .. } => Some(source),
            DispatchError::Validation(_) => None,
            DispatchError::Invocation(e) => Some(e),
            DispatchError::ResourceCreation(e) => Some(e.as_ref()),
        }
    }
}

impl From<InvocationError> for DispatchError {
    fn from(e: InvocationError) -> Self {
        DispatchError::Invocation(e)
    }
}
