//! Bean-style validation of the resolved target instance.
//!
//! The dispatch engine only needs `validate(target) -> violations`; how
//! constraints are declared is up to the [`Validator`] implementation.

use crate::media::MediaType;
use crate::request::Target;
use serde::Serialize;
use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintViolation {
    /// Property path, e.g. `pet.name` or `id`.
    pub path: String,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConstraintViolation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Violations collected for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationSet {
    violations: Vec<ConstraintViolation>,
}

impl ViolationSet {
    #[must_use]
    pub fn new(violations: Vec<ConstraintViolation>) -> Self {
        Self { violations }
    }

    pub fn push(&mut self, violation: ConstraintViolation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = ConstraintViolation>) {
        self.violations.extend(other);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter()
    }
}

impl Display for ViolationSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} constraint violation(s)", self.violations.len())?;
        for (idx, violation) in self.violations.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{sep}{violation}")?;
        }
        Ok(())
    }
}

/// Validates a resolved target instance.
pub trait Validator: Send + Sync {
    fn validate(&self, target: &(dyn Any + Send + Sync)) -> Vec<ConstraintViolation>;
}

/// Supplies a [`Validator`] for a media type, the way context resolvers do.
///
/// The dispatch engine asks once, for `*/*`, when an endpoint is built.
pub trait ValidatorResolver: Send + Sync {
    fn resolve(&self, media: &MediaType) -> Option<Arc<dyn Validator>>;
}

/// Resolver that always hands out the same validator.
pub struct FixedValidatorResolver(pub Arc<dyn Validator>);

impl ValidatorResolver for FixedValidatorResolver {
    fn resolve(&self, _media: &MediaType) -> Option<Arc<dyn Validator>> {
        Some(Arc::clone(&self.0))
    }
}

/// Run a validator against a target.
pub(crate) fn validate_target(validator: &dyn Validator, target: &Target) -> ViolationSet {
    ViolationSet::new(validator.validate(target.as_ref()))
}
