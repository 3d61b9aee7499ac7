//! # Handler Descriptor
//!
//! Immutable metadata for one matched endpoint, created once when the route
//! is registered and shared read-only by every concurrent dispatch.
//!
//! ```rust
//! use endpoint_dispatch::descriptor::{Annotation, HandlerDescriptor, ReturnType};
//! use endpoint_dispatch::media::MediaType;
//!
//! let descriptor = HandlerDescriptor::builder("PetResource", "get_pet")
//!     .method(http::Method::GET)
//!     .path("/pets/{id}")
//!     .produces(MediaType::application_json())
//!     .returns(ReturnType::typed("Pet"))
//!     .annotation(Annotation::marker("Audited"))
//!     .build()
//!     .unwrap();
//!
//! assert!(descriptor.has_binding("Audited"));
//! ```

use crate::media::MediaType;
use http::Method;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A capability marker attached to a handler or to its declaring group.
///
/// Markers double as name-bindings: a provider registered with binding
/// `"Audited"` only applies to handlers carrying an `Audited` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub name: Arc<str>,
    pub value: Option<String>,
}

impl Annotation {
    #[must_use]
    pub fn marker(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name),
            value: Some(value.into()),
        }
    }
}

/// Shared, immutable annotation list. Cloning is an atomic increment.
pub type Annotations = Arc<[Annotation]>;

/// Declared return shape of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// Handler returns nothing.
    Void,
    /// Handler returns a response envelope whose entity type is only known at runtime.
    Response,
    /// Handler returns a value of the named (possibly generic) type, e.g. `Vec<Pet>`.
    Typed(Arc<str>),
}

impl ReturnType {
    #[must_use]
    pub fn typed(name: &str) -> Self {
        ReturnType::Typed(Arc::from(name))
    }

    /// Type name used as the generic entity type when the declared type is concrete.
    #[must_use]
    pub fn generic_name(&self) -> Option<&Arc<str>> {
        match self {
            ReturnType::Typed(name) => Some(name),
            ReturnType::Void | ReturnType::Response => None,
        }
    }
}

/// Builder rejected the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// At least one HTTP method is required.
    NoMethods { handler: String },
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::NoMethods { handler } => {
                write!(f, "handler '{handler}' declares no HTTP methods")
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Immutable metadata for one endpoint.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    resource_class: Arc<str>,
    handler_name: Arc<str>,
    path: Option<Arc<str>>,
    http_methods: Arc<[Method]>,
    produces: Arc<[MediaType]>,
    consumes: Arc<[MediaType]>,
    return_type: ReturnType,
    annotations: Annotations,
    group_annotations: Annotations,
}

impl HandlerDescriptor {
    #[must_use]
    pub fn builder(resource_class: &str, handler_name: &str) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder {
            resource_class: Arc::from(resource_class),
            handler_name: Arc::from(handler_name),
            path: None,
            http_methods: Vec::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
            return_type: ReturnType::Void,
            annotations: Vec::new(),
            group_annotations: Vec::new(),
        }
    }

    /// Name of the resource/controller type that declares the handler.
    #[must_use]
    pub fn resource_class(&self) -> &str {
        &self.resource_class
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Sub-path declared on the handler itself, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn http_methods(&self) -> &[Method] {
        &self.http_methods
    }

    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.http_methods.contains(method)
    }

    /// Declared produced types; empty means "anything".
    #[must_use]
    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    /// Declared consumed types; empty means "anything".
    #[must_use]
    pub fn consumes(&self) -> &[MediaType] {
        &self.consumes
    }

    #[must_use]
    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }

    /// Annotations declared on the handler itself.
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Annotations declared on the enclosing resource group.
    #[must_use]
    pub fn group_annotations(&self) -> &Annotations {
        &self.group_annotations
    }

    /// True when the handler or its group carries an annotation with this name.
    #[must_use]
    pub fn has_binding(&self, name: &str) -> bool {
        self.annotations
            .iter()
            .chain(self.group_annotations.iter())
            .any(|a| &*a.name == name)
    }

    /// The read-only view handed to dynamic features.
    #[must_use]
    pub fn resource_info(&self) -> ResourceInfo<'_> {
        ResourceInfo { descriptor: self }
    }
}

/// What a dynamic feature gets to see about the endpoint it configures.
#[derive(Debug, Clone, Copy)]
pub struct ResourceInfo<'a> {
    descriptor: &'a HandlerDescriptor,
}

impl ResourceInfo<'_> {
    #[must_use]
    pub fn resource_class(&self) -> &str {
        self.descriptor.resource_class()
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        self.descriptor.handler_name()
    }

    #[must_use]
    pub fn has_binding(&self, name: &str) -> bool {
        self.descriptor.has_binding(name)
    }

    #[must_use]
    pub fn http_methods(&self) -> &[Method] {
        self.descriptor.http_methods()
    }
}

pub struct HandlerDescriptorBuilder {
    resource_class: Arc<str>,
    handler_name: Arc<str>,
    path: Option<Arc<str>>,
    http_methods: Vec<Method>,
    produces: Vec<MediaType>,
    consumes: Vec<MediaType>,
    return_type: ReturnType,
    annotations: Vec<Annotation>,
    group_annotations: Vec<Annotation>,
}

impl HandlerDescriptorBuilder {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.http_methods.contains(&method) {
            self.http_methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(Arc::from(path));
        self
    }

    #[must_use]
    pub fn produces(mut self, media: MediaType) -> Self {
        self.produces.push(media);
        self
    }

    #[must_use]
    pub fn consumes(mut self, media: MediaType) -> Self {
        self.consumes.push(media);
        self
    }

    #[must_use]
    pub fn returns(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    #[must_use]
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn group_annotation(mut self, annotation: Annotation) -> Self {
        self.group_annotations.push(annotation);
        self
    }

    /// Freeze the descriptor.
    ///
    /// # Errors
    ///
    /// [`DescriptorError::NoMethods`] when no HTTP method was declared.
    pub fn build(self) -> Result<HandlerDescriptor, DescriptorError> {
        if self.http_methods.is_empty() {
            return Err(DescriptorError::NoMethods {
                handler: self.handler_name.to_string(),
            });
        }
        Ok(HandlerDescriptor {
            resource_class: self.resource_class,
            handler_name: self.handler_name,
            path: self.path,
            http_methods: self.http_methods.into(),
            produces: self.produces.into(),
            consumes: self.consumes.into(),
            return_type: self.return_type,
            annotations: self.annotations.into(),
            group_annotations: self.group_annotations.into(),
        })
    }
}
