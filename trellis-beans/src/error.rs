use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Type-erased error returned by user-supplied callbacks (constructors, setters, init and destroy
/// methods). The container wraps these into [BeansError] variants with a proper source chain.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Errors related to registering, creating and managing beans.
#[derive(Error, Debug, Clone)]
pub enum BeansError {
    /// No definition or externally registered singleton exists for the given name or type.
    #[error("No bean named or typed '{0}' is defined.")]
    NoSuchBean(String),
    /// A type query matched more than one candidate and neither a primary marker nor a name
    /// resolved the tie.
    #[error("No unique bean for query '{query}' - candidates: {candidates:?}.")]
    NoUniqueBean {
        query: String,
        candidates: Vec<String>,
    },
    /// Any failure during instantiation, population or initialisation of a bean. Carries the
    /// causal chain plus messages of recovered transient failures.
    #[error("Error creating bean '{name}': {source}")]
    BeanCreation {
        name: String,
        #[source]
        source: Box<BeansError>,
        suppressed: Vec<String>,
    },
    /// A user-supplied callback returned an error.
    #[error("Error in user callback: {0}")]
    Callback(#[source] ErrorPtr),
    /// A singleton was requested from within its own creation and early exposure could not
    /// resolve the cycle.
    #[error("Singleton '{0}' is currently in creation - unresolvable circular reference.")]
    CircularCreation(String),
    /// A prototype was re-entered from within its own construction.
    #[error("Prototype '{0}' is currently in creation - circular reference.")]
    CircularPrototype(String),
    /// The `depends-on` graph contains a cycle.
    #[error("Circular depends-on relationship between '{name}' and '{depends_on}'.")]
    CircularDependsOn { name: String, depends_on: String },
    /// The parent chain of a definition loops back on itself.
    #[error("Definition parent chain for '{0}' is circular.")]
    CircularParent(String),
    /// The finished bean is not the object handed out through early exposure, but dependants
    /// already hold the early reference.
    #[error(
        "Bean '{0}' has been injected into other beans in its early form, but was subsequently \
         replaced during initialisation."
    )]
    InconsistentEarlyReference(String),
    /// Constructor selection could not settle on a single candidate.
    #[error("Ambiguous constructor for bean '{0}'.")]
    AmbiguousConstructor(String),
    /// Autowiring found no candidate for an injection point.
    #[error("Unresolvable dependency '{parameter}' of bean '{name}'.")]
    UnresolvableDependency { name: String, parameter: String },
    /// Mutation was attempted after the configuration was frozen.
    #[error("Configuration is frozen - definitions can no longer change.")]
    ConfigurationFrozen,
    /// The container has begun shutting down.
    #[error("Container is closed.")]
    ContainerClosed,
    /// Duplicate registration rejected by policy, or an alias collides with a definition name.
    #[error("Conflicting registration for name '{0}'.")]
    NameConflict(String),
    /// Registering the alias would make the alias chain cyclic.
    #[error("Registering alias '{0}' would create a circular alias chain.")]
    CircularAlias(String),
    /// Removal of an alias that is not registered.
    #[error("No alias '{0}' is registered.")]
    UnknownAlias(String),
    /// A placeholder key could not be resolved and no default was given.
    #[error("Could not resolve placeholder '{0}'.")]
    UnresolvedPlaceholder(String),
    /// A placeholder key is already being expanded on the current call stack.
    #[error("Circular placeholder reference '{0}'.")]
    CircularPlaceholder(String),
    /// The resolved instance cannot be viewed as the requested type.
    #[error("Bean '{name}' is not of required type '{expected}'.")]
    TypeMismatch { name: String, expected: String },
    /// The `&` dereference prefix was used on a bean that is not a factory bean.
    #[error("Bean '{0}' is not a factory bean.")]
    NotAFactory(String),
    /// A definition names a scope no registered [Scope](crate::scope::Scope) implementation
    /// covers.
    #[error("Unrecognized scope: {0}")]
    UnrecognizedScope(String),
}

impl BeansError {
    /// Wraps an error into [BeansError::BeanCreation] unless it already is one for the same bean.
    pub(crate) fn into_creation_error(self, name: &str) -> BeansError {
        match self {
            BeansError::BeanCreation {
                name: existing,
                source,
                suppressed,
            } if existing == name => BeansError::BeanCreation {
                name: existing,
                source,
                suppressed,
            },
            other => BeansError::BeanCreation {
                name: name.to_string(),
                source: Box::new(other),
                suppressed: vec![],
            },
        }
    }
}
