//! The reflective method model. Rust synthesises no classes at runtime, so proxied interfaces
//! are described by name and dispatched through a [MethodDispatch] shim - typically a small
//! hand-written forwarder per interface - while the interception machinery stays generic.

use std::sync::Arc;
use trellis_beans::bean::BeanPtr;
use trellis_beans::error::ErrorPtr;

/// Type-erased argument list of one invocation.
pub type Args = Vec<BeanPtr>;

/// Type-erased return value; `None` models a unit-returning method.
pub type RetVal = Option<BeanPtr>;

/// Descriptor of one proxied method.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Method {
    pub name: String,
    /// Whether the declared return type is the proxied interface itself. Fluent methods
    /// returning their own receiver get the proxy substituted for the raw target.
    pub returns_self_type: bool,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns_self_type: false,
        }
    }

    /// Marks the method as returning its own declaring type.
    pub fn returning_self(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns_self_type: true,
        }
    }
}

/// Invokes a method on the raw target. Implementations downcast the target and forward -
/// the build-time stand-in for reflective dispatch.
pub trait MethodDispatch: Send + Sync {
    fn dispatch(&self, target: &BeanPtr, method: &Method, args: &Args) -> Result<RetVal, ErrorPtr>;
}

/// One proxied interface: the set of method names it declares plus the dispatch shim forwarding
/// them to a target.
pub struct Interface {
    pub name: String,
    methods: Vec<String>,
    pub dispatcher: Arc<dyn MethodDispatch>,
}

impl Interface {
    pub fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
        dispatcher: Arc<dyn MethodDispatch>,
    ) -> Self {
        Self {
            name: name.into(),
            methods: methods.into_iter().map(Into::into).collect(),
            dispatcher,
        }
    }

    #[inline]
    pub fn declares(&self, method: &str) -> bool {
        self.methods.iter().any(|declared| declared == method)
    }
}
