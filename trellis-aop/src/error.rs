use thiserror::Error;
use trellis_beans::error::{BeansError, ErrorPtr};

/// Errors related to proxy configuration and invocation.
#[derive(Error, Debug, Clone)]
pub enum AopError {
    /// Mutation attempted after the configuration was frozen or a proxy was realised.
    #[error("Proxy configuration is frozen.")]
    ConfigurationFrozen,
    /// Advisor removal with an out-of-bounds index.
    #[error("Advisor index {0} is out of bounds.")]
    NoSuchAdvisor(usize),
    /// The invoked method is not declared by any proxied interface.
    #[error("No proxied interface declares method '{0}'.")]
    NoSuchMethod(String),
    /// A pooled target source ran out of instances and the checkout timed out.
    #[error("No pooled target for '{name}' became available within {timeout_ms} ms.")]
    PoolTimeout { name: String, timeout_ms: u64 },
    /// The target source could not obtain a target from the bean factory.
    #[error("Failed to resolve proxy target: {0}")]
    Target(#[from] BeansError),
    /// An interceptor, advice or the target method itself failed.
    #[error("Proxied invocation failed: {0}")]
    Invocation(#[source] ErrorPtr),
}
