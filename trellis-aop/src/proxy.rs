//! The proxy core: a frozen [ProxyConfig] plus the dispatch object walking the interceptor
//! chain per invocation. Class synthesis is replaced by interface-forwarding shims (see
//! [crate::method::MethodDispatch]); the dispatch algorithm itself is independent of how the
//! shim came to be.

use crate::advisor::Advisor;
use crate::chain::AdvisorChainFactory;
use crate::error::AopError;
use crate::invocation::Invocation;
use crate::method::{Args, Interface, Method, RetVal};
use crate::target::{SingletonTargetSource, TargetSource};
use std::any::Any;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;
use trellis_beans::bean::BeanPtr;

thread_local! {
    /// The proxy handling the innermost invocation on this thread, when `expose_proxy` is set.
    static CURRENT_PROXY: RefCell<Option<BeanPtr>> = RefCell::new(None);
}

/// The proxy currently handling an invocation on this thread, if one chose to expose itself.
pub fn current_proxy() -> Option<BeanPtr> {
    CURRENT_PROXY.with(|slot| slot.borrow().clone())
}

/// Restores the previous expose-proxy slot value on every exit path.
struct ExposeGuard {
    previous: Option<BeanPtr>,
}

impl ExposeGuard {
    fn install(proxy: BeanPtr) -> Self {
        CURRENT_PROXY.with(|slot| Self {
            previous: slot.borrow_mut().replace(proxy),
        })
    }
}

impl Drop for ExposeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_PROXY.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Returns a non-static target to its source on every exit path.
struct TargetReleaseGuard<'a> {
    source: &'a dyn TargetSource,
    target: Option<BeanPtr>,
}

impl Drop for TargetReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            self.source.release_target(target);
        }
    }
}

/// The full configuration a proxy dispatches against: ordered advisors, the target source, the
/// proxied interfaces and the behaviour flags. Frozen when the first proxy is realised.
#[derive(Clone)]
pub struct ProxyConfig {
    advisors: Vec<Advisor>,
    target_source: Arc<dyn TargetSource>,
    interfaces: Vec<Arc<Interface>>,
    proxy_target_class: bool,
    expose_proxy: bool,
    opaque: bool,
    frozen: bool,
    optimize: bool,
}

impl ProxyConfig {
    pub fn advisors(&self) -> &[Advisor] {
        &self.advisors
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    pub fn interfaces(&self) -> &[Arc<Interface>] {
        &self.interfaces
    }

    pub fn is_proxy_target_class(&self) -> bool {
        self.proxy_target_class
    }

    pub fn is_expose_proxy(&self) -> bool {
        self.expose_proxy
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_optimize(&self) -> bool {
        self.optimize
    }

    /// Structural comparison: two configurations are equal when they proxy the same interfaces
    /// with the same advice against the same target source.
    fn structural_eq(&self, other: &ProxyConfig) -> bool {
        self.proxy_target_class == other.proxy_target_class
            && self.expose_proxy == other.expose_proxy
            && self.opaque == other.opaque
            && self.optimize == other.optimize
            && self.interfaces.len() == other.interfaces.len()
            && self
                .interfaces
                .iter()
                .zip(&other.interfaces)
                .all(|(left, right)| left.name == right.name)
            && self.advisors.len() == other.advisors.len()
            && self
                .advisors
                .iter()
                .zip(&other.advisors)
                .all(|(left, right)| left.same_advice(right))
            && Arc::ptr_eq(&self.target_source, &other.target_source)
    }
}

/// Builder and mutation surface for a [ProxyConfig]. All mutators fail once the configuration
/// froze - explicitly or by realising the first proxy.
pub struct ProxyFactory {
    config: ProxyConfig,
    realized: bool,
}

impl ProxyFactory {
    pub fn new(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            config: ProxyConfig {
                advisors: vec![],
                target_source,
                interfaces: vec![],
                proxy_target_class: false,
                expose_proxy: false,
                opaque: false,
                frozen: false,
                optimize: false,
            },
            realized: false,
        }
    }

    /// Convenience for proxying one fixed instance.
    pub fn for_target(target: BeanPtr) -> Self {
        Self::new(Arc::new(SingletonTargetSource::new(target)))
    }

    pub fn set_proxy_target_class(&mut self, value: bool) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.proxy_target_class = value;
        Ok(())
    }

    pub fn set_expose_proxy(&mut self, value: bool) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.expose_proxy = value;
        Ok(())
    }

    pub fn set_opaque(&mut self, value: bool) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.opaque = value;
        Ok(())
    }

    pub fn set_optimize(&mut self, value: bool) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.optimize = value;
        Ok(())
    }

    /// Freezing is always allowed; unfreezing only before the first proxy was realised.
    pub fn set_frozen(&mut self, value: bool) -> Result<(), AopError> {
        if !value && self.realized {
            return Err(AopError::ConfigurationFrozen);
        }
        self.config.frozen = value;
        Ok(())
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource>) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.target_source = target_source;
        Ok(())
    }

    pub fn add_interface(&mut self, interface: Interface) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.interfaces.push(Arc::new(interface));
        Ok(())
    }

    pub fn add_advisor(&mut self, advisor: Advisor) -> Result<(), AopError> {
        self.check_mutable()?;
        self.config.advisors.push(advisor);
        Ok(())
    }

    pub fn remove_advisor(&mut self, index: usize) -> Result<(), AopError> {
        self.check_mutable()?;
        if index >= self.config.advisors.len() {
            return Err(AopError::NoSuchAdvisor(index));
        }
        self.config.advisors.remove(index);
        Ok(())
    }

    /// Realises the proxy. The configuration freezes here: later mutation attempts fail, so
    /// every proxy obtained from this factory dispatches against the same advisor list.
    pub fn get_proxy(&mut self) -> Arc<Proxy> {
        self.realized = true;
        self.config.frozen = true;

        debug!(
            advisors = self.config.advisors.len(),
            interfaces = self.config.interfaces.len(),
            "Realising proxy."
        );

        Arc::new(Proxy {
            config: self.config.clone(),
            chains: AdvisorChainFactory::default(),
        })
    }

    fn check_mutable(&self) -> Result<(), AopError> {
        if self.realized || self.config.frozen {
            Err(AopError::ConfigurationFrozen)
        } else {
            Ok(())
        }
    }
}

/// The dispatch object behind every proxied invocation. Interface shims hold an `Arc<Proxy>`
/// and forward each call through [invoke](Self::invoke).
pub struct Proxy {
    config: ProxyConfig,
    chains: AdvisorChainFactory,
}

impl Proxy {
    /// Dispatches one proxied invocation: obtain the target, optionally expose the proxy, walk
    /// the interceptor chain (or short-circuit straight to the target), then normalise
    /// self-returning methods to the proxy.
    pub fn invoke(self: &Arc<Self>, method: &Method, args: Args) -> Result<RetVal, AopError> {
        let interface = self
            .config
            .interfaces
            .iter()
            .find(|interface| interface.declares(&method.name))
            .ok_or_else(|| AopError::NoSuchMethod(method.name.clone()))?;

        let target = self.config.target_source.get_target()?;
        let _release = TargetReleaseGuard {
            source: self.config.target_source.as_ref(),
            target: (!self.config.target_source.is_static()).then(|| target.clone()),
        };

        let _expose = self
            .config
            .expose_proxy
            .then(|| ExposeGuard::install(self.clone() as BeanPtr));

        let target_type = self
            .config
            .target_source
            .target_type()
            .unwrap_or_else(|| (*target).type_id());
        let chain = self
            .chains
            .interceptors_for(&self.config.advisors, method, target_type);

        debug!(method = %method.name, interceptors = chain.len(), "Dispatching proxied invocation.");

        let result = if chain.is_empty() {
            interface.dispatcher.dispatch(&target, method, &args)
        } else {
            let mut invocation = Invocation::new(
                Some(self.clone() as BeanPtr),
                &target,
                method,
                args,
                &chain,
                interface.dispatcher.as_ref(),
            );
            invocation.proceed()
        }
        .map_err(AopError::Invocation)?;

        // fluent interfaces: a method returning its raw receiver keeps returning the proxy
        Ok(match result {
            Some(value) if method.returns_self_type && Arc::ptr_eq(&value, &target) => {
                Some(self.clone() as BeanPtr)
            }
            other => other,
        })
    }

    /// The frozen configuration, unless the proxy is opaque.
    pub fn advised(&self) -> Option<&ProxyConfig> {
        (!self.config.opaque).then_some(&self.config)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.config.structural_eq(&other.config)
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.config.proxy_target_class.hash(state);
        self.config.expose_proxy.hash(state);
        self.config.opaque.hash(state);
        self.config.optimize.hash(state);
        self.config.advisors.len().hash(state);
        for interface in &self.config.interfaces {
            interface.name.hash(state);
        }
    }
}
