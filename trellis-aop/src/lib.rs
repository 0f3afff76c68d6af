//! Method-interception proxies for [trellis_beans] containers.
//!
//! An [Advisor](advisor::Advisor) pairs a [Pointcut](pointcut::Pointcut) with an
//! [Advice](advice::Advice); a [ProxyFactory](proxy::ProxyFactory) assembles advisors, a
//! [TargetSource](target::TargetSource) and the proxied [Interface](method::Interface)
//! descriptions into a [Proxy](proxy::Proxy) whose every invocation walks the matching
//! interceptor chain around the real method call.
//!
//! There is no runtime class synthesis in Rust, so an interface is proxied through a small
//! hand-written shim implementing the interface trait over an `Arc<Proxy>` - the dispatch
//! algorithm, chain caching, target-source indirection and expose-proxy semantics all live
//! here and stay generic.

pub mod advice;
pub mod advisor;
pub(crate) mod chain;
pub mod error;
pub mod invocation;
pub mod method;
pub mod pointcut;
pub mod proxy;
pub mod target;
