//! Computation of the interceptor chain applying to one (method, target type) pair, with a
//! cache that lives as long as the frozen proxy configuration.

use crate::advice::Interceptor;
use crate::advisor::Advisor;
use crate::invocation::Invocation;
use crate::method::{Method, RetVal};
use crate::pointcut::MethodMatcher;
use fxhash::FxHashMap;
use itertools::Itertools;
use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;
use trellis_beans::error::ErrorPtr;

/// Wraps advice whose matcher is dynamic: the runtime match against the actual arguments
/// happens per call, skipping straight to the rest of the chain on a miss.
struct DynamicMatchInterceptor {
    delegate: Arc<dyn Interceptor>,
    matcher: Arc<dyn MethodMatcher>,
    target_type: TypeId,
}

impl Interceptor for DynamicMatchInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        if self
            .matcher
            .matches_with_args(invocation.method(), self.target_type, invocation.args())
        {
            self.delegate.invoke(invocation)
        } else {
            invocation.proceed()
        }
    }
}

/// Computes and caches interceptor chains for a fixed advisor list.
#[derive(Default)]
pub(crate) struct AdvisorChainFactory {
    cache: Mutex<FxHashMap<(String, TypeId), Arc<[Arc<dyn Interceptor>]>>>,
}

impl AdvisorChainFactory {
    /// The ordered interceptors applying to the method on the given target type. Advisors with
    /// explicit ordering metadata run first (lower order further out); the rest keep their
    /// registration order.
    pub(crate) fn interceptors_for(
        &self,
        advisors: &[Advisor],
        method: &Method,
        target_type: TypeId,
    ) -> Arc<[Arc<dyn Interceptor>]> {
        let key = (method.name.clone(), target_type);
        if let Some(chain) = self.cache.lock().get(&key) {
            return chain.clone();
        }

        let chain: Arc<[Arc<dyn Interceptor>]> = advisors
            .iter()
            .sorted_by_key(|advisor| advisor.order.unwrap_or(i32::MAX))
            .filter(|advisor| {
                advisor.pointcut.class_filter.matches(target_type)
                    && advisor.pointcut.method_matcher.matches(method, target_type)
            })
            .map(|advisor| {
                let interceptor = advisor.advice.as_interceptor();
                if advisor.pointcut.method_matcher.is_runtime() {
                    Arc::new(DynamicMatchInterceptor {
                        delegate: interceptor,
                        matcher: advisor.pointcut.method_matcher.clone(),
                        target_type,
                    }) as Arc<dyn Interceptor>
                } else {
                    interceptor
                }
            })
            .collect();

        self.cache.lock().insert(key, chain.clone());
        chain
    }

    /// Drops all cached chains; required whenever the advisor list changes.
    #[allow(dead_code)]
    pub(crate) fn invalidate(&self) {
        self.cache.lock().clear();
    }
}
