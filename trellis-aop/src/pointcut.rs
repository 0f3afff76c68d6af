//! Pointcuts decide where advice applies: a [ClassFilter] over target types and a
//! [MethodMatcher] over methods. Static matchers are evaluated once per (method, target type)
//! and cached with the chain; runtime matchers are additionally consulted per call with the
//! actual arguments.

use crate::method::{Args, Method};
use fxhash::FxHashSet;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;
use std::sync::Arc;

/// Predicate over target types.
#[cfg_attr(test, automock)]
pub trait ClassFilter: Send + Sync {
    fn matches(&self, target_type: TypeId) -> bool;
}

/// Predicate over methods. A matcher reporting [is_runtime](Self::is_runtime) also sees the
/// actual arguments on every call.
#[cfg_attr(test, automock)]
pub trait MethodMatcher: Send + Sync {
    fn matches(&self, method: &Method, target_type: TypeId) -> bool;

    fn is_runtime(&self) -> bool {
        false
    }

    fn matches_with_args(&self, method: &Method, target_type: TypeId, args: &Args) -> bool {
        let _ = args;
        self.matches(method, target_type)
    }
}

/// A class filter matching everything.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    #[inline]
    fn matches(&self, _target_type: TypeId) -> bool {
        true
    }
}

/// A method matcher matching everything, statically.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    #[inline]
    fn matches(&self, _method: &Method, _target_type: TypeId) -> bool {
        true
    }
}

/// Where advice applies: class filter plus method matcher.
#[derive(Clone)]
pub struct Pointcut {
    pub class_filter: Arc<dyn ClassFilter>,
    pub method_matcher: Arc<dyn MethodMatcher>,
}

impl Pointcut {
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// The canonical "always applies" pointcut.
    pub fn always() -> Self {
        Self {
            class_filter: Arc::new(TrueClassFilter),
            method_matcher: Arc::new(TrueMethodMatcher),
        }
    }
}

impl Default for Pointcut {
    fn default() -> Self {
        Self::always()
    }
}

/// Pointcut matching method names against simple patterns: exact names plus `*` wildcards at
/// either end (`set*`, `*name`, `*mid*`).
#[derive(Clone, Debug, Default)]
pub struct NameMatchMethodPointcut {
    patterns: FxHashSet<String>,
}

impl NameMatchMethodPointcut {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.insert(pattern.into());
        self
    }

    pub fn into_pointcut(self) -> Pointcut {
        Pointcut {
            class_filter: Arc::new(TrueClassFilter),
            method_matcher: Arc::new(self),
        }
    }
}

impl MethodMatcher for NameMatchMethodPointcut {
    fn matches(&self, method: &Method, _target_type: TypeId) -> bool {
        self.patterns
            .iter()
            .any(|pattern| simple_match(pattern, &method.name))
    }
}

/// `*`-wildcard matching in the style of simple bean-name patterns.
fn simple_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(suffix), None) => value.ends_with(suffix),
        (None, Some(prefix)) => value.starts_with(prefix),
        (Some(_), Some(_)) => value.contains(&pattern[1..pattern.len() - 1]),
        (None, None) => pattern == value,
    }
}
