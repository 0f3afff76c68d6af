//! The per-call invocation object handed down the interceptor chain.

use crate::advice::Interceptor;
use crate::method::{Args, Method, MethodDispatch, RetVal};
use std::sync::Arc;
use trellis_beans::bean::BeanPtr;
use trellis_beans::error::ErrorPtr;

/// State of one proxied method call: the target, the method, the (mutable) arguments and the
/// position inside the interceptor chain.
pub struct Invocation<'a> {
    proxy: Option<BeanPtr>,
    target: &'a BeanPtr,
    method: &'a Method,
    args: Args,
    chain: &'a [Arc<dyn Interceptor>],
    dispatcher: &'a dyn MethodDispatch,
    index: usize,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        proxy: Option<BeanPtr>,
        target: &'a BeanPtr,
        method: &'a Method,
        args: Args,
        chain: &'a [Arc<dyn Interceptor>],
        dispatcher: &'a dyn MethodDispatch,
    ) -> Self {
        Self {
            proxy,
            target,
            method,
            args,
            chain,
            dispatcher,
            index: 0,
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        self.method
    }

    #[inline]
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Interceptors may rewrite arguments before proceeding.
    #[inline]
    pub fn args_mut(&mut self) -> &mut Args {
        &mut self.args
    }

    #[inline]
    pub fn target(&self) -> &BeanPtr {
        self.target
    }

    /// The proxy handling this call, when one is attached.
    #[inline]
    pub fn proxy(&self) -> Option<&BeanPtr> {
        self.proxy.as_ref()
    }

    /// Hands the invocation to the next interceptor, or - at the end of the chain - invokes the
    /// target method. The chain position is restored afterwards, so an interceptor may call
    /// `proceed` again to re-run the remainder (retry advice).
    pub fn proceed(&mut self) -> Result<RetVal, ErrorPtr> {
        if self.index == self.chain.len() {
            return self.dispatcher.dispatch(self.target, self.method, &self.args);
        }

        let interceptor = self.chain[self.index].clone();
        self.index += 1;
        let result = interceptor.invoke(self);
        self.index -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDispatch {
        calls: AtomicUsize,
    }

    impl MethodDispatch for CountingDispatch {
        fn dispatch(
            &self,
            _target: &BeanPtr,
            _method: &Method,
            _args: &Args,
        ) -> Result<RetVal, ErrorPtr> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Arc::new(1_i64) as BeanPtr))
        }
    }

    struct Retry;

    impl Interceptor for Retry {
        fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
            invocation.proceed()?;
            invocation.proceed()
        }
    }

    #[test]
    fn should_dispatch_to_target_with_empty_chain() {
        let dispatcher = CountingDispatch {
            calls: AtomicUsize::new(0),
        };
        let target: BeanPtr = Arc::new(());
        let method = Method::new("compute");

        let mut invocation = Invocation::new(None, &target, &method, vec![], &[], &dispatcher);
        assert!(invocation.proceed().unwrap().is_some());
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_allow_retrying_the_remaining_chain() {
        let dispatcher = CountingDispatch {
            calls: AtomicUsize::new(0),
        };
        let target: BeanPtr = Arc::new(());
        let method = Method::new("compute");
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Retry)];

        let mut invocation = Invocation::new(None, &target, &method, vec![], &chain, &dispatcher);
        invocation.proceed().unwrap();

        // the retry interceptor proceeded twice, so the target ran twice
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }
}
