//! Advice forms and their reduction to one uniform dispatch interface. Interceptors wrap a
//! [proceed](crate::invocation::Invocation::proceed) call; the before / after-returning /
//! after-throwing forms are adapted into interceptors by table dispatch over [Advice].

use crate::invocation::Invocation;
use crate::method::{Args, Method, RetVal};
use std::sync::Arc;
use trellis_beans::error::ErrorPtr;

/// Uniform around-advice interface walked per invocation. An interceptor may call
/// [Invocation::proceed] zero, one or many times - short-circuiting, suppressing or retrying the
/// rest of the chain.
pub trait Interceptor: Send + Sync {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr>;
}

/// Advice running before the method; a returned error aborts the invocation.
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, method: &Method, args: &Args) -> Result<(), ErrorPtr>;
}

/// Advice observing the successful return value.
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, value: &RetVal, method: &Method, args: &Args)
        -> Result<(), ErrorPtr>;
}

/// Advice observing a failed invocation; the original error is rethrown afterwards.
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(&self, method: &Method, error: &ErrorPtr);
}

/// Any supported advice form.
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn Interceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn ThrowsAdvice>),
}

impl Advice {
    /// Converts to the uniform interceptor interface.
    pub(crate) fn as_interceptor(&self) -> Arc<dyn Interceptor> {
        match self {
            Advice::Around(interceptor) => interceptor.clone(),
            Advice::Before(advice) => Arc::new(BeforeAdviceInterceptor {
                advice: advice.clone(),
            }),
            Advice::AfterReturning(advice) => Arc::new(AfterReturningInterceptor {
                advice: advice.clone(),
            }),
            Advice::AfterThrowing(advice) => Arc::new(ThrowsAdviceInterceptor {
                advice: advice.clone(),
            }),
        }
    }

    /// Identity of the underlying advice object, for structural proxy comparison.
    pub(crate) fn identity(&self) -> *const () {
        match self {
            Advice::Around(advice) => Arc::as_ptr(advice) as *const (),
            Advice::Before(advice) => Arc::as_ptr(advice) as *const (),
            Advice::AfterReturning(advice) => Arc::as_ptr(advice) as *const (),
            Advice::AfterThrowing(advice) => Arc::as_ptr(advice) as *const (),
        }
    }
}

struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl Interceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        self.advice.before(invocation.method(), invocation.args())?;
        invocation.proceed()
    }
}

struct AfterReturningInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl Interceptor for AfterReturningInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        let value = invocation.proceed()?;
        self.advice
            .after_returning(&value, invocation.method(), invocation.args())?;
        Ok(value)
    }
}

struct ThrowsAdviceInterceptor {
    advice: Arc<dyn ThrowsAdvice>,
}

impl Interceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(error) => {
                self.advice.after_throwing(invocation.method(), &error);
                Err(error)
            }
        }
    }
}
