//! Hooks running around bean initialisation. Post-processors may replace the instance they
//! receive; the replacement becomes the bean other components see.

use crate::bean::BeanPtr;
use crate::error::ErrorPtr;
#[cfg(test)]
use mockall::automock;

/// Callback invoked around the initialisation of every bean the factory creates.
///
/// Processors run sorted by [order](Self::order) (lower first), registration order breaking
/// ties.
#[cfg_attr(test, automock)]
pub trait BeanPostProcessor: Send + Sync {
    /// Runs after property population, before any init method.
    fn before_init(&self, bean: BeanPtr, name: &str) -> Result<BeanPtr, ErrorPtr> {
        let _ = name;
        Ok(bean)
    }

    /// Runs after init methods. A proxy-installing processor typically wraps here.
    fn after_init(&self, bean: BeanPtr, name: &str) -> Result<BeanPtr, ErrorPtr> {
        let _ = name;
        Ok(bean)
    }

    /// Runs when an in-creation singleton is exposed early to close a circular reference. A
    /// processor which wraps in [after_init](Self::after_init) must wrap here as well, so
    /// dependants receive the same object the container finally publishes.
    fn on_early_exposure(&self, bean: BeanPtr, name: &str) -> Result<BeanPtr, ErrorPtr> {
        let _ = name;
        Ok(bean)
    }

    fn order(&self) -> i32 {
        0
    }
}
