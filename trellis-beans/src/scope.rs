//! Custom scopes. The singleton and prototype scopes are built into the factory; any other scope
//! name declared by a definition dispatches to a [Scope] implementation registered under that
//! name, which provides its own instance cache.

use crate::bean::BeanPtr;
use crate::error::BeansError;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};

pub type ScopePtr = Arc<dyn Scope + Send + Sync>;

/// A container of bean instances with its own reuse policy.
pub trait Scope {
    /// Returns the instance stored under `name`, creating it through `producer` when absent.
    fn get(
        &self,
        name: &str,
        producer: &mut dyn FnMut() -> Result<BeanPtr, BeansError>,
    ) -> Result<BeanPtr, BeansError>;

    /// Removes and returns the instance stored under `name`, if any.
    fn remove(&self, name: &str) -> Option<BeanPtr>;
}

/// A scope tying instances to the calling thread. Each thread sees its own instance; removal
/// only affects the calling thread's one.
#[derive(Default)]
pub struct ThreadScope {
    instances: Mutex<FxHashMap<(ThreadId, String), BeanPtr>>,
}

impl Scope for ThreadScope {
    fn get(
        &self,
        name: &str,
        producer: &mut dyn FnMut() -> Result<BeanPtr, BeansError>,
    ) -> Result<BeanPtr, BeansError> {
        let key = (thread::current().id(), name.to_string());

        if let Some(existing) = self.instances.lock().get(&key) {
            return Ok(existing.clone());
        }

        let instance = producer()?;
        self.instances.lock().insert(key, instance.clone());
        Ok(instance)
    }

    fn remove(&self, name: &str) -> Option<BeanPtr> {
        self.instances
            .lock()
            .remove(&(thread::current().id(), name.to_string()))
    }
}
