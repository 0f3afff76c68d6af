//! Target sources abstract how the object behind a proxy is obtained per invocation: a fixed
//! instance, a fresh prototype, a thread-bound or pooled instance, or a hot-swappable
//! reference.

use crate::error::AopError;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use parking_lot::{Condvar, Mutex, RwLock};
use std::any::{Any, TypeId};
use std::mem;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::debug;
use trellis_beans::bean::BeanPtr;
use trellis_beans::factory::BeanFactory;

/// Supplies the current target for a proxied invocation and takes it back afterwards.
#[cfg_attr(test, automock)]
pub trait TargetSource: Send + Sync {
    /// The target type, when known without obtaining an instance.
    fn target_type(&self) -> Option<TypeId> {
        None
    }

    /// Whether every call returns the same instance; static sources skip the release step.
    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<BeanPtr, AopError>;

    fn release_target(&self, target: BeanPtr) {
        let _ = target;
    }
}

/// Holds one fixed target instance.
pub struct SingletonTargetSource {
    target: BeanPtr,
}

impl SingletonTargetSource {
    pub fn new(target: BeanPtr) -> Self {
        Self { target }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_type(&self) -> Option<TypeId> {
        Some((*self.target).type_id())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<BeanPtr, AopError> {
        Ok(self.target.clone())
    }
}

/// Resolves a fresh prototype instance from the bean factory on every invocation.
pub struct PrototypeTargetSource {
    factory: Arc<BeanFactory>,
    bean_name: String,
}

impl PrototypeTargetSource {
    pub fn new(factory: Arc<BeanFactory>, bean_name: impl Into<String>) -> Self {
        Self {
            factory,
            bean_name: bean_name.into(),
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_type(&self) -> Option<TypeId> {
        self.factory.get_type(&self.bean_name).ok().flatten()
    }

    fn get_target(&self) -> Result<BeanPtr, AopError> {
        Ok(self.factory.get_bean(&self.bean_name)?)
    }
}

/// Binds one target instance to each calling thread, created on first touch.
pub struct ThreadLocalTargetSource {
    factory: Arc<BeanFactory>,
    bean_name: String,
    instances: Mutex<FxHashMap<ThreadId, BeanPtr>>,
}

impl ThreadLocalTargetSource {
    pub fn new(factory: Arc<BeanFactory>, bean_name: impl Into<String>) -> Self {
        Self {
            factory,
            bean_name: bean_name.into(),
            instances: Default::default(),
        }
    }

    /// Number of threads currently holding a bound instance.
    pub fn bound_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Drops every thread-bound instance; called on registry shutdown.
    pub fn destroy(&self) {
        let dropped = self.instances.lock().drain().count();
        debug!(bean = %self.bean_name, dropped, "Destroyed thread-bound targets.");
    }
}

impl TargetSource for ThreadLocalTargetSource {
    fn target_type(&self) -> Option<TypeId> {
        self.factory.get_type(&self.bean_name).ok().flatten()
    }

    fn get_target(&self) -> Result<BeanPtr, AopError> {
        let thread = thread::current().id();

        if let Some(existing) = self.instances.lock().get(&thread) {
            return Ok(existing.clone());
        }

        let target = self.factory.get_bean(&self.bean_name)?;
        self.instances.lock().insert(thread, target.clone());
        Ok(target)
    }
}

struct PoolState {
    idle: Vec<BeanPtr>,
    created: usize,
}

/// Checks targets out of a bounded pool, blocking with a timeout when exhausted. Instances are
/// resolved from the bean factory, so the pooled bean is expected to be prototype-scoped.
pub struct PooledTargetSource {
    factory: Arc<BeanFactory>,
    bean_name: String,
    max_size: usize,
    timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PooledTargetSource {
    pub fn new(
        factory: Arc<BeanFactory>,
        bean_name: impl Into<String>,
        max_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            bean_name: bean_name.into(),
            max_size,
            timeout,
            state: Mutex::new(PoolState {
                idle: vec![],
                created: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Instances created so far, pooled or checked out.
    pub fn size(&self) -> usize {
        self.state.lock().created
    }
}

impl TargetSource for PooledTargetSource {
    fn target_type(&self) -> Option<TypeId> {
        self.factory.get_type(&self.bean_name).ok().flatten()
    }

    fn get_target(&self) -> Result<BeanPtr, AopError> {
        let deadline = Instant::now() + self.timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(target) = state.idle.pop() {
                return Ok(target);
            }

            if state.created < self.max_size {
                state.created += 1;
                drop(state);

                return match self.factory.get_bean(&self.bean_name) {
                    Ok(target) => Ok(target),
                    Err(error) => {
                        self.state.lock().created -= 1;
                        self.available.notify_one();
                        Err(error.into())
                    }
                };
            }

            if self.available.wait_until(&mut state, deadline).timed_out() {
                return Err(AopError::PoolTimeout {
                    name: self.bean_name.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        }
    }

    fn release_target(&self, target: BeanPtr) {
        self.state.lock().idle.push(target);
        self.available.notify_one();
    }
}

/// A single target reference which can be atomically replaced at runtime; readers always see a
/// consistent pointer.
pub struct HotSwapTargetSource {
    target: RwLock<BeanPtr>,
}

impl HotSwapTargetSource {
    pub fn new(initial: BeanPtr) -> Self {
        Self {
            target: RwLock::new(initial),
        }
    }

    /// Installs a new target, returning the previous one.
    pub fn swap(&self, new_target: BeanPtr) -> BeanPtr {
        mem::replace(&mut *self.target.write(), new_target)
    }
}

impl TargetSource for HotSwapTargetSource {
    fn target_type(&self) -> Option<TypeId> {
        Some((**self.target.read()).type_id())
    }

    fn get_target(&self) -> Result<BeanPtr, AopError> {
        Ok(self.target.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_beans::bean::{BeanClass, ConstructorSpec};
    use trellis_beans::definition::{BeanDefinition, PROTOTYPE};

    struct Worker;

    fn worker_factory() -> Arc<BeanFactory> {
        let class = Arc::new(BeanClass::new::<Worker>().constructor(ConstructorSpec {
            params: vec![],
            invoke: Arc::new(|_| Ok(Arc::new(Worker) as BeanPtr)),
        }));

        let factory = BeanFactory::default();
        factory
            .register_definition(
                "worker",
                BeanDefinition::of(class).with_scope(PROTOTYPE),
            )
            .unwrap();
        Arc::new(factory)
    }

    #[test]
    fn should_serve_one_static_instance() {
        let target: BeanPtr = Arc::new(Worker);
        let source = SingletonTargetSource::new(target.clone());

        assert!(source.is_static());
        assert!(Arc::ptr_eq(&source.get_target().unwrap(), &target));
        assert_eq!(source.target_type(), Some(TypeId::of::<Worker>()));
    }

    #[test]
    fn should_create_prototype_per_call() {
        let source = PrototypeTargetSource::new(worker_factory(), "worker");

        let first = source.get_target().unwrap();
        let second = source.get_target().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!source.is_static());
    }

    #[test]
    fn should_bind_instances_per_thread() {
        let source = Arc::new(ThreadLocalTargetSource::new(worker_factory(), "worker"));

        let local_first = source.get_target().unwrap();
        let local_second = source.get_target().unwrap();
        assert!(Arc::ptr_eq(&local_first, &local_second));

        let remote_source = source.clone();
        let remote = thread::spawn(move || remote_source.get_target().unwrap())
            .join()
            .unwrap();
        assert!(!Arc::ptr_eq(&local_first, &remote));

        assert_eq!(source.bound_count(), 2);
        source.destroy();
        assert_eq!(source.bound_count(), 0);
    }

    #[test]
    fn should_reuse_released_pool_instances() {
        let source =
            PooledTargetSource::new(worker_factory(), "worker", 1, Duration::from_millis(50));

        let target = source.get_target().unwrap();
        source.release_target(target.clone());

        let again = source.get_target().unwrap();
        assert!(Arc::ptr_eq(&target, &again));
        assert_eq!(source.size(), 1);
    }

    #[test]
    fn should_time_out_when_pool_exhausted() {
        let source =
            PooledTargetSource::new(worker_factory(), "worker", 1, Duration::from_millis(20));

        let _checked_out = source.get_target().unwrap();
        assert!(matches!(
            source.get_target().unwrap_err(),
            AopError::PoolTimeout { .. }
        ));
    }

    #[test]
    fn should_unblock_waiting_checkout_on_release() {
        let source = Arc::new(PooledTargetSource::new(
            worker_factory(),
            "worker",
            1,
            Duration::from_secs(5),
        ));

        let checked_out = source.get_target().unwrap();

        let waiting = {
            let source = source.clone();
            thread::spawn(move || source.get_target().unwrap())
        };

        thread::sleep(Duration::from_millis(10));
        source.release_target(checked_out);

        waiting.join().unwrap();
    }

    #[test]
    fn should_swap_targets_atomically() {
        let first: BeanPtr = Arc::new(Worker);
        let second: BeanPtr = Arc::new(Worker);
        let source = HotSwapTargetSource::new(first.clone());

        assert!(Arc::ptr_eq(&source.get_target().unwrap(), &first));

        let previous = source.swap(second.clone());
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(&source.get_target().unwrap(), &second));
    }
}
