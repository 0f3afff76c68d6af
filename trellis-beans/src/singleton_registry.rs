//! The authoritative cache for shared bean instances: ready and early-exposed singletons,
//! creation-in-progress tracking, inter-bean edges and dependency-aware destruction. The
//! registry does not know how to build an instance - it receives a producer callback.

use crate::bean::BeanPtr;
use crate::error::{BeansError, ErrorPtr};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Zero-argument producer of the early (not yet populated) form of a singleton, registered while
/// the bean is in creation to close circular references.
pub type EarlyFactoryFn = Box<dyn FnOnce() -> Result<BeanPtr, BeansError> + Send>;

/// Disposal callback invoked exactly once during destruction. Failures are logged and swallowed.
pub type DisposeFn = Box<dyn FnOnce() -> Result<(), ErrorPtr> + Send>;

/// Cache and lifecycle coordinator for singletons.
#[derive(Default)]
pub struct SingletonRegistry {
    /// Fully initialised instances. Publication under the write lock gives release/acquire
    /// ordering to readers.
    singletons: RwLock<FxHashMap<String, BeanPtr>>,
    registration_order: Mutex<Vec<String>>,
    early_instances: Mutex<FxHashMap<String, BeanPtr>>,
    early_factories: Mutex<FxHashMap<String, EarlyFactoryFn>>,
    /// Names whose early reference has actually been handed out to a dependant.
    early_consumed: Mutex<FxHashSet<String>>,
    /// Names in creation in any thread.
    creating: Mutex<FxHashSet<String>>,
    /// Names in creation per thread - the re-entrance detector.
    creating_by_thread: Mutex<FxHashMap<ThreadId, FxHashSet<String>>>,
    /// Per-name creation locks so distinct names can be built in parallel.
    creation_locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
    suppressed_by_thread: Mutex<FxHashMap<ThreadId, Vec<String>>>,
    disposables: Mutex<FxHashMap<String, DisposeFn>>,
    disposal_order: Mutex<Vec<String>>,
    /// `dependents[b]` holds every bean that must be destroyed before `b`.
    dependents: Mutex<FxHashMap<String, FxHashSet<String>>>,
    /// Inverse of `dependents`.
    depends_on: Mutex<FxHashMap<String, FxHashSet<String>>>,
    /// `contained[outer]` holds inner beans created privately for `outer`.
    contained: Mutex<FxHashMap<String, FxHashSet<String>>>,
}

/// Removes creation markers and leftover early state when a creation attempt ends.
struct CreationGuard<'a> {
    registry: &'a SingletonRegistry,
    name: &'a str,
    thread: ThreadId,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.registry.creating.lock().remove(self.name);
        if let Some(names) = self
            .registry
            .creating_by_thread
            .lock()
            .get_mut(&self.thread)
        {
            names.remove(self.name);
        }
        self.registry.early_factories.lock().remove(self.name);
        self.registry.early_instances.lock().remove(self.name);
        self.registry.early_consumed.lock().remove(self.name);
    }
}

impl SingletonRegistry {
    /// Returns the ready instance, or - when `name` is currently in creation - its early
    /// reference. The early factory is only run when `allow_early` is set.
    pub fn get_singleton(
        &self,
        name: &str,
        allow_early: bool,
    ) -> Result<Option<BeanPtr>, BeansError> {
        if let Some(instance) = self.singletons.read().get(name) {
            return Ok(Some(instance.clone()));
        }

        if !self.creating.lock().contains(name) {
            return Ok(None);
        }

        if let Some(early) = self.early_instances.lock().get(name) {
            self.early_consumed.lock().insert(name.to_string());
            return Ok(Some(early.clone()));
        }

        if !allow_early {
            return Ok(None);
        }

        let factory = match self.early_factories.lock().remove(name) {
            Some(factory) => factory,
            None => return Ok(None),
        };

        let early = factory()?;
        self.early_instances
            .lock()
            .insert(name.to_string(), early.clone());
        self.early_consumed.lock().insert(name.to_string());
        Ok(Some(early))
    }

    /// Returns the ready instance or runs `producer` to create, publish and return it. A name is
    /// created at most once: concurrent callers block on the per-name lock, while re-entrant
    /// creation on the same thread fails with [BeansError::CircularCreation].
    pub fn get_or_create(
        &self,
        name: &str,
        producer: impl FnOnce() -> Result<BeanPtr, BeansError>,
    ) -> Result<BeanPtr, BeansError> {
        if let Some(existing) = self.singletons.read().get(name) {
            return Ok(existing.clone());
        }

        let thread = thread::current().id();
        if self.is_creating_on_thread(name, thread) {
            return Err(BeansError::CircularCreation(name.to_string()));
        }

        let name_lock = {
            let mut locks = self.creation_locks.lock();
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _held = name_lock.lock();

        // another thread may have finished the name while we waited
        if let Some(existing) = self.singletons.read().get(name) {
            return Ok(existing.clone());
        }

        debug!(name, "Creating shared bean instance.");

        self.creating.lock().insert(name.to_string());
        let outermost = {
            let mut by_thread = self.creating_by_thread.lock();
            let names = by_thread.entry(thread).or_default();
            names.insert(name.to_string());
            names.len() == 1
        };
        if outermost {
            self.suppressed_by_thread.lock().insert(thread, vec![]);
        }

        let guard = CreationGuard {
            registry: self,
            name,
            thread,
        };
        let result = match producer() {
            Ok(instance) => self.publish(name, instance),
            Err(error) => Err(error),
        };
        drop(guard);

        match result {
            Ok(instance) => {
                if outermost {
                    self.suppressed_by_thread.lock().remove(&thread);
                }
                Ok(instance)
            }
            Err(error) => {
                let suppressed = if outermost {
                    self.suppressed_by_thread
                        .lock()
                        .remove(&thread)
                        .unwrap_or_default()
                } else {
                    vec![]
                };
                Err(Self::attach_suppressed(name, error, suppressed))
            }
        }
    }

    fn attach_suppressed(name: &str, error: BeansError, suppressed: Vec<String>) -> BeansError {
        if suppressed.is_empty() {
            return error;
        }

        match error {
            BeansError::BeanCreation {
                name: existing,
                source,
                suppressed: mut messages,
            } if existing == name => {
                messages.extend(suppressed);
                BeansError::BeanCreation {
                    name: existing,
                    source,
                    suppressed: messages,
                }
            }
            other => BeansError::BeanCreation {
                name: name.to_string(),
                source: Box::new(other),
                suppressed,
            },
        }
    }

    /// Publishes the finished form of a singleton, verifying it is identical to any early
    /// reference dependants already hold.
    fn publish(&self, name: &str, instance: BeanPtr) -> Result<BeanPtr, BeansError> {
        if self.early_consumed.lock().contains(name) {
            if let Some(early) = self.early_instances.lock().get(name) {
                if !Arc::ptr_eq(early, &instance) {
                    return Err(BeansError::InconsistentEarlyReference(name.to_string()));
                }
            }
        }

        self.singletons
            .write()
            .insert(name.to_string(), instance.clone());
        self.registration_order.lock().push(name.to_string());
        Ok(instance)
    }

    /// Injects a pre-built instance from outside the creation pipeline.
    pub fn register_external(&self, name: &str, instance: BeanPtr) -> Result<(), BeansError> {
        let mut singletons = self.singletons.write();
        if singletons.contains_key(name) {
            return Err(BeansError::NameConflict(name.to_string()));
        }

        singletons.insert(name.to_string(), instance);
        drop(singletons);

        self.registration_order.lock().push(name.to_string());
        Ok(())
    }

    /// Registers the early form producer for a name currently in creation.
    pub fn add_early_factory(&self, name: &str, factory: EarlyFactoryFn) {
        debug_assert!(self.creating.lock().contains(name));
        self.early_factories.lock().insert(name.to_string(), factory);
    }

    /// Records a suppressed failure message attached to the outer creation error, e.g. a
    /// recovered autowiring attempt.
    pub fn add_suppressed(&self, message: String) {
        let thread = thread::current().id();
        if let Some(messages) = self.suppressed_by_thread.lock().get_mut(&thread) {
            messages.push(message);
        }
    }

    #[inline]
    pub fn is_creating(&self, name: &str) -> bool {
        self.creating.lock().contains(name)
    }

    fn is_creating_on_thread(&self, name: &str, thread: ThreadId) -> bool {
        self.creating_by_thread
            .lock()
            .get(&thread)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name)
    }

    /// Names of ready singletons in registration order.
    pub fn names(&self) -> Vec<String> {
        let singletons = self.singletons.read();
        self.registration_order
            .lock()
            .iter()
            .filter(|name| singletons.contains_key(*name))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<BeanPtr> {
        self.singletons.read().get(name).cloned()
    }

    /// Records that `dependent`'s construction and lifetime rely on `depended_on`.
    pub fn register_dependency(&self, dependent: &str, depended_on: &str) {
        self.depends_on
            .lock()
            .entry(dependent.to_string())
            .or_default()
            .insert(depended_on.to_string());
        self.dependents
            .lock()
            .entry(depended_on.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Records that `inner` was created as a nested bean of `outer`; the outer bean is destroyed
    /// before its contained ones.
    pub fn register_contained(&self, outer: &str, inner: &str) {
        self.contained
            .lock()
            .entry(outer.to_string())
            .or_default()
            .insert(inner.to_string());
        self.register_dependency(outer, inner);
    }

    /// Whether `candidate` transitively depends on `name`.
    pub fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        let dependents = self.dependents.lock();
        let mut visited = FxHashSet::default();
        let mut queue = vec![name.to_string()];

        while let Some(current) = queue.pop() {
            if let Some(direct) = dependents.get(&current) {
                if direct.contains(candidate) {
                    return true;
                }
                for dependent in direct {
                    if visited.insert(dependent.clone()) {
                        queue.push(dependent.clone());
                    }
                }
            }
        }

        false
    }

    /// Enqueues a disposal callback run exactly once at destruction.
    pub fn register_disposable(&self, name: &str, dispose: DisposeFn) {
        let mut disposables = self.disposables.lock();
        if disposables.insert(name.to_string(), dispose).is_none() {
            self.disposal_order.lock().push(name.to_string());
        }
    }

    /// Destroys one singleton: dependants first, then the disposal callback, then contained
    /// beans. Never fails - disposal errors are logged and swallowed.
    pub fn destroy_singleton(&self, name: &str) {
        self.singletons.write().remove(name);
        self.early_instances.lock().remove(name);
        self.early_factories.lock().remove(name);
        self.destroy_bean(name);
    }

    fn destroy_bean(&self, name: &str) {
        let mut dependents: Vec<_> = self
            .dependents
            .lock()
            .remove(name)
            .unwrap_or_default()
            .into_iter()
            .collect();
        dependents.sort();
        for dependent in dependents {
            debug!(name, dependent = %dependent, "Destroying dependent bean first.");
            self.destroy_singleton(&dependent);
        }

        if let Some(dispose) = self.disposables.lock().remove(name) {
            debug!(name, "Invoking destroy callback.");
            if let Err(error) = dispose() {
                warn!(name, error = %error, "Destroy callback failed; continuing shutdown.");
            }
        }

        let mut contained: Vec<_> = self
            .contained
            .lock()
            .remove(name)
            .unwrap_or_default()
            .into_iter()
            .collect();
        contained.sort();
        for inner in contained {
            self.destroy_singleton(&inner);
        }

        self.depends_on.lock().remove(name);
        for dependents in self.dependents.lock().values_mut() {
            dependents.remove(name);
        }
    }

    /// Destroys every singleton in reverse registration order, dependants before their
    /// dependencies.
    pub fn destroy_all(&self) {
        info!("Destroying singletons.");

        let mut order = {
            let disposal_order = self.disposal_order.lock();
            let registration_order = self.registration_order.lock();
            let mut seen: FxHashSet<&String> = disposal_order.iter().collect();
            let mut order = disposal_order.clone();
            order.extend(
                registration_order
                    .iter()
                    .filter(|name| seen.insert(*name))
                    .cloned(),
            );
            order
        };
        order.reverse();

        for name in order {
            self.destroy_singleton(&name);
        }

        self.singletons.write().clear();
        self.registration_order.lock().clear();
        self.early_instances.lock().clear();
        self.early_factories.lock().clear();
        self.early_consumed.lock().clear();
        self.disposables.lock().clear();
        self.disposal_order.lock().clear();
        self.dependents.lock().clear();
        self.depends_on.lock().clear();
        self.contained.lock().clear();
    }
}
