//! Storage of bean definitions keyed by canonical name, with a configurable duplicate policy,
//! copy-on-write snapshots for deterministic enumeration, a merged-definition cache and one-way
//! configuration freezing.

use crate::definition::{BeanDefinition, BeanRole, MergedDefinition};
use crate::error::BeansError;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Policy for registering a name that already exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum OverridePolicy {
    /// Replace application-role definitions, reject infrastructure-role ones.
    #[default]
    RoleBased,
    Reject,
    Replace,
    KeepFirst,
}

#[derive(Debug, Default)]
struct RegistryState {
    definitions: FxHashMap<String, Arc<BeanDefinition>>,
    /// Registration order, driving enumeration and destruction.
    order: Vec<String>,
}

/// The authoritative store of [BeanDefinition]s.
#[derive(Debug)]
pub struct DefinitionRegistry {
    state: RwLock<Arc<RegistryState>>,
    merged: RwLock<FxHashMap<String, Arc<MergedDefinition>>>,
    frozen: AtomicBool,
    policy: OverridePolicy,
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new(OverridePolicy::default())
    }
}

impl DefinitionRegistry {
    pub fn new(policy: OverridePolicy) -> Self {
        Self {
            state: RwLock::new(Arc::new(RegistryState::default())),
            merged: RwLock::new(Default::default()),
            frozen: AtomicBool::new(false),
            policy,
        }
    }

    /// Registers a definition under the given canonical name, applying the duplicate policy when
    /// the name is taken.
    pub fn register(&self, name: &str, definition: BeanDefinition) -> Result<(), BeansError> {
        self.check_not_frozen()?;

        let mut state = self.state.write();

        if let Some(existing) = state.definitions.get(name) {
            match self.policy {
                OverridePolicy::Reject => return Err(BeansError::NameConflict(name.to_string())),
                OverridePolicy::KeepFirst => {
                    debug!(name, "Keeping first registration for duplicate definition.");
                    return Ok(());
                }
                OverridePolicy::RoleBased if existing.role == BeanRole::Infrastructure => {
                    return Err(BeansError::NameConflict(name.to_string()));
                }
                _ => debug!(name, "Overriding bean definition."),
            }
        }

        let mut next = RegistryState {
            definitions: state.definitions.clone(),
            order: state.order.clone(),
        };
        if next
            .definitions
            .insert(name.to_string(), Arc::new(definition))
            .is_none()
        {
            next.order.push(name.to_string());
        }
        *state = Arc::new(next);
        drop(state);

        self.invalidate_merged();
        Ok(())
    }

    /// Removes a definition, failing with [BeansError::NoSuchBean] when absent.
    pub fn remove(&self, name: &str) -> Result<(), BeansError> {
        self.check_not_frozen()?;

        let mut state = self.state.write();
        if !state.definitions.contains_key(name) {
            return Err(BeansError::NoSuchBean(name.to_string()));
        }

        let mut next = RegistryState {
            definitions: state.definitions.clone(),
            order: state.order.clone(),
        };
        next.definitions.remove(name);
        next.order.retain(|existing| existing != name);
        *state = Arc::new(next);
        drop(state);

        self.invalidate_merged();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.state.read().definitions.get(name).cloned()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().definitions.contains_key(name)
    }

    /// All definition names in registration order. The returned snapshot is unaffected by
    /// concurrent mutation.
    pub fn names(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.state.read().definitions.len()
    }

    /// One-way transition after which all mutators fail with
    /// [BeansError::ConfigurationFrozen]. A frozen registry caches merged definitions and type
    /// indices permanently.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
        debug!("Definition registry frozen.");
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns the definition with its parent chain folded in. Merges are cached until the next
    /// mutation.
    pub fn merged(&self, name: &str) -> Result<Arc<MergedDefinition>, BeansError> {
        if let Some(merged) = self.merged.read().get(name) {
            return Ok(merged.clone());
        }

        let mut visited = FxHashSet::default();
        visited.insert(name.to_string());
        self.merge_recursive(name, &mut visited)
    }

    fn merge_recursive(
        &self,
        name: &str,
        visited: &mut FxHashSet<String>,
    ) -> Result<Arc<MergedDefinition>, BeansError> {
        let definition = self
            .get(name)
            .ok_or_else(|| BeansError::NoSuchBean(name.to_string()))?;

        let parent = match &definition.parent {
            Some(parent) => {
                if !visited.insert(parent.clone()) {
                    return Err(BeansError::CircularParent(name.to_string()));
                }
                Some(self.merge_recursive(parent, visited)?)
            }
            None => None,
        };

        let merged = Arc::new(MergedDefinition::merge(
            name,
            &definition,
            parent.as_deref(),
        )?);
        self.merged
            .write()
            .insert(name.to_string(), merged.clone());
        Ok(merged)
    }

    fn invalidate_merged(&self) {
        self.merged.write().clear();
    }

    fn check_not_frozen(&self) -> Result<(), BeansError> {
        if self.is_frozen() {
            Err(BeansError::ConfigurationFrozen)
        } else {
            Ok(())
        }
    }
}
