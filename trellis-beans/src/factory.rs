//! The bean factory: resolves names and types to fully wired instances. Lookup canonicalises the
//! name, consults the singleton cache, and otherwise drives the creation pipeline - constructor
//! selection, argument and property resolution, lifecycle callbacks and factory-bean
//! dereferencing - against the merged definition.

use crate::alias_registry::AliasRegistry;
use crate::bean::{BeanClass, BeanPtr, ConstructorFn, ConvertFn};
use crate::definition::{BeanDefinition, MergedDefinition, ValueSpec, PROTOTYPE, SINGLETON};
use crate::definition_registry::{DefinitionRegistry, OverridePolicy};
use crate::error::{BeansError, ErrorPtr};
use crate::lifecycle::BeanPostProcessor;
use crate::placeholder::PlaceholderResolver;
use crate::scope::ScopePtr;
use crate::singleton_registry::SingletonRegistry;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info};

/// Prefix requesting the factory bean itself instead of its product.
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// Key lookup used to expand `${...}` placeholders in literal values.
pub type PlaceholderLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Handle passed to the post-construction awareness callback, exposing the capabilities a bean
/// may ask the container for.
pub struct BeanContext<'a> {
    name: &'a str,
    factory: &'a BeanFactory,
}

impl BeanContext<'_> {
    /// Canonical name of the bean being initialised.
    pub fn bean_name(&self) -> &str {
        self.name
    }

    pub fn factory(&self) -> &BeanFactory {
        self.factory
    }
}

/// Builder for [BeanFactory] with sensible defaults, for easy construction.
pub struct BeanFactoryBuilder {
    policy: OverridePolicy,
    allow_alias_overriding: bool,
    allow_circular_references: bool,
    placeholders: PlaceholderResolver,
    placeholder_lookup: Option<PlaceholderLookup>,
    scopes: FxHashMap<String, ScopePtr>,
    parent: Option<Arc<BeanFactory>>,
}

impl Default for BeanFactoryBuilder {
    fn default() -> Self {
        Self {
            policy: OverridePolicy::default(),
            allow_alias_overriding: false,
            allow_circular_references: true,
            placeholders: PlaceholderResolver::default(),
            placeholder_lookup: None,
            scopes: Default::default(),
            parent: None,
        }
    }
}

impl BeanFactoryBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_override_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_alias_overriding(mut self, allow: bool) -> Self {
        self.allow_alias_overriding = allow;
        self
    }

    /// Disabling circular references makes any singleton cycle fail fast instead of resolving
    /// through early exposure.
    pub fn with_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn with_placeholder_resolver(mut self, placeholders: PlaceholderResolver) -> Self {
        self.placeholders = placeholders;
        self
    }

    pub fn with_placeholder_lookup(mut self, lookup: PlaceholderLookup) -> Self {
        self.placeholder_lookup = Some(lookup);
        self
    }

    pub fn with_scope(mut self, name: impl Into<String>, scope: ScopePtr) -> Self {
        self.scopes.insert(name.into(), scope);
        self
    }

    pub fn with_parent(mut self, parent: Arc<BeanFactory>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn build(self) -> BeanFactory {
        BeanFactory {
            aliases: AliasRegistry::new(self.allow_alias_overriding),
            definitions: DefinitionRegistry::new(self.policy),
            singletons: SingletonRegistry::default(),
            scopes: RwLock::new(self.scopes),
            post_processors: RwLock::new(vec![]),
            placeholders: self.placeholders,
            placeholder_lookup: self.placeholder_lookup,
            parent: self.parent,
            allow_circular_references: self.allow_circular_references,
            prototypes_in_creation: Default::default(),
            factory_products: Default::default(),
            type_query_cache: Default::default(),
            closed: AtomicBool::new(false),
        }
    }
}

/// The container service value: definition and alias registries, the singleton store and the
/// resolution logic, aggregated behind one handle.
pub struct BeanFactory {
    aliases: AliasRegistry,
    definitions: DefinitionRegistry,
    singletons: SingletonRegistry,
    scopes: RwLock<FxHashMap<String, ScopePtr>>,
    post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    placeholders: PlaceholderResolver,
    placeholder_lookup: Option<PlaceholderLookup>,
    parent: Option<Arc<BeanFactory>>,
    allow_circular_references: bool,
    /// Prototype names in creation, per thread.
    prototypes_in_creation: Mutex<FxHashMap<ThreadId, FxHashSet<String>>>,
    /// Cached products of singleton factory beans.
    factory_products: Mutex<FxHashMap<String, BeanPtr>>,
    /// Type-index cache, populated only once the configuration is frozen.
    type_query_cache: RwLock<FxHashMap<(TypeId, bool, bool), Arc<Vec<String>>>>,
    closed: AtomicBool,
}

impl Default for BeanFactory {
    fn default() -> Self {
        BeanFactoryBuilder::new().build()
    }
}

/// Clears the per-thread prototype marker on every exit path.
struct PrototypeGuard<'a> {
    factory: &'a BeanFactory,
    name: String,
    thread: ThreadId,
}

impl Drop for PrototypeGuard<'_> {
    fn drop(&mut self) {
        if let Some(names) = self
            .factory
            .prototypes_in_creation
            .lock()
            .get_mut(&self.thread)
        {
            names.remove(&self.name);
        }
    }
}

/// Per-creation state threaded through value resolution.
struct CreationContext<'a> {
    owner: &'a str,
    owner_singleton: bool,
}

impl BeanFactory {
    // ---- loader contract ----

    /// Registers a bean definition under its canonical name.
    pub fn register_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> Result<(), BeansError> {
        self.check_open()?;

        if self.aliases.is_alias(name) {
            return Err(BeansError::NameConflict(name.to_string()));
        }

        self.definitions.register(name, definition)
    }

    /// Removes a bean definition.
    pub fn remove_definition(&self, name: &str) -> Result<(), BeansError> {
        self.definitions.remove(name)
    }

    /// Registers `alias` for the canonical name `canonical`. A definition and an alias never
    /// share a string.
    pub fn register_alias(&self, canonical: &str, alias: &str) -> Result<(), BeansError> {
        self.check_open()?;

        if self.definitions.contains(alias) {
            return Err(BeansError::NameConflict(alias.to_string()));
        }

        self.aliases.register_alias(canonical, alias)
    }

    pub fn remove_alias(&self, alias: &str) -> Result<(), BeansError> {
        self.aliases.remove_alias(alias)
    }

    /// Injects a pre-built singleton from outside the creation pipeline. Participates in name
    /// and type lookups and in destruction.
    pub fn register_singleton(&self, name: &str, instance: BeanPtr) -> Result<(), BeansError> {
        self.check_open()?;

        if self.aliases.is_alias(name) {
            return Err(BeansError::NameConflict(name.to_string()));
        }

        self.singletons.register_external(name, instance)
    }

    pub fn register_scope(&self, name: impl Into<String>, scope: ScopePtr) {
        self.scopes.write().insert(name.into(), scope);
    }

    /// Adds a post-processor; the pipeline stays sorted by [BeanPostProcessor::order].
    pub fn add_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.post_processors.write();
        processors.push(processor);
        processors.sort_by_key(|processor| processor.order());
    }

    /// One-way transition after which definitions and aliases no longer change.
    pub fn freeze_configuration(&self) {
        self.definitions.freeze();
    }

    pub fn is_configuration_frozen(&self) -> bool {
        self.definitions.is_frozen()
    }

    // ---- consumer contract ----

    /// Returns the bean with the given name, creating it if necessary.
    pub fn get_bean(&self, name: &str) -> Result<BeanPtr, BeansError> {
        self.do_get_bean(name, None, None)
    }

    /// Typed [get_bean](Self::get_bean) for concrete types.
    pub fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, BeansError> {
        let instance = self.do_get_bean(name, Some(TypeId::of::<T>()), None)?;
        instance
            .downcast::<T>()
            .map_err(|_| BeansError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>().to_string(),
            })
    }

    /// Resolves a bean with explicit constructor arguments; only meaningful for prototypes.
    pub fn get_bean_with_args(
        &self,
        name: &str,
        args: Vec<BeanPtr>,
    ) -> Result<BeanPtr, BeansError> {
        self.do_get_bean(name, None, Some(args))
    }

    /// Returns the unique bean of type `T`; `primary` markers and a name matching the type break
    /// ties.
    pub fn get_bean_by_type<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BeansError> {
        let name = self.unique_name_for_type(TypeId::of::<T>(), type_name::<T>())?;
        self.get_bean_typed::<T>(&name)
    }

    /// Returns the unique bean of type `T`, constructed with explicit arguments.
    pub fn get_bean_by_type_with_args<T: Any + Send + Sync>(
        &self,
        args: Vec<BeanPtr>,
    ) -> Result<Arc<T>, BeansError> {
        let name = self.unique_name_for_type(TypeId::of::<T>(), type_name::<T>())?;
        let instance = self.do_get_bean(&name, Some(TypeId::of::<T>()), Some(args))?;
        instance
            .downcast::<T>()
            .map_err(|_| BeansError::TypeMismatch {
                name,
                expected: type_name::<T>().to_string(),
            })
    }

    /// Whether a definition, alias or externally registered singleton answers to the name.
    pub fn contains_bean(&self, name: &str) -> bool {
        let canonical = self.canonical(name);
        self.definitions.contains(&canonical)
            || self.singletons.contains(&canonical)
            || self
                .parent
                .as_ref()
                .map(|parent| parent.contains_bean(name))
                .unwrap_or(false)
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool, BeansError> {
        let canonical = self.canonical(name);
        match self.definitions.merged(&canonical) {
            Ok(merged) => Ok(merged.is_singleton()),
            Err(BeansError::NoSuchBean(_)) => {
                if self.singletons.contains(&canonical) {
                    return Ok(true);
                }
                match &self.parent {
                    Some(parent) => parent.is_singleton(name),
                    None => Err(BeansError::NoSuchBean(canonical)),
                }
            }
            Err(error) => Err(error),
        }
    }

    pub fn is_prototype(&self, name: &str) -> Result<bool, BeansError> {
        let canonical = self.canonical(name);
        match self.definitions.merged(&canonical) {
            Ok(merged) => Ok(merged.is_prototype()),
            Err(BeansError::NoSuchBean(_)) => {
                if self.singletons.contains(&canonical) {
                    return Ok(false);
                }
                match &self.parent {
                    Some(parent) => parent.is_prototype(name),
                    None => Err(BeansError::NoSuchBean(canonical)),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Whether the bean would match the given type. Has no side effects on the singleton cache:
    /// factory-bean products with statically unknown types simply report `false`.
    pub fn is_type_match(&self, name: &str, type_id: TypeId) -> Result<bool, BeansError> {
        Ok(self.get_type(name)?.map(|found| found == type_id).unwrap_or(false)
            || self.assignability_of(name)?.contains(&type_id))
    }

    /// The type the bean would expose, or `None` when it cannot be determined without
    /// instantiation.
    pub fn get_type(&self, name: &str) -> Result<Option<TypeId>, BeansError> {
        let wants_factory = name.starts_with(FACTORY_BEAN_PREFIX);
        let canonical = self.canonical(name);

        match self.definitions.merged(&canonical) {
            Ok(merged) => match &merged.class {
                Some(class) if class.factory_bean.is_some() && !wants_factory => {
                    Ok(class.factory_object_type)
                }
                Some(class) => Ok(Some(class.type_id)),
                None => Ok(None),
            },
            Err(BeansError::NoSuchBean(_)) => {
                if let Some(instance) = self.singletons.get(&canonical) {
                    return Ok(Some((*instance).type_id()));
                }
                if let Some(parent) = &self.parent {
                    return parent.get_type(name);
                }
                Err(BeansError::NoSuchBean(canonical))
            }
            Err(error) => Err(error),
        }
    }

    /// All aliases of the given name. For an alias, the canonical name leads the result.
    pub fn get_aliases(&self, name: &str) -> Vec<String> {
        let bare = name.strip_prefix(FACTORY_BEAN_PREFIX).unwrap_or(name);
        let canonical = self.aliases.canonical_name(bare);

        let mut result = self.aliases.aliases_of(&canonical);
        if canonical != bare {
            result.retain(|alias| alias != bare);
            result.insert(0, canonical);
        }
        result
    }

    // ---- introspection ----

    /// All definition names in registration order; never includes aliases.
    pub fn bean_definition_names(&self) -> Vec<String> {
        self.definitions.names()
    }

    pub fn bean_definition_count(&self) -> usize {
        self.definitions.count()
    }

    /// Names of beans matching the given type. Factory-bean definitions match through their
    /// product type; when that type is statically unknown it is probed only if
    /// `allow_eager_init` permits instantiating the factory bean.
    pub fn bean_names_for_type(
        &self,
        type_id: TypeId,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        let frozen = self.definitions.is_frozen();
        let key = (type_id, include_non_singletons, allow_eager_init);
        if frozen {
            if let Some(cached) = self.type_query_cache.read().get(&key) {
                return cached.as_ref().clone();
            }
        }

        let mut result = vec![];
        for name in self.definitions.names() {
            let merged = match self.definitions.merged(&name) {
                Ok(merged) => merged,
                Err(_) => continue,
            };
            if !include_non_singletons && !merged.is_singleton() {
                continue;
            }

            let class = match &merged.class {
                Some(class) => class,
                None => continue,
            };

            if class.factory_bean.is_some() {
                let product = class.factory_object_type.or_else(|| {
                    if allow_eager_init {
                        self.probe_factory_object_type(&name)
                    } else {
                        None
                    }
                });
                if product == Some(type_id) {
                    result.push(name);
                }
            } else if class.is_assignable_to(type_id) {
                result.push(name);
            }
        }

        for name in self.singletons.names() {
            if self.definitions.contains(&name) {
                continue;
            }
            if let Some(instance) = self.singletons.get(&name) {
                if (*instance).type_id() == type_id {
                    result.push(name);
                }
            }
        }

        if frozen {
            self.type_query_cache
                .write()
                .insert(key, Arc::new(result.clone()));
        }
        result
    }

    /// Resolves every bean matching the type, keyed by name.
    pub fn beans_of_type(
        &self,
        type_id: TypeId,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Result<FxHashMap<String, BeanPtr>, BeansError> {
        self.bean_names_for_type(type_id, include_non_singletons, allow_eager_init)
            .into_iter()
            .map(|name| self.get_bean(&name).map(|instance| (name, instance)))
            .try_collect()
    }

    /// Names of definitions carrying the given annotation attribute.
    pub fn bean_names_for_annotation(&self, annotation: &str) -> Vec<String> {
        self.definitions
            .names()
            .into_iter()
            .filter(|name| {
                self.definitions
                    .merged(name)
                    .map(|merged| merged.annotations.contains_key(annotation))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn beans_with_annotation(
        &self,
        annotation: &str,
    ) -> Result<FxHashMap<String, BeanPtr>, BeansError> {
        self.bean_names_for_annotation(annotation)
            .into_iter()
            .map(|name| self.get_bean(&name).map(|instance| (name, instance)))
            .try_collect()
    }

    /// The value of an annotation attribute on the given bean, if present.
    pub fn find_annotation_on_bean(
        &self,
        name: &str,
        annotation: &str,
    ) -> Result<Option<String>, BeansError> {
        let canonical = self.canonical(name);
        let merged = self.definitions.merged(&canonical)?;
        Ok(merged.annotations.get(annotation).cloned())
    }

    // ---- lifecycle ----

    /// Eagerly resolves every non-lazy singleton definition in registration order.
    pub fn preinstantiate_singletons(&self) -> Result<(), BeansError> {
        info!("Pre-instantiating singletons.");

        for name in self.definitions.names() {
            let merged = self.definitions.merged(&name)?;
            if !merged.is_singleton() || merged.lazy_init {
                continue;
            }

            if merged.is_factory_bean() {
                self.do_get_bean(&format!("{FACTORY_BEAN_PREFIX}{name}"), None, None)?;
            } else {
                self.get_bean(&name)?;
            }
        }

        Ok(())
    }

    /// Begins shutdown: all further lookups fail with [BeansError::ContainerClosed] and every
    /// singleton is destroyed in dependency-aware reverse order.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing bean factory.");
        self.factory_products.lock().clear();
        self.singletons.destroy_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ---- resolution pipeline ----

    fn do_get_bean(
        &self,
        name: &str,
        required_type: Option<TypeId>,
        args: Option<Vec<BeanPtr>>,
    ) -> Result<BeanPtr, BeansError> {
        self.check_open()?;

        let wants_factory = name.starts_with(FACTORY_BEAN_PREFIX);
        let bare = name.strip_prefix(FACTORY_BEAN_PREFIX).unwrap_or(name);
        let canonical = self.aliases.canonical_name(bare);

        if args.is_none() {
            if let Some(shared) = self
                .singletons
                .get_singleton(&canonical, self.allow_circular_references)?
            {
                let instance = self.deref_factory(shared, &canonical, wants_factory)?;
                return self.check_required_type(instance, &canonical, required_type);
            }
        }

        let merged = match self.definitions.merged(&canonical) {
            Ok(merged) => merged,
            Err(BeansError::NoSuchBean(_)) => {
                if let Some(parent) = &self.parent {
                    return parent.do_get_bean(name, required_type, args);
                }
                return Err(BeansError::NoSuchBean(canonical));
            }
            Err(error) => return Err(error),
        };

        for depends_on in &merged.depends_on {
            if self.singletons.is_dependent(&canonical, depends_on) {
                return Err(BeansError::CircularDependsOn {
                    name: canonical,
                    depends_on: depends_on.clone(),
                });
            }
            self.singletons.register_dependency(&canonical, depends_on);
            self.get_bean(depends_on)?;
        }

        let instance = match merged.scope.as_str() {
            SINGLETON => self.singletons.get_or_create(&canonical, || {
                self.create_bean(&canonical, &merged, args, true)
            })?,
            PROTOTYPE => {
                let _guard = self.begin_prototype(&canonical)?;
                self.create_bean(&canonical, &merged, args, false)?
            }
            custom => {
                let scope = self
                    .scopes
                    .read()
                    .get(custom)
                    .cloned()
                    .ok_or_else(|| BeansError::UnrecognizedScope(custom.to_string()))?;
                let _guard = self.begin_prototype(&canonical)?;
                scope.get(&canonical, &mut || {
                    self.create_bean(&canonical, &merged, args.clone(), false)
                })?
            }
        };

        let instance = self.deref_factory(instance, &canonical, wants_factory)?;
        self.check_required_type(instance, &canonical, required_type)
    }

    /// Builds one bean instance: instantiation, early exposure, property population and the init
    /// sequence. Any failure is reported as [BeansError::BeanCreation] for this bean.
    fn create_bean(
        &self,
        name: &str,
        merged: &MergedDefinition,
        args: Option<Vec<BeanPtr>>,
        track_disposal: bool,
    ) -> Result<BeanPtr, BeansError> {
        debug!(name, class = merged.class.as_ref().map(|class| class.type_name.as_str()),
            "Creating bean instance.");
        self.do_create_bean(name, merged, args, track_disposal)
            .map_err(|error| error.into_creation_error(name))
    }

    fn do_create_bean(
        &self,
        name: &str,
        merged: &MergedDefinition,
        args: Option<Vec<BeanPtr>>,
        track_disposal: bool,
    ) -> Result<BeanPtr, BeansError> {
        let context = CreationContext {
            owner: name,
            owner_singleton: merged.is_singleton() && track_disposal,
        };

        let raw = self.instantiate(&context, merged, args)?;

        // only top-level singletons are tracked by the store; inner beans and scoped instances
        // cannot be exposed early
        if self.allow_circular_references && self.singletons.is_creating(name) {
            let processors = self.post_processors.read().clone();
            let early = raw.clone();
            let early_name = name.to_string();
            self.singletons.add_early_factory(
                name,
                Box::new(move || {
                    let mut exposed = early;
                    for processor in &processors {
                        exposed = processor
                            .on_early_exposure(exposed, &early_name)
                            .map_err(BeansError::Callback)?;
                    }
                    Ok(exposed)
                }),
            );
        }

        self.populate_properties(&context, merged, &raw)?;
        let bean = self.initialize(merged, name, raw)?;

        if context.owner_singleton {
            self.register_disposal(name, merged, &bean);
        }

        Ok(bean)
    }

    fn instantiate(
        &self,
        context: &CreationContext<'_>,
        merged: &MergedDefinition,
        args: Option<Vec<BeanPtr>>,
    ) -> Result<BeanPtr, BeansError> {
        if let (Some(factory_bean), Some(factory_method)) =
            (&merged.factory_bean, &merged.factory_method)
        {
            let factory_instance = self.get_bean(factory_bean)?;
            self.singletons
                .register_dependency(context.owner, factory_bean);

            let factory_merged = self.definitions.merged(factory_bean)?;
            let method = factory_merged
                .class
                .as_ref()
                .and_then(|class| class.factory_methods.get(factory_method))
                .ok_or_else(|| {
                    BeansError::NoSuchBean(format!(
                        "factory method '{factory_method}' on bean '{factory_bean}'"
                    ))
                })?
                .clone();

            let resolved = match args {
                Some(explicit) => explicit,
                None => merged
                    .constructor_args
                    .iter()
                    .enumerate()
                    .map(|(index, value)| {
                        self.resolve_value(context, value, None, &format!("arg{index}"))
                    })
                    .collect::<Result<_, _>>()?,
            };

            return method(&factory_instance, resolved).map_err(BeansError::Callback);
        }

        let class = merged
            .class
            .clone()
            .ok_or_else(|| BeansError::NoSuchBean(context.owner.to_string()))?;
        let (constructor, resolved) =
            self.select_constructor(context, &class, merged, args)?;
        constructor(resolved).map_err(BeansError::Callback)
    }

    /// Selects a constructor candidate. Explicit arguments match by count; declared arguments
    /// match by count then declaration order; otherwise candidates are tried greedily by
    /// descending arity with autowired parameters, exact type matches then declaration order
    /// breaking ties.
    fn select_constructor(
        &self,
        context: &CreationContext<'_>,
        class: &BeanClass,
        merged: &MergedDefinition,
        args: Option<Vec<BeanPtr>>,
    ) -> Result<(ConstructorFn, Vec<BeanPtr>), BeansError> {
        let name = context.owner;
        if class.constructors.is_empty() {
            return Err(BeansError::AmbiguousConstructor(name.to_string()));
        }

        if let Some(explicit) = args {
            let mut matching = class
                .constructors
                .iter()
                .filter(|candidate| candidate.params.len() == explicit.len());
            return match (matching.next(), matching.next()) {
                (Some(only), None) => Ok((only.invoke.clone(), explicit)),
                _ => Err(BeansError::AmbiguousConstructor(name.to_string())),
            };
        }

        if !merged.constructor_args.is_empty() {
            let arity = merged.constructor_args.len();
            let matching: Vec<_> = class
                .constructors
                .iter()
                .filter(|candidate| candidate.params.len() == arity)
                .collect();
            if matching.is_empty() {
                return Err(BeansError::AmbiguousConstructor(name.to_string()));
            }

            let single = matching.len() == 1;
            for candidate in matching {
                match self.resolve_declared_args(context, merged, candidate) {
                    Ok(resolved) => return Ok((candidate.invoke.clone(), resolved)),
                    Err(error) if single => return Err(error),
                    Err(error) => self.singletons.add_suppressed(format!(
                        "constructor candidate rejected for '{name}': {error}"
                    )),
                }
            }
            return Err(BeansError::AmbiguousConstructor(name.to_string()));
        }

        // greedy autowiring - highest arity first, declaration order within one arity
        let ordered = class
            .constructors
            .iter()
            .enumerate()
            .sorted_by_key(|(index, candidate)| (usize::MAX - candidate.params.len(), *index))
            .collect_vec();

        let mut best: Option<(usize, usize, ConstructorFn, Vec<BeanPtr>)> = None;
        let mut first_error = None;

        for (_, candidate) in &ordered {
            if let Some((best_arity, _, _, _)) = &best {
                if candidate.params.len() < *best_arity {
                    break;
                }
            }

            match self.resolve_autowired_args(context, candidate) {
                Ok((resolved, exact)) => {
                    // within one arity the iteration order is declaration order, so on an
                    // exact-count tie the earlier candidate stays
                    let better = match &best {
                        Some((_, best_exact, _, _)) => exact > *best_exact,
                        None => true,
                    };
                    if better {
                        best = Some((
                            candidate.params.len(),
                            exact,
                            candidate.invoke.clone(),
                            resolved,
                        ));
                    }
                }
                Err(error) => {
                    self.singletons.add_suppressed(format!(
                        "constructor candidate rejected for '{name}': {error}"
                    ));
                    first_error.get_or_insert(error);
                }
            }
        }

        match best {
            Some((_, _, invoke, resolved)) => Ok((invoke, resolved)),
            None => Err(first_error
                .unwrap_or_else(|| BeansError::AmbiguousConstructor(name.to_string()))),
        }
    }

    fn resolve_declared_args(
        &self,
        context: &CreationContext<'_>,
        merged: &MergedDefinition,
        candidate: &crate::bean::ConstructorSpec,
    ) -> Result<Vec<BeanPtr>, BeansError> {
        merged
            .constructor_args
            .iter()
            .zip(&candidate.params)
            .map(|(value, param)| {
                self.resolve_value(context, value, param.convert.as_ref(), &param.name)
            })
            .collect()
    }

    fn resolve_autowired_args(
        &self,
        context: &CreationContext<'_>,
        candidate: &crate::bean::ConstructorSpec,
    ) -> Result<(Vec<BeanPtr>, usize), BeansError> {
        let mut resolved = Vec::with_capacity(candidate.params.len());
        let mut exact = 0;

        for param in &candidate.params {
            let value = self.resolve_autowire(context, param.type_id, &param.name)?;
            if (*value).type_id() == param.type_id {
                exact += 1;
            }
            resolved.push(value);
        }

        Ok((resolved, exact))
    }

    fn resolve_value(
        &self,
        context: &CreationContext<'_>,
        value: &ValueSpec,
        convert: Option<&ConvertFn>,
        injection_point: &str,
    ) -> Result<BeanPtr, BeansError> {
        match value {
            ValueSpec::Literal(text) => {
                let expanded = match &self.placeholder_lookup {
                    Some(lookup) => self.placeholders.expand(text, &**lookup)?,
                    None => text.clone(),
                };
                match convert {
                    Some(convert) => convert(&expanded).map_err(BeansError::Callback),
                    None => Ok(Arc::new(expanded) as BeanPtr),
                }
            }
            ValueSpec::Ref(target) => {
                let instance = self.get_bean(target)?;
                self.singletons
                    .register_dependency(context.owner, &self.canonical(target));
                Ok(instance)
            }
            ValueSpec::Nested(definition) => self.create_inner_bean(context, definition, injection_point),
            ValueSpec::Autowire(type_id) => {
                self.resolve_autowire(context, *type_id, injection_point)
            }
        }
    }

    fn create_inner_bean(
        &self,
        context: &CreationContext<'_>,
        definition: &BeanDefinition,
        injection_point: &str,
    ) -> Result<BeanPtr, BeansError> {
        let inner_name = format!("(inner bean)#{}#{}", context.owner, injection_point);

        let parent = match &definition.parent {
            Some(parent) => Some(self.definitions.merged(parent)?),
            None => None,
        };
        let merged = MergedDefinition::merge(&inner_name, definition, parent.as_deref())?;

        let instance = self.create_bean(&inner_name, &merged, None, context.owner_singleton)?;

        if context.owner_singleton {
            self.singletons.register_contained(context.owner, &inner_name);
        }

        Ok(instance)
    }

    /// Autowires a single injection point: candidates by type, filtered on
    /// `autowire-candidate`, then `primary` markers, then the injection point name.
    fn resolve_autowire(
        &self,
        context: &CreationContext<'_>,
        type_id: TypeId,
        injection_point: &str,
    ) -> Result<BeanPtr, BeansError> {
        let candidates: Vec<_> = self
            .bean_names_for_type(type_id, true, true)
            .into_iter()
            .filter(|name| {
                self.definitions
                    .merged(name)
                    .map(|merged| merged.autowire_candidate)
                    .unwrap_or(true)
            })
            .collect();

        let chosen = match candidates.as_slice() {
            [] => {
                return Err(BeansError::UnresolvableDependency {
                    name: context.owner.to_string(),
                    parameter: injection_point.to_string(),
                })
            }
            [only] => only.clone(),
            _ => {
                let primaries: Vec<_> = candidates
                    .iter()
                    .filter(|name| {
                        self.definitions
                            .merged(name)
                            .map(|merged| merged.primary)
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                match primaries.as_slice() {
                    [primary] => primary.clone(),
                    [] if candidates.iter().any(|name| name == injection_point) => {
                        injection_point.to_string()
                    }
                    _ => {
                        return Err(BeansError::UnresolvableDependency {
                            name: context.owner.to_string(),
                            parameter: injection_point.to_string(),
                        })
                    }
                }
            }
        };

        let instance = self.get_bean(&chosen)?;
        self.singletons.register_dependency(context.owner, &chosen);
        Ok(instance)
    }

    fn populate_properties(
        &self,
        context: &CreationContext<'_>,
        merged: &MergedDefinition,
        instance: &BeanPtr,
    ) -> Result<(), BeansError> {
        if merged.property_values.is_empty() {
            return Ok(());
        }

        let class = merged.class.as_ref().ok_or_else(|| {
            BeansError::UnresolvableDependency {
                name: context.owner.to_string(),
                parameter: merged.property_values[0].name.clone(),
            }
        })?;

        for property in &merged.property_values {
            let setter =
                class
                    .setters
                    .get(&property.name)
                    .ok_or_else(|| BeansError::UnresolvableDependency {
                        name: context.owner.to_string(),
                        parameter: property.name.clone(),
                    })?;
            let value = self.resolve_value(
                context,
                &property.value,
                setter.convert.as_ref(),
                &property.name,
            )?;
            (setter.apply)(instance, value).map_err(BeansError::Callback)?;
        }

        Ok(())
    }

    /// The init sequence: awareness callback, before-init hooks, intrinsic initializer, declared
    /// init method, after-init hooks. Post-processors may substitute the instance.
    fn initialize(
        &self,
        merged: &MergedDefinition,
        name: &str,
        instance: BeanPtr,
    ) -> Result<BeanPtr, BeansError> {
        let mut bean = instance;

        if let Some(class) = &merged.class {
            if let Some(aware) = &class.aware {
                let bean_context = BeanContext {
                    name,
                    factory: self,
                };
                aware(&bean, &bean_context).map_err(BeansError::Callback)?;
            }
        }

        let processors = self.post_processors.read().clone();
        for processor in &processors {
            bean = processor
                .before_init(bean, name)
                .map_err(BeansError::Callback)?;
        }

        if let Some(class) = &merged.class {
            if let Some(init) = &class.init {
                init(&bean).map_err(BeansError::Callback)?;
            }
            if let Some(init_method) = &merged.init_method {
                let method = class.methods.get(init_method).ok_or_else(|| {
                    BeansError::NoSuchBean(format!("init method '{init_method}' on bean '{name}'"))
                })?;
                method(&bean).map_err(BeansError::Callback)?;
            }
        }

        for processor in &processors {
            bean = processor
                .after_init(bean, name)
                .map_err(BeansError::Callback)?;
        }

        Ok(bean)
    }

    fn register_disposal(&self, name: &str, merged: &MergedDefinition, bean: &BeanPtr) {
        let class = match &merged.class {
            Some(class) => class.clone(),
            None => return,
        };

        let declared = merged
            .destroy_method
            .as_ref()
            .and_then(|method| class.methods.get(method))
            .cloned();
        let intrinsic = class.destroy.clone();
        if declared.is_none() && intrinsic.is_none() {
            return;
        }

        let instance = bean.clone();
        self.singletons.register_disposable(
            name,
            Box::new(move || {
                if let Some(destroy) = &intrinsic {
                    destroy(&instance)?;
                }
                if let Some(destroy) = &declared {
                    destroy(&instance)?;
                }
                Ok(())
            }),
        );
    }

    /// Dereferences factory beans: consumers of the plain name receive the product, the `&`
    /// prefix addresses the factory itself. Singleton products are cached.
    fn deref_factory(
        &self,
        instance: BeanPtr,
        canonical: &str,
        wants_factory: bool,
    ) -> Result<BeanPtr, BeansError> {
        let adapter = self
            .definitions
            .merged(canonical)
            .ok()
            .and_then(|merged| merged.class.clone())
            .and_then(|class| class.factory_bean);

        let factory = match adapter.and_then(|cast| cast(&instance)) {
            Some(factory) => factory,
            None => {
                return if wants_factory {
                    Err(BeansError::NotAFactory(canonical.to_string()))
                } else {
                    Ok(instance)
                };
            }
        };

        if wants_factory {
            return Ok(instance);
        }

        let shared_product = factory.is_singleton()
            && self
                .definitions
                .merged(canonical)
                .map(|merged| merged.is_singleton())
                .unwrap_or(false);
        if shared_product {
            if let Some(product) = self.factory_products.lock().get(canonical) {
                return Ok(product.clone());
            }
        }

        let product = factory.object().map_err(BeansError::Callback)?;
        if shared_product {
            self.factory_products
                .lock()
                .insert(canonical.to_string(), product.clone());
        }
        Ok(product)
    }

    fn probe_factory_object_type(&self, name: &str) -> Option<TypeId> {
        let factory_ref = format!("{FACTORY_BEAN_PREFIX}{name}");
        let instance = self.do_get_bean(&factory_ref, None, None).ok()?;
        let adapter = self
            .definitions
            .merged(&self.canonical(name))
            .ok()
            .and_then(|merged| merged.class.clone())
            .and_then(|class| class.factory_bean)?;
        adapter(&instance).and_then(|factory| factory.object_type())
    }

    fn unique_name_for_type(&self, type_id: TypeId, query: &str) -> Result<String, BeansError> {
        let candidates = self.bean_names_for_type(type_id, true, true);
        match candidates.as_slice() {
            [] => Err(BeansError::NoSuchBean(query.to_string())),
            [only] => Ok(only.clone()),
            _ => {
                let primaries: Vec<_> = candidates
                    .iter()
                    .filter(|name| {
                        self.definitions
                            .merged(name)
                            .map(|merged| merged.primary)
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                if let [primary] = primaries.as_slice() {
                    return Ok(primary.clone());
                }

                let short_name = short_type_name(query);
                if let Some(by_name) = candidates.iter().find(|name| **name == short_name) {
                    return Ok(by_name.clone());
                }

                Err(BeansError::NoUniqueBean {
                    query: query.to_string(),
                    candidates,
                })
            }
        }
    }

    fn assignability_of(&self, name: &str) -> Result<FxHashSet<TypeId>, BeansError> {
        let wants_factory = name.starts_with(FACTORY_BEAN_PREFIX);
        let canonical = self.canonical(name);

        match self.definitions.merged(&canonical) {
            Ok(merged) => Ok(match &merged.class {
                Some(class) if class.factory_bean.is_some() && !wants_factory => class
                    .factory_object_type
                    .into_iter()
                    .collect(),
                Some(class) => class.assignable_to.clone(),
                None => Default::default(),
            }),
            Err(BeansError::NoSuchBean(_)) => {
                if let Some(instance) = self.singletons.get(&canonical) {
                    return Ok([(*instance).type_id()].into_iter().collect());
                }
                if let Some(parent) = &self.parent {
                    return parent.assignability_of(name);
                }
                Err(BeansError::NoSuchBean(canonical))
            }
            Err(error) => Err(error),
        }
    }

    fn check_required_type(
        &self,
        instance: BeanPtr,
        canonical: &str,
        required_type: Option<TypeId>,
    ) -> Result<BeanPtr, BeansError> {
        let required = match required_type {
            Some(required) => required,
            None => return Ok(instance),
        };

        if (*instance).type_id() == required {
            return Ok(instance);
        }

        let assignable = self
            .definitions
            .merged(canonical)
            .ok()
            .and_then(|merged| merged.class.clone())
            .map(|class| class.is_assignable_to(required))
            .unwrap_or(false);
        if assignable {
            return Ok(instance);
        }

        Err(BeansError::TypeMismatch {
            name: canonical.to_string(),
            expected: format!("{required:?}"),
        })
    }

    fn begin_prototype(&self, name: &str) -> Result<PrototypeGuard<'_>, BeansError> {
        let thread = thread::current().id();
        let mut by_thread = self.prototypes_in_creation.lock();
        if !by_thread
            .entry(thread)
            .or_default()
            .insert(name.to_string())
        {
            return Err(BeansError::CircularPrototype(name.to_string()));
        }

        Ok(PrototypeGuard {
            factory: self,
            name: name.to_string(),
            thread,
        })
    }

    fn canonical(&self, name: &str) -> String {
        let bare = name.strip_prefix(FACTORY_BEAN_PREFIX).unwrap_or(name);
        self.aliases.canonical_name(bare)
    }

    fn check_open(&self) -> Result<(), BeansError> {
        if self.is_closed() {
            Err(BeansError::ContainerClosed)
        } else {
            Ok(())
        }
    }
}

fn short_type_name(query: &str) -> String {
    let last = query.rsplit("::").next().unwrap_or(query);
    let mut result = String::with_capacity(last.len() + 4);
    for (index, character) in last.chars().enumerate() {
        if character.is_uppercase() {
            if index > 0 {
                result.push('_');
            }
            result.extend(character.to_lowercase());
        } else {
            result.push(character);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanClass, ConstructorSpec, ParamSpec, SetterSpec};
    use parking_lot::RwLock as PlainRwLock;

    struct Holder {
        label: PlainRwLock<String>,
    }

    fn holder_class() -> Arc<BeanClass> {
        Arc::new(
            BeanClass::new::<Holder>()
                .constructor(ConstructorSpec {
                    params: vec![],
                    invoke: Arc::new(|_| {
                        Ok(Arc::new(Holder {
                            label: PlainRwLock::new(String::new()),
                        }) as BeanPtr)
                    }),
                })
                .setter(
                    "label",
                    SetterSpec {
                        type_id: TypeId::of::<String>(),
                        convert: None,
                        apply: Arc::new(|bean, value| {
                            let holder = bean.clone().downcast::<Holder>().unwrap();
                            let label = value.downcast::<String>().unwrap();
                            *holder.label.write() = (*label).clone();
                            Ok(())
                        }),
                    },
                ),
        )
    }

    #[test]
    fn should_resolve_singleton_with_property() {
        let factory = BeanFactory::default();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class())
                    .with_property("label", ValueSpec::Literal("alpha".to_string())),
            )
            .unwrap();

        let first = factory.get_bean_typed::<Holder>("holder").unwrap();
        assert_eq!(*first.label.read(), "alpha");

        let second = factory.get_bean_typed::<Holder>("holder").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn should_resolve_constructor_literals_with_conversion() {
        struct Sized_ {
            size: i64,
        }

        let class = Arc::new(BeanClass::new::<Sized_>().constructor(ConstructorSpec {
            params: vec![ParamSpec::parsed::<i64>("size")],
            invoke: Arc::new(|mut args| {
                let size = args.remove(0).downcast::<i64>().unwrap();
                Ok(Arc::new(Sized_ { size: *size }) as BeanPtr)
            }),
        }));

        let factory = BeanFactory::default();
        factory
            .register_definition(
                "sized",
                BeanDefinition::of(class)
                    .with_constructor_arg(ValueSpec::Literal("17".to_string())),
            )
            .unwrap();

        assert_eq!(factory.get_bean_typed::<Sized_>("sized").unwrap().size, 17);
    }

    #[test]
    fn should_expand_placeholders_in_literals() {
        let factory = BeanFactoryBuilder::new()
            .with_placeholder_lookup(Arc::new(|key: &str| {
                (key == "holder.label").then(|| "from-config".to_string())
            }))
            .build();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class())
                    .with_property("label", ValueSpec::Literal("${holder.label}".to_string())),
            )
            .unwrap();

        let holder = factory.get_bean_typed::<Holder>("holder").unwrap();
        assert_eq!(*holder.label.read(), "from-config");
    }

    #[test]
    fn should_resolve_through_aliases_transparently() {
        let factory = BeanFactory::default();
        factory
            .register_definition("holder", BeanDefinition::of(holder_class()))
            .unwrap();
        factory.register_alias("holder", "other").unwrap();
        factory.register_alias("other", "third").unwrap();

        let by_name = factory.get_bean("holder").unwrap();
        let by_alias = factory.get_bean("third").unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_alias));

        assert_eq!(factory.get_aliases("third"), ["holder", "other"]);
        assert!(factory.contains_bean("other"));
    }

    #[test]
    fn should_reject_alias_colliding_with_definition() {
        let factory = BeanFactory::default();
        factory
            .register_definition("holder", BeanDefinition::of(holder_class()))
            .unwrap();

        assert!(matches!(
            factory.register_alias("whatever", "holder").unwrap_err(),
            BeansError::NameConflict(..)
        ));
    }

    #[test]
    fn should_create_prototypes_per_request() {
        let factory = BeanFactory::default();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class()).with_scope(PROTOTYPE),
            )
            .unwrap();

        let first = factory.get_bean("holder").unwrap();
        let second = factory.get_bean("holder").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(factory.is_prototype("holder").unwrap());
        assert!(!factory.is_singleton("holder").unwrap());
    }

    #[test]
    fn should_fail_on_unknown_scope() {
        let factory = BeanFactory::default();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class()).with_scope("conversation"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("holder").unwrap_err(),
            BeansError::UnrecognizedScope(scope) if scope == "conversation"
        ));
    }

    #[test]
    fn should_dispatch_to_registered_custom_scope() {
        use crate::scope::ThreadScope;

        let factory = BeanFactoryBuilder::new()
            .with_scope("thread", Arc::new(ThreadScope::default()))
            .build();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class()).with_scope("thread"),
            )
            .unwrap();

        let first = factory.get_bean("holder").unwrap();
        let second = factory.get_bean("holder").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn should_autowire_by_type_with_primary_tiebreak() {
        trait Port: Send + Sync {}
        struct Adapter;
        impl Port for Adapter {}
        struct Backup;
        impl Port for Backup {}

        struct Service {
            port: BeanPtr,
        }

        fn port_class<T: Default + Port + Any + Send + Sync>() -> Arc<BeanClass> {
            Arc::new(
                BeanClass::new::<T>()
                    .assignable::<dyn Port>()
                    .constructor(ConstructorSpec {
                        params: vec![],
                        invoke: Arc::new(|_| Ok(Arc::new(T::default()) as BeanPtr)),
                    }),
            )
        }

        impl Default for Adapter {
            fn default() -> Self {
                Adapter
            }
        }
        impl Default for Backup {
            fn default() -> Self {
                Backup
            }
        }

        let service_class = Arc::new(BeanClass::new::<Service>().constructor(ConstructorSpec {
            params: vec![ParamSpec::of::<dyn Port>("port")],
            invoke: Arc::new(|mut args| {
                Ok(Arc::new(Service {
                    port: args.remove(0),
                }) as BeanPtr)
            }),
        }));

        let factory = BeanFactory::default();
        factory
            .register_definition(
                "adapter",
                BeanDefinition::of(port_class::<Adapter>()).with_primary(),
            )
            .unwrap();
        factory
            .register_definition("backup", BeanDefinition::of(port_class::<Backup>()))
            .unwrap();
        factory
            .register_definition("service", BeanDefinition::of(service_class))
            .unwrap();

        let service = factory.get_bean_typed::<Service>("service").unwrap();
        assert!((*service.port).type_id() == TypeId::of::<Adapter>());
    }

    #[test]
    fn should_prefer_earlier_declared_constructor_on_ties() {
        struct Dep;
        struct Built {
            tag: &'static str,
        }

        let dep_class = Arc::new(BeanClass::new::<Dep>().constructor(ConstructorSpec {
            params: vec![],
            invoke: Arc::new(|_| Ok(Arc::new(Dep) as BeanPtr)),
        }));

        // two candidates with equal arity and equal specificity - declaration order decides
        let built_class = Arc::new(
            BeanClass::new::<Built>()
                .constructor(ConstructorSpec {
                    params: vec![ParamSpec::of::<Dep>("dep")],
                    invoke: Arc::new(|_| Ok(Arc::new(Built { tag: "first" }) as BeanPtr)),
                })
                .constructor(ConstructorSpec {
                    params: vec![ParamSpec::of::<Dep>("dep")],
                    invoke: Arc::new(|_| Ok(Arc::new(Built { tag: "second" }) as BeanPtr)),
                }),
        );

        let factory = BeanFactory::default();
        factory
            .register_definition("dep", BeanDefinition::of(dep_class))
            .unwrap();
        factory
            .register_definition("built", BeanDefinition::of(built_class))
            .unwrap();

        assert_eq!(factory.get_bean_typed::<Built>("built").unwrap().tag, "first");
    }

    #[test]
    fn should_fail_autowiring_without_candidates() {
        struct Lonely;
        struct Needy;

        let class = Arc::new(BeanClass::new::<Needy>().constructor(ConstructorSpec {
            params: vec![ParamSpec::of::<Lonely>("lonely")],
            invoke: Arc::new(|_| Ok(Arc::new(Needy) as BeanPtr)),
        }));

        let factory = BeanFactory::default();
        factory
            .register_definition("needy", BeanDefinition::of(class))
            .unwrap();

        let error = factory.get_bean("needy").unwrap_err();
        assert!(matches!(
            error,
            BeansError::BeanCreation { name, .. } if name == "needy"
        ));
    }

    #[test]
    fn should_respect_depends_on_ordering() {
        let order: Arc<PlainRwLock<Vec<&'static str>>> = Arc::new(PlainRwLock::new(vec![]));

        struct Tracked;
        fn tracked_class(
            order: Arc<PlainRwLock<Vec<&'static str>>>,
            tag: &'static str,
        ) -> Arc<BeanClass> {
            Arc::new(BeanClass::new::<Tracked>().constructor(ConstructorSpec {
                params: vec![],
                invoke: Arc::new(move |_| {
                    order.write().push(tag);
                    Ok(Arc::new(Tracked) as BeanPtr)
                }),
            }))
        }

        let factory = BeanFactory::default();
        factory
            .register_definition(
                "first",
                BeanDefinition::of(tracked_class(order.clone(), "first")).with_depends_on("second"),
            )
            .unwrap();
        factory
            .register_definition(
                "second",
                BeanDefinition::of(tracked_class(order.clone(), "second")),
            )
            .unwrap();

        factory.get_bean("first").unwrap();
        assert_eq!(*order.read(), ["second", "first"]);
    }

    #[test]
    fn should_detect_depends_on_cycles() {
        let factory = BeanFactory::default();
        factory
            .register_definition(
                "a",
                BeanDefinition::of(holder_class()).with_depends_on("b"),
            )
            .unwrap();
        factory
            .register_definition(
                "b",
                BeanDefinition::of(holder_class()).with_depends_on("a"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeansError::CircularDependsOn { .. }
        ));
    }

    #[test]
    fn should_fall_back_to_parent_factory() {
        let parent = BeanFactory::default();
        parent
            .register_definition("holder", BeanDefinition::of(holder_class()))
            .unwrap();
        let parent = Arc::new(parent);

        let child = BeanFactoryBuilder::new().with_parent(parent.clone()).build();

        let from_child = child.get_bean("holder").unwrap();
        let from_parent = parent.get_bean("holder").unwrap();
        assert!(Arc::ptr_eq(&from_child, &from_parent));
        assert!(child.contains_bean("holder"));
    }

    #[test]
    fn should_fail_lookups_after_close() {
        let factory = BeanFactory::default();
        factory
            .register_definition("holder", BeanDefinition::of(holder_class()))
            .unwrap();
        factory.get_bean("holder").unwrap();

        factory.close();

        assert!(matches!(
            factory.get_bean("holder").unwrap_err(),
            BeansError::ContainerClosed
        ));
        assert!(factory.is_closed());
    }

    #[test]
    fn should_enumerate_names_by_type_excluding_aliases() {
        let factory = BeanFactory::default();
        factory
            .register_definition("holder", BeanDefinition::of(holder_class()))
            .unwrap();
        factory.register_alias("holder", "alias").unwrap();
        factory
            .register_singleton("external", Arc::new(Holder {
                label: PlainRwLock::new("ext".to_string()),
            }))
            .unwrap();

        let names = factory.bean_names_for_type(TypeId::of::<Holder>(), true, true);
        assert_eq!(names, ["holder", "external"]);
    }

    #[test]
    fn should_find_beans_by_annotation() {
        let factory = BeanFactory::default();
        factory
            .register_definition(
                "holder",
                BeanDefinition::of(holder_class()).with_annotation("repository", "users"),
            )
            .unwrap();
        factory
            .register_definition("plain", BeanDefinition::of(holder_class()))
            .unwrap();

        assert_eq!(factory.bean_names_for_annotation("repository"), ["holder"]);
        assert_eq!(
            factory
                .find_annotation_on_bean("holder", "repository")
                .unwrap()
                .as_deref(),
            Some("users")
        );
        assert_eq!(
            factory.find_annotation_on_bean("plain", "repository").unwrap(),
            None
        );
    }

    #[test]
    fn should_convert_type_names_to_short_bean_names() {
        assert_eq!(short_type_name("my_crate::module::HolderBean"), "holder_bean");
        assert_eq!(short_type_name("Holder"), "holder");
    }
}
