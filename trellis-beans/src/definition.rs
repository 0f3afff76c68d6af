//! Declarative bean descriptions. A [BeanDefinition] is what a configuration loader registers;
//! attributes an inheriting child leaves unset fall back to its parent during merging, which
//! produces the [MergedDefinition] the factory actually works from.

use crate::bean::BeanClass;
use crate::error::BeansError;
use fxhash::FxHashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Name of the shared-instance scope.
pub const SINGLETON: &str = "singleton";

/// Name of the instance-per-request scope.
pub const PROTOTYPE: &str = "prototype";

/// Role of a definition, deciding the default duplicate-registration policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum BeanRole {
    #[default]
    Application,
    Infrastructure,
}

/// A single constructor argument or property value.
#[derive(Clone, Debug)]
pub enum ValueSpec {
    /// A literal string, expanded through the placeholder engine and converted to the declared
    /// parameter type.
    Literal(String),
    /// Reference to another bean by name.
    Ref(String),
    /// An inner bean created privately for the enclosing one.
    Nested(Box<BeanDefinition>),
    /// Resolved by type from the available autowire candidates.
    Autowire(TypeId),
}

/// A named property assignment.
#[derive(Clone, Debug)]
pub struct PropertyValue {
    pub name: String,
    pub value: ValueSpec,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: ValueSpec) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The declarative description of how to produce a bean.
#[derive(Clone, Debug, Default)]
pub struct BeanDefinition {
    /// Concrete producer type. May be absent when inherited from a parent definition.
    pub class: Option<Arc<BeanClass>>,
    /// Producing bean for factory-method instantiation.
    pub factory_bean: Option<String>,
    /// Factory method name, looked up on the factory bean's class.
    pub factory_method: Option<String>,
    /// `None` inherits the parent scope, ultimately defaulting to [SINGLETON].
    pub scope: Option<String>,
    pub lazy_init: Option<bool>,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub constructor_args: Vec<ValueSpec>,
    pub property_values: Vec<PropertyValue>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    /// Name of the definition this one inherits from.
    pub parent: Option<String>,
    /// Names which must be fully initialised before this bean's construction begins.
    pub depends_on: Vec<String>,
    pub role: BeanRole,
    /// String metadata attributes, the closest runtime analogue of source-level annotations.
    pub annotations: FxHashMap<String, String>,
}

impl BeanDefinition {
    /// Definition producing instances of the given class.
    pub fn of(class: Arc<BeanClass>) -> Self {
        Self {
            class: Some(class),
            autowire_candidate: true,
            ..Default::default()
        }
    }

    /// Definition inheriting from a parent definition.
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            autowire_candidate: true,
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = Some(lazy_init);
        self
    }

    pub fn with_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    pub fn with_constructor_arg(mut self, value: ValueSpec) -> Self {
        self.constructor_args.push(value);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: ValueSpec) -> Self {
        self.property_values.push(PropertyValue::new(name, value));
        self
    }

    pub fn with_factory(
        mut self,
        factory_bean: impl Into<String>,
        factory_method: impl Into<String>,
    ) -> Self {
        self.factory_bean = Some(factory_bean.into());
        self.factory_method = Some(factory_method.into());
        self
    }

    pub fn with_init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self
    }

    pub fn with_destroy_method(mut self, name: impl Into<String>) -> Self {
        self.destroy_method = Some(name.into());
        self
    }

    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn with_role(mut self, role: BeanRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// A definition with its parent chain folded in and defaults applied. Cached by the definition
/// registry and invalidated whenever definitions change.
#[derive(Clone, Debug)]
pub struct MergedDefinition {
    pub name: String,
    pub class: Option<Arc<BeanClass>>,
    pub factory_bean: Option<String>,
    pub factory_method: Option<String>,
    pub scope: String,
    pub lazy_init: bool,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub constructor_args: Vec<ValueSpec>,
    pub property_values: Vec<PropertyValue>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    pub depends_on: Vec<String>,
    pub role: BeanRole,
    pub annotations: FxHashMap<String, String>,
}

impl MergedDefinition {
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.scope == SINGLETON
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.scope == PROTOTYPE
    }

    /// Whether instances are produced by a factory-bean class rather than consumed directly.
    #[inline]
    pub fn is_factory_bean(&self) -> bool {
        self.class
            .as_ref()
            .map(|class| class.factory_bean.is_some())
            .unwrap_or(false)
    }

    /// Folds a child definition onto an already merged parent. With no parent, applies defaults.
    pub(crate) fn merge(
        name: &str,
        definition: &BeanDefinition,
        parent: Option<&MergedDefinition>,
    ) -> Result<MergedDefinition, BeansError> {
        let mut merged = match parent {
            Some(parent) => MergedDefinition {
                name: name.to_string(),
                ..parent.clone()
            },
            None => MergedDefinition {
                name: name.to_string(),
                class: None,
                factory_bean: None,
                factory_method: None,
                scope: SINGLETON.to_string(),
                lazy_init: false,
                primary: false,
                autowire_candidate: true,
                constructor_args: vec![],
                property_values: vec![],
                init_method: None,
                destroy_method: None,
                depends_on: vec![],
                role: BeanRole::Application,
                annotations: Default::default(),
            },
        };

        if let Some(class) = &definition.class {
            merged.class = Some(class.clone());
        }

        if definition.factory_bean.is_some() {
            merged.factory_bean = definition.factory_bean.clone();
            merged.factory_method = definition.factory_method.clone();
        }

        if let Some(scope) = &definition.scope {
            merged.scope = scope.clone();
        }

        if let Some(lazy_init) = definition.lazy_init {
            merged.lazy_init = lazy_init;
        }

        merged.primary = definition.primary;
        merged.autowire_candidate = definition.autowire_candidate;
        merged.role = definition.role;

        if !definition.constructor_args.is_empty() {
            merged.constructor_args = definition.constructor_args.clone();
        }

        // property values merge by name, the child overriding individual entries
        for property in &definition.property_values {
            match merged
                .property_values
                .iter_mut()
                .find(|existing| existing.name == property.name)
            {
                Some(existing) => existing.value = property.value.clone(),
                None => merged.property_values.push(property.clone()),
            }
        }

        if definition.init_method.is_some() {
            merged.init_method = definition.init_method.clone();
        }

        if definition.destroy_method.is_some() {
            merged.destroy_method = definition.destroy_method.clone();
        }

        if !definition.depends_on.is_empty() {
            merged.depends_on = definition.depends_on.clone();
        }

        merged
            .annotations
            .extend(definition.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));

        if merged.class.is_none() && merged.factory_bean.is_none() {
            return Err(BeansError::BeanCreation {
                name: name.to_string(),
                source: Box::new(BeansError::NoSuchBean(format!(
                    "definition '{name}' declares neither a class nor a factory bean"
                ))),
                suppressed: vec![],
            });
        }

        Ok(merged)
    }
}
