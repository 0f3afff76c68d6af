//! The runtime metadata a configuration loader registers for each concrete bean type. Rust has no
//! reflection, so everything the container would discover reflectively - constructors, setters,
//! lifecycle methods, trait assignability - is described up front by a [BeanClass] and invoked
//! through stored closures.

use crate::error::ErrorPtr;
use crate::factory::BeanContext;
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use std::any::{type_name, Any, TypeId};
use std::str::FromStr;
use std::sync::Arc;

/// Type-erased, shared pointer to a bean instance.
pub type BeanPtr = Arc<dyn Any + Send + Sync>;

/// Invokes one constructor candidate with fully resolved arguments.
pub type ConstructorFn = Arc<dyn Fn(Vec<BeanPtr>) -> Result<BeanPtr, ErrorPtr> + Send + Sync>;

/// Writes one property value into an existing instance. Beans which participate in property
/// population expose interior mutability for those fields; the setter closure downcasts and
/// stores.
pub type SetterFn = Arc<dyn Fn(&BeanPtr, BeanPtr) -> Result<(), ErrorPtr> + Send + Sync>;

/// Converts an expanded literal string into a typed instance.
pub type ConvertFn = Arc<dyn Fn(&str) -> Result<BeanPtr, ErrorPtr> + Send + Sync>;

/// A named lifecycle method (`init-method` / `destroy-method` dispatch target) or an intrinsic
/// initialisation/disposal capability of the type.
pub type LifecycleFn = Arc<dyn Fn(&BeanPtr) -> Result<(), ErrorPtr> + Send + Sync>;

/// A named factory method: receives the factory instance and resolved arguments.
pub type FactoryMethodFn =
    Arc<dyn Fn(&BeanPtr, Vec<BeanPtr>) -> Result<BeanPtr, ErrorPtr> + Send + Sync>;

/// Glue function viewing an instance as a [FactoryBean], if its concrete type implements it.
/// Same shape as a cast function: only the registering loader knows the concrete type.
pub type FactoryBeanCast = fn(&BeanPtr) -> Option<Arc<dyn FactoryBean>>;

/// Post-construction callback receiving a context handle. Replaces the "aware" interface family:
/// a bean which wants its own name or a reference back to the factory asks the context for it.
pub type AwareFn = Arc<dyn Fn(&BeanPtr, &BeanContext<'_>) -> Result<(), ErrorPtr> + Send + Sync>;

/// A bean producing *another* object. Consumers asking for the bean name receive the product;
/// the factory itself is addressed with the `&` name prefix.
pub trait FactoryBean: Send + Sync {
    /// Produces the object this factory exposes.
    fn object(&self) -> Result<BeanPtr, ErrorPtr>;

    /// Type of the produced object, if it can be determined without producing one.
    fn object_type(&self) -> Option<TypeId> {
        None
    }

    /// Whether the product may be cached and shared. Defaults to shared.
    fn is_singleton(&self) -> bool {
        true
    }
}

/// One constructor candidate of a [BeanClass].
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ConstructorSpec {
    pub params: Vec<ParamSpec>,
    #[derivative(Debug = "ignore")]
    pub invoke: ConstructorFn,
}

/// One parameter of a constructor or factory method.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ParamSpec {
    /// Parameter name, used as an autowiring tie-breaker.
    pub name: String,
    /// The type this parameter accepts - a concrete type id or a `dyn Trait` id.
    pub type_id: TypeId,
    /// Literal conversion for this parameter, when string values are acceptable.
    #[derivative(Debug = "ignore")]
    pub convert: Option<ConvertFn>,
}

impl ParamSpec {
    /// Parameter taking an instance of (or assignable to) `T`, without literal conversion.
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            convert: None,
        }
    }

    /// Parameter parsed from literal strings via [FromStr].
    pub fn parsed<T>(name: impl Into<String>) -> Self
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            convert: Some(parse_convert::<T>()),
        }
    }
}

/// One settable property of a [BeanClass].
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct SetterSpec {
    pub type_id: TypeId,
    #[derivative(Debug = "ignore")]
    pub convert: Option<ConvertFn>,
    #[derivative(Debug = "ignore")]
    pub apply: SetterFn,
}

/// The reflective descriptor for a concrete bean-producing type. Registered once by a loader and
/// shared by every definition using the type.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanClass {
    pub type_id: TypeId,
    pub type_name: String,
    /// The concrete type id plus every `dyn Trait` id instances can be viewed as. Drives type
    /// queries and autowiring.
    pub assignable_to: FxHashSet<TypeId>,
    #[derivative(Debug = "ignore")]
    pub constructors: Vec<ConstructorSpec>,
    #[derivative(Debug = "ignore")]
    pub setters: FxHashMap<String, SetterSpec>,
    /// Named methods addressable from `init-method` / `destroy-method` definition attributes.
    #[derivative(Debug = "ignore")]
    pub methods: FxHashMap<String, LifecycleFn>,
    #[derivative(Debug = "ignore")]
    pub factory_methods: FxHashMap<String, FactoryMethodFn>,
    /// Intrinsic initialisation capability, run before any declared `init-method`.
    #[derivative(Debug = "ignore")]
    pub init: Option<LifecycleFn>,
    /// Intrinsic disposal capability, run before any declared `destroy-method`.
    #[derivative(Debug = "ignore")]
    pub destroy: Option<LifecycleFn>,
    /// Present iff the type implements [FactoryBean].
    #[derivative(Debug = "ignore")]
    pub factory_bean: Option<FactoryBeanCast>,
    /// Statically known product type for factory-bean classes; `None` means unknown without
    /// instantiation.
    pub factory_object_type: Option<TypeId>,
    #[derivative(Debug = "ignore")]
    pub aware: Option<AwareFn>,
}

impl BeanClass {
    /// Creates a descriptor for `T` with no members registered yet.
    pub fn new<T: Any + Send + Sync>() -> Self {
        let type_id = TypeId::of::<T>();
        Self {
            type_id,
            type_name: type_name::<T>().to_string(),
            assignable_to: [type_id].into_iter().collect(),
            constructors: vec![],
            setters: Default::default(),
            methods: Default::default(),
            factory_methods: Default::default(),
            init: None,
            destroy: None,
            factory_bean: None,
            factory_object_type: None,
            aware: None,
        }
    }

    /// Declares that instances can also be viewed as `T` (typically a `dyn Trait`).
    pub fn assignable<T: ?Sized + 'static>(mut self) -> Self {
        self.assignable_to.insert(TypeId::of::<T>());
        self
    }

    pub fn constructor(mut self, spec: ConstructorSpec) -> Self {
        self.constructors.push(spec);
        self
    }

    pub fn setter(mut self, name: impl Into<String>, spec: SetterSpec) -> Self {
        self.setters.insert(name.into(), spec);
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: LifecycleFn) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn factory_method(mut self, name: impl Into<String>, method: FactoryMethodFn) -> Self {
        self.factory_methods.insert(name.into(), method);
        self
    }

    pub fn initializer(mut self, init: LifecycleFn) -> Self {
        self.init = Some(init);
        self
    }

    pub fn disposer(mut self, destroy: LifecycleFn) -> Self {
        self.destroy = Some(destroy);
        self
    }

    pub fn factory(mut self, cast: FactoryBeanCast, object_type: Option<TypeId>) -> Self {
        self.factory_bean = Some(cast);
        self.factory_object_type = object_type;
        self
    }

    pub fn aware(mut self, callback: AwareFn) -> Self {
        self.aware = Some(callback);
        self
    }

    /// Whether instances of this class can satisfy a request for `type_id`.
    #[inline]
    pub fn is_assignable_to(&self, type_id: TypeId) -> bool {
        self.assignable_to.contains(&type_id)
    }
}

/// Downcasts a shared instance pointer to a concrete type.
pub fn downcast_bean<T: Any + Send + Sync>(instance: &BeanPtr) -> Option<Arc<T>> {
    instance.clone().downcast::<T>().ok()
}

/// Conversion passing the literal through as a [String].
pub fn string_convert() -> ConvertFn {
    Arc::new(|value| Ok(Arc::new(value.to_string()) as BeanPtr))
}

/// Conversion parsing the literal via [FromStr].
pub fn parse_convert<T>() -> ConvertFn
where
    T: FromStr + Send + Sync + 'static,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Arc::new(|value| {
        value
            .parse::<T>()
            .map(|parsed| Arc::new(parsed) as BeanPtr)
            .map_err(|error| Arc::new(error) as ErrorPtr)
    })
}
