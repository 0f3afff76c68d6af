//! An inversion-of-control container core inspired by the
//! [Spring Framework](https://spring.io/) in Java.
//!
//! Configuration loaders register declarative [bean definitions](definition::BeanDefinition)
//! together with the [class metadata](bean::BeanClass) Rust cannot reflect on at runtime; the
//! [factory](factory::BeanFactory) resolves names and types to fully wired instances, manages
//! singleton lifecycles - including circular references closed through early exposure - and
//! destroys instances in dependency-aware reverse order.
//!
//! ### Simple usage example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_beans::bean::{BeanClass, BeanPtr, ConstructorSpec};
//! use trellis_beans::definition::BeanDefinition;
//! use trellis_beans::factory::BeanFactory;
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     fn greet(&self) -> &'static str {
//!         "hello"
//!     }
//! }
//!
//! // a loader registers the class metadata and a definition using it
//! let class = Arc::new(BeanClass::new::<Greeter>().constructor(ConstructorSpec {
//!     params: vec![],
//!     invoke: Arc::new(|_| Ok(Arc::new(Greeter) as BeanPtr)),
//! }));
//!
//! let factory = BeanFactory::default();
//! factory
//!     .register_definition("greeter", BeanDefinition::of(class))
//!     .unwrap();
//!
//! // consumers ask for wired instances by name or type
//! let greeter = factory.get_bean_typed::<Greeter>("greeter").unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```

pub mod alias_registry;
pub mod bean;
pub mod definition;
pub mod definition_registry;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod placeholder;
pub mod scope;
pub mod singleton_registry;
