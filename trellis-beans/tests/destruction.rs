use parking_lot::Mutex;
use std::sync::Arc;
use trellis_beans::bean::{BeanClass, BeanPtr, ConstructorSpec, LifecycleFn};
use trellis_beans::definition::{BeanDefinition, ValueSpec};
use trellis_beans::error::BeansError;
use trellis_beans::factory::BeanFactory;

type EventLog = Arc<Mutex<Vec<String>>>;

struct Closeable;

/// A class whose `close` method records its bean name in the shared event log.
fn closeable_class(events: EventLog, tag: &'static str) -> Arc<BeanClass> {
    let close: LifecycleFn = Arc::new(move |_| {
        events.lock().push(format!("close({tag})"));
        Ok(())
    });

    Arc::new(
        BeanClass::new::<Closeable>()
            .constructor(ConstructorSpec {
                params: vec![],
                invoke: Arc::new(|_| Ok(Arc::new(Closeable) as BeanPtr)),
            })
            .method("close", close),
    )
}

#[test]
fn should_destroy_dependants_before_their_dependencies() {
    let events: EventLog = Default::default();

    let factory = BeanFactory::default();
    factory
        .register_definition(
            "a",
            BeanDefinition::of(closeable_class(events.clone(), "A"))
                .with_depends_on("b")
                .with_destroy_method("close"),
        )
        .unwrap();
    factory
        .register_definition(
            "b",
            BeanDefinition::of(closeable_class(events.clone(), "B")).with_destroy_method("close"),
        )
        .unwrap();

    factory.get_bean("a").unwrap();
    factory.close();

    assert_eq!(*events.lock(), ["close(A)", "close(B)"]);
}

#[test]
fn should_destroy_reference_holders_before_their_references() {
    let events: EventLog = Default::default();

    let factory = BeanFactory::default();
    factory
        .register_definition(
            "service",
            BeanDefinition::of(closeable_class(events.clone(), "service"))
                .with_destroy_method("close"),
        )
        .unwrap();

    // the consumer is registered and created first, but holds a reference to the service
    let consumer_events = events.clone();
    let consumer_class = Arc::new(
        BeanClass::new::<Closeable>()
            .constructor(ConstructorSpec {
                params: vec![trellis_beans::bean::ParamSpec::of::<Closeable>("service")],
                invoke: Arc::new(|_| Ok(Arc::new(Closeable) as BeanPtr)),
            })
            .method(
                "close",
                Arc::new(move |_| {
                    consumer_events.lock().push("close(consumer)".to_string());
                    Ok(())
                }),
            ),
    );
    factory
        .register_definition(
            "consumer",
            BeanDefinition::of(consumer_class)
                .with_constructor_arg(ValueSpec::Ref("service".to_string()))
                .with_destroy_method("close"),
        )
        .unwrap();

    factory.get_bean("consumer").unwrap();
    factory.close();

    assert_eq!(*events.lock(), ["close(consumer)", "close(service)"]);
}

#[test]
fn should_destroy_inner_beans_after_their_outer_bean() {
    let events: EventLog = Default::default();

    let inner_definition = BeanDefinition::of(closeable_class(events.clone(), "inner"))
        .with_destroy_method("close");

    let outer_class = Arc::new(
        BeanClass::new::<Closeable>()
            .constructor(ConstructorSpec {
                params: vec![trellis_beans::bean::ParamSpec::of::<Closeable>("inner")],
                invoke: Arc::new(|_| Ok(Arc::new(Closeable) as BeanPtr)),
            })
            .method("close", {
                let events = events.clone();
                Arc::new(move |_| {
                    events.lock().push("close(outer)".to_string());
                    Ok(())
                })
            }),
    );

    let factory = BeanFactory::default();
    factory
        .register_definition(
            "outer",
            BeanDefinition::of(outer_class)
                .with_constructor_arg(ValueSpec::Nested(Box::new(inner_definition)))
                .with_destroy_method("close"),
        )
        .unwrap();

    factory.get_bean("outer").unwrap();
    factory.close();

    assert_eq!(*events.lock(), ["close(outer)", "close(inner)"]);
}

#[test]
fn should_swallow_destroy_failures_and_continue() {
    let events: EventLog = Default::default();

    let failing_class = Arc::new(
        BeanClass::new::<Closeable>()
            .constructor(ConstructorSpec {
                params: vec![],
                invoke: Arc::new(|_| Ok(Arc::new(Closeable) as BeanPtr)),
            })
            .method(
                "close",
                Arc::new(|_| Err(Arc::new(std::fmt::Error) as trellis_beans::error::ErrorPtr)),
            ),
    );

    let factory = BeanFactory::default();
    factory
        .register_definition(
            "failing",
            BeanDefinition::of(failing_class).with_destroy_method("close"),
        )
        .unwrap();
    factory
        .register_definition(
            "fine",
            BeanDefinition::of(closeable_class(events.clone(), "fine"))
                .with_destroy_method("close"),
        )
        .unwrap();

    factory.get_bean("failing").unwrap();
    factory.get_bean("fine").unwrap();
    factory.close();

    assert_eq!(*events.lock(), ["close(fine)"]);
}

#[test]
fn should_destroy_each_singleton_exactly_once() {
    let events: EventLog = Default::default();

    let factory = BeanFactory::default();
    factory
        .register_definition(
            "bean",
            BeanDefinition::of(closeable_class(events.clone(), "bean"))
                .with_destroy_method("close"),
        )
        .unwrap();

    factory.get_bean("bean").unwrap();
    factory.close();
    factory.close();

    assert_eq!(*events.lock(), ["close(bean)"]);
}

#[test]
fn should_fail_registration_after_close() {
    let factory = BeanFactory::default();
    factory.close();

    assert!(matches!(
        factory
            .register_definition(
                "late",
                BeanDefinition::of(closeable_class(Default::default(), "late"))
            )
            .unwrap_err(),
        BeansError::ContainerClosed
    ));
}
