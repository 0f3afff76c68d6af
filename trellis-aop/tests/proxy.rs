use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;
use trellis_aop::advice::{Advice, BeforeAdvice, Interceptor, ThrowsAdvice};
use trellis_aop::advisor::Advisor;
use trellis_aop::error::AopError;
use trellis_aop::invocation::Invocation;
use trellis_aop::method::{Args, Interface, Method, MethodDispatch, RetVal};
use trellis_aop::pointcut::{MethodMatcher, NameMatchMethodPointcut, Pointcut, TrueClassFilter};
use trellis_aop::proxy::{current_proxy, Proxy, ProxyFactory};
use trellis_aop::target::{PooledTargetSource, SingletonTargetSource};
use trellis_beans::bean::{BeanClass, BeanPtr, ConstructorSpec};
use trellis_beans::definition::{BeanDefinition, PROTOTYPE};
use trellis_beans::error::ErrorPtr;
use trellis_beans::factory::BeanFactory;

struct Computer {
    base: i64,
}

struct ComputerDispatch;

impl MethodDispatch for ComputerDispatch {
    fn dispatch(&self, target: &BeanPtr, method: &Method, args: &Args) -> Result<RetVal, ErrorPtr> {
        let computer = target
            .clone()
            .downcast::<Computer>()
            .map_err(|_| test_error("target is not a Computer"))?;

        match method.name.as_str() {
            "compute" => Ok(Some(Arc::new(computer.base) as BeanPtr)),
            "add" => {
                let operand = args
                    .first()
                    .and_then(|arg| arg.clone().downcast::<i64>().ok())
                    .ok_or_else(|| test_error("missing operand"))?;
                Ok(Some(Arc::new(computer.base + *operand) as BeanPtr))
            }
            "identity" => Ok(Some(target.clone())),
            "explode" => Err(test_error("boom")),
            other => Err(test_error(other)),
        }
    }
}

fn test_error(message: &str) -> ErrorPtr {
    Arc::new(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
}

fn computer_interface() -> Interface {
    Interface::new(
        "Computer",
        ["compute", "add", "identity", "explode"],
        Arc::new(ComputerDispatch),
    )
}

fn computer_proxy(advisors: Vec<Advisor>) -> Arc<Proxy> {
    let mut factory = ProxyFactory::for_target(Arc::new(Computer { base: 1 }));
    factory.add_interface(computer_interface()).unwrap();
    for advisor in advisors {
        factory.add_advisor(advisor).unwrap();
    }
    factory.get_proxy()
}

fn int_result(result: RetVal) -> i64 {
    *result.unwrap().downcast::<i64>().unwrap()
}

struct TimesTwo;

impl Interceptor for TimesTwo {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        let result = int_result(invocation.proceed()?);
        Ok(Some(Arc::new(result * 2) as BeanPtr))
    }
}

struct PlusThree;

impl Interceptor for PlusThree {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
        let result = int_result(invocation.proceed()?);
        Ok(Some(Arc::new(result + 3) as BeanPtr))
    }
}

#[test]
fn should_invoke_target_directly_with_empty_chain() {
    let proxy = computer_proxy(vec![]);

    let result = proxy.invoke(&Method::new("compute"), vec![]).unwrap();
    assert_eq!(int_result(result), 1);
}

#[test]
fn should_walk_advisors_outer_to_inner_in_list_order() {
    // advisor list [x2, +3]: x2 is outermost, so compute() = (1 + 3) * 2
    let proxy = computer_proxy(vec![
        Advisor::always(Advice::Around(Arc::new(TimesTwo))),
        Advisor::always(Advice::Around(Arc::new(PlusThree))),
    ]);

    let result = proxy.invoke(&Method::new("compute"), vec![]).unwrap();
    assert_eq!(int_result(result), 8);

    // the reverse list yields (1 * 2) + 3
    let reversed = computer_proxy(vec![
        Advisor::always(Advice::Around(Arc::new(PlusThree))),
        Advisor::always(Advice::Around(Arc::new(TimesTwo))),
    ]);

    let result = reversed.invoke(&Method::new("compute"), vec![]).unwrap();
    assert_eq!(int_result(result), 5);
}

#[test]
fn should_apply_before_advice_only_where_pointcut_matches() {
    struct Counting {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl BeforeAdvice for Counting {
        fn before(&self, method: &Method, _args: &Args) -> Result<(), ErrorPtr> {
            self.calls.lock().push(method.name.clone());
            Ok(())
        }
    }

    let calls: Arc<Mutex<Vec<String>>> = Default::default();
    let advisor = Advisor::new(
        NameMatchMethodPointcut::new()
            .with_pattern("compute")
            .into_pointcut(),
        Advice::Before(Arc::new(Counting {
            calls: calls.clone(),
        })),
    );

    let proxy = computer_proxy(vec![advisor]);
    proxy.invoke(&Method::new("compute"), vec![]).unwrap();
    proxy
        .invoke(&Method::new("add"), vec![Arc::new(5_i64)])
        .unwrap();

    assert_eq!(*calls.lock(), ["compute"]);
}

#[test]
fn should_notify_throws_advice_and_rethrow() {
    struct Observing {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ThrowsAdvice for Observing {
        fn after_throwing(&self, method: &Method, error: &ErrorPtr) {
            self.seen.lock().push(format!("{}: {error}", method.name));
        }
    }

    let seen: Arc<Mutex<Vec<String>>> = Default::default();
    let proxy = computer_proxy(vec![Advisor::always(Advice::AfterThrowing(Arc::new(
        Observing { seen: seen.clone() },
    )))]);

    let error = proxy.invoke(&Method::new("explode"), vec![]).unwrap_err();
    assert!(matches!(error, AopError::Invocation(..)));
    assert_eq!(seen.lock().len(), 1);
    assert!(seen.lock()[0].starts_with("explode"));
}

#[test]
fn should_evaluate_dynamic_matchers_per_call() {
    struct PositiveOperandMatcher;

    impl MethodMatcher for PositiveOperandMatcher {
        fn matches(&self, method: &Method, _target_type: TypeId) -> bool {
            method.name == "add"
        }

        fn is_runtime(&self) -> bool {
            true
        }

        fn matches_with_args(&self, _method: &Method, _target_type: TypeId, args: &Args) -> bool {
            args.first()
                .and_then(|arg| arg.clone().downcast::<i64>().ok())
                .map(|operand| *operand > 0)
                .unwrap_or(false)
        }
    }

    let advisor = Advisor::new(
        Pointcut::new(Arc::new(TrueClassFilter), Arc::new(PositiveOperandMatcher)),
        Advice::Around(Arc::new(TimesTwo)),
    );
    let proxy = computer_proxy(vec![advisor]);

    // positive operand: advice applies, (1 + 5) * 2
    let doubled = proxy
        .invoke(&Method::new("add"), vec![Arc::new(5_i64)])
        .unwrap();
    assert_eq!(int_result(doubled), 12);

    // non-positive operand: the runtime match fails, plain 1 + (-5)
    let plain = proxy
        .invoke(&Method::new("add"), vec![Arc::new(-5_i64)])
        .unwrap();
    assert_eq!(int_result(plain), -4);
}

#[test]
fn should_expose_proxy_during_invocation_and_restore_after() {
    struct CapturesProxy {
        observed: Arc<Mutex<Vec<bool>>>,
    }

    impl Interceptor for CapturesProxy {
        fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<RetVal, ErrorPtr> {
            self.observed.lock().push(current_proxy().is_some());
            invocation.proceed()
        }
    }

    let observed: Arc<Mutex<Vec<bool>>> = Default::default();

    let mut factory = ProxyFactory::for_target(Arc::new(Computer { base: 1 }));
    factory.add_interface(computer_interface()).unwrap();
    factory.set_expose_proxy(true).unwrap();
    factory
        .add_advisor(Advisor::always(Advice::Around(Arc::new(CapturesProxy {
            observed: observed.clone(),
        }))))
        .unwrap();
    let proxy = factory.get_proxy();

    assert!(current_proxy().is_none());
    proxy.invoke(&Method::new("compute"), vec![]).unwrap();
    assert_eq!(*observed.lock(), [true]);
    // the slot is restored on exit
    assert!(current_proxy().is_none());
}

#[test]
fn should_substitute_proxy_for_self_returning_methods() {
    let proxy = computer_proxy(vec![]);

    let result = proxy
        .invoke(&Method::returning_self("identity"), vec![])
        .unwrap()
        .unwrap();
    let returned = result.downcast::<Proxy>().unwrap();
    assert!(Arc::ptr_eq(&returned, &proxy));

    // without the self-returning marker the raw target comes back
    let raw = proxy
        .invoke(&Method::new("identity"), vec![])
        .unwrap()
        .unwrap();
    assert!(raw.downcast::<Computer>().is_ok());
}

#[test]
fn should_reject_unknown_methods() {
    let proxy = computer_proxy(vec![]);

    assert!(matches!(
        proxy.invoke(&Method::new("undeclared"), vec![]).unwrap_err(),
        AopError::NoSuchMethod(..)
    ));
}

#[test]
fn should_freeze_configuration_at_first_proxy() {
    let mut factory = ProxyFactory::for_target(Arc::new(Computer { base: 1 }));
    factory.add_interface(computer_interface()).unwrap();
    let _proxy = factory.get_proxy();

    assert!(matches!(
        factory
            .add_advisor(Advisor::always(Advice::Around(Arc::new(TimesTwo))))
            .unwrap_err(),
        AopError::ConfigurationFrozen
    ));
    assert!(matches!(
        factory.set_expose_proxy(true).unwrap_err(),
        AopError::ConfigurationFrozen
    ));
}

#[test]
fn should_compare_proxies_structurally() {
    let target_source = Arc::new(SingletonTargetSource::new(Arc::new(Computer { base: 1 })));
    let advice: Arc<dyn Interceptor> = Arc::new(TimesTwo);

    let mut first = ProxyFactory::new(target_source.clone());
    first.add_interface(computer_interface()).unwrap();
    first
        .add_advisor(Advisor::always(Advice::Around(advice.clone())))
        .unwrap();

    let mut second = ProxyFactory::new(target_source.clone());
    second.add_interface(computer_interface()).unwrap();
    second
        .add_advisor(Advisor::always(Advice::Around(advice)))
        .unwrap();

    assert!(first.get_proxy() == second.get_proxy());

    let mut different = ProxyFactory::new(target_source);
    different.add_interface(computer_interface()).unwrap();
    different
        .add_advisor(Advisor::always(Advice::Around(Arc::new(PlusThree))))
        .unwrap();

    assert!(first.get_proxy() != different.get_proxy());
}

#[test]
fn should_hide_configuration_when_opaque() {
    let mut factory = ProxyFactory::for_target(Arc::new(Computer { base: 1 }));
    factory.add_interface(computer_interface()).unwrap();
    let transparent = factory.get_proxy();
    assert!(transparent.advised().is_some());

    let mut factory = ProxyFactory::for_target(Arc::new(Computer { base: 1 }));
    factory.add_interface(computer_interface()).unwrap();
    factory.set_opaque(true).unwrap();
    let opaque = factory.get_proxy();
    assert!(opaque.advised().is_none());
}

#[test]
fn should_release_pooled_targets_after_each_invocation() {
    let class = Arc::new(BeanClass::new::<Computer>().constructor(ConstructorSpec {
        params: vec![],
        invoke: Arc::new(|_| Ok(Arc::new(Computer { base: 1 }) as BeanPtr)),
    }));
    let beans = BeanFactory::default();
    beans
        .register_definition("computer", BeanDefinition::of(class).with_scope(PROTOTYPE))
        .unwrap();

    let pool = Arc::new(PooledTargetSource::new(
        Arc::new(beans),
        "computer",
        1,
        Duration::from_millis(50),
    ));

    let mut factory = ProxyFactory::new(pool.clone());
    factory.add_interface(computer_interface()).unwrap();
    let proxy = factory.get_proxy();

    // with a pool of one, a second invocation only works if the first released its target
    assert_eq!(int_result(proxy.invoke(&Method::new("compute"), vec![]).unwrap()), 1);
    assert_eq!(int_result(proxy.invoke(&Method::new("compute"), vec![]).unwrap()), 1);
    assert_eq!(pool.size(), 1);
}
