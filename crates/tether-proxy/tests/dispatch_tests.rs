use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_proxy::{
    HandleResolver, MethodHandle, Proxy, ProxyFactory, ProxyRegistry, ProxySettings,
};
use tether_proxy::{LookupPreference, PrivilegedHandleTable, RuntimeCapabilities};
use tether_sdk::{
    ExecutionError, InterfaceDescriptor, InvocationError, MethodDescriptor, ObjectId,
    ObjectMethod, OperationRegistry, ProxyError, ProxyResult, Receiver, ResolutionError,
    Signature, TypeRef, Value, Visibility,
};

// Helper: Greeter { greet(str) -> str; shout(str) -> str = greet(name).upper() }
fn greeter() -> Arc<InterfaceDescriptor> {
    InterfaceDescriptor::builder("Greeter")
        .abstract_method("greet", Signature::new([TypeRef::Str], TypeRef::Str))
        .default_method(
            "shout",
            Signature::new([TypeRef::Str], TypeRef::Str),
            |recv, args| {
                let hello = recv.call("greet", args)?;
                Ok(Value::from(hello.expect_str()?.to_uppercase()))
            },
        )
        .build()
}

// Helper: engine answering Greeter.greet with "hi <name>"
fn greeting_engine() -> Arc<OperationRegistry> {
    let mut engine = OperationRegistry::new();
    engine.register("Greeter.greet", |args| {
        Ok(Value::from(format!("hi {}", args[0])))
    });
    Arc::new(engine)
}

fn host_table(caps: RuntimeCapabilities) -> Arc<dyn HandleResolver> {
    Arc::new(PrivilegedHandleTable::probe(&caps, LookupPreference::Auto).unwrap())
}

fn method(iface: &InterfaceDescriptor, name: &str) -> Arc<MethodDescriptor> {
    Arc::clone(iface.declared_named(name).next().unwrap())
}

/// Overrides `shout`, forwards everything else to the proxy
struct LoudGreeter<'a> {
    proxy: &'a Proxy,
}

impl Receiver for LoudGreeter<'_> {
    fn object_id(&self) -> ObjectId {
        self.proxy.id()
    }

    fn call(&self, name: &str, args: &[Value]) -> ProxyResult<Value> {
        match name {
            "shout" => Ok(Value::from("overridden")),
            _ => self.proxy.call_method(name, args),
        }
    }
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[test]
fn test_abstract_method_delegates_to_engine() {
    let proxy = Proxy::new(greeter(), greeting_engine()).unwrap();
    let result = proxy.call_method("greet", &[Value::from("Sam")]).unwrap();
    assert_eq!(result, Value::from("hi Sam"));
}

#[test]
fn test_builtin_body_runs_on_proxy() {
    let proxy = Proxy::new(greeter(), greeting_engine()).unwrap();
    let result = proxy.call_method("shout", &[Value::from("Sam")]).unwrap();
    assert_eq!(result, Value::from("HI SAM"));
}

#[test]
fn test_builtin_body_bypasses_receiver_override() {
    let iface = greeter();
    let proxy = Proxy::new(Arc::clone(&iface), greeting_engine()).unwrap();
    let loud = LoudGreeter { proxy: &proxy };
    let shout = method(&iface, "shout");

    let overridden = loud.call("shout", &[Value::from("Sam")]).unwrap();
    assert_eq!(overridden, Value::from("overridden"));
    let result = proxy.intercept(&loud, &shout, &[Value::from("Sam")]).unwrap();
    assert_eq!(result, Value::from("HI SAM"));
}

#[test]
fn test_engine_failure_keeps_its_kind() {
    let proxy = Proxy::new(greeter(), Arc::new(OperationRegistry::new())).unwrap();
    let err = proxy.call_method("greet", &[Value::from("Sam")]).unwrap_err();
    assert_eq!(
        err,
        ProxyError::Execution(ExecutionError::NoSuchOperation("Greeter.greet".into()))
    );

    // The same failure surfaces unchanged through a built-in body
    let err = proxy.call_method("shout", &[Value::from("Sam")]).unwrap_err();
    assert_eq!(
        err,
        ProxyError::Execution(ExecutionError::NoSuchOperation("Greeter.greet".into()))
    );
}

#[test]
fn test_engine_reported_failure() {
    let mut engine = OperationRegistry::new();
    engine.register("Greeter.greet", |_args| {
        Err(ExecutionError::Failed {
            statement: "Greeter.greet".into(),
            message: "connection reset".into(),
        })
    });
    let proxy = Proxy::new(greeter(), Arc::new(engine)).unwrap();
    let err = proxy.call_method("greet", &[Value::from("Sam")]).unwrap_err();
    assert!(matches!(err, ProxyError::Execution(ExecutionError::Failed { .. })));
}

#[test]
fn test_builtin_body_arity_mismatch() {
    let iface = greeter();
    let proxy = Proxy::new(Arc::clone(&iface), greeting_engine()).unwrap();
    let err = proxy.intercept(&proxy, &method(&iface, "shout"), &[]).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Invocation(InvocationError::ArityMismatch { expected: 1, got: 0, .. })
    ));
}

#[test]
fn test_builtin_body_argument_type_mismatch() {
    let iface = greeter();
    let proxy = Proxy::new(Arc::clone(&iface), greeting_engine()).unwrap();
    let err = proxy
        .intercept(&proxy, &method(&iface, "shout"), &[Value::Int(7)])
        .unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Invocation(InvocationError::ArgumentType { index: 0, .. })
    ));
}

#[test]
fn test_delegated_call_checks_arguments() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut engine = OperationRegistry::new();
    let counter = Arc::clone(&runs);
    engine.register("Greeter.greet", move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::from(format!("hi {}", args[0])))
    });
    let iface = greeter();
    let proxy = Proxy::new(Arc::clone(&iface), Arc::new(engine)).unwrap();
    let greet = method(&iface, "greet");

    let err = proxy.intercept(&proxy, &greet, &[]).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Invocation(InvocationError::ArityMismatch { expected: 1, got: 0, .. })
    ));

    let err = proxy.intercept(&proxy, &greet, &[Value::Int(7)]).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Invocation(InvocationError::ArgumentType { index: 0, .. })
    ));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let ok = proxy.intercept(&proxy, &greet, &[Value::from("Sam")]).unwrap();
    assert_eq!(ok, Value::from("hi Sam"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Object Method Tests
// ============================================================================

#[test]
fn test_object_methods_never_routed() {
    let proxy = Proxy::new(greeter(), greeting_engine()).unwrap();

    for object_method in ObjectMethod::ALL {
        let descriptor = object_method.descriptor();
        let args: Vec<Value> = match object_method {
            ObjectMethod::Equals => vec![proxy.as_value()],
            _ => vec![],
        };
        proxy.intercept(&proxy, &descriptor, &args).unwrap();
    }

    assert!(proxy.router().cache().is_empty());
    assert_eq!(proxy.router().constructions(), 0);
}

#[test]
fn test_object_method_results() {
    let factory = ProxyFactory::with_resolver(
        greeter(),
        host_table(RuntimeCapabilities::host()),
        &ProxySettings::default(),
    );
    let a = factory.new_instance(greeting_engine());
    let b = factory.new_instance(greeting_engine());

    assert_eq!(a.call_method("equals", &[a.as_value()]).unwrap(), Value::Bool(true));
    assert_eq!(a.call_method("equals", &[b.as_value()]).unwrap(), Value::Bool(false));
    assert_eq!(a.call_method("equals", &[Value::Null]).unwrap(), Value::Bool(false));
    assert_ne!(
        a.call_method("hash_code", &[]).unwrap(),
        b.call_method("hash_code", &[]).unwrap()
    );
    assert_eq!(
        a.call_method("to_string", &[]).unwrap(),
        Value::Str(format!("Proxy<Greeter>@{}", a.id()))
    );
}

// ============================================================================
// Caching Tests
// ============================================================================

#[test]
fn test_one_construction_per_method() {
    let proxy = Proxy::new(greeter(), greeting_engine()).unwrap();
    for _ in 0..25 {
        proxy.call_method("greet", &[Value::from("Sam")]).unwrap();
    }
    assert_eq!(proxy.router().constructions(), 1);

    for _ in 0..25 {
        proxy.call_method("shout", &[Value::from("Sam")]).unwrap();
    }
    assert_eq!(proxy.router().constructions(), 2);
    assert_eq!(proxy.router().cache().len(), 2);
}

/// Fails every resolution until repaired
struct BrokenThenFixed {
    repaired: std::sync::atomic::AtomicBool,
    inner: Arc<dyn HandleResolver>,
}

impl HandleResolver for BrokenThenFixed {
    fn resolve(
        &self,
        interface: &Arc<InterfaceDescriptor>,
        method: &MethodDescriptor,
    ) -> Result<MethodHandle, ResolutionError> {
        if !self.repaired.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ResolutionError::NoBuiltinBody {
                interface: interface.name().to_string(),
                method: method.name().to_string(),
                signature: method.signature().to_string(),
            });
        }
        self.inner.resolve(interface, method)
    }
}

#[test]
fn test_failed_resolution_is_retried() {
    let resolver = Arc::new(BrokenThenFixed {
        repaired: std::sync::atomic::AtomicBool::new(false),
        inner: host_table(RuntimeCapabilities::host()),
    });
    let factory =
        ProxyFactory::with_resolver(greeter(), resolver.clone(), &ProxySettings::default());
    let proxy = factory.new_instance(greeting_engine());

    let err = proxy.call_method("shout", &[Value::from("Sam")]).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Resolution(ResolutionError::NoBuiltinBody { .. })
    ));
    assert!(factory.method_cache().is_empty());

    resolver.repaired.store(true, std::sync::atomic::Ordering::SeqCst);
    let result = proxy.call_method("shout", &[Value::from("Sam")]).unwrap();
    assert_eq!(result, Value::from("HI SAM"));
    // shout, plus the greet it calls
    assert_eq!(factory.method_cache().len(), 2);
}

#[test]
fn test_bodyless_descriptor_dispatches_declared_body() {
    let factory = ProxyFactory::with_resolver(
        greeter(),
        host_table(RuntimeCapabilities::host()),
        &ProxySettings::default(),
    );
    let first = factory.new_instance(greeting_engine());
    let second = factory.new_instance(greeting_engine());

    // Same key as the built-in shout, built without its body
    let sig = Signature::new([TypeRef::Str], TypeRef::Str);
    let bare = MethodDescriptor::abstract_method("Greeter", "shout", sig);
    let result = first.intercept(&first, &bare, &[Value::from("Sam")]).unwrap();
    assert_eq!(result, Value::from("HI SAM"));

    let cached = factory.method_cache().get(bare.key()).unwrap();
    assert!(cached.is_native_body());

    for proxy in [&first, &second] {
        let result = proxy.call_method("shout", &[Value::from("Sam")]).unwrap();
        assert_eq!(result, Value::from("HI SAM"));
    }
}

// ============================================================================
// Inheritance Tests
// ============================================================================

fn person() -> Arc<InterfaceDescriptor> {
    let named = InterfaceDescriptor::builder("Named")
        .abstract_method("name", Signature::new([], TypeRef::Str))
        .default_method("describe", Signature::new([], TypeRef::Str), |recv, _args| {
            Ok(Value::from(format!("I am {}", recv.call("name", &[])?)))
        })
        .build();
    InterfaceDescriptor::builder("Person")
        .extends(named)
        .abstract_method("age", Signature::new([], TypeRef::Int))
        .build()
}

fn person_engine() -> Arc<OperationRegistry> {
    let mut engine = OperationRegistry::new();
    engine.register("Person.name", |_args| Ok(Value::from("Ada")));
    engine.register("Person.age", |_args| Ok(Value::Int(36)));
    Arc::new(engine)
}

#[test]
fn test_inherited_methods() {
    let proxy = Proxy::new(person(), person_engine()).unwrap();
    assert_eq!(proxy.call_method("age", &[]).unwrap(), Value::Int(36));
    assert_eq!(proxy.call_method("name", &[]).unwrap(), Value::from("Ada"));
    assert_eq!(proxy.call_method("describe", &[]).unwrap(), Value::from("I am Ada"));
}

#[test]
fn test_inherited_body_through_legacy_lookup() {
    let factory = ProxyFactory::with_resolver(
        person(),
        host_table(RuntimeCapabilities::legacy()),
        &ProxySettings::default(),
    );
    let proxy = factory.new_instance(person_engine());
    assert_eq!(proxy.call_method("describe", &[]).unwrap(), Value::from("I am Ada"));
}

#[test]
fn test_inherited_statement_falls_back_to_declaring_interface() {
    let mut engine = OperationRegistry::new();
    engine.register("Named.name", |_args| Ok(Value::from("Ada")));
    engine.register("Person.age", |_args| Ok(Value::Int(36)));
    let proxy = Proxy::new(person(), Arc::new(engine)).unwrap();

    assert_eq!(proxy.call_method("name", &[]).unwrap(), Value::from("Ada"));
    assert_eq!(proxy.call_method("describe", &[]).unwrap(), Value::from("I am Ada"));

    // Neither statement registered: the proxied interface's id is reported
    let proxy = Proxy::new(person(), Arc::new(OperationRegistry::new())).unwrap();
    let err = proxy.call_method("name", &[]).unwrap_err();
    assert_eq!(
        err,
        ProxyError::Execution(ExecutionError::NoSuchOperation("Person.name".into()))
    );
}

#[test]
fn test_foreign_method_rejected() {
    let proxy = Proxy::new(person(), person_engine()).unwrap();
    let greet = method(&greeter(), "greet");
    let err = proxy.intercept(&proxy, &greet, &[Value::from("Sam")]).unwrap_err();
    assert_eq!(
        err,
        ProxyError::Invocation(InvocationError::ForeignMethod {
            interface: "Person".into(),
            method: greet.to_string(),
        })
    );
}

#[test]
fn test_overloads_pick_matching_signature() {
    let iface = InterfaceDescriptor::builder("Formatter")
        .default_method("format", Signature::new([TypeRef::Int], TypeRef::Str), |_recv, args| {
            Ok(Value::from(format!("int:{}", args[0])))
        })
        .default_method("format", Signature::new([TypeRef::Str], TypeRef::Str), |_recv, args| {
            Ok(Value::from(format!("str:{}", args[0])))
        })
        .build();
    let proxy = Proxy::new(iface, Arc::new(OperationRegistry::new())).unwrap();

    assert_eq!(proxy.call_method("format", &[Value::Int(1)]).unwrap(), Value::from("int:1"));
    assert_eq!(proxy.call_method("format", &[Value::from("a")]).unwrap(), Value::from("str:a"));
    assert_eq!(proxy.router().constructions(), 2);
}

#[test]
fn test_private_body_resolves() {
    let iface = InterfaceDescriptor::builder("Vault")
        .method(
            MethodDescriptor::default_method(
                "Vault",
                "secret",
                Signature::new([], TypeRef::Int),
                |_recv, _args| Ok(Value::Int(42)),
            )
            .with_visibility(Visibility::Private),
        )
        .build();

    for caps in [RuntimeCapabilities::host(), RuntimeCapabilities::legacy()] {
        let settings = ProxySettings::default();
        let factory = ProxyFactory::with_resolver(Arc::clone(&iface), host_table(caps), &settings);
        let proxy = factory.new_instance(Arc::new(OperationRegistry::new()));
        assert_eq!(proxy.call_method("secret", &[]).unwrap(), Value::Int(42));
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_registry_serves_registered_interfaces() {
    let registry = ProxyRegistry::new(host_table(RuntimeCapabilities::host()));
    registry.add_interface(greeter()).unwrap();
    registry.add_interface(person()).unwrap();

    assert_eq!(registry.interfaces(), vec!["Greeter", "Person"]);

    let greeter_proxy = registry.get_proxy("Greeter", greeting_engine()).unwrap();
    let person_proxy = registry.get_proxy("Person", person_engine()).unwrap();
    assert_eq!(
        greeter_proxy.call_method("shout", &[Value::from("Sam")]).unwrap(),
        Value::from("HI SAM")
    );
    assert_eq!(person_proxy.call_method("describe", &[]).unwrap(), Value::from("I am Ada"));

    // Proxies from one registry entry share resolutions
    let again = registry.get_proxy("Greeter", greeting_engine()).unwrap();
    again.call_method("shout", &[Value::from("Bo")]).unwrap();
    assert_eq!(registry.factory("Greeter").unwrap().method_cache().constructions(), 2);
}
