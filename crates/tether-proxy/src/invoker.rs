//! Invoker strategies
//!
//! Every intercepted interface method resolves to exactly one [`Invoker`]:
//! abstract methods delegate to the execution engine, built-in bodies run
//! through a pre-resolved [`MethodHandle`].

use std::sync::Arc;

use tether_sdk::{
    statement_id, CallFailure, ExecutionEngine, ExecutionError, InterfaceDescriptor,
    MethodDescriptor, OperationCall, Receiver, Value,
};

use crate::handle::MethodHandle;

/// Shared, immutable state of one proxy
#[derive(Clone)]
pub struct ProxyContext {
    interface: Arc<InterfaceDescriptor>,
    engine: Arc<dyn ExecutionEngine>,
}

impl ProxyContext {
    /// Create a context
    pub fn new(interface: Arc<InterfaceDescriptor>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { interface, engine }
    }

    /// Proxied interface
    pub fn interface(&self) -> &Arc<InterfaceDescriptor> {
        &self.interface
    }

    /// Engine running abstract methods
    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }
}

impl std::fmt::Debug for ProxyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyContext")
            .field("interface", &self.interface.name())
            .finish_non_exhaustive()
    }
}

/// The mapped operation an abstract method delegates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTarget {
    statement: String,
    fallback: Option<String>,
}

impl OperationTarget {
    /// Target for `method` called through `interface`
    pub fn new(interface: &InterfaceDescriptor, method: &MethodDescriptor) -> Self {
        let fallback = (method.declaring() != interface.name())
            .then(|| format!("{}.{}", method.declaring(), method.name()));
        Self {
            statement: statement_id(interface, method),
            fallback,
        }
    }

    /// Statement id
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Statement id under the declaring interface, for inherited methods
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }
}

/// Resolved call strategy for one method
#[derive(Debug)]
pub enum Invoker {
    /// Forward to the execution engine
    Delegating(OperationTarget),
    /// Run the method's own built-in body
    NativeBody(MethodHandle),
}

impl Invoker {
    /// Whether this runs a built-in body
    pub fn is_native_body(&self) -> bool {
        matches!(self, Invoker::NativeBody(_))
    }

    /// Execute the call.
    ///
    /// Failures come back wrapped in one [`CallFailure`] layer.
    pub fn invoke(
        &self,
        receiver: &dyn Receiver,
        method: &MethodDescriptor,
        args: &[Value],
        context: &ProxyContext,
    ) -> Result<Value, CallFailure> {
        match self {
            Invoker::Delegating(target) => {
                let call = OperationCall {
                    interface: &context.interface,
                    method,
                    statement: target.statement(),
                    args,
                };
                let primary = match context.engine.execute(&call) {
                    Err(err @ ExecutionError::NoSuchOperation(_)) => err,
                    done => return Ok(done?),
                };
                // An inherited method may be mapped under its declaring interface only.
                // When neither id is mapped, the proxied interface's id is reported.
                let Some(fallback) = target.fallback() else {
                    return Err(primary.into());
                };
                match context.engine.execute(&OperationCall { statement: fallback, ..call }) {
                    Err(ExecutionError::NoSuchOperation(_)) => Err(primary.into()),
                    done => Ok(done?),
                }
            }
            Invoker::NativeBody(handle) => handle.bind_to(receiver).invoke_with_arguments(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupMechanism;
    use parking_lot::Mutex;
    use tether_sdk::{ObjectId, OperationRegistry, ProxyError, ProxyResult, Signature, TypeRef};

    struct Fixed(ObjectId);

    impl Receiver for Fixed {
        fn object_id(&self) -> ObjectId {
            self.0
        }

        fn call(&self, name: &str, _args: &[Value]) -> ProxyResult<Value> {
            Ok(Value::from(name))
        }
    }

    /// Records every statement it is asked to run
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl ExecutionEngine for Recording {
        fn execute(&self, call: &OperationCall<'_>) -> Result<Value, ExecutionError> {
            self.seen.lock().push(call.statement.to_string());
            Ok(Value::Int(call.args.len() as i64))
        }
    }

    fn counter() -> Arc<InterfaceDescriptor> {
        InterfaceDescriptor::builder("Counter")
            .abstract_method("count", Signature::new([TypeRef::Any], TypeRef::Int))
            .default_method("label", Signature::new([], TypeRef::Str), |recv, _args| {
                recv.call("count", &[])
            })
            .build()
    }

    #[test]
    fn test_delegating_forwards_every_call() {
        let iface = counter();
        let engine = Arc::new(Recording::default());
        let context = ProxyContext::new(Arc::clone(&iface), engine.clone());
        let count = &iface.methods()[0];
        let invoker = Invoker::Delegating(OperationTarget::new(&iface, count));

        let receiver = Fixed(ObjectId::new());
        for _ in 0..3 {
            let out = invoker
                .invoke(&receiver, count, &[Value::Null], &context)
                .unwrap();
            assert_eq!(out, Value::Int(1));
        }
        assert_eq!(engine.seen.lock().len(), 3);
        assert_eq!(engine.seen.lock()[0], "Counter.count");
        assert!(!invoker.is_native_body());
    }

    #[test]
    fn test_delegating_engine_failure_is_target() {
        let iface = counter();
        let context = ProxyContext::new(Arc::clone(&iface), Arc::new(OperationRegistry::new()));
        let count = &iface.methods()[0];
        let invoker = Invoker::Delegating(OperationTarget::new(&iface, count));

        let err = invoker
            .invoke(&Fixed(ObjectId::new()), count, &[Value::Null], &context)
            .unwrap_err();
        assert_eq!(
            err,
            CallFailure::Target(ProxyError::Execution(ExecutionError::NoSuchOperation(
                "Counter.count".into()
            )))
        );
    }

    #[test]
    fn test_inherited_target_falls_back() {
        let base = counter();
        let derived = InterfaceDescriptor::builder("Tally")
            .extends(Arc::clone(&base))
            .build();
        let count = &base.methods()[0];
        let target = OperationTarget::new(&derived, count);
        assert_eq!(target.statement(), "Tally.count");
        assert_eq!(target.fallback(), Some("Counter.count"));
        assert_eq!(OperationTarget::new(&base, count).fallback(), None);

        let mut registry = OperationRegistry::new();
        registry.register("Counter.count", |_args| Ok(Value::Int(9)));
        let context = ProxyContext::new(Arc::clone(&derived), Arc::new(registry));
        let invoker = Invoker::Delegating(target);
        let receiver = Fixed(ObjectId::new());
        let out = invoker.invoke(&receiver, count, &[Value::Null], &context).unwrap();
        assert_eq!(out, Value::Int(9));

        // Unmapped under both ids: the primary id is the one reported
        let empty = ProxyContext::new(derived, Arc::new(OperationRegistry::new()));
        let err = invoker.invoke(&receiver, count, &[Value::Null], &empty).unwrap_err();
        assert_eq!(
            err,
            CallFailure::Target(ProxyError::Execution(ExecutionError::NoSuchOperation(
                "Tally.count".into()
            )))
        );
    }

    #[test]
    fn test_native_body_binds_receiver() {
        let iface = counter();
        let context = ProxyContext::new(Arc::clone(&iface), Arc::new(OperationRegistry::new()));
        let label = Arc::clone(&iface.methods()[1]);
        let body = label.body().cloned().unwrap();
        let invoker = Invoker::NativeBody(MethodHandle::new(
            Arc::clone(&label),
            body,
            LookupMechanism::Modern,
        ));

        // The body calls back into whatever receiver it is bound to
        let out = invoker
            .invoke(&Fixed(ObjectId::new()), &label, &[], &context)
            .unwrap();
        assert_eq!(out, Value::from("count"));
        assert!(invoker.is_native_body());
    }
}
