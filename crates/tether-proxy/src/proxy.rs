//! Interface proxy
//!
//! A [`Proxy`] stands in for an object implementing an interface. Every call
//! goes through [`Proxy::intercept`]:
//! - base-object methods are answered from the proxy's own identity
//! - everything else is matched to the interface's own descriptor, checked
//!   against its signature and routed to a cached [`Invoker`](crate::Invoker)
//! - mechanism failures are unwrapped once before reaching the caller

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tether_sdk::{
    CallFailure, ExecutionEngine, InterfaceDescriptor, InvocationError, MethodDescriptor,
    ObjectId, ObjectMethod, ProxyResult, Receiver, Value, OBJECT_TYPE,
};
use tracing::trace;

use crate::handle_table::{HandleResolver, PrivilegedHandleTable};
use crate::invoker::ProxyContext;
use crate::router::{MethodCache, MethodRouter};

/// Dynamic implementation of one interface
pub struct Proxy {
    id: ObjectId,
    context: ProxyContext,
    router: MethodRouter,
}

impl Proxy {
    /// Create a proxy with its own method cache, resolving built-in bodies
    /// through the process-wide handle table
    pub fn new(
        interface: Arc<InterfaceDescriptor>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> ProxyResult<Self> {
        let table: Arc<dyn HandleResolver> = PrivilegedHandleTable::global()?;
        let router = MethodRouter::new(Arc::clone(&interface), Arc::new(MethodCache::new()), table);
        Ok(Self::with_router(ProxyContext::new(interface, engine), router))
    }

    pub(crate) fn with_router(context: ProxyContext, router: MethodRouter) -> Self {
        Self {
            id: ObjectId::new(),
            context,
            router,
        }
    }

    /// Proxy identity
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Proxied interface
    pub fn interface(&self) -> &Arc<InterfaceDescriptor> {
        self.context.interface()
    }

    /// Immutable per-proxy state
    pub fn context(&self) -> &ProxyContext {
        &self.context
    }

    /// Method router
    pub fn router(&self) -> &MethodRouter {
        &self.router
    }

    /// The proxy as an object reference
    pub fn as_value(&self) -> Value {
        Value::Object(self.id)
    }

    /// Dispatch `method` with `receiver` as the object built-in bodies bind to.
    ///
    /// `receiver` is normally the proxy itself; a wrapper overriding some
    /// methods may pass itself instead.
    pub fn intercept(
        &self,
        receiver: &dyn Receiver,
        method: &MethodDescriptor,
        args: &[Value],
    ) -> ProxyResult<Value> {
        if let Some(object_method) = ObjectMethod::of(method) {
            return self.object_method(object_method, args);
        }

        let method = self.interface().canonical(method.key()).ok_or_else(|| {
            InvocationError::ForeignMethod {
                interface: self.interface().name().to_string(),
                method: method.to_string(),
            }
        })?;
        method.check_arguments(args, self.router.checks_argument_types())?;

        let invoker = self.router.resolve(&method)?;
        trace!(method = %method, native = invoker.is_native_body(), "dispatch");
        invoker
            .invoke(receiver, &method, args, &self.context)
            .map_err(CallFailure::unwrap_failure)
    }

    /// Call a method by name, picking the overload that accepts `args`
    pub fn call_method(&self, name: &str, args: &[Value]) -> ProxyResult<Value> {
        if let Some(method) = self.interface().find(name, args) {
            return self.intercept(self, &method, args);
        }
        match ObjectMethod::from_name(name) {
            Some(object_method) => self.object_method(object_method, args),
            None => Err(InvocationError::NoSuchMethod {
                interface: self.interface().name().to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn object_method(&self, method: ObjectMethod, args: &[Value]) -> ProxyResult<Value> {
        let arity = method.signature().arity();
        if args.len() != arity {
            return Err(InvocationError::ArityMismatch {
                method: format!("{}.{}", OBJECT_TYPE, method.name()),
                expected: arity,
                got: args.len(),
            }
            .into());
        }

        Ok(match method {
            ObjectMethod::Equals => Value::Bool(args[0] == self.as_value()),
            ObjectMethod::HashCode => Value::Int(self.id.as_u64() as i64),
            ObjectMethod::ToString => Value::Str(self.to_string()),
        })
    }
}

impl Receiver for Proxy {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn call(&self, name: &str, args: &[Value]) -> ProxyResult<Value> {
        self.call_method(name, args)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy<{}>@{}", self.interface().name(), self.id)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id)
            .field("interface", &self.interface().name())
            .field("router", &self.router)
            .finish()
    }
}
