//! Execution engines for abstract interface methods
//!
//! Abstract methods have no body of their own. A proxy forwards each call
//! to an [`ExecutionEngine`], naming the operation by a statement id of the
//! form `Interface.method`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::interface::{InterfaceDescriptor, MethodDescriptor};
use crate::value::Value;

/// One call forwarded to an engine
#[derive(Debug, Clone, Copy)]
pub struct OperationCall<'a> {
    /// Proxied interface
    pub interface: &'a InterfaceDescriptor,
    /// Called method
    pub method: &'a MethodDescriptor,
    /// Statement id of the operation
    pub statement: &'a str,
    /// Call arguments
    pub args: &'a [Value],
}

/// Statement id for `method` called through `interface`
pub fn statement_id(interface: &InterfaceDescriptor, method: &MethodDescriptor) -> String {
    format!("{}.{}", interface.name(), method.name())
}

/// Executes mapped operations for abstract methods.
///
/// Engines are shared between proxies and threads, and are never mutated
/// by a proxy.
pub trait ExecutionEngine: Send + Sync {
    /// Run one operation
    fn execute(&self, call: &OperationCall<'_>) -> Result<Value, ExecutionError>;
}

/// An engine with no operations
pub struct NoopEngine;

impl ExecutionEngine for NoopEngine {
    fn execute(&self, call: &OperationCall<'_>) -> Result<Value, ExecutionError> {
        Err(ExecutionError::NoSuchOperation(call.statement.to_string()))
    }
}

/// An operation handler
pub type OperationFn = Arc<dyn Fn(&[Value]) -> Result<Value, ExecutionError> + Send + Sync>;

/// Engine dispatching by statement id.
///
/// Operations are registered up front (e.g. "Greeter.greet"); unknown ids
/// fail with [`ExecutionError::NoSuchOperation`].
pub struct OperationRegistry {
    handlers: HashMap<String, OperationFn>,
}

impl OperationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register an operation by statement id
    pub fn register(
        &mut self,
        statement: &str,
        handler: impl Fn(&[Value]) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    ) {
        self.handlers.insert(statement.to_string(), Arc::new(handler));
    }

    /// Get a handler by statement id
    pub fn get(&self, statement: &str) -> Option<OperationFn> {
        self.handlers.get(statement).cloned()
    }

    /// Check if an operation is registered
    pub fn contains(&self, statement: &str) -> bool {
        self.handlers.contains_key(statement)
    }

    /// Get the number of registered operations
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine for OperationRegistry {
    fn execute(&self, call: &OperationCall<'_>) -> Result<Value, ExecutionError> {
        match self.get(call.statement) {
            Some(handler) => handler(call.args),
            None => Err(ExecutionError::NoSuchOperation(call.statement.to_string())),
        }
    }
}
