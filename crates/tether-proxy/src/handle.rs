//! Method handles for built-in bodies
//!
//! A [`MethodHandle`] is produced once per method by a privileged lookup and
//! always runs the body of the method it was resolved for, never an
//! override. Handles are unbound; [`MethodHandle::bind_to`] ties one to a
//! receiver for a single call.

use std::fmt;
use std::sync::Arc;

use tether_sdk::{CallFailure, DefaultBody, InvocationError, MethodDescriptor, Receiver, Value};

use crate::lookup::LookupMechanism;

/// Unbound handle to a method's own built-in body
#[derive(Clone)]
pub struct MethodHandle {
    method: Arc<MethodDescriptor>,
    body: DefaultBody,
    mechanism: LookupMechanism,
    check_types: bool,
}

impl MethodHandle {
    pub(crate) fn new(
        method: Arc<MethodDescriptor>,
        body: DefaultBody,
        mechanism: LookupMechanism,
    ) -> Self {
        Self {
            method,
            body,
            mechanism,
            check_types: true,
        }
    }

    /// Enable or disable argument/return type checks on bound calls
    pub fn type_checked(mut self, check: bool) -> Self {
        self.check_types = check;
        self
    }

    /// The method this handle runs
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// Mechanism whose lookup produced the handle
    pub fn mechanism(&self) -> LookupMechanism {
        self.mechanism
    }

    /// Whether bound calls check types
    pub fn is_type_checked(&self) -> bool {
        self.check_types
    }

    /// Bind to a receiver
    pub fn bind_to<'h, 'r>(&'h self, receiver: &'r dyn Receiver) -> BoundHandle<'h, 'r> {
        BoundHandle {
            handle: self,
            receiver,
        }
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("method", &self.method.to_string())
            .field("mechanism", &self.mechanism)
            .field("check_types", &self.check_types)
            .finish()
    }
}

/// A handle bound to a receiver
pub struct BoundHandle<'h, 'r> {
    handle: &'h MethodHandle,
    receiver: &'r dyn Receiver,
}

impl BoundHandle<'_, '_> {
    /// Run the body with the bound receiver.
    ///
    /// Arity and type mismatches fail as [`CallFailure::Mechanism`]; whatever
    /// the body itself returns as an error comes back as [`CallFailure::Target`].
    pub fn invoke_with_arguments(&self, args: &[Value]) -> Result<Value, CallFailure> {
        let method = &self.handle.method;
        let signature = method.signature();

        method.check_arguments(args, self.handle.check_types)?;

        let result = (self.handle.body)(self.receiver, args).map_err(CallFailure::Target)?;

        if self.handle.check_types && !signature.ret.accepts(&result) {
            return Err(InvocationError::ReturnType {
                method: method.to_string(),
                expected: signature.ret,
                got: result.type_ref(),
            }
            .into());
        }
        Ok(result)
    }
}
