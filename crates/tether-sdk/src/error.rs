//! Error types for proxied calls
//!
//! Three failure kinds reach a caller of a proxied interface:
//! - [`ResolutionError`]: a built-in body could not be turned into a handle
//! - [`ExecutionError`]: the execution engine failed to run an operation
//! - [`InvocationError`]: a bound call was malformed (arity, argument types)
//!
//! [`CallFailure`] is the single layer a call mechanism wraps around the
//! callee's own failure. The dispatch entry point strips it before the
//! error reaches the caller.

use crate::value::TypeRef;

/// Result type for proxied calls
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failure to produce a handle for a built-in method body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// Neither lookup mechanism exists in the running host
    #[error("There is neither '{modern}' nor '{legacy}' available to build privileged lookups")]
    NoLookupMechanism {
        /// Name of the modern factory that was probed
        modern: String,
        /// Name of the legacy constructor that was probed
        legacy: String,
    },

    /// A specific mechanism was requested but the host does not provide it
    #[error("Lookup mechanism '{mechanism}' was requested but is not available")]
    MechanismUnavailable {
        /// Requested mechanism
        mechanism: String,
    },

    /// The process-wide table was already initialized with another mechanism
    #[error("Privileged handle table already uses '{active}', cannot switch to '{requested}'")]
    MechanismConflict {
        /// Mechanism in use
        active: String,
        /// Mechanism requested afterwards
        requested: String,
    },

    /// The declaring type has no method with this name
    #[error("No method {interface}.{method}{signature} (via {mechanism})")]
    MethodNotFound {
        /// Declaring interface
        interface: String,
        /// Method name
        method: String,
        /// Requested signature
        signature: String,
        /// Mechanism that attempted the lookup
        mechanism: String,
    },

    /// Methods with this name exist but none has the requested signature
    #[error("No {interface}.{method} with signature {expected}; found {found} (via {mechanism})")]
    SignatureMismatch {
        /// Declaring interface
        interface: String,
        /// Method name
        method: String,
        /// Requested signature
        expected: String,
        /// Signatures actually declared under this name
        found: String,
        /// Mechanism that attempted the lookup
        mechanism: String,
    },

    /// The lookup is not allowed to reach the method
    #[error("Access to {interface}.{method}{signature} denied: {reason} (via {mechanism})")]
    AccessDenied {
        /// Declaring interface
        interface: String,
        /// Method name
        method: String,
        /// Method signature
        signature: String,
        /// Why access was refused
        reason: String,
        /// Mechanism that attempted the lookup
        mechanism: String,
    },

    /// The method is abstract, there is no body to call
    #[error("{interface}.{method}{signature} has no built-in body")]
    NoBuiltinBody {
        /// Declaring interface
        interface: String,
        /// Method name
        method: String,
        /// Method signature
        signature: String,
    },
}

/// Failure raised by an execution engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// No operation is mapped to this statement id
    #[error("No such operation: {0}")]
    NoSuchOperation(String),

    /// The operation ran and failed
    #[error("Operation {statement} failed: {message}")]
    Failed {
        /// Statement id
        statement: String,
        /// Engine-provided message
        message: String,
    },
}

/// Failure of a bound call itself, independent of what the callee does
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    /// Wrong number of arguments
    #[error("{method} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Method display name
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// An argument does not fit its parameter type
    #[error("Argument {index} of {method}: expected {expected}, got {got}")]
    ArgumentType {
        /// Method display name
        method: String,
        /// Zero-based argument position
        index: usize,
        /// Parameter type
        expected: TypeRef,
        /// Argument type
        got: TypeRef,
    },

    /// A body returned a value that does not fit the declared return type
    #[error("{method} returned {got}, declared {expected}")]
    ReturnType {
        /// Method display name
        method: String,
        /// Declared return type
        expected: TypeRef,
        /// Returned value type
        got: TypeRef,
    },

    /// Value conversion failed
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type
        expected: TypeRef,
        /// Actual type
        got: TypeRef,
    },

    /// The method does not belong to the proxied interface
    #[error("Method {method} is not declared by interface {interface}")]
    ForeignMethod {
        /// Proxied interface
        interface: String,
        /// Method display name
        method: String,
    },

    /// No method with this name accepts the given arguments
    #[error("No method '{name}' on interface {interface} accepts the given arguments")]
    NoSuchMethod {
        /// Proxied interface
        interface: String,
        /// Requested name
        name: String,
    },

    /// Raised by a built-in body
    #[error("{0}")]
    Raised(String),
}

/// Any failure observable by a caller of a proxied interface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// Handle resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Engine failed
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Bound call failed
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Failure surfaced by a generic call mechanism (bound handle, engine dispatch)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallFailure {
    /// The callee ran and failed; the wrapped error is what the caller should see
    #[error("call target failed: {0}")]
    Target(ProxyError),

    /// The mechanism rejected the call before reaching the callee
    #[error(transparent)]
    Mechanism(#[from] InvocationError),
}

impl CallFailure {
    /// Strip exactly one layer of call-mechanism wrapping
    pub fn unwrap_failure(self) -> ProxyError {
        match self {
            CallFailure::Target(err) => err,
            CallFailure::Mechanism(err) => ProxyError::Invocation(err),
        }
    }
}

impl From<ExecutionError> for CallFailure {
    fn from(err: ExecutionError) -> Self {
        CallFailure::Target(ProxyError::Execution(err))
    }
}
