//! Tether SDK - contracts shared by interface proxies and their collaborators
//!
//! This crate holds the types a proxied interface is described with and the
//! collaborators a proxy talks to, without depending on the proxy itself:
//!
//! - [`Value`] / [`TypeRef`]: dynamic call arguments and their static types
//! - [`InterfaceDescriptor`] / [`MethodDescriptor`]: what an interface declares,
//!   which methods carry a built-in body
//! - [`Receiver`]: the object a built-in body is bound to
//! - [`ExecutionEngine`]: runs abstract methods
//! - error types for each failure kind
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{InterfaceDescriptor, Signature, TypeRef, Value};
//!
//! let greeter = InterfaceDescriptor::builder("Greeter")
//!     .abstract_method("greet", Signature::new([TypeRef::Str], TypeRef::Str))
//!     .default_method("shout", Signature::new([TypeRef::Str], TypeRef::Str), |recv, args| {
//!         let hello = recv.call("greet", args)?;
//!         Ok(Value::from(hello.expect_str()?.to_uppercase()))
//!     })
//!     .build();
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod interface;
pub mod value;

pub use engine::{
    statement_id, ExecutionEngine, NoopEngine, OperationCall, OperationFn, OperationRegistry,
};
pub use error::{
    CallFailure, ExecutionError, InvocationError, ProxyError, ProxyResult, ResolutionError,
};
pub use interface::{
    DefaultBody, InterfaceBuilder, InterfaceDescriptor, MethodDescriptor, MethodKey, ObjectMethod,
    Receiver, Signature, Visibility, OBJECT_TYPE,
};
pub use value::{ObjectId, TypeRef, Value};
