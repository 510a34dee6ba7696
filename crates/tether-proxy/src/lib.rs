//! Tether Proxy - dynamic dispatch for described interfaces
//!
//! A [`Proxy`] implements an interface described by a
//! [`tether_sdk::InterfaceDescriptor`] without any hand-written
//! implementation:
//!
//! - abstract methods are forwarded to an [`tether_sdk::ExecutionEngine`]
//! - methods with a built-in body run that body, bound to the receiver, through
//!   a [`MethodHandle`] obtained from a privileged lookup
//! - `equals`, `hash_code` and `to_string` are answered by the proxy itself
//!
//! The strategy for each method is resolved once and cached in a
//! [`MethodCache`] shared by every proxy a [`ProxyFactory`] mints.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_proxy::ProxyFactory;
//! use tether_sdk::{InterfaceDescriptor, OperationRegistry, Signature, TypeRef, Value};
//!
//! let greeter = InterfaceDescriptor::builder("Greeter")
//!     .abstract_method("greet", Signature::new([TypeRef::Str], TypeRef::Str))
//!     .build();
//!
//! let mut engine = OperationRegistry::new();
//! engine.register("Greeter.greet", |args| Ok(Value::from(format!("hi {}", args[0]))));
//!
//! let proxy = ProxyFactory::new(greeter)?.new_instance(Arc::new(engine));
//! assert_eq!(proxy.call_method("greet", &[Value::from("Sam")])?, Value::from("hi Sam"));
//! ```

#![warn(missing_docs)]

pub mod access;
pub mod config;
pub mod factory;
pub mod handle;
pub mod handle_table;
pub mod invoker;
pub mod lookup;
pub mod proxy;
pub mod router;

pub use access::AccessModes;
pub use config::{ConfigError, ProxyConfig, ProxySettings};
pub use factory::{ProxyFactory, ProxyRegistry, RegistryError};
pub use handle::{BoundHandle, MethodHandle};
pub use handle_table::{HandleResolver, PrivilegedHandleTable};
pub use invoker::{Invoker, OperationTarget, ProxyContext};
pub use lookup::{
    HostLookupConstructor, HostLookupFactory, Lookup, LookupConstructor, LookupMechanism,
    LookupPreference, PrivateLookupFactory, RuntimeCapabilities,
};
pub use proxy::Proxy;
pub use router::{MethodCache, MethodRouter};
