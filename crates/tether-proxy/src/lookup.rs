//! Privileged lookups
//!
//! A [`Lookup`] is scoped to one interface (its target) and may hand out
//! *special* handles: handles that run the target's own built-in body for a
//! method, as if called from inside the target, bypassing overrides.
//!
//! Hosts offer lookups through one of two mechanisms:
//! - modern: a [`PrivateLookupFactory`] producing a full-access lookup into
//!   a type (`private_lookup_in`)
//! - legacy: a non-public [`LookupConstructor`] taking the type and an
//!   access mask
//!
//! [`RuntimeCapabilities`] records which of them the running host provides.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tether_sdk::{InterfaceDescriptor, MethodDescriptor, ResolutionError, Signature};

use crate::access::AccessModes;
use crate::handle::MethodHandle;

/// Which mechanism produced a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupMechanism {
    /// `private_lookup_in(type, lookup)` factory
    Modern,
    /// `Lookup::new(type, modes)` constructor
    Legacy,
}

impl LookupMechanism {
    /// Name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            LookupMechanism::Modern => "private_lookup_in(type, lookup)",
            LookupMechanism::Legacy => "Lookup::new(type, modes)",
        }
    }
}

impl fmt::Display for LookupMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which mechanism to select when probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupPreference {
    /// Modern if present, else legacy
    #[default]
    Auto,
    /// Require the modern factory
    Modern,
    /// Require the legacy constructor
    Legacy,
}

/// A privileged lookup scoped to one interface
#[derive(Clone)]
pub struct Lookup {
    target: Arc<InterfaceDescriptor>,
    modes: AccessModes,
    mechanism: LookupMechanism,
}

impl Lookup {
    /// Create a lookup into `target`.
    ///
    /// Only lookup mechanisms call this; everyone else obtains lookups
    /// through them.
    pub fn new(
        target: Arc<InterfaceDescriptor>,
        modes: AccessModes,
        mechanism: LookupMechanism,
    ) -> Self {
        Self {
            target,
            modes,
            mechanism,
        }
    }

    /// Interface the lookup is scoped to
    pub fn target(&self) -> &Arc<InterfaceDescriptor> {
        &self.target
    }

    /// Granted access modes
    pub fn modes(&self) -> AccessModes {
        self.modes
    }

    /// Producing mechanism
    pub fn mechanism(&self) -> LookupMechanism {
        self.mechanism
    }

    /// Find the built-in body of `target.name(signature)` as a special
    /// handle, called as if from `special_caller`.
    pub fn find_special(
        &self,
        name: &str,
        signature: &Signature,
        special_caller: &str,
    ) -> Result<MethodHandle, ResolutionError> {
        self.check_caller(name, signature, special_caller)?;

        let method = match self.target.declared(name, signature) {
            Some(method) => Arc::clone(method),
            None => {
                let found: Vec<String> = self
                    .target
                    .declared_named(name)
                    .map(|m| m.signature().to_string())
                    .collect();
                if found.is_empty() {
                    return Err(ResolutionError::MethodNotFound {
                        interface: self.target.name().to_string(),
                        method: name.to_string(),
                        signature: signature.to_string(),
                        mechanism: self.mechanism.to_string(),
                    });
                }
                return Err(ResolutionError::SignatureMismatch {
                    interface: self.target.name().to_string(),
                    method: name.to_string(),
                    expected: signature.to_string(),
                    found: found.join(", "),
                    mechanism: self.mechanism.to_string(),
                });
            }
        };

        self.special_handle(method)
    }

    /// Turn a method description into a special handle, called as if from
    /// `special_caller`.
    pub fn unreflect_special(
        &self,
        method: &MethodDescriptor,
        special_caller: &str,
    ) -> Result<MethodHandle, ResolutionError> {
        self.check_caller(method.name(), method.signature(), special_caller)?;

        if method.declaring() != self.target.name() {
            return Err(self.denied(
                method.name(),
                method.signature(),
                format!("method is declared by {}", method.declaring()),
            ));
        }

        let declared = self
            .target
            .declared(method.name(), method.signature())
            .ok_or_else(|| ResolutionError::MethodNotFound {
                interface: self.target.name().to_string(),
                method: method.name().to_string(),
                signature: method.signature().to_string(),
                mechanism: self.mechanism.to_string(),
            })?;

        self.special_handle(Arc::clone(declared))
    }

    fn special_handle(
        &self,
        method: Arc<MethodDescriptor>,
    ) -> Result<MethodHandle, ResolutionError> {
        if !self.modes.allows(method.visibility()) {
            return Err(self.denied(
                method.name(),
                method.signature(),
                format!(
                    "{} member not reachable with modes {}",
                    method.visibility(),
                    self.modes
                ),
            ));
        }

        let body = method
            .body()
            .cloned()
            .ok_or_else(|| ResolutionError::NoBuiltinBody {
                interface: method.declaring().to_string(),
                method: method.name().to_string(),
                signature: method.signature().to_string(),
            })?;

        Ok(MethodHandle::new(method, body, self.mechanism))
    }

    // Special handles may only be requested on behalf of the target itself
    fn check_caller(
        &self,
        name: &str,
        signature: &Signature,
        special_caller: &str,
    ) -> Result<(), ResolutionError> {
        if special_caller == self.target.name() {
            return Ok(());
        }
        Err(self.denied(
            name,
            signature,
            format!(
                "special caller {} is not the lookup class {}",
                special_caller,
                self.target.name()
            ),
        ))
    }

    fn denied(&self, name: &str, signature: &Signature, reason: String) -> ResolutionError {
        ResolutionError::AccessDenied {
            interface: self.target.name().to_string(),
            method: name.to_string(),
            signature: signature.to_string(),
            reason,
            mechanism: self.mechanism.to_string(),
        }
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("target", &self.target.name())
            .field("modes", &self.modes)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Modern mechanism: full-access lookup into a type
pub trait PrivateLookupFactory: Send + Sync {
    /// `private_lookup_in(target, caller_lookup)`
    fn private_lookup_in(
        &self,
        target: &Arc<InterfaceDescriptor>,
    ) -> Result<Lookup, ResolutionError>;
}

/// Legacy mechanism: the non-public lookup constructor
pub trait LookupConstructor: Send + Sync {
    /// `Lookup::new(target, modes)`
    fn new_lookup(
        &self,
        target: &Arc<InterfaceDescriptor>,
        modes: AccessModes,
    ) -> Result<Lookup, ResolutionError>;
}

/// The host's modern factory
#[derive(Debug, Default)]
pub struct HostLookupFactory;

impl PrivateLookupFactory for HostLookupFactory {
    fn private_lookup_in(
        &self,
        target: &Arc<InterfaceDescriptor>,
    ) -> Result<Lookup, ResolutionError> {
        Ok(Lookup::new(
            Arc::clone(target),
            AccessModes::ALLOWED_MODES,
            LookupMechanism::Modern,
        ))
    }
}

/// The host's legacy constructor
#[derive(Debug, Default)]
pub struct HostLookupConstructor;

impl LookupConstructor for HostLookupConstructor {
    fn new_lookup(
        &self,
        target: &Arc<InterfaceDescriptor>,
        modes: AccessModes,
    ) -> Result<Lookup, ResolutionError> {
        Ok(Lookup::new(Arc::clone(target), modes, LookupMechanism::Legacy))
    }
}

/// Lookup mechanisms available in the running host
#[derive(Clone, Default)]
pub struct RuntimeCapabilities {
    private_lookup_in: Option<Arc<dyn PrivateLookupFactory>>,
    lookup_constructor: Option<Arc<dyn LookupConstructor>>,
}

impl RuntimeCapabilities {
    /// No mechanism at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The current host: both mechanisms present
    pub fn host() -> Self {
        Self::empty()
            .with_private_lookup_in(Arc::new(HostLookupFactory))
            .with_lookup_constructor(Arc::new(HostLookupConstructor))
    }

    /// An older host: only the legacy constructor
    pub fn legacy() -> Self {
        Self::empty().with_lookup_constructor(Arc::new(HostLookupConstructor))
    }

    /// Provide the modern factory
    pub fn with_private_lookup_in(mut self, factory: Arc<dyn PrivateLookupFactory>) -> Self {
        self.private_lookup_in = Some(factory);
        self
    }

    /// Provide the legacy constructor
    pub fn with_lookup_constructor(mut self, constructor: Arc<dyn LookupConstructor>) -> Self {
        self.lookup_constructor = Some(constructor);
        self
    }

    /// Probe for the modern factory
    pub fn private_lookup_in(&self) -> Option<&Arc<dyn PrivateLookupFactory>> {
        self.private_lookup_in.as_ref()
    }

    /// Probe for the legacy constructor
    pub fn lookup_constructor(&self) -> Option<&Arc<dyn LookupConstructor>> {
        self.lookup_constructor.as_ref()
    }
}

impl fmt::Debug for RuntimeCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCapabilities")
            .field("private_lookup_in", &self.private_lookup_in.is_some())
            .field("lookup_constructor", &self.lookup_constructor.is_some())
            .finish()
    }
}
