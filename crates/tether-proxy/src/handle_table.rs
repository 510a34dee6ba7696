//! Process-wide privileged handle table
//!
//! The table picks one lookup mechanism when it is created and keeps it for
//! the rest of the process. Probing order: the modern factory if present,
//! else the legacy constructor; with neither, creation fails and names both.
//!
//! The global table is created on first use (or explicitly through
//! [`PrivilegedHandleTable::install`]) and is read-only afterwards.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tether_sdk::{InterfaceDescriptor, MethodDescriptor, ResolutionError};
use tracing::debug;

use crate::access::AccessModes;
use crate::handle::MethodHandle;
use crate::lookup::{
    LookupConstructor, LookupMechanism, LookupPreference, PrivateLookupFactory,
    RuntimeCapabilities,
};

/// Resolves built-in bodies into unbound handles
pub trait HandleResolver: Send + Sync {
    /// Produce a handle for `method`'s own body.
    ///
    /// `interface` is the proxied interface; the method may be declared by
    /// it or by one of its ancestors.
    fn resolve(
        &self,
        interface: &Arc<InterfaceDescriptor>,
        method: &MethodDescriptor,
    ) -> Result<MethodHandle, ResolutionError>;
}

enum Mechanism {
    Modern(Arc<dyn PrivateLookupFactory>),
    Legacy(Arc<dyn LookupConstructor>),
}

/// Lookup mechanism chosen once for the process
pub struct PrivilegedHandleTable {
    mechanism: Mechanism,
}

static HANDLE_TABLE: OnceCell<Arc<PrivilegedHandleTable>> = OnceCell::new();

impl PrivilegedHandleTable {
    /// Probe `caps` and select a mechanism
    pub fn probe(
        caps: &RuntimeCapabilities,
        preference: LookupPreference,
    ) -> Result<Self, ResolutionError> {
        let mechanism = match preference {
            LookupPreference::Auto => match (caps.private_lookup_in(), caps.lookup_constructor()) {
                (Some(factory), _) => Mechanism::Modern(Arc::clone(factory)),
                (None, Some(constructor)) => Mechanism::Legacy(Arc::clone(constructor)),
                (None, None) => {
                    return Err(ResolutionError::NoLookupMechanism {
                        modern: LookupMechanism::Modern.name().to_string(),
                        legacy: LookupMechanism::Legacy.name().to_string(),
                    })
                }
            },
            LookupPreference::Modern => caps
                .private_lookup_in()
                .map(|factory| Mechanism::Modern(Arc::clone(factory)))
                .ok_or_else(|| unavailable(LookupMechanism::Modern))?,
            LookupPreference::Legacy => caps
                .lookup_constructor()
                .map(|constructor| Mechanism::Legacy(Arc::clone(constructor)))
                .ok_or_else(|| unavailable(LookupMechanism::Legacy))?,
        };

        let table = Self { mechanism };
        debug!(mechanism = %table.mechanism(), ?preference, "privileged handle table ready");
        Ok(table)
    }

    /// The process-wide table, probing the current host on first use
    pub fn global() -> Result<Arc<Self>, ResolutionError> {
        HANDLE_TABLE
            .get_or_try_init(|| {
                Self::probe(&RuntimeCapabilities::host(), LookupPreference::Auto).map(Arc::new)
            })
            .cloned()
    }

    /// Initialize the process-wide table from `caps`.
    ///
    /// If the table already exists it is returned as is, unless a specific
    /// mechanism is requested that differs from the one in use.
    pub fn install(
        caps: &RuntimeCapabilities,
        preference: LookupPreference,
    ) -> Result<Arc<Self>, ResolutionError> {
        let table = HANDLE_TABLE
            .get_or_try_init(|| Self::probe(caps, preference).map(Arc::new))?
            .clone();

        let requested = match preference {
            LookupPreference::Auto => return Ok(table),
            LookupPreference::Modern => LookupMechanism::Modern,
            LookupPreference::Legacy => LookupMechanism::Legacy,
        };
        if table.mechanism() != requested {
            return Err(ResolutionError::MechanismConflict {
                active: table.mechanism().to_string(),
                requested: requested.to_string(),
            });
        }
        Ok(table)
    }

    /// The selected mechanism
    pub fn mechanism(&self) -> LookupMechanism {
        match self.mechanism {
            Mechanism::Modern(_) => LookupMechanism::Modern,
            Mechanism::Legacy(_) => LookupMechanism::Legacy,
        }
    }
}

impl std::fmt::Debug for PrivilegedHandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedHandleTable")
            .field("mechanism", &self.mechanism())
            .finish()
    }
}

impl HandleResolver for PrivilegedHandleTable {
    fn resolve(
        &self,
        interface: &Arc<InterfaceDescriptor>,
        method: &MethodDescriptor,
    ) -> Result<MethodHandle, ResolutionError> {
        let declaring = interface.ancestor(method.declaring()).ok_or_else(|| {
            ResolutionError::MethodNotFound {
                interface: method.declaring().to_string(),
                method: method.name().to_string(),
                signature: method.signature().to_string(),
                mechanism: self.mechanism().to_string(),
            }
        })?;

        match &self.mechanism {
            Mechanism::Modern(factory) => {
                let lookup = factory.private_lookup_in(&declaring)?;
                lookup.find_special(method.name(), method.signature(), declaring.name())
            }
            Mechanism::Legacy(constructor) => {
                let lookup = constructor.new_lookup(&declaring, AccessModes::ALLOWED_MODES)?;
                lookup.unreflect_special(method, declaring.name())
            }
        }
    }
}

fn unavailable(mechanism: LookupMechanism) -> ResolutionError {
    ResolutionError::MechanismUnavailable {
        mechanism: mechanism.to_string(),
    }
}
