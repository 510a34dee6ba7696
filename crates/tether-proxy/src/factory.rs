//! Proxy factories and the interface registry
//!
//! A [`ProxyFactory`] binds one interface to one method cache; every proxy it
//! mints shares that cache, so each method resolves once per factory no
//! matter how many proxies or engines are involved.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tether_sdk::{ExecutionEngine, InterfaceDescriptor, ResolutionError};
use thiserror::Error;
use tracing::debug;

use crate::config::{ProxyConfig, ProxySettings};
use crate::handle_table::{HandleResolver, PrivilegedHandleTable};
use crate::invoker::ProxyContext;
use crate::proxy::Proxy;
use crate::router::{MethodCache, MethodRouter};

/// Errors raised by [`ProxyRegistry`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Interface registered twice
    #[error("Interface {0} is already registered")]
    DuplicateInterface(String),

    /// No such interface
    #[error("Interface {0} is not registered")]
    UnknownInterface(String),

    /// Handle table could not be created
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Mints proxies for one interface
pub struct ProxyFactory {
    interface: Arc<InterfaceDescriptor>,
    cache: Arc<MethodCache>,
    resolver: Arc<dyn HandleResolver>,
    check_argument_types: bool,
}

impl ProxyFactory {
    /// Factory using the process-wide handle table and default settings
    pub fn new(interface: Arc<InterfaceDescriptor>) -> Result<Self, ResolutionError> {
        let table = PrivilegedHandleTable::global()?;
        Ok(Self::with_resolver(interface, table, &ProxySettings::default()))
    }

    /// Factory configured from `config`; initializes the process-wide
    /// handle table with the configured lookup preference
    pub fn with_config(
        interface: Arc<InterfaceDescriptor>,
        config: &ProxyConfig,
    ) -> Result<Self, ResolutionError> {
        let table = config.handle_table()?;
        Ok(Self::with_resolver(interface, table, &config.proxy))
    }

    /// Factory resolving built-in bodies through `resolver`
    pub fn with_resolver(
        interface: Arc<InterfaceDescriptor>,
        resolver: Arc<dyn HandleResolver>,
        settings: &ProxySettings,
    ) -> Self {
        Self {
            interface,
            cache: Arc::new(MethodCache::with_capacity(settings.initial_cache_capacity)),
            resolver,
            check_argument_types: settings.check_argument_types,
        }
    }

    /// Proxied interface
    pub fn interface(&self) -> &Arc<InterfaceDescriptor> {
        &self.interface
    }

    /// Cache shared by every proxy from this factory
    pub fn method_cache(&self) -> &Arc<MethodCache> {
        &self.cache
    }

    /// Mint a proxy delegating abstract methods to `engine`
    pub fn new_instance(&self, engine: Arc<dyn ExecutionEngine>) -> Proxy {
        let router = MethodRouter::new(
            Arc::clone(&self.interface),
            Arc::clone(&self.cache),
            Arc::clone(&self.resolver),
        )
        .check_argument_types(self.check_argument_types);
        Proxy::with_router(ProxyContext::new(Arc::clone(&self.interface), engine), router)
    }
}

impl std::fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("interface", &self.interface.name())
            .field("cache", &self.cache)
            .field("check_argument_types", &self.check_argument_types)
            .finish()
    }
}

/// Registry of proxyable interfaces by name
pub struct ProxyRegistry {
    /// Interface name → factory
    factories: RwLock<FxHashMap<String, Arc<ProxyFactory>>>,
    resolver: Arc<dyn HandleResolver>,
    settings: ProxySettings,
}

impl ProxyRegistry {
    /// Create an empty registry resolving through `resolver`
    pub fn new(resolver: Arc<dyn HandleResolver>) -> Self {
        Self::with_settings(resolver, ProxySettings::default())
    }

    fn with_settings(resolver: Arc<dyn HandleResolver>, settings: ProxySettings) -> Self {
        Self {
            factories: RwLock::new(FxHashMap::default()),
            resolver,
            settings,
        }
    }

    /// Create an empty registry from configuration
    pub fn from_config(config: &ProxyConfig) -> Result<Self, RegistryError> {
        let table = config.handle_table()?;
        Ok(Self::with_settings(table, config.proxy.clone()))
    }

    /// Register an interface
    pub fn add_interface(
        &self,
        interface: Arc<InterfaceDescriptor>,
    ) -> Result<Arc<ProxyFactory>, RegistryError> {
        let mut factories = self.factories.write();
        let name = interface.name().to_string();
        if factories.contains_key(&name) {
            return Err(RegistryError::DuplicateInterface(name));
        }

        let factory = Arc::new(ProxyFactory::with_resolver(
            interface,
            Arc::clone(&self.resolver),
            &self.settings,
        ));
        debug!(interface = %name, "interface registered");
        factories.insert(name, Arc::clone(&factory));
        Ok(factory)
    }

    /// Check if an interface is registered
    pub fn has_interface(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Get the factory for an interface
    pub fn factory(&self, name: &str) -> Option<Arc<ProxyFactory>> {
        self.factories.read().get(name).cloned()
    }

    /// Mint a proxy for a registered interface
    pub fn get_proxy(
        &self,
        name: &str,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Result<Proxy, RegistryError> {
        let factory = self
            .factory(name)
            .ok_or_else(|| RegistryError::UnknownInterface(name.to_string()))?;
        Ok(factory.new_instance(engine))
    }

    /// Registered interface names, sorted
    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}
