//! Method cache and router
//!
//! The router maps each intercepted method to its [`Invoker`], building it
//! on first use. Resolution is compute-once per method key:
//! - the map shard is locked only long enough to create the key's slot
//! - the strategy is built inside the slot's `OnceCell`, so concurrent
//!   callers for the same key wait for a single construction while other
//!   keys proceed in parallel
//! - a failed construction leaves the slot empty; the next caller retries

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tether_sdk::{InterfaceDescriptor, MethodDescriptor, MethodKey, ResolutionError};
use tracing::{debug, trace, warn};

use crate::handle_table::HandleResolver;
use crate::invoker::{Invoker, OperationTarget};

type Slot = Arc<OnceCell<Arc<Invoker>>>;

/// Resolved invokers keyed by method identity
pub struct MethodCache {
    slots: DashMap<MethodKey, Slot>,
    constructions: AtomicU64,
}

impl MethodCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a cache sized for `capacity` methods
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(capacity),
            constructions: AtomicU64::new(0),
        }
    }

    /// Cached invoker for `key`, if resolved
    pub fn get(&self, key: &MethodKey) -> Option<Arc<Invoker>> {
        self.slots
            .get(key)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Get the invoker for `key`, building it with `init` if absent.
    ///
    /// `init` runs at most once per successful resolution of a key.
    pub fn get_or_try_init<F>(
        &self,
        key: &MethodKey,
        init: F,
    ) -> Result<Arc<Invoker>, ResolutionError>
    where
        F: FnOnce() -> Result<Invoker, ResolutionError>,
    {
        if let Some(invoker) = self.get(key) {
            trace!(method = %key, "method cache hit");
            return Ok(invoker);
        }

        // Shard guard is released at the end of this statement
        let slot: Slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        slot.get_or_try_init(|| {
            let invoker = init()?;
            self.constructions.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(invoker))
        })
        .cloned()
    }

    /// Whether `key` has a resolved invoker
    pub fn contains(&self, key: &MethodKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of resolved methods
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    /// Check if no method is resolved
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of invokers ever built
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Drop every cached invoker
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl Default for MethodCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MethodCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodCache")
            .field("resolved", &self.len())
            .field("constructions", &self.constructions())
            .finish()
    }
}

/// Routes methods of one interface to their invokers
pub struct MethodRouter {
    interface: Arc<InterfaceDescriptor>,
    cache: Arc<MethodCache>,
    resolver: Arc<dyn HandleResolver>,
    check_argument_types: bool,
}

impl MethodRouter {
    /// Create a router over `cache`
    pub fn new(
        interface: Arc<InterfaceDescriptor>,
        cache: Arc<MethodCache>,
        resolver: Arc<dyn HandleResolver>,
    ) -> Self {
        Self {
            interface,
            cache,
            resolver,
            check_argument_types: true,
        }
    }

    /// Enable or disable type checks on built-in body calls
    pub fn check_argument_types(mut self, check: bool) -> Self {
        self.check_argument_types = check;
        self
    }

    /// Whether calls are checked against parameter and return types
    pub fn checks_argument_types(&self) -> bool {
        self.check_argument_types
    }

    /// The shared cache
    pub fn cache(&self) -> &Arc<MethodCache> {
        &self.cache
    }

    /// Number of invokers built through the shared cache
    pub fn constructions(&self) -> u64 {
        self.cache.constructions()
    }

    /// Resolve the invoker for `method`
    pub fn resolve(&self, method: &MethodDescriptor) -> Result<Arc<Invoker>, ResolutionError> {
        self.cache
            .get_or_try_init(method.key(), || self.build(method))
            .inspect_err(|err| warn!(method = %method, error = %err, "method resolution failed"))
    }

    fn build(&self, method: &MethodDescriptor) -> Result<Invoker, ResolutionError> {
        if method.is_default() {
            let handle = self
                .resolver
                .resolve(&self.interface, method)?
                .type_checked(self.check_argument_types);
            debug!(method = %method, mechanism = %handle.mechanism(), "resolved built-in body");
            Ok(Invoker::NativeBody(handle))
        } else {
            let target = OperationTarget::new(&self.interface, method);
            debug!(method = %method, statement = target.statement(), "resolved delegating method");
            Ok(Invoker::Delegating(target))
        }
    }
}

impl std::fmt::Debug for MethodRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRouter")
            .field("interface", &self.interface.name())
            .field("cache", &self.cache)
            .field("check_argument_types", &self.check_argument_types)
            .finish()
    }
}
