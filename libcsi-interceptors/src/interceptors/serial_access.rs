//! Serial access to volumes.
//!
//! At most one guarded call per resource key is inside the handler at any
//! time.  A second call for a key that is already in flight fails at once
//! with [`CsiError::OperationPending`]; it is never queued.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::error::CsiError;
use crate::interceptor::{Interceptor, Next};
use crate::message::{CsiRequest, CsiResponse, Method};

/// Marker for a call currently holding a key.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    method: Method,
    since: Instant,
}

/// Keys with an operation in flight.
///
/// Backed by a sharded map, so acquiring one key never blocks calls on
/// unrelated keys, and no lock is held while the handler runs.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: DashMap<String, InFlight>,
}

impl InFlightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `method`, or return `None` if it is already held.
    ///
    /// The key is released when the returned guard is dropped, which also
    /// happens when the holding future panics or is cancelled.
    pub fn try_acquire(&self, key: &str, method: Method) -> Option<InFlightGuard<'_>> {
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(held) => {
                let held = held.get();
                debug!(
                    key,
                    held_by = %held.method,
                    held_for = ?held.since.elapsed(),
                    "key already in flight"
                );
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(InFlight {
                    method,
                    since: Instant::now(),
                });
                Some(InFlightGuard {
                    registry: self,
                    key: key.to_owned(),
                })
            }
        }
    }

    /// Whether `key` is currently held.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// How long `key` has been held, if it is.
    #[must_use]
    pub fn held_for(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(|e| e.since.elapsed())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases a key on drop.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.entries.remove(&self.key);
    }
}

/// Rejects overlapping calls on the same volume for the configured methods.
///
/// The resource key is the volume name for `CreateVolume` and the volume id
/// for every other guarded call.  Calls whose method is not guarded, or
/// whose request carries no key, pass straight through.
#[derive(Debug)]
pub struct SerialVolumeAccess {
    guarded: HashSet<Method>,
    registry: InFlightRegistry,
}

impl SerialVolumeAccess {
    /// Stable name reported by [`Interceptor::name`].
    pub const NAME: &'static str = "serial_access";

    /// Guard every mutating call.
    #[must_use]
    pub fn new() -> Self {
        Self::for_methods(Method::MUTATING)
    }

    /// Guard exactly `methods`.
    #[must_use]
    pub fn for_methods(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            guarded: methods.into_iter().collect(),
            registry: InFlightRegistry::new(),
        }
    }

    #[must_use]
    pub fn is_guarded(&self, method: Method) -> bool {
        self.guarded.contains(&method)
    }

    #[must_use]
    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }
}

impl Default for SerialVolumeAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interceptor for SerialVolumeAccess {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn intercept(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        next: Next<'_>,
    ) -> Result<CsiResponse, CsiError> {
        let method = req.method();
        if !self.is_guarded(method) {
            return next.run(ctx, req).await;
        }
        let Some(key) = req.resource_key().map(str::to_owned) else {
            return next.run(ctx, req).await;
        };

        let Some(_guard) = self.registry.try_acquire(&key, method) else {
            warn!(%method, key = %key, request_id = ctx.request_id(), "rejected overlapping call");
            return Err(CsiError::OperationPending(key));
        };
        next.run(ctx, req).await
    }
}
