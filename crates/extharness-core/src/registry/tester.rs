//! Live tester instances, addressed by handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use extharness_protocols::TesterHandle;

use crate::bridge::CompletionBridge;
use crate::hooks::ExtensionUnderTest;

/// One tester instance: its hooks and its completion bridge.
pub struct TesterInstance {
    handle: TesterHandle,
    hooks: Arc<dyn ExtensionUnderTest>,
    bridge: Arc<CompletionBridge>,
}

impl TesterInstance {
    pub fn handle(&self) -> TesterHandle {
        self.handle
    }

    pub fn hooks(&self) -> Arc<dyn ExtensionUnderTest> {
        self.hooks.clone()
    }

    pub fn bridge(&self) -> Arc<CompletionBridge> {
        self.bridge.clone()
    }
}

impl fmt::Debug for TesterInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TesterInstance")
            .field("handle", &self.handle)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Handles are unique per process so registries can share one boundary.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Owns tester instances. The boundary only ever sees their handles.
pub struct TesterRegistry {
    instances: DashMap<TesterHandle, Arc<TesterInstance>>,
}

impl TesterRegistry {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Allocate a handle and store a new instance under it.
    pub fn create(&self, hooks: Arc<dyn ExtensionUnderTest>) -> Arc<TesterInstance> {
        let handle = TesterHandle::new(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let instance = Arc::new(TesterInstance {
            handle,
            hooks,
            bridge: Arc::new(CompletionBridge::new(handle)),
        });
        self.instances.insert(handle, instance.clone());
        debug!(%handle, "Tester instance created");
        instance
    }

    pub fn get(&self, handle: TesterHandle) -> Option<Arc<TesterInstance>> {
        self.instances.get(&handle).map(|entry| entry.clone())
    }

    pub fn contains(&self, handle: TesterHandle) -> bool {
        self.instances.contains_key(&handle)
    }

    /// Release an instance. Returns false if it was already released.
    pub fn dispose(&self, handle: TesterHandle) -> bool {
        match self.instances.remove(&handle) {
            Some((_, instance)) => {
                let leaked = instance.bridge.close();
                for op in &leaked {
                    warn!(%handle, operation = %op.id, kind = %op.kind, "Operation never completed");
                }
                debug!(%handle, "Tester instance disposed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for TesterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
