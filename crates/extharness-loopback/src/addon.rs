//! Addons: named factories for extension instances.

use std::fmt;
use std::sync::Arc;

use extharness_core::{BaseRegistry, Registerable};

use crate::peer::PeerExtension;

/// A named factory for extensions.
pub trait Addon: Registerable {
    fn create_instance(&self, instance_name: &str) -> Arc<dyn PeerExtension>;
}

/// Addons available to a runtime, by name.
pub type AddonRegistry = BaseRegistry<dyn Addon>;

/// An addon backed by a closure.
pub struct FnAddon<F> {
    name: String,
    factory: F,
}

impl<F> FnAddon<F>
where
    F: Fn(&str) -> Arc<dyn PeerExtension> + Send + Sync,
{
    pub fn new(name: impl Into<String>, factory: F) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }
}

impl<F> Registerable for FnAddon<F>
where
    F: Fn(&str) -> Arc<dyn PeerExtension> + Send + Sync,
{
    fn registry_id(&self) -> &str {
        &self.name
    }
}

impl<F> Addon for FnAddon<F>
where
    F: Fn(&str) -> Arc<dyn PeerExtension> + Send + Sync,
{
    fn create_instance(&self, instance_name: &str) -> Arc<dyn PeerExtension> {
        (self.factory)(instance_name)
    }
}

impl<F> fmt::Debug for FnAddon<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAddon").field("name", &self.name).finish()
    }
}
