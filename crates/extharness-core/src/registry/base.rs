//! Name-keyed registry shared by test cases and addons.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use extharness_protocols::TesterError;

/// Items that can be stored in a [`BaseRegistry`].
pub trait Registerable: Send + Sync {
    /// Unique name within its registry.
    fn registry_id(&self) -> &str;
}

/// Thread-safe registry of named items.
///
/// `T` is usually a trait object, e.g. `dyn Addon`.
pub struct BaseRegistry<T: ?Sized + Registerable> {
    items: DashMap<String, Arc<T>>,
}

impl<T: ?Sized + Registerable> BaseRegistry<T> {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Register an item. Fails if the name is taken.
    pub fn register(&self, item: Arc<T>) -> Result<(), TesterError> {
        let id = item.registry_id().to_string();
        match self.items.entry(id) {
            Entry::Occupied(entry) => {
                Err(TesterError::AlreadyRegistered(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(item);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, id: &str) -> Result<Arc<T>, TesterError> {
        self.items
            .remove(id)
            .map(|(_, item)| item)
            .ok_or_else(|| TesterError::NotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.items.get(id).map(|item| item.clone())
    }

    /// Like [`BaseRegistry::get`], failing with [`TesterError::NotFound`].
    pub fn require(&self, id: &str) -> Result<Arc<T>, TesterError> {
        self.get(id)
            .ok_or_else(|| TesterError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Registered names, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.iter().map(|item| item.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.items.iter().map(|entry| entry.value().clone())
    }
}

impl<T: ?Sized + Registerable> Default for BaseRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Registerable {
        fn label(&self) -> String;
    }

    struct Case {
        id: String,
    }

    impl Registerable for Case {
        fn registry_id(&self) -> &str {
            &self.id
        }
    }

    impl Named for Case {
        fn label(&self) -> String {
            format!("case {}", self.id)
        }
    }

    fn case(id: &str) -> Arc<Case> {
        Arc::new(Case { id: id.to_string() })
    }

    #[test]
    fn test_register_and_get() {
        let registry: BaseRegistry<Case> = BaseRegistry::new();
        assert!(registry.is_empty());

        registry.register(case("cmd_ping_pong")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("cmd_ping_pong"));
        assert_eq!(
            registry.get("cmd_ping_pong").unwrap().registry_id(),
            "cmd_ping_pong"
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let registry: BaseRegistry<Case> = BaseRegistry::default();
        registry.register(case("greeting")).unwrap();

        let result = registry.register(case("greeting"));
        assert!(matches!(result, Err(TesterError::AlreadyRegistered(id)) if id == "greeting"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry: BaseRegistry<Case> = BaseRegistry::new();
        registry.register(case("a")).unwrap();

        let removed = registry.unregister("a").unwrap();
        assert_eq!(removed.registry_id(), "a");
        assert!(registry.is_empty());
        assert!(matches!(registry.unregister("a"), Err(TesterError::NotFound(_))));
    }

    #[test]
    fn test_require() {
        let registry: BaseRegistry<Case> = BaseRegistry::new();
        registry.register(case("a")).unwrap();
        assert!(registry.require("a").is_ok());
        assert!(matches!(registry.require("b"), Err(TesterError::NotFound(id)) if id == "b"));
    }

    #[test]
    fn test_list_ids_sorted() {
        let registry: BaseRegistry<Case> = BaseRegistry::new();
        registry.register(case("video")).unwrap();
        registry.register(case("audio")).unwrap();
        registry.register(case("data")).unwrap();

        assert_eq!(registry.list_ids(), vec!["audio", "data", "video"]);
        assert_eq!(registry.iter().count(), 3);
    }

    #[test]
    fn test_trait_objects() {
        let registry: BaseRegistry<dyn Named> = BaseRegistry::new();
        registry.register(case("x") as Arc<dyn Named>).unwrap();
        assert_eq!(registry.get("x").unwrap().label(), "case x");
    }
}
