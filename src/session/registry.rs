//! Topic to key registry

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::protocol::{ProtocolError, ProtocolResult};

/// Maps each topic to the key its traffic is addressed with
///
/// Writes are serialized by a single lock, so concurrent registrations never
/// lose updates. A later registration for a topic replaces the earlier one.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    keys: RwLock<HashMap<String, String>>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `topic`, replacing any previous binding
    pub fn register(&self, topic: impl Into<String>, key: impl Into<String>) {
        self.keys.write().insert(topic.into(), key.into());
    }

    /// Key bound to `topic`
    pub fn resolve(&self, topic: &str) -> ProtocolResult<String> {
        self.keys
            .read()
            .get(topic)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownTopic(topic.to_string()))
    }

    /// Whether `topic` has a binding
    pub fn contains(&self, topic: &str) -> bool {
        self.keys.read().contains_key(topic)
    }

    /// All registered topics
    pub fn topics(&self) -> Vec<String> {
        self.keys.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_resolve_before_register_fails() {
        let registry = TopicRegistry::new();
        assert!(matches!(
            registry.resolve("t"),
            Err(ProtocolError::UnknownTopic(topic)) if topic == "t"
        ));
    }

    #[test]
    fn test_register_then_resolve() {
        let registry = TopicRegistry::new();
        registry.register("t", "k");

        assert_eq!(registry.resolve("t").unwrap(), "k");
        assert!(registry.contains("t"));
    }

    #[test]
    fn test_register_overwrites() {
        let registry = TopicRegistry::new();
        registry.register("t", "k");
        registry.register("t", "k2");

        assert_eq!(registry.resolve("t").unwrap(), "k2");
        assert_eq!(registry.topics(), vec!["t".to_string()]);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(TopicRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        registry.register(format!("topic-{}-{}", i, j), format!("key-{}", i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.topics().len(), 800);
        assert_eq!(registry.resolve("topic-3-99").unwrap(), "key-3");
    }
}
