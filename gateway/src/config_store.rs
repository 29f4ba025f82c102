use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;

/// Tagged variant for a runtime-configurable setting. No duck typing: a
/// handler that wants a number gets a number or nothing, never a string
/// that happens to parse as one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Bool(bool),
}

/// Small in-memory key/value store behind a runtime config endpoint. A
/// subset of keys is fixed read-only at construction (e.g. the values that
/// back startup-only settings); writes and deletes against those keys are
/// rejected rather than silently accepted.
pub struct ConfigStore {
    values: RwLock<HashMap<String, ConfigValue>>,
    read_only: HashSet<String>,
}

impl ConfigStore {
    pub fn new(initial: HashMap<String, ConfigValue>, read_only: HashSet<String>) -> Self {
        Self { values: RwLock::new(initial), read_only }
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.read().expect("config store lock poisoned").get(key).cloned()
    }

    pub fn all(&self) -> HashMap<String, ConfigValue> {
        self.values.read().expect("config store lock poisoned").clone()
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.read_only.contains(key)
    }

    /// Returns `false` without mutating anything if `key` is read-only.
    pub fn set(&self, key: String, value: ConfigValue) -> bool {
        if self.read_only.contains(&key) {
            return false;
        }
        self.values.write().expect("config store lock poisoned").insert(key, value);
        true
    }

    /// Returns `false` if `key` is read-only or absent.
    pub fn remove(&self, key: &str) -> bool {
        if self.read_only.contains(key) {
            return false;
        }
        self.values.write().expect("config store lock poisoned").remove(key).is_some()
    }
}

pub fn value_from_json(value: &Value) -> Option<ConfigValue> {
    match value {
        Value::String(s) => Some(ConfigValue::String(s.clone())),
        Value::Number(n) => n.as_f64().map(ConfigValue::Number),
        Value::Bool(b) => Some(ConfigValue::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_key_rejects_writes_and_deletes() {
        let mut initial = HashMap::new();
        initial.insert("engine_command".to_string(), ConfigValue::String("veloz-engine".to_string()));
        let mut read_only = HashSet::new();
        read_only.insert("engine_command".to_string());
        let store = ConfigStore::new(initial, read_only);

        assert!(!store.set("engine_command".to_string(), ConfigValue::String("evil".to_string())));
        assert!(!store.remove("engine_command"));
        assert_eq!(store.get("engine_command"), Some(ConfigValue::String("veloz-engine".to_string())));
    }

    #[test]
    fn writable_key_round_trips() {
        let store = ConfigStore::new(HashMap::new(), HashSet::new());
        assert!(store.set("max_leverage".to_string(), ConfigValue::Number(5.0)));
        assert_eq!(store.get("max_leverage"), Some(ConfigValue::Number(5.0)));
        assert!(store.remove("max_leverage"));
        assert_eq!(store.get("max_leverage"), None);
    }
}
