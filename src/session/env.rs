use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Environment variables shared by a host and all of its sessions.
///
/// Names are case-insensitive. Cloning yields another handle to the same
/// store; use [`Environment::snapshot`] for a private copy.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Arc<RwLock<BTreeMap<String, (String, String)>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded from the process environment.
    pub fn from_process() -> Self {
        let env = Self::new();
        for (name, value) in std::env::vars() {
            env.set(&name, &value);
        }
        env
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars
            .read()
            .get(&name.to_lowercase())
            .map(|(_, value)| value.clone())
    }

    pub fn set(&self, name: &str, value: &str) {
        self.vars
            .write()
            .insert(name.to_lowercase(), (name.to_string(), value.to_string()));
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.vars
            .write()
            .remove(&name.to_lowercase())
            .map(|(_, value)| value)
    }

    /// `(name, value)` pairs ordered by name, names as first written.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.vars.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
