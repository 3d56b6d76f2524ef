//! Transient registry of currently reachable systems.
//!
//! Rebuilt from connectivity notifications after every restart; the local
//! system registers itself when the service starts. The lock is held per
//! map access only, never across storage transactions.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

pub struct OnlineSystemRegistry {
    systems: Mutex<HashMap<String, String>>,
}

impl OnlineSystemRegistry {
    pub fn new() -> Self {
        OnlineSystemRegistry {
            systems: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_online(&self, system_id: &str, name: &str) {
        debug!(system = system_id, "system online");
        self.systems
            .lock()
            .unwrap()
            .insert(system_id.to_string(), name.to_string());
    }

    pub fn set_offline(&self, system_id: &str) {
        debug!(system = system_id, "system offline");
        self.systems.lock().unwrap().remove(system_id);
    }

    pub fn is_online(&self, system_id: &str) -> bool {
        self.systems.lock().unwrap().contains_key(system_id)
    }

    pub fn online_systems(&self) -> HashMap<String, String> {
        self.systems.lock().unwrap().clone()
    }
}

impl Default for OnlineSystemRegistry {
    fn default() -> Self {
        OnlineSystemRegistry::new()
    }
}
