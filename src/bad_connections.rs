use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// File-backed blocklist of VPN configuration names a client has reported as bad.
///
/// Kept deliberately outside the pool core: persistent configuration bookkeeping is
/// not the supervisor's concern. [`DockerProvisioner`](crate::provisioner::DockerProvisioner)
/// consults it when choosing a VPN config; the pool never sees it.
pub struct BadConnections {
    path: PathBuf,
    entries: Mutex<HashSet<BadEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BadEntry {
    pub config_name: String,
    pub reason: Option<String>,
}

impl BadConnections {
    /// Loads `<db_dir>/bad_connections.json`, creating an empty blocklist file if none
    /// exists yet.
    pub fn load_or_create(db_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let db_dir = db_dir.into();
        std::fs::create_dir_all(&db_dir)?;
        let path = db_dir.join("bad_connections.json");

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            let empty: Vec<BadEntry> = Vec::new();
            std::fs::write(&path, serde_json::to_string(&empty)?)?;
            HashSet::new()
        };

        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn mark_bad(&self, config_name: String, reason: Option<String>) -> std::io::Result<()> {
        let mut entries = self.entries.lock().expect("bad connections lock poisoned");
        entries.insert(BadEntry { config_name, reason });
        self.persist(&entries)
    }

    pub fn list(&self) -> Vec<BadEntry> {
        self.entries.lock().expect("bad connections lock poisoned").iter().cloned().collect()
    }

    pub fn contains(&self, config_name: &str) -> bool {
        self.entries
            .lock()
            .expect("bad connections lock poisoned")
            .iter()
            .any(|entry| entry.config_name == config_name)
    }

    fn persist(&self, entries: &HashSet<BadEntry>) -> std::io::Result<()> {
        let serialized = serde_json::to_string(&entries.iter().collect::<Vec<_>>())?;
        std::fs::write(&self.path, serialized)
    }
}
