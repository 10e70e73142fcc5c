//! Crash-recovery snapshotting of the local store, backed by a JSON file
//! on disk.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::node::Node;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    pairs: Vec<(String, String, u64)>,
}

/// Persists and restores a `Store`'s contents across restarts. The default
/// backend is JSON-on-disk; swappable so tests can stub it out without
/// touching the filesystem.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> std::io::Result<Vec<(String, String, u64)>>;
    fn persist(&self, pairs: Vec<(String, String, u64)>) -> std::io::Result<()>;
}

pub struct JsonFileSnapshotStore {
    path: String,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<String>) -> Self {
        JsonFileSnapshotStore { path: path.into() }
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> std::io::Result<Vec<(String, String, u64)>> {
        if !Path::new(&self.path).exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let file: SnapshotFile = serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(file.pairs)
    }

    fn persist(&self, pairs: Vec<(String, String, u64)>) -> std::io::Result<()> {
        let file = SnapshotFile { pairs };
        let contents = serde_json::to_string(&file).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp_path = format!("{}.tmp", self.path);
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)
    }
}

/// Loads a snapshot into `node`'s store, if one exists. A missing or
/// unreadable file is not fatal: the node starts empty and logs instead of
/// refusing to boot.
pub fn restore(node: &Node, backend: &dyn SnapshotStore) {
    match backend.load() {
        Ok(pairs) if pairs.is_empty() => {}
        Ok(pairs) => {
            let count = pairs.len();
            node.ingest_transfer(pairs);
            info!("restored {count} keys from snapshot");
        }
        Err(e) => warn!("could not load snapshot, starting with an empty store: {e}"),
    }
}

pub fn checkpoint(node: &Node, backend: &dyn SnapshotStore) {
    if let Err(e) = backend.persist(node.store_snapshot()) {
        warn!("could not write snapshot: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::kv::GetOutcome;
    use crate::node::NodeInfo;

    #[test]
    fn roundtrips_through_a_temp_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("chord-snapshot-test-{}.json", std::process::id()));
        let backend = JsonFileSnapshotStore::new(path.to_string_lossy().to_string());

        let node = Node::create(NodeInfo::new("127.0.0.1:0".into()), Config::for_tests("127.0.0.1:0".into()));
        node.put_local("k", "v", 0);
        checkpoint(&node, &backend);

        let restored = Node::create(NodeInfo::new("127.0.0.1:0".into()), Config::for_tests("127.0.0.1:0".into()));
        restore(&restored, &backend);
        assert_eq!(restored.get_local("k"), GetOutcome::Found("v".to_string()));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_restores_empty() {
        let backend = JsonFileSnapshotStore::new("/nonexistent/path/does-not-exist.json".to_string());
        let node = Node::create(NodeInfo::new("127.0.0.1:0".into()), Config::for_tests("127.0.0.1:0".into()));
        restore(&node, &backend);
        assert_eq!(node.store_size(), 0);
    }
}
