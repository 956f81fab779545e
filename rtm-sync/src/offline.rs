//! Local persistence of replicated documents: a binary snapshot plus a queue
//! of pending updates awaiting sync.
//!
//! The store owns its snapshot path exclusively; concurrent writers are
//! undefined behavior at the data level (no file locking is attempted).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use rtm_core::{RequirementStore, Result};

use crate::document::RtmDocument;

const STATE_FILE: &str = "rtm_state.bin";
const PENDING_DIR: &str = "pending";

/// Filesystem layout for one document's offline state.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    state_dir: PathBuf,
}

impl OfflineStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Path of the binary snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn pending_dir(&self) -> PathBuf {
        self.state_dir.join(PENDING_DIR)
    }

    /// Whether a snapshot exists.
    pub fn has_state(&self) -> bool {
        self.state_path().exists()
    }

    /// Write the document snapshot atomically.
    pub fn save_state(&self, doc: &RtmDocument) -> Result<()> {
        fs::create_dir_all(&self.state_dir)?;
        let path = self.state_path();
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, doc.encode_state())?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "saved document snapshot");
        Ok(())
    }

    /// Load the snapshot into a fresh document.
    pub fn load_state(&self) -> Result<RtmDocument> {
        let bytes = fs::read(self.state_path())?;
        RtmDocument::from_state_bytes(&bytes)
    }

    /// Append an update to the pending queue.
    pub fn queue_update(&self, update: &[u8]) -> Result<()> {
        let dir = self.pending_dir();
        fs::create_dir_all(&dir)?;
        let seq = self.pending_files()?.len();
        let path = dir.join(format!("update-{seq:06}.bin"));
        fs::write(&path, update)?;
        debug!(path = %path.display(), "queued pending update");
        Ok(())
    }

    fn pending_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.pending_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "bin")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("update-"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Pending updates in enqueue order.
    pub fn get_pending_updates(&self) -> Result<Vec<Vec<u8>>> {
        self.pending_files()?
            .iter()
            .map(|path| fs::read(path).map_err(Into::into))
            .collect()
    }

    pub fn pending_update_count(&self) -> Result<usize> {
        Ok(self.pending_files()?.len())
    }

    /// Drop every pending update (after a successful sync).
    pub fn clear_pending_updates(&self) -> Result<()> {
        for path in self.pending_files()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Apply every pending update to a document, in enqueue order. Returns
    /// the number applied; the queue is left intact.
    pub fn apply_pending_to_document(&self, doc: &mut RtmDocument) -> Result<usize> {
        let updates = self.get_pending_updates()?;
        let count = updates.len();
        for update in updates {
            doc.apply_update(&update)?;
        }
        Ok(count)
    }

    /// Canonical bootstrap: load the snapshot and replay pending updates, or
    /// build a fresh document from the tabular file when no snapshot exists.
    pub fn sync_from_table(&self, table_path: &Path) -> Result<RtmDocument> {
        if self.has_state() {
            let mut doc = self.load_state()?;
            let applied = self.apply_pending_to_document(&mut doc)?;
            info!(applied, "restored document from snapshot");
            return Ok(doc);
        }
        let store = RequirementStore::load(table_path)?;
        info!(records = store.len(), path = %table_path.display(), "bootstrapped document from table");
        Ok(RtmDocument::from_store(&store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtm_core::Requirement;
    use tempfile::TempDir;

    fn sample(id: &str) -> Requirement {
        let mut req = Requirement::new(id);
        req.category = "SW".to_string();
        req.requirement_text = format!("requirement {id}");
        req
    }

    #[test]
    fn snapshot_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::new(dir.path());
        assert!(!store.has_state());

        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));
        store.save_state(&doc).unwrap();
        assert!(store.has_state());

        let loaded = store.load_state().unwrap();
        assert_eq!(
            loaded.get_requirement("REQ-SW-001"),
            doc.get_requirement("REQ-SW-001")
        );
    }

    #[test]
    fn pending_queue_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::new(dir.path());

        store.queue_update(b"first").unwrap();
        store.queue_update(b"second").unwrap();
        store.queue_update(b"third").unwrap();
        assert_eq!(store.pending_update_count().unwrap(), 3);

        let pending = store.get_pending_updates().unwrap();
        assert_eq!(pending, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);

        store.clear_pending_updates().unwrap();
        assert_eq!(store.pending_update_count().unwrap(), 0);
    }

    #[test]
    fn apply_pending_replays_in_order() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::new(dir.path());

        // A remote replica produced two updates while we were offline.
        let mut remote = RtmDocument::with_replica(9);
        let empty_vector = RtmDocument::with_replica(8).encode_state_vector();
        remote.set_requirement(&sample("REQ-SW-001"));
        let first = remote.encode_state();
        remote.set_requirement(&sample("REQ-SW-002"));
        let second = remote.encode_update_since(&empty_vector).unwrap();
        store.queue_update(&first).unwrap();
        store.queue_update(&second).unwrap();

        let mut doc = RtmDocument::with_replica(1);
        assert_eq!(store.apply_pending_to_document(&mut doc).unwrap(), 2);
        assert!(doc.get_requirement("REQ-SW-001").is_some());
        assert!(doc.get_requirement("REQ-SW-002").is_some());
        // Queue is left intact for the caller to clear after a real sync.
        assert_eq!(store.pending_update_count().unwrap(), 2);
    }

    #[test]
    fn sync_bootstraps_from_table_then_prefers_snapshot() {
        let dir = TempDir::new().unwrap();
        let table = dir.path().join("rtm.csv");
        std::fs::write(
            &table,
            "req_id,category,requirement_text,status\n\
             REQ-SW-001,SW,from the table,MISSING\n",
        )
        .unwrap();

        let store = OfflineStore::new(dir.path().join("state"));
        let doc = store.sync_from_table(&table).unwrap();
        assert!(doc.get_requirement("REQ-SW-001").is_some());

        // Persist a diverged snapshot; the next sync uses it, not the table.
        let mut doc = doc;
        doc.set_requirement(&sample("REQ-SW-002"));
        store.save_state(&doc).unwrap();

        let restored = store.sync_from_table(&table).unwrap();
        assert!(restored.get_requirement("REQ-SW-002").is_some());
    }
}
