//! Knowledge backends: an in-process one and a sled-backed snapshot on disk.

use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{KnowledgeBackend, KnowledgeEntry};
use crate::error::{Result, TriageError};

const TREE_NAME: &str = "knowledge_entries";
const META_TREE: &str = "knowledge_meta";
const SEEDED_KEY: &[u8] = b"seeded";

/// Keeps entries in process memory; shared by every desk of one gateway run.
#[derive(Debug, Default)]
pub struct MemoryKnowledgeBackend {
    entries: RwLock<Vec<KnowledgeEntry>>,
    seeded: AtomicBool,
}

impl MemoryKnowledgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
            seeded: AtomicBool::new(false),
        }
    }
}

impl KnowledgeBackend for MemoryKnowledgeBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        self.entries
            .read()
            .map(|g| g.clone())
            .map_err(|_| TriageError::Storage("knowledge snapshot lock poisoned".to_string()))
    }

    fn save(&self, entry: &KnowledgeEntry) -> Result<()> {
        let id = entry
            .id()
            .ok_or_else(|| TriageError::Storage("cannot persist an entry without id".to_string()))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TriageError::Storage("knowledge snapshot lock poisoned".to_string()))?;
        match entries.iter_mut().find(|e| e.id() == Some(id)) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TriageError::Storage("knowledge snapshot lock poisoned".to_string()))?;
        entries.retain(|e| e.id() != Some(id));
        Ok(())
    }

    fn is_seeded(&self) -> Result<bool> {
        Ok(self.seeded.load(Ordering::SeqCst))
    }

    fn mark_seeded(&self) -> Result<()> {
        self.seeded.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Value stored per entry; `seq` preserves first-save order since sled iterates by key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    seq: u64,
    entry: KnowledgeEntry,
}

/// Sled-backed knowledge snapshot keyed by entry id.
pub struct SledKnowledgeBackend {
    db: Db,
}

impl SledKnowledgeBackend {
    /// Opens or creates the snapshot at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Number of saved entries.
    pub fn count(&self) -> Result<usize> {
        Ok(self.db.open_tree(TREE_NAME)?.len())
    }
}

impl KnowledgeBackend for SledKnowledgeBackend {
    fn name(&self) -> &str {
        "sled"
    }

    fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        let tree = self.db.open_tree(TREE_NAME)?;
        let mut stored = Vec::new();
        for item in tree.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<StoredEntry>(&value) {
                Ok(s) => stored.push(s),
                Err(e) => tracing::warn!(
                    target: "triage::storage",
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping unreadable knowledge record"
                ),
            }
        }
        stored.sort_by_key(|s| s.seq);
        Ok(stored.into_iter().map(|s| s.entry).collect())
    }

    fn save(&self, entry: &KnowledgeEntry) -> Result<()> {
        let id = entry
            .id()
            .ok_or_else(|| TriageError::Storage("cannot persist an entry without id".to_string()))?;
        let tree = self.db.open_tree(TREE_NAME)?;
        let seq = match tree.get(id.as_bytes())? {
            Some(bytes) => serde_json::from_slice::<StoredEntry>(&bytes)
                .map(|s| s.seq)
                .or_else(|_| self.db.generate_id())?,
            None => self.db.generate_id()?,
        };
        let record = StoredEntry {
            seq,
            entry: entry.clone(),
        };
        let prev = tree.insert(id.as_bytes(), serde_json::to_vec(&record)?)?;
        tree.flush()?;
        let action = if prev.is_some() { "UPDATE" } else { "INSERT" };
        tracing::info!(
            target: "triage::storage",
            entry_id = id,
            action,
            "Knowledge snapshot write '{}'",
            id
        );
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let tree = self.db.open_tree(TREE_NAME)?;
        if tree.remove(id.as_bytes())?.is_some() {
            tree.flush()?;
            tracing::info!(target: "triage::storage", entry_id = id, action = "REMOVE", "Knowledge snapshot removed '{}'", id);
        }
        Ok(())
    }

    fn is_seeded(&self) -> Result<bool> {
        Ok(self.db.open_tree(META_TREE)?.contains_key(SEEDED_KEY)?)
    }

    fn mark_seeded(&self) -> Result<()> {
        let meta = self.db.open_tree(META_TREE)?;
        meta.insert(SEEDED_KEY, &b"1"[..])?;
        meta.flush()?;
        Ok(())
    }
}
