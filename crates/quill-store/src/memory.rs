use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use quill_pack::PackedObject;
use quill_types::Hash;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify, ListableObjectStore, ObjectStore};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Payloads are held behind a `RwLock`
/// so many traversal tasks can read concurrently while writes serialize.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Hash, Vec<u8>>>> {
        self.objects.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_map(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Hash, Vec<u8>>>> {
        self.objects.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    /// Total payload bytes across all stored objects.
    pub fn total_bytes(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.values().map(Vec::len).sum())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn write_packed(&self, object: &PackedObject) -> StoreResult<usize> {
        let mut map = self.write_map()?;
        if map.contains_key(object.hash()) {
            trace!(hash = %object.hash(), "object already stored");
            return Ok(0);
        }
        map.insert(*object.hash(), object.payload().to_vec());
        Ok(object.len())
    }

    fn retrieve_packed(&self, hash: &Hash) -> StoreResult<PackedObject> {
        let payload = self
            .read_map()?
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound(*hash))?;
        verify(hash, payload)
    }

    fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(hash))
    }
}

impl ListableObjectStore for InMemoryObjectStore {
    fn list_hashes(&self) -> StoreResult<Vec<Hash>> {
        let mut hashes: Vec<Hash> = self.read_map()?.keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.objects.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_pack::{Affix, Checkpoint, JsonPacker, ObjectKind};

    fn event(text: &str) -> PackedObject {
        JsonPacker
            .pack_event("note", &serde_json::json!({ "text": text }))
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Write / retrieve
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_retrieve_is_byte_exact() {
        let store = InMemoryObjectStore::new();
        let obj = event("hello");
        store.write_packed(&obj).unwrap();
        let read = store.retrieve_packed(obj.hash()).unwrap();
        assert_eq!(read, obj);
        assert_eq!(read.kind().unwrap(), ObjectKind::Event);
    }

    #[test]
    fn all_object_kinds_store() {
        let store = InMemoryObjectStore::new();
        let affix = JsonPacker.pack_affix(&Affix::new()).unwrap();
        let cp = JsonPacker
            .pack_checkpoint(&Checkpoint::new(*affix.hash()))
            .unwrap();
        store.write_batch(&[event("a"), affix.clone(), cp.clone()]).unwrap();
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(
            store.retrieve_packed(cp.hash()).unwrap().kind().unwrap(),
            ObjectKind::Checkpoint
        );
    }

    // -----------------------------------------------------------------------
    // Dedup
    // -----------------------------------------------------------------------

    #[test]
    fn second_write_reports_zero_bytes() {
        let store = InMemoryObjectStore::new();
        let obj = event("dup");
        let first = store.write_packed(&obj).unwrap();
        assert!(first > 0);
        assert_eq!(first, obj.len());
        assert_eq!(store.write_packed(&obj).unwrap(), 0);
        assert_eq!(store.len().unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // Missing and malformed lookups
    // -----------------------------------------------------------------------

    #[test]
    fn retrieve_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let missing = Hash::digest_of(b"missing");
        assert!(matches!(
            store.retrieve_packed(&missing),
            Err(StoreError::NotFound(h)) if h == missing
        ));
        assert!(!store.exists(&missing).unwrap());
    }

    #[test]
    fn retrieve_str_parses_hash() {
        let store = InMemoryObjectStore::new();
        let obj = event("by string");
        store.write_packed(&obj).unwrap();
        let read = store.retrieve_str(&obj.hash().to_string()).unwrap();
        assert_eq!(read, obj);
    }

    #[test]
    fn retrieve_str_rejects_malformed() {
        let store = InMemoryObjectStore::new();
        for bad in ["nonsense", "sha1:abcd", "sha256:xyz"] {
            assert!(
                matches!(store.retrieve_str(bad), Err(StoreError::InvalidHash(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    #[test]
    fn tampered_payload_is_hash_mismatch() {
        let store = InMemoryObjectStore::new();
        let obj = event("original");
        store.write_packed(&obj).unwrap();
        store
            .write_map()
            .unwrap()
            .insert(*obj.hash(), b"event json note 2\0{}".to_vec());
        assert!(matches!(
            store.retrieve_packed(obj.hash()),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn list_hashes_is_sorted() {
        let store = InMemoryObjectStore::new();
        for text in ["c", "a", "b"] {
            store.write_packed(&event(text)).unwrap();
        }
        let hashes = store.list_hashes().unwrap();
        assert_eq!(hashes.len(), 3);
        assert!(hashes.windows(2).all(|w| w[0] < w[1]));
        assert!(store.total_bytes().unwrap() > 0);
    }

    // -----------------------------------------------------------------------
    // Concurrent read safety
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let obj = event("shared data");
        store.write_packed(&obj).unwrap();
        let hash = *obj.hash();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let read = store.retrieve_packed(&hash).unwrap();
                    assert_eq!(*read.hash(), hash);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }
}
