use quill_pack::PackedObject;
use quill_types::Hash;

use crate::error::StoreResult;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Writing bytes that are already
///   present is a no-op reported as `Ok(0)`.
/// - Retrieval is byte-exact and re-verifies the content hash.
/// - Concurrent reads are always safe (objects are immutable).
/// - The store never interprets payloads; it is a pure key-value store.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Persist a packed object.
    ///
    /// Returns the number of payload bytes written, or `0` if an object with
    /// the same hash already exists.
    fn write_packed(&self, object: &PackedObject) -> StoreResult<usize>;

    /// Retrieve a packed object by hash.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) if
    /// absent and [`StoreError::HashMismatch`](crate::StoreError::HashMismatch)
    /// if the stored bytes no longer hash to `hash`.
    fn retrieve_packed(&self, hash: &Hash) -> StoreResult<PackedObject>;

    /// Check whether an object exists in the store.
    fn exists(&self, hash: &Hash) -> StoreResult<bool>;

    /// Retrieve by textual hash (`algo:hex`).
    ///
    /// A malformed string or unsupported algorithm is a decode error, not a
    /// not-found.
    fn retrieve_str(&self, hash: &str) -> StoreResult<PackedObject> {
        let hash: Hash = hash.parse()?;
        self.retrieve_packed(&hash)
    }

    /// Write several objects, returning the bytes written for each.
    fn write_batch(&self, objects: &[PackedObject]) -> StoreResult<Vec<usize>> {
        objects.iter().map(|obj| self.write_packed(obj)).collect()
    }
}

/// Stores that can enumerate their contents.
///
/// Kept apart from [`ObjectStore`] so that backends without cheap listing
/// (e.g. a remote store) need not pretend to support it.
pub trait ListableObjectStore: ObjectStore {
    /// All stored hashes, sorted.
    fn list_hashes(&self) -> StoreResult<Vec<Hash>>;
}

/// Re-hash retrieved bytes and compare against the requested hash.
pub(crate) fn verify(expected: &Hash, payload: Vec<u8>) -> StoreResult<PackedObject> {
    let object = PackedObject::from_payload(payload);
    if object.hash() != expected {
        return Err(crate::error::StoreError::HashMismatch {
            expected: *expected,
            computed: *object.hash(),
        });
    }
    Ok(object)
}
