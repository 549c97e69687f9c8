//! The [`RefStore`] trait defining the reference storage interface.

use quill_types::Hash;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::types::RefTarget;

/// Maximum symbolic hops [`RefStore::resolve`] follows.
pub const MAX_SYMBOLIC_DEPTH: usize = 8;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). A name holds either
/// a direct hash or a symbolic pointer to another name, never both.
///
/// Backends implement the four primitives; the typed accessors are provided.
pub trait RefStore: Send + Sync {
    /// Read what `name` points at, or `None` if it does not exist.
    fn read_target(&self, name: &str) -> Result<Option<RefTarget>>;

    /// Store `target` under `name`.
    ///
    /// Returns `false` without touching storage when the stored value
    /// already equals `target`.
    fn write_target(&self, name: &str, target: &RefTarget) -> Result<bool>;

    /// Delete a ref. Returns `true` if it existed.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, RefTarget)>>;

    /// Point `name` at a checkpoint hash. Returns whether the value changed.
    fn write(&self, name: &str, hash: &Hash) -> Result<bool> {
        validate_ref_name(name)?;
        self.write_target(name, &RefTarget::Direct(*hash))
    }

    /// Point `name` at another ref. Returns whether the value changed.
    fn write_symbolic(&self, name: &str, target: &str) -> Result<bool> {
        validate_ref_name(name)?;
        validate_ref_name(target)?;
        self.write_target(name, &RefTarget::Symbolic(target.to_string()))
    }

    /// The hash stored directly under `name`.
    ///
    /// Fails with [`RefError::UnknownRef`] if absent and
    /// [`RefError::NotDirect`] if `name` is symbolic.
    fn retrieve(&self, name: &str) -> Result<Hash> {
        match self.read_target(name)? {
            Some(RefTarget::Direct(hash)) => Ok(hash),
            Some(RefTarget::Symbolic(_)) => Err(RefError::NotDirect {
                name: name.to_string(),
            }),
            None => Err(RefError::UnknownRef {
                name: name.to_string(),
            }),
        }
    }

    /// The ref name a symbolic ref points at.
    fn retrieve_symbolic(&self, name: &str) -> Result<String> {
        match self.read_target(name)? {
            Some(RefTarget::Symbolic(target)) => Ok(target),
            _ => Err(RefError::UnknownSymbolicRef {
                name: name.to_string(),
            }),
        }
    }

    /// Follow symbolic refs from `name` until a hash is reached.
    fn resolve(&self, name: &str) -> Result<Hash> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.read_target(&current)? {
                Some(RefTarget::Direct(hash)) => return Ok(hash),
                Some(RefTarget::Symbolic(next)) => current = next,
                None => return Err(RefError::UnknownRef { name: current }),
            }
        }
        Err(RefError::SymbolicLoop {
            name: name.to_string(),
            depth: MAX_SYMBOLIC_DEPTH,
        })
    }

    /// Follow symbolic refs from `name` to the ref that holds, or would
    /// hold, the hash: the first name that is direct or does not exist yet.
    ///
    /// Writing a new tip under the returned name advances the branch a
    /// symbolic `HEAD` points at instead of replacing `HEAD` itself.
    fn resolve_name(&self, name: &str) -> Result<String> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.read_target(&current)? {
                Some(RefTarget::Symbolic(next)) => current = next,
                Some(RefTarget::Direct(_)) | None => return Ok(current),
            }
        }
        Err(RefError::SymbolicLoop {
            name: name.to_string(),
            depth: MAX_SYMBOLIC_DEPTH,
        })
    }
}
