//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{RefError, Result};
use crate::traits::RefStore;
use crate::types::RefTarget;

/// An in-memory implementation of [`RefStore`].
///
/// All refs live in a `BTreeMap` behind a `RwLock`, so listing is naturally
/// sorted. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, RefTarget>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_target(&self, name: &str) -> Result<Option<RefTarget>> {
        let refs = self.refs.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs.get(name).cloned())
    }

    fn write_target(&self, name: &str, target: &RefTarget) -> Result<bool> {
        let mut refs = self.refs.write().map_err(|_| RefError::LockPoisoned)?;
        if refs.get(name) == Some(target) {
            return Ok(false);
        }
        refs.insert(name.to_string(), target.clone());
        debug!(name, target = %target, "ref updated");
        Ok(true)
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut refs = self.refs.write().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, RefTarget)>> {
        let refs = self.refs.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
