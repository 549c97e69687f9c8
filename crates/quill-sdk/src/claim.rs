//! Per-partition write claims.
//!
//! A claim reserves a partition for one writer between reading its state and
//! appending to it. Claims are RAII guards: they are released when the
//! [`ClaimGuard`] drops, whichever way the writer exits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_types::PartitionName;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// Another writer held the partition for the whole timeout.
    #[error("timed out after {waited:?} waiting to claim partition {partition}")]
    Timeout {
        partition: PartitionName,
        waited: Duration,
    },

    #[error("claim registry lock poisoned")]
    LockPoisoned,
}

/// Hands out at most one live claim per partition.
#[derive(Debug)]
pub struct ClaimRegistry {
    timeout: Duration,
    slots: Mutex<HashMap<PartitionName, Arc<AsyncMutex<()>>>>,
}

impl ClaimRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn slot(&self, partition: &PartitionName) -> Result<Arc<AsyncMutex<()>>, ClaimError> {
        let mut slots = self.slots.lock().map_err(|_| ClaimError::LockPoisoned)?;
        // Slots nobody holds or waits on are only referenced from the map.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Ok(Arc::clone(slots.entry(partition.clone()).or_default()))
    }

    /// Claim `partition`, waiting at most the registry's timeout.
    ///
    /// On timeout nothing stays reserved.
    pub async fn claim(&self, partition: &PartitionName) -> Result<ClaimGuard, ClaimError> {
        let slot = self.slot(partition)?;
        match tokio::time::timeout(self.timeout, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(partition = %partition, "partition claimed");
                Ok(ClaimGuard {
                    partition: partition.clone(),
                    _guard: guard,
                })
            }
            Err(_) => {
                warn!(partition = %partition, timeout = ?self.timeout, "claim timed out");
                Err(ClaimError::Timeout {
                    partition: partition.clone(),
                    waited: self.timeout,
                })
            }
        }
    }

    /// Claim `partition` only if it is free right now.
    pub fn try_claim(&self, partition: &PartitionName) -> Result<Option<ClaimGuard>, ClaimError> {
        let slot = self.slot(partition)?;
        Ok(slot.try_lock_owned().ok().map(|guard| ClaimGuard {
            partition: partition.clone(),
            _guard: guard,
        }))
    }

    /// Whether some writer currently holds `partition`.
    pub fn is_claimed(&self, partition: &PartitionName) -> Result<bool, ClaimError> {
        let slots = self.slots.lock().map_err(|_| ClaimError::LockPoisoned)?;
        Ok(slots
            .get(partition)
            .is_some_and(|slot| slot.try_lock().is_err()))
    }
}

/// A live claim on one partition.
#[derive(Debug)]
pub struct ClaimGuard {
    partition: PartitionName,
    _guard: OwnedMutexGuard<()>,
}

impl ClaimGuard {
    pub fn partition(&self) -> &PartitionName {
        &self.partition
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        trace!(partition = %self.partition, "claim released");
    }
}
