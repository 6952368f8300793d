//! In-memory table of known providers.
//!
//! Each composite key owns its own async mutex, so reads and writes of one
//! record are mutually exclusive while different records never contend.
//! [`ProviderRegistry::lock`] hands out the per-key guard; ingestion holds it
//! across the whole register/retry exchange so at most one registration per
//! key is in flight.

use crate::models::{ProviderKey, ProviderRecord};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Slot = Arc<Mutex<Option<ProviderRecord>>>;

/// Result of a write to an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No registered record; nothing was written.
    NotFound,
}

/// Provider state store. Exclusive owner of every [`ProviderRecord`].
#[derive(Default)]
pub struct ProviderRegistry {
    slots: RwLock<HashMap<ProviderKey, Slot>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn existing_slot(&self, key: &ProviderKey) -> Option<Slot> {
        self.slots.read().await.get(key).cloned()
    }

    async fn slot(&self, key: &ProviderKey) -> Slot {
        if let Some(slot) = self.existing_slot(key).await {
            return slot;
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Exclusive access to one key, registered or not.
    pub async fn lock(&self, key: &ProviderKey) -> ProviderGuard {
        let slot = self.slot(key).await;
        ProviderGuard {
            inner: slot.lock_owned().await,
        }
    }

    /// Hand back a guard. A key left unregistered loses its slot, unless
    /// another task still holds a reference to it.
    pub async fn release(&self, key: &ProviderKey, guard: ProviderGuard) {
        if guard.is_registered() {
            return;
        }
        drop(guard);

        let mut slots = self.slots.write().await;
        let unused = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().map(|record| record.is_none()).unwrap_or(false)
        });
        if unused {
            slots.remove(key);
        }
    }

    /// Number of keys with a slot, registered or not.
    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn exists(&self, key: &ProviderKey) -> bool {
        match self.existing_slot(key).await {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Overwrite the last value of a registered provider. Never creates a
    /// record: registration has to happen first.
    pub async fn upsert(&self, key: &ProviderKey, payload: String) -> UpdateOutcome {
        let Some(slot) = self.existing_slot(key).await else {
            return UpdateOutcome::NotFound;
        };
        let mut record = slot.lock().await;
        match record.as_mut() {
            Some(record) => {
                record.last_value = payload;
                UpdateOutcome::Updated
            }
            None => UpdateOutcome::NotFound,
        }
    }

    /// Last value of a registered provider.
    pub async fn get(&self, key: &ProviderKey) -> Option<String> {
        let slot = self.existing_slot(key).await?;
        let record = slot.lock().await;
        record.as_ref().map(|r| r.last_value.clone())
    }

    /// Consistent copy of a registered record.
    pub async fn snapshot(&self, key: &ProviderKey) -> Option<ProviderRecord> {
        let slot = self.existing_slot(key).await?;
        let record = slot.lock().await;
        record.clone()
    }

    pub async fn set_key_path(&self, key: &ProviderKey, path: PathBuf) -> UpdateOutcome {
        let Some(slot) = self.existing_slot(key).await else {
            return UpdateOutcome::NotFound;
        };
        let mut record = slot.lock().await;
        match record.as_mut() {
            Some(record) => {
                record.private_key_path = Some(path);
                UpdateOutcome::Updated
            }
            None => UpdateOutcome::NotFound,
        }
    }

    /// Copies of every registered record.
    pub async fn registered(&self) -> Vec<(ProviderKey, ProviderRecord)> {
        let slots: Vec<(ProviderKey, Slot)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();

        let mut records = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            if let Some(record) = slot.lock().await.clone() {
                records.push((key, record));
            }
        }
        records
    }

    /// Drop every record. Returns how many registered records were removed.
    pub async fn remove_all(&self) -> usize {
        let drained: Vec<Slot> = self.slots.write().await.drain().map(|(_, slot)| slot).collect();

        let mut removed = 0;
        for slot in drained {
            // Waits for any in-flight registration on this key
            if slot.lock().await.take().is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.registered().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Exclusive handle on one provider key.
pub struct ProviderGuard {
    inner: OwnedMutexGuard<Option<ProviderRecord>>,
}

impl ProviderGuard {
    pub fn is_registered(&self) -> bool {
        self.inner.is_some()
    }

    pub fn record(&self) -> Option<&ProviderRecord> {
        self.inner.as_ref()
    }

    /// Overwrite the last value; `NotFound` if the key is not registered.
    pub fn update_value(&mut self, payload: String) -> UpdateOutcome {
        match self.inner.as_mut() {
            Some(record) => {
                record.last_value = payload;
                UpdateOutcome::Updated
            }
            None => UpdateOutcome::NotFound,
        }
    }

    /// Store the record of a provider that just registered successfully.
    pub fn insert_registered(&mut self, record: ProviderRecord) {
        *self.inner = Some(record);
    }
}
