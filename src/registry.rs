//! Mutex-guarded maps from opaque ids to native resource handles.
//!
//! A registry lock is only ever held for the duration of a synchronous closure. Callers
//! clone whatever handle they need out of the entry, let the lock go, and only then await
//! native work. The closures passed to [`Registry::with_entry`] are plain `FnOnce`, so an
//! `.await` inside one does not compile, and the returned value cannot borrow from the
//! guarded entry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{BridgeError, ResourceKind};

/// Opaque identifier handed to the host. Never reused.
pub type ResourceId = String;

pub(crate) fn mint_id() -> ResourceId {
    uuid::Uuid::new_v4().to_string()
}

/// Resources that belong to a connection.
pub trait Owned {
    fn owner(&self) -> &str;
}

pub struct Registry<T> {
    kind: ResourceKind,
    entries: Mutex<HashMap<ResourceId, T>>,
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ResourceId, T>>, BridgeError> {
        self.entries.lock().map_err(|_| {
            BridgeError::Internal(format!(
                "{} registry lock poisoned by an earlier fault",
                self.kind
            ))
        })
    }

    /// Store `entry` under a freshly minted id.
    ///
    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn insert(&self, entry: T) -> Result<ResourceId, BridgeError> {
        let id = mint_id();
        self.lock()?.insert(id.clone(), entry);
        Ok(id)
    }

    /// Run `f` against the entry while holding only this registry's lock.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotFound`] for unknown ids and [`BridgeError::Internal`] if the
    /// lock is poisoned.
    pub fn with_entry<R>(&self, id: &str, f: impl FnOnce(&T) -> R) -> Result<R, BridgeError> {
        let guard = self.lock()?;
        let entry = guard
            .get(id)
            .ok_or_else(|| BridgeError::not_found(self.kind, id))?;
        Ok(f(entry))
    }

    /// Mutable variant of [`Registry::with_entry`].
    ///
    /// # Errors
    /// Same as [`Registry::with_entry`].
    pub fn with_entry_mut<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, BridgeError> {
        let mut guard = self.lock()?;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| BridgeError::not_found(self.kind, id))?;
        Ok(f(entry))
    }

    /// Remove the entry after `check` accepts it. Both happen under one lock acquisition so
    /// two racing terminal calls cannot both succeed.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, whatever `check` returns, or `Internal` on poisoning.
    pub fn take_if(
        &self,
        id: &str,
        check: impl FnOnce(&T) -> Result<(), BridgeError>,
    ) -> Result<T, BridgeError> {
        let mut guard = self.lock()?;
        let entry = guard
            .get(id)
            .ok_or_else(|| BridgeError::not_found(self.kind, id))?;
        check(entry)?;
        guard
            .remove(id)
            .ok_or_else(|| BridgeError::not_found(self.kind, id))
    }

    /// Remove an entry. Unknown ids are a no-op returning `Ok(None)`.
    ///
    /// The removed value is returned so the caller drops the native handle after the lock is
    /// released.
    ///
    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn remove(&self, id: &str) -> Result<Option<T>, BridgeError> {
        Ok(self.lock()?.remove(id))
    }

    /// Drain every entry matching `pred`.
    ///
    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn remove_where(
        &self,
        mut pred: impl FnMut(&T) -> bool,
    ) -> Result<Vec<(ResourceId, T)>, BridgeError> {
        let mut guard = self.lock()?;
        let ids: Vec<ResourceId> = guard
            .iter()
            .filter(|(_, entry)| pred(entry))
            .map(|(id, _)| id.clone())
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| guard.remove(&id).map(|entry| (id, entry)))
            .collect())
    }

    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn contains(&self, id: &str) -> Result<bool, BridgeError> {
        Ok(self.lock()?.contains_key(id))
    }

    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, BridgeError> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, BridgeError> {
        Ok(self.lock()?.is_empty())
    }

    /// Snapshot of the live ids.
    ///
    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub fn ids(&self) -> Result<Vec<ResourceId>, BridgeError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// Poison the lock by panicking while it is held. Test hook only.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> Option<()> {
            let _guard = self.entries.lock();
            panic!("poisoning {} registry", self.kind);
        }));
    }
}

impl<T: Owned> Registry<T> {
    /// Look up an entry, verify it belongs to `conn_id`, and project what the caller needs.
    ///
    /// # Errors
    /// `NotFound`, `NotOwner`, or `Internal` on poisoning.
    pub(crate) fn with_owned<R>(
        &self,
        id: &str,
        conn_id: &str,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, BridgeError> {
        let kind = self.kind;
        self.with_entry(id, |entry| {
            if entry.owner() == conn_id {
                Ok(f(entry))
            } else {
                Err(BridgeError::not_owner(kind, id))
            }
        })?
    }

    /// [`Registry::take_if`] with an ownership check.
    ///
    /// # Errors
    /// `NotFound`, `NotOwner`, or `Internal` on poisoning.
    pub(crate) fn take_owned(&self, id: &str, conn_id: &str) -> Result<T, BridgeError> {
        let kind = self.kind;
        self.take_if(id, |entry| {
            if entry.owner() == conn_id {
                Ok(())
            } else {
                Err(BridgeError::not_owner(kind, id))
            }
        })
    }

    /// Remove everything owned by `conn_id`.
    ///
    /// # Errors
    /// Returns [`BridgeError::Internal`] if the lock is poisoned.
    pub(crate) fn remove_owned_by(
        &self,
        conn_id: &str,
    ) -> Result<Vec<(ResourceId, T)>, BridgeError> {
        self.remove_where(|entry| entry.owner() == conn_id)
    }
}
