//! Resource lock registry keyed by [`SyncKey`].
//!
//! Each key maps to a slot holding the current holder and a FIFO queue of
//! waiters. Release hands the slot directly to the oldest waiter, so no
//! later arrival can barge in front of a job that has been waiting. A key
//! with no holder and no waiters is removed from the map.
//!
//! Acquisition is cancel safe: dropping an in-flight [`acquire`] future
//! (timeout, `select!`) either removes its queue entry or, if the slot was
//! handed over in the meantime, passes it on to the next waiter.
//!
//! The map is guarded by a [`parking_lot::Mutex`] that is never held across
//! an `.await`.
//!
//! [`acquire`]: ResourceLockRegistry::acquire

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::types::job::JobId;
use crate::types::key::SyncKey;

#[derive(Debug, Clone, Copy)]
struct Holder {
    ticket: u64,
    job_id: JobId,
}

#[derive(Debug)]
struct Waiter {
    holder: Holder,
    grant: oneshot::Sender<()>,
}

#[derive(Debug)]
struct Slot {
    holder: Holder,
    waiters: VecDeque<Waiter>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Mutex<HashMap<SyncKey, Slot>>,
    next_ticket: AtomicU64,
}

impl Inner {
    /// Releases `ticket`'s hold on `key`, granting the slot to the next live waiter.
    fn release(&self, key: &SyncKey, ticket: u64) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        if slot.holder.ticket != ticket {
            return;
        }
        while let Some(waiter) = slot.waiters.pop_front() {
            slot.holder = waiter.holder;
            if waiter.grant.send(()).is_ok() {
                tracing::trace!(%key, job_id = %waiter.holder.job_id, "lock handed off");
                return;
            }
            // Receiver already dropped; its cleanup finds nothing to undo.
        }
        slots.remove(key);
        tracing::trace!(%key, "lock slot released");
    }

    /// Undoes a waiter that gave up before (or just after) being granted.
    fn abandon(&self, key: &SyncKey, ticket: u64) {
        let granted = {
            let mut slots = self.slots.lock();
            match slots.get_mut(key) {
                Some(slot) if slot.holder.ticket == ticket => true,
                Some(slot) => {
                    slot.waiters.retain(|w| w.holder.ticket != ticket);
                    false
                },
                None => false,
            }
        };
        if granted {
            self.release(key, ticket);
        }
    }
}

/// Maps `(resource-kind, resource-id)` keys to mutual-exclusion slots.
///
/// Cloning is cheap and yields a handle to the same registry. Construct one
/// per engine instance; nothing here is global.
///
/// # Examples
///
/// ```
/// use jobsync::{JobId, ResourceLockRegistry, SyncKey};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let registry = ResourceLockRegistry::new();
/// let key = SyncKey::new("lb", "42");
/// let job = JobId::new();
///
/// let guard = registry.acquire(&key, job).await;
/// assert_eq!(registry.holder(&key), Some(job));
/// guard.release();
/// assert!(!registry.is_locked(&key));
/// assert!(registry.is_empty());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceLockRegistry {
    inner: Arc<Inner>,
}

impl ResourceLockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `job_id` holds `key`, in FIFO order among waiters.
    ///
    /// The returned guard releases the slot when dropped.
    pub async fn acquire(&self, key: &SyncKey, job_id: JobId) -> LockGuard {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let holder = Holder { ticket, job_id };

        let grant = {
            let mut slots = self.inner.slots.lock();
            match slots.entry(key.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot {
                        holder,
                        waiters: VecDeque::new(),
                    });
                    None
                },
                Entry::Occupied(mut occupied) => {
                    let (tx, rx) = oneshot::channel();
                    occupied.get_mut().waiters.push_back(Waiter { holder, grant: tx });
                    Some(rx)
                },
            }
        };

        if let Some(grant) = grant {
            tracing::debug!(%key, %job_id, "waiting for contended lock");
            let pending = PendingGrant {
                inner: Arc::clone(&self.inner),
                key,
                ticket,
                armed: true,
            };
            // The sender is only dropped after a send or once the slot is gone,
            // and the slot outlives every queued waiter.
            let _ = grant.await;
            pending.disarm();
        }

        tracing::debug!(%key, %job_id, "lock granted");
        LockGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            ticket,
            job_id,
        }
    }

    /// The job currently holding `key`, if any.
    pub fn holder(&self, key: &SyncKey) -> Option<JobId> {
        self.inner
            .slots
            .lock()
            .get(key)
            .map(|slot| slot.holder.job_id)
    }

    /// Returns `true` if some job holds `key`.
    pub fn is_locked(&self, key: &SyncKey) -> bool {
        self.inner.slots.lock().contains_key(key)
    }

    /// Number of jobs queued behind the holder of `key`.
    pub fn waiters(&self, key: &SyncKey) -> usize {
        self.inner
            .slots
            .lock()
            .get(key)
            .map_or(0, |slot| slot.waiters.len())
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Returns `true` if no key is held.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }
}

/// Cleans up a queued waiter whose `acquire` future is dropped mid-wait.
struct PendingGrant<'a> {
    inner: Arc<Inner>,
    key: &'a SyncKey,
    ticket: u64,
    armed: bool,
}

impl PendingGrant<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon(self.key, self.ticket);
        }
    }
}

/// Exclusive hold on one [`SyncKey`]. Released exactly once, on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    inner: Arc<Inner>,
    key: SyncKey,
    ticket: u64,
    job_id: JobId,
}

impl LockGuard {
    /// The key this guard holds.
    pub fn key(&self) -> &SyncKey {
        &self.key
    }

    /// The job holding the key.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Releases the key now. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.inner.release(&self.key, self.ticket);
    }
}
