//! Live roster projection.
//!
//! Composes one top-level subscription on the student collection with one
//! nested profile subscription per record. The projection holds the
//! last-known profile per key and re-emits the whole roster after every
//! change, from either stream. Only records with a profile appear.
//!
//! Ordering is causal per key, not across keys: the roster is "best known
//! state per key so far", never a point-in-time view of the store. A later
//! snapshot for a key simply overwrites the earlier one; there are no
//! sequence numbers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::model::{Profile, StudentKey, StudentRecord};
use crate::store::{CancelHandle, StoreError, StudentStore};

pub type RosterCallback = Arc<dyn Fn(Vec<StudentRecord>) + Send + Sync>;
pub type RosterErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

struct SyncState {
    composed: BTreeMap<StudentKey, StudentRecord>,
    // owned key -> cancel-handle table; this is the single place nested
    // subscriptions live, so add/remove/teardown stay symmetric
    profile_subs: HashMap<StudentKey, CancelHandle>,
    top: Option<CancelHandle>,
}

struct SyncInner {
    alive: AtomicBool,
    on_change: RosterCallback,
    on_error: RosterErrorCallback,
    state: Mutex<SyncState>,
}

/// Active roster subscription. Cancelling (or dropping) tears down the
/// top-level subscription and every nested one; safe to call twice.
pub struct RosterSub {
    inner: Arc<SyncInner>,
}

impl RosterSub {
    pub fn cancel(&self) {
        RosterSync::teardown(&self.inner);
    }
}

impl Drop for RosterSub {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct RosterSync;

impl RosterSync {
    /// Starts the projection. `on_change` receives the full roster after
    /// every mutation (no debouncing; rosters are class-sized). `on_error`
    /// fires at most once, when the top-level subscription fails; the
    /// projection stops afterwards. Nested failures are logged and isolated
    /// to their key.
    pub fn subscribe(
        store: Arc<dyn StudentStore>,
        on_change: RosterCallback,
        on_error: RosterErrorCallback,
    ) -> RosterSub {
        let inner = Arc::new(SyncInner {
            alive: AtomicBool::new(true),
            on_change,
            on_error,
            state: Mutex::new(SyncState {
                composed: BTreeMap::new(),
                profile_subs: HashMap::new(),
                top: None,
            }),
        });

        let keys_inner = inner.clone();
        let keys_store = store.clone();
        let err_inner = inner.clone();
        let top = store.watch_students(
            Arc::new(move |keys| Self::on_keys(&keys_inner, &keys_store, keys)),
            Arc::new(move |error| Self::on_top_error(&err_inner, error)),
        );

        // the registration itself may already have delivered an error and
        // torn us down; only keep the handle while live
        let mut top = Some(top);
        {
            let mut state = inner.state.lock().unwrap();
            if inner.alive.load(Ordering::SeqCst) {
                state.top = top.take();
            }
        }
        if let Some(mut handle) = top {
            handle.cancel();
        }

        RosterSub { inner }
    }

    fn on_keys(inner: &Arc<SyncInner>, store: &Arc<dyn StudentStore>, keys: Vec<StudentKey>) {
        if !inner.alive.load(Ordering::SeqCst) {
            return;
        }
        let current: BTreeSet<StudentKey> = keys.into_iter().collect();

        let (mut departed, removed_any, to_open) = {
            let mut state = inner.state.lock().unwrap();

            let departed_keys: Vec<StudentKey> = state
                .profile_subs
                .keys()
                .filter(|key| !current.contains(*key))
                .cloned()
                .collect();
            let mut departed = Vec::new();
            let mut removed_any = false;
            for key in &departed_keys {
                if let Some(handle) = state.profile_subs.remove(key) {
                    departed.push(handle);
                }
                removed_any |= state.composed.remove(key).is_some();
            }

            let to_open: Vec<StudentKey> = current
                .iter()
                .filter(|key| !state.profile_subs.contains_key(*key))
                .cloned()
                .collect();

            (departed, removed_any, to_open)
        };

        for handle in &mut departed {
            handle.cancel();
        }
        if removed_any {
            Self::emit(inner);
        }

        for key in to_open {
            let snap_inner = inner.clone();
            let snap_key = key.clone();
            let err_key = key.clone();
            // the nested registration delivers the current profile state
            // synchronously, which upserts and emits before we file the
            // handle; the state lock must not be held here
            let mut handle = store.watch_profile(
                &key,
                Arc::new(move |snapshot| Self::on_profile(&snap_inner, &snap_key, snapshot)),
                Arc::new(move |error| {
                    warn!("Profile subscription for {err_key} failed, keeping last-known entry: {error}");
                }),
            );

            let mut state = inner.state.lock().unwrap();
            if inner.alive.load(Ordering::SeqCst) {
                state.profile_subs.insert(key, handle);
            } else {
                drop(state);
                handle.cancel();
            }
        }
    }

    fn on_profile(inner: &Arc<SyncInner>, key: &StudentKey, snapshot: Option<Profile>) {
        if !inner.alive.load(Ordering::SeqCst) {
            return;
        }
        let changed = {
            let mut state = inner.state.lock().unwrap();
            match snapshot {
                Some(profile) => {
                    state.composed.insert(
                        key.clone(),
                        StudentRecord {
                            key: key.clone(),
                            profile,
                        },
                    );
                    true
                }
                // only confirmed absence deletes; deleting nothing is not a
                // mutation and emits nothing
                None => state.composed.remove(key).is_some(),
            }
        };
        if changed {
            Self::emit(inner);
        }
    }

    fn on_top_error(inner: &Arc<SyncInner>, error: StoreError) {
        if !inner.alive.load(Ordering::SeqCst) {
            return;
        }
        Self::teardown(inner);
        (inner.on_error)(error);
    }

    fn emit(inner: &Arc<SyncInner>) {
        if !inner.alive.load(Ordering::SeqCst) {
            return;
        }
        // snapshot under the lock, call out without it
        let roster: Vec<StudentRecord> = {
            let state = inner.state.lock().unwrap();
            state.composed.values().cloned().collect()
        };
        (inner.on_change)(roster);
    }

    fn teardown(inner: &Arc<SyncInner>) {
        if !inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        let (top, profile_subs) = {
            let mut state = inner.state.lock().unwrap();
            (state.top.take(), std::mem::take(&mut state.profile_subs))
        };
        if let Some(mut handle) = top {
            handle.cancel();
        }
        for (_, mut handle) in profile_subs {
            handle.cancel();
        }
    }
}
