//! Document store seam.
//!
//! The portal reads students from a managed document database: a top-level
//! collection of records, each with one fixed-name nested profile document.
//! Everything above this module consumes the [`StudentStore`] trait and is
//! handed an implementation at construction time, so the resolver and the
//! roster projection test without a live backend.
//!
//! Deliveries are push-based callbacks. Registration and cancellation return
//! immediately; snapshots arrive on the store's own schedule, including one
//! initial snapshot at registration.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Profile, StudentKey};

pub type KeysCallback = Arc<dyn Fn(Vec<StudentKey>) + Send + Sync>;
pub type ProfileCallback = Arc<dyn Fn(Option<Profile>) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store is not configured")]
    Unavailable,

    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("subscription failed: {0}")]
    Subscription(String),
}

/// Owned cancellation guard for one subscription. Cancelling is synchronous
/// and idempotent; deliveries already queued by the store may still arrive
/// and are the consumer's to ignore.
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// One-shot enumeration of every record key in the top-level collection.
    async fn student_keys(&self) -> Result<Vec<StudentKey>, StoreError>;

    /// One-shot read of the nested profile document under `key`.
    async fn profile(&self, key: &StudentKey) -> Result<Option<Profile>, StoreError>;

    /// Live subscription to the top-level key set. Delivers the full current
    /// set at registration and after every membership change.
    fn watch_students(&self, on_snapshot: KeysCallback, on_error: ErrorCallback) -> CancelHandle;

    /// Live subscription to one nested profile document. Delivers its
    /// current state at registration and on every change; `None` means the
    /// profile is confirmed absent.
    fn watch_profile(
        &self,
        key: &StudentKey,
        on_snapshot: ProfileCallback,
        on_error: ErrorCallback,
    ) -> CancelHandle;
}

struct ProfileWatcher {
    key: StudentKey,
    on_snapshot: ProfileCallback,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct MemoryInner {
    records: BTreeSet<StudentKey>,
    profiles: BTreeMap<StudentKey, Profile>,
    next_key: u64,
    next_watcher: u64,
    key_watchers: HashMap<u64, (KeysCallback, ErrorCallback)>,
    profile_watchers: HashMap<u64, ProfileWatcher>,
    fail_reads: bool,
}

/// In-process store. Mutations dispatch snapshots to live subscribers on the
/// caller's thread, which keeps the tests and the tester bin deterministic.
///
/// Callbacks are always invoked with the internal lock released, so a
/// subscriber may call back into the store (the roster projection does, to
/// open nested subscriptions from inside a key-set snapshot).
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh opaque key, inserts the record and its profile.
    pub fn create_student(&self, profile: Profile) -> StudentKey {
        let key = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_key += 1;
            StudentKey::new(format!("stu-{:06}", inner.next_key))
        };
        self.put_student(key.clone());
        self.put_profile(key.clone(), profile);
        key
    }

    pub fn put_student(&self, key: StudentKey) {
        let notify = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.records.insert(key) {
                return;
            }
            Self::keys_notification(&inner)
        };
        for (on_snapshot, keys) in notify {
            on_snapshot(keys);
        }
    }

    pub fn remove_student(&self, key: &StudentKey) {
        let notify = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.records.remove(key) {
                return;
            }
            Self::keys_notification(&inner)
        };
        for (on_snapshot, keys) in notify {
            on_snapshot(keys);
        }
    }

    pub fn put_profile(&self, key: StudentKey, profile: Profile) {
        let notify = {
            let mut inner = self.inner.lock().unwrap();
            inner.profiles.insert(key.clone(), profile.clone());
            Self::profile_notification(&inner, &key)
        };
        for on_snapshot in notify {
            on_snapshot(Some(profile.clone()));
        }
    }

    pub fn remove_profile(&self, key: &StudentKey) {
        let notify = {
            let mut inner = self.inner.lock().unwrap();
            if inner.profiles.remove(key).is_none() {
                return;
            }
            Self::profile_notification(&inner, key)
        };
        for on_snapshot in notify {
            on_snapshot(None);
        }
    }

    pub fn has_student(&self, key: &StudentKey) -> bool {
        self.inner.lock().unwrap().records.contains(key)
    }

    /// Test support: make the one-shot reads fail until cleared.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reads = fail;
    }

    /// Test support: deliver a mid-stream error on the top-level stream.
    pub fn emit_students_error(&self, error: StoreError) {
        let watchers: Vec<ErrorCallback> = {
            let inner = self.inner.lock().unwrap();
            inner
                .key_watchers
                .values()
                .map(|(_, on_error)| on_error.clone())
                .collect()
        };
        for on_error in watchers {
            on_error(error.clone());
        }
    }

    /// Test support: deliver a mid-stream error on one profile stream.
    pub fn emit_profile_error(&self, key: &StudentKey, error: StoreError) {
        let watchers: Vec<ErrorCallback> = {
            let inner = self.inner.lock().unwrap();
            inner
                .profile_watchers
                .values()
                .filter(|w| &w.key == key)
                .map(|w| w.on_error.clone())
                .collect()
        };
        for on_error in watchers {
            on_error(error.clone());
        }
    }

    fn keys_notification(inner: &MemoryInner) -> Vec<(KeysCallback, Vec<StudentKey>)> {
        let keys: Vec<StudentKey> = inner.records.iter().cloned().collect();
        inner
            .key_watchers
            .values()
            .map(|(on_snapshot, _)| (on_snapshot.clone(), keys.clone()))
            .collect()
    }

    fn profile_notification(inner: &MemoryInner, key: &StudentKey) -> Vec<ProfileCallback> {
        inner
            .profile_watchers
            .values()
            .filter(|w| &w.key == key)
            .map(|w| w.on_snapshot.clone())
            .collect()
    }

    fn deregister_keys(inner: &Weak<Mutex<MemoryInner>>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.lock().unwrap().key_watchers.remove(&id);
        }
    }

    fn deregister_profile(inner: &Weak<Mutex<MemoryInner>>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.lock().unwrap().profile_watchers.remove(&id);
        }
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn student_keys(&self) -> Result<Vec<StudentKey>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads {
            return Err(StoreError::Read("injected read failure".into()));
        }
        Ok(inner.records.iter().cloned().collect())
    }

    async fn profile(&self, key: &StudentKey) -> Result<Option<Profile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads {
            return Err(StoreError::Read("injected read failure".into()));
        }
        Ok(inner.profiles.get(key).cloned())
    }

    fn watch_students(&self, on_snapshot: KeysCallback, on_error: ErrorCallback) -> CancelHandle {
        let (id, keys) = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_watcher += 1;
            let id = inner.next_watcher;
            inner
                .key_watchers
                .insert(id, (on_snapshot.clone(), on_error));
            (id, inner.records.iter().cloned().collect::<Vec<_>>())
        };
        on_snapshot(keys);

        let inner = Arc::downgrade(&self.inner);
        CancelHandle::new(move || Self::deregister_keys(&inner, id))
    }

    fn watch_profile(
        &self,
        key: &StudentKey,
        on_snapshot: ProfileCallback,
        on_error: ErrorCallback,
    ) -> CancelHandle {
        let (id, current) = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_watcher += 1;
            let id = inner.next_watcher;
            inner.profile_watchers.insert(
                id,
                ProfileWatcher {
                    key: key.clone(),
                    on_snapshot: on_snapshot.clone(),
                    on_error,
                },
            );
            (id, inner.profiles.get(key).cloned())
        };
        on_snapshot(current);

        let inner = Arc::downgrade(&self.inner);
        CancelHandle::new(move || Self::deregister_profile(&inner, id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::Profile;

    fn profile(name: &str) -> Profile {
        Profile {
            full_name: name.to_string(),
            ..Profile::default()
        }
    }

    #[test]
    fn test_watch_students_delivers_initial_and_changes() {
        let store = MemoryStore::new();
        store.put_student(StudentKey::from("a"));

        let seen: Arc<Mutex<Vec<Vec<StudentKey>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = store.watch_students(
            Arc::new(move |keys| sink.lock().unwrap().push(keys)),
            Arc::new(|_| panic!("no error expected")),
        );

        store.put_student(StudentKey::from("b"));
        store.remove_student(&StudentKey::from("a"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], vec![StudentKey::from("a")]);
        assert_eq!(seen[2], vec![StudentKey::from("b")]);
    }

    #[test]
    fn test_cancel_stops_deliveries() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        let mut handle = store.watch_students(
            Arc::new(move |_| *sink.lock().unwrap() += 1),
            Arc::new(|_| {}),
        );

        store.put_student(StudentKey::from("a"));
        handle.cancel();
        handle.cancel();
        store.put_student(StudentKey::from("b"));

        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_watch_profile_sees_upsert_and_removal() {
        let store = MemoryStore::new();
        let key = StudentKey::from("a");
        let seen: Arc<Mutex<Vec<Option<Profile>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = store.watch_profile(
            &key,
            Arc::new(move |snapshot| sink.lock().unwrap().push(snapshot)),
            Arc::new(|_| {}),
        );

        store.put_profile(key.clone(), profile("Ana"));
        store.remove_profile(&key);
        // removing an absent profile is not a change
        store.remove_profile(&key);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_ref().map(|p| p.full_name.as_str()), Some("Ana"));
        assert_eq!(seen[2], None);
    }

    #[test]
    fn test_dropped_handle_deregisters() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        {
            let _handle = store.watch_students(
                Arc::new(move |_| *sink.lock().unwrap() += 1),
                Arc::new(|_| {}),
            );
        }
        store.put_student(StudentKey::from("a"));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_one_shot_reads() {
        let store = MemoryStore::new();
        let key = store.create_student(profile("Ana"));

        assert_eq!(store.student_keys().await.unwrap(), vec![key.clone()]);
        let read = store.profile(&key).await.unwrap().unwrap();
        assert_eq!(read.full_name, "Ana");
        assert_eq!(store.profile(&StudentKey::from("nope")).await.unwrap(), None);

        store.set_fail_reads(true);
        assert!(store.student_keys().await.is_err());
    }
}
