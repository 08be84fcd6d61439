//! Multi-account resolution.
//!
//! One signed-in identity may map to several student records (siblings
//! enrolled under one guardian email), so login discovers every record whose
//! profile email matches and picks which one is active. The pick is
//! remembered in the selection store; a remembered key that no longer
//! matches is ignored, never deleted.
//!
//! Resolution is an O(N) fan-out of one-shot reads over the whole
//! collection. That is fine here: account counts are class-sized and this
//! runs once per session, not per render.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::{AccountSummary, StudentKey};
use crate::store::{StoreError, StudentStore};

/// Durable storage for the chosen account per identity. The server backs
/// this with a Redis hash; tests and the default wiring use
/// [`MemorySelections`].
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn get(&self, identity: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, identity: &str, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct MemorySelections {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySelections {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SelectionStore for MemorySelections {
    async fn get(&self, identity: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().get(identity).cloned())
    }

    async fn set(&self, identity: &str, key: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .insert(identity.to_string(), key.to_string());
        Ok(())
    }
}

/// The signed-in user as the auth provider hands them over.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    /// Store-assigned key of the signed-in user. Legacy accounts use it
    /// directly as their student key.
    pub uid: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }

    fn folded_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum AccountError {
    #[error("{0} is not one of this identity's accounts")]
    UnknownAccount(StudentKey),
}

/// Result of one resolution: the matching accounts in store enumeration
/// order, the active key, and whether the chooser must be shown.
#[derive(Clone, Debug)]
pub struct AccountSession {
    pub identity: Identity,
    pub accounts: Vec<AccountSummary>,
    pub active: StudentKey,
    pub needs_choice: bool,
}

pub struct AccountResolver {
    store: Arc<dyn StudentStore>,
    selections: Arc<dyn SelectionStore>,
}

impl AccountResolver {
    pub fn new(store: Arc<dyn StudentStore>, selections: Arc<dyn SelectionStore>) -> Self {
        Self { store, selections }
    }

    /// Discovers the identity's accounts and picks the active one.
    ///
    /// Never fails: any read error degrades to the identity's own key so the
    /// UI is never stuck waiting on resolution.
    pub async fn resolve(&self, identity: &Identity) -> AccountSession {
        let Some(email) = identity.folded_email() else {
            return Self::fallback(identity);
        };

        let keys = match self.store.student_keys().await {
            Ok(keys) => keys,
            Err(error) => {
                warn!("Account resolution failed, using the identity key: {error}");
                return Self::fallback(identity);
            }
        };

        let mut matches = Vec::new();
        for key in keys {
            let profile = match self.store.profile(&key).await {
                Ok(profile) => profile,
                Err(error) => {
                    warn!("Account resolution failed, using the identity key: {error}");
                    return Self::fallback(identity);
                }
            };
            let Some(profile) = profile else { continue };
            if profile.email.as_deref().map(|e| e.trim().to_lowercase()) == Some(email.clone()) {
                matches.push(AccountSummary {
                    key,
                    full_name: profile.full_name,
                    email: profile.email,
                });
            }
        }

        let (active, needs_choice) = match matches.as_slice() {
            // legacy self-keyed account: the uid doubles as the student key
            [] => (StudentKey::new(identity.uid.clone()), false),
            [only] => (only.key.clone(), false),
            many => {
                let persisted = match self.selections.get(&email).await {
                    Ok(persisted) => persisted.map(StudentKey::new),
                    Err(error) => {
                        warn!("Could not read the persisted account selection: {error}");
                        None
                    }
                };
                match persisted.filter(|key| many.iter().any(|a| &a.key == key)) {
                    Some(key) => (key, false),
                    // first multi-account login, or a stale selection:
                    // default to the first match and surface the chooser.
                    // The selection itself is only written on an explicit
                    // switch, a stale one stays put until then.
                    None => (many[0].key.clone(), true),
                }
            }
        };

        AccountSession {
            identity: identity.clone(),
            accounts: matches,
            active,
            needs_choice,
        }
    }

    /// Switches the active account to `key` and persists the choice.
    ///
    /// `key` is only checked against the session's last-resolved accounts,
    /// not against the store.
    pub async fn switch(
        &self,
        session: &mut AccountSession,
        key: StudentKey,
    ) -> Result<(), AccountError> {
        if !session.accounts.iter().any(|a| a.key == key) {
            return Err(AccountError::UnknownAccount(key));
        }

        let identity = session
            .identity
            .folded_email()
            .unwrap_or_else(|| session.identity.uid.clone());
        if let Err(error) = self.selections.set(&identity, key.as_str()).await {
            warn!("Could not persist the account selection: {error}");
        }

        session.active = key;
        session.needs_choice = false;
        Ok(())
    }

    fn fallback(identity: &Identity) -> AccountSession {
        AccountSession {
            identity: identity.clone(),
            accounts: Vec::new(),
            active: StudentKey::new(identity.uid.clone()),
            needs_choice: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;
    use crate::store::MemoryStore;

    fn student(store: &MemoryStore, key: &str, name: &str, email: &str) {
        let key = StudentKey::from(key);
        store.put_student(key.clone());
        store.put_profile(
            key,
            Profile {
                full_name: name.to_string(),
                email: Some(email.to_string()),
                ..Profile::default()
            },
        );
    }

    fn resolver(store: &MemoryStore) -> (AccountResolver, Arc<MemorySelections>) {
        let selections = Arc::new(MemorySelections::new());
        (
            AccountResolver::new(Arc::new(store.clone()), selections.clone()),
            selections,
        )
    }

    fn guardian() -> Identity {
        Identity::new("uid-1", Some("guardian@gmail.com".to_string()))
    }

    #[tokio::test]
    async fn test_single_match_is_active_without_prompt() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        student(&store, "b", "Bia", "someone@else.com");
        let (resolver, _) = resolver(&store);

        let session = resolver.resolve(&guardian()).await;

        assert_eq!(session.active, StudentKey::from("a"));
        assert_eq!(session.accounts.len(), 1);
        assert!(!session.needs_choice);
    }

    #[tokio::test]
    async fn test_email_match_is_case_folded() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "Guardian@GMAIL.com ");
        let (resolver, _) = resolver(&store);

        let identity = Identity::new("uid-1", Some(" GUARDIAN@gmail.com".to_string()));
        let session = resolver.resolve(&identity).await;

        assert_eq!(session.active, StudentKey::from("a"));
    }

    #[tokio::test]
    async fn test_zero_matches_falls_back_to_identity_key() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "someone@else.com");
        let (resolver, _) = resolver(&store);

        let session = resolver.resolve(&guardian()).await;

        assert_eq!(session.active, StudentKey::from("uid-1"));
        assert!(session.accounts.is_empty());
        assert!(!session.needs_choice);
    }

    #[tokio::test]
    async fn test_missing_email_falls_back_to_identity_key() {
        let store = MemoryStore::new();
        let (resolver, _) = resolver(&store);

        let session = resolver.resolve(&Identity::new("uid-1", None)).await;

        assert_eq!(session.active, StudentKey::from("uid-1"));
    }

    #[tokio::test]
    async fn test_multi_match_with_stale_selection_prompts() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        student(&store, "b", "Bia", "guardian@gmail.com");
        let (resolver, selections) = resolver(&store);
        // remembered key points at a record that no longer matches
        selections.set("guardian@gmail.com", "gone").await.unwrap();

        let session = resolver.resolve(&guardian()).await;

        assert_eq!(session.active, StudentKey::from("a"));
        assert_eq!(session.accounts.len(), 2);
        assert!(session.needs_choice);
        // revalidated, not purged
        assert_eq!(
            selections.get("guardian@gmail.com").await.unwrap(),
            Some("gone".to_string())
        );
    }

    #[tokio::test]
    async fn test_multi_match_with_valid_selection_is_silent() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        student(&store, "b", "Bia", "guardian@gmail.com");
        let (resolver, selections) = resolver(&store);
        selections.set("guardian@gmail.com", "b").await.unwrap();

        let session = resolver.resolve(&guardian()).await;

        assert_eq!(session.active, StudentKey::from("b"));
        assert!(!session.needs_choice);
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_identity_key() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        store.set_fail_reads(true);
        let (resolver, _) = resolver(&store);

        let session = resolver.resolve(&guardian()).await;

        assert_eq!(session.active, StudentKey::from("uid-1"));
        assert!(session.accounts.is_empty());
        assert!(!session.needs_choice);
    }

    #[tokio::test]
    async fn test_switch_persists_and_clears_prompt() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        student(&store, "b", "Bia", "guardian@gmail.com");
        let (resolver, selections) = resolver(&store);

        let mut session = resolver.resolve(&guardian()).await;
        assert!(session.needs_choice);

        resolver
            .switch(&mut session, StudentKey::from("b"))
            .await
            .unwrap();

        assert_eq!(session.active, StudentKey::from("b"));
        assert!(!session.needs_choice);
        assert_eq!(
            selections.get("guardian@gmail.com").await.unwrap(),
            Some("b".to_string())
        );

        // the persisted pick holds on the next login
        let next = resolver.resolve(&guardian()).await;
        assert_eq!(next.active, StudentKey::from("b"));
        assert!(!next.needs_choice);
    }

    #[tokio::test]
    async fn test_switch_to_unknown_key_is_rejected() {
        let store = MemoryStore::new();
        student(&store, "a", "Ana", "guardian@gmail.com");
        student(&store, "b", "Bia", "guardian@gmail.com");
        let (resolver, _) = resolver(&store);

        let mut session = resolver.resolve(&guardian()).await;
        let active = session.active.clone();

        let result = resolver.switch(&mut session, StudentKey::from("gone")).await;

        assert_eq!(
            result,
            Err(AccountError::UnknownAccount(StudentKey::from("gone")))
        );
        assert_eq!(session.active, active);
    }
}
