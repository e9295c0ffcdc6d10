//! Embedded backend: sled storage, bcrypt password hashes and a signed session
//! token that survives restarts.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::{
    create_session_token, hash_password, normalize_email, validate_session_token, verify_password,
    UserRecord, MIN_PASSWORD_LEN,
};
use crate::backend::{Backend, SessionListener, SnapshotListener};
use crate::config::Config;
use crate::error::{AuthError, StoreError};
use crate::live::{Registry, Subscription};
use crate::models::Identity;
use crate::query::Query;
use crate::storage::{Document, Storage};

pub struct LocalBackend {
    storage: Storage,
    session_secret: String,
    session_ttl_secs: u64,
    bcrypt_cost: u32,
    session: Mutex<Option<Identity>>,
    session_listeners: Arc<Registry<(), Option<Identity>>>,
    queries: Arc<Registry<Query, [Document]>>,
}

impl LocalBackend {
    /// Open the database under `config.data_dir`.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        Self::new(Storage::open(&config.data_dir)?, config)
    }

    /// Wrap an opened storage, resolving any persisted session.
    pub fn new(storage: Storage, config: &Config) -> Result<Self, StoreError> {
        let session = match storage.session_token()? {
            Some(token) => match validate_session_token(&token, &config.session_secret) {
                Ok(identity) => {
                    tracing::info!(uid = %identity.uid, "restored persisted session");
                    Some(identity)
                }
                Err(err) => {
                    tracing::info!(%err, "discarding persisted session");
                    storage.set_session_token(None)?;
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            storage,
            session_secret: config.session_secret.clone(),
            session_ttl_secs: config.session_ttl_secs,
            bcrypt_cost: config.bcrypt_cost,
            session: Mutex::new(session),
            session_listeners: Registry::new(),
            queries: Registry::new(),
        })
    }

    fn current_session(&self) -> Option<Identity> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, identity: Option<Identity>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = identity.clone();
        for (_, listener) in self.session_listeners.matching(|_| true) {
            listener(&identity);
        }
    }

    fn start_session(&self, identity: &Identity) -> Result<(), StoreError> {
        let token = create_session_token(identity, &self.session_secret, self.session_ttl_secs)?;
        self.storage.set_session_token(Some(&token))?;
        self.set_session(Some(identity.clone()));
        Ok(())
    }

    /// Re-run every live query on `collection` and deliver the new snapshots.
    fn notify(&self, collection: &str) {
        for (query, listener) in self.queries.matching(|q| q.collection == collection) {
            match self.storage.query(&query) {
                Ok(docs) => listener(&docs),
                Err(err) => tracing::error!(%err, collection, "failed to refresh live query"),
            }
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[async_trait]
impl Backend for LocalBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let user = self
            .storage
            .get_user(&email)?
            .ok_or(AuthError::UserNotFound)?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        if !blocking(move || verify_password(&password, &hash)).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let identity = user.identity();
        self.start_session(&identity)?;
        tracing::info!(uid = %identity.uid, "signed in");
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AuthError::Unknown(format!("invalid email {email:?}")));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        if self.storage.get_user(&email)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = blocking(move || hash_password(&password, cost)).await?;
        let user = UserRecord {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            password_hash,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        if !self.storage.create_user(&user)? {
            return Err(AuthError::EmailInUse);
        }

        let identity = user.identity();
        self.start_session(&identity)?;
        tracing::info!(uid = %identity.uid, "signed up");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.set_session(None);
        self.storage.set_session_token(None)
    }

    fn observe_session(&self, listener: SessionListener) -> Subscription {
        let subscription = self.session_listeners.register((), Arc::clone(&listener));
        listener(&self.current_session());
        subscription
    }

    async fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError> {
        let doc = self.storage.insert_doc(collection, fields)?;
        self.notify(collection);
        Ok(doc.id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.storage.get_doc(collection, id)
    }

    fn observe_query(&self, query: Query, listener: SnapshotListener) -> Result<Subscription, StoreError> {
        let initial = self.storage.query(&query)?;
        let subscription = self.queries.register(query, Arc::clone(&listener));
        listener(&initial);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::test_support::test_config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backend() -> LocalBackend {
        LocalBackend::new(Storage::temporary().unwrap(), &test_config()).unwrap()
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let backend = backend();
        let created = backend.sign_up(" Ana@Example.com ", "secreto").await.unwrap();
        assert_eq!(created.email, "ana@example.com");

        backend.sign_out().await.unwrap();
        let signed_in = backend.sign_in("ana@example.com", "secreto").await.unwrap();
        assert_eq!(signed_in, created);
    }

    #[tokio::test]
    async fn auth_failures_are_classified() {
        let backend = backend();
        assert_eq!(
            backend.sign_in("nobody@example.com", "whatever").await,
            Err(AuthError::UserNotFound)
        );
        assert_eq!(
            backend.sign_up("ana@example.com", "12345").await,
            Err(AuthError::WeakPassword)
        );
        assert!(matches!(
            backend.sign_up("not-an-email", "secreto").await,
            Err(AuthError::Unknown(_))
        ));

        backend.sign_up("ana@example.com", "secreto").await.unwrap();
        assert_eq!(
            backend.sign_up("ANA@example.com", "secreto2").await,
            Err(AuthError::EmailInUse)
        );
        assert_eq!(
            backend.sign_in("ana@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn session_listener_sees_initial_state_and_changes() {
        let backend = backend();
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let sub = backend.observe_session(Arc::new(move |identity: &Option<Identity>| {
            sink.lock().unwrap().push(identity.as_ref().map(|i| i.email.clone()));
        }));

        backend.sign_up("ana@example.com", "secreto").await.unwrap();
        backend.sign_out().await.unwrap();
        sub.cancel();
        backend.sign_in("ana@example.com", "secreto").await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("ana@example.com".to_string()), None]
        );
    }

    #[tokio::test]
    async fn live_query_delivers_full_snapshots() {
        let backend = backend();
        let sizes: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&sizes);
        let sub = backend
            .observe_query(
                Query::new("lists").where_eq("userId", "u1"),
                Arc::new(move |docs: &[Document]| sink.lock().unwrap().push(docs.len())),
            )
            .unwrap();

        let fields = |owner: &str| json!({"userId": owner}).as_object().cloned().unwrap();
        backend.insert("lists", fields("u1")).await.unwrap();
        backend.insert("lists", fields("u2")).await.unwrap();
        backend.insert("products", fields("u1")).await.unwrap();
        backend.insert("lists", fields("u1")).await.unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 1, 2]);
        drop(sub);
        backend.insert("lists", fields("u1")).await.unwrap();
        assert_eq!(sizes.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn persisted_session_is_restored_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..test_config()
        };
        let identity = {
            let backend = LocalBackend::open(&config).unwrap();
            backend.sign_up("ana@example.com", "secreto").await.unwrap()
        };

        let backend = LocalBackend::open(&config).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let expected = identity.clone();
        let _sub = backend.observe_session(Arc::new(move |current: &Option<Identity>| {
            assert_eq!(current.as_ref(), Some(&expected));
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_signed_with_another_secret_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..test_config()
        };
        {
            let backend = LocalBackend::open(&config).unwrap();
            backend.sign_up("ana@example.com", "secreto").await.unwrap();
        }

        let rotated = Config {
            session_secret: "rotated".to_string(),
            ..config
        };
        let backend = LocalBackend::open(&rotated).unwrap();
        assert!(backend.current_session().is_none());
    }
}
