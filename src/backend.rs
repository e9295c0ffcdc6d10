//! The backend primitives the rest of the crate depends on: authentication
//! with session notifications, and a document store with live queries.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{AuthError, StoreError};
use crate::live::{Listener, Subscription};
use crate::models::Identity;
use crate::query::Query;
use crate::storage::Document;

/// Receives the current identity, or `None` when signed out.
pub type SessionListener = Listener<Option<Identity>>;

/// Receives the full set of documents matching a query.
pub type SnapshotListener = Listener<[Document]>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), StoreError>;

    /// Deliver the current session state immediately, then again on every
    /// change until the subscription is cancelled.
    fn observe_session(&self, listener: SessionListener) -> Subscription;

    /// Insert a document with an autogenerated id and return the id.
    async fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Deliver the matching documents immediately, then a full snapshot after
    /// every write to the query's collection.
    fn observe_query(&self, query: Query, listener: SnapshotListener) -> Result<Subscription, StoreError>;
}
