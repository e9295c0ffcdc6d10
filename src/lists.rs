use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::Backend;
use crate::error::{Error, StoreError};
use crate::live::LiveValue;
use crate::models::{
    from_documents, list_fields, now_millis, Identity, ShoppingList, FIELD_CREATED_AT,
    FIELD_USER_ID, LISTS,
};
use crate::query::{Direction, Query};

/// `lists where userId == owner order by createdAt desc`
pub fn lists_query(owner: &Identity) -> Query {
    Query::new(LISTS)
        .where_eq(FIELD_USER_ID, owner.uid.as_str())
        .order_by(FIELD_CREATED_AT, Direction::Desc)
}

/// Live, newest-first lists of the signed-in identity.
pub struct ListStore {
    backend: Arc<dyn Backend>,
    owner: Mutex<Option<Identity>>,
    lists: LiveValue<Vec<ShoppingList>>,
}

impl ListStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            owner: Mutex::new(None),
            lists: LiveValue::new(),
        }
    }

    /// Scope the store to `owner`, replacing any previous subscription.
    pub fn bind(&self, owner: &Identity) -> Result<(), StoreError> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(owner.clone());
        self.lists
            .bind(&*self.backend, lists_query(owner), |docs| from_documents(docs))
    }

    pub fn unbind(&self) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.lists.unbind();
    }

    pub fn owner(&self) -> Option<Identity> {
        self.owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lists(&self) -> Vec<ShoppingList> {
        self.lists.get()
    }

    pub fn find(&self, list_id: &str) -> Option<ShoppingList> {
        self.lists
            .with(|lists| lists.iter().find(|l| l.id == list_id).cloned())
    }

    /// Create a list named `name` (trimmed). Blank names are ignored and
    /// return `Ok(None)`. The new list shows up through the live
    /// subscription, not by local insertion.
    pub async fn create_list(&self, name: &str) -> Result<Option<String>, Error> {
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!("ignoring list with blank name");
            return Ok(None);
        }
        let owner = self.owner().ok_or(Error::NotSignedIn)?;

        let id = self
            .backend
            .insert(LISTS, list_fields(&owner, name, now_millis()))
            .await?;
        tracing::info!(list_id = %id, "created list");
        Ok(Some(id))
    }
}
