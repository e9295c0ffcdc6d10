use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sled::{Db, Tree};
use uuid::Uuid;

use crate::auth::UserRecord;
use crate::error::StoreError;
use crate::query::Query;

const SESSION_KEY: &[u8] = b"current";

/// A stored document: an autogenerated id plus schema-flexible JSON fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Sled-backed document store.
///
/// Each collection lives in its own tree keyed by a monotonic sequence number,
/// so a scan yields documents in insertion order. A second tree per
/// collection maps document ids to sequence keys for point lookups.
#[derive(Clone)]
pub struct Storage {
    db: Db,
    users: Tree,
    session: Tree,
}

impl Storage {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let users = db.open_tree("users")?;
        let session = db.open_tree("session")?;
        Ok(Self { db, users, session })
    }

    fn collection(&self, name: &str) -> Result<(Tree, Tree), StoreError> {
        let docs = self.db.open_tree(format!("docs:{name}"))?;
        let ids = self.db.open_tree(format!("ids:{name}"))?;
        Ok((docs, ids))
    }

    /// Insert a document with an autogenerated id.
    pub fn insert_doc(&self, collection: &str, fields: Map<String, Value>) -> Result<Document, StoreError> {
        let (docs, ids) = self.collection(collection)?;
        let doc = Document {
            id: Uuid::new_v4().simple().to_string(),
            fields,
        };
        let key = self.db.generate_id()?.to_be_bytes();

        docs.insert(key, serde_json::to_vec(&doc)?)?;
        ids.insert(doc.id.as_bytes(), key.to_vec())?;
        self.db.flush()?;

        Ok(doc)
    }

    pub fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let (docs, ids) = self.collection(collection)?;
        let Some(key) = ids.get(id.as_bytes())? else {
            return Ok(None);
        };
        match docs.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Err(StoreError::Corrupt {
                tree: format!("ids:{collection}"),
                reason: format!("id {id} points at a missing document"),
            }),
        }
    }

    /// All documents of a collection in insertion order.
    pub fn scan(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let (docs, _) = self.collection(collection)?;
        let mut out = Vec::new();
        for item in docs.iter() {
            let (_, bytes) = item?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    pub fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        Ok(query.apply(self.scan(&query.collection)?))
    }

    pub fn get_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.users
            .get(email.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    /// Store a new user. Returns `false` if the email is already taken.
    pub fn create_user(&self, user: &UserRecord) -> Result<bool, StoreError> {
        let bytes = serde_json::to_vec(user)?;
        let swapped = self
            .users
            .compare_and_swap(user.email.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        self.db.flush()?;
        Ok(swapped.is_ok())
    }

    pub fn session_token(&self) -> Result<Option<String>, StoreError> {
        self.session
            .get(SESSION_KEY)?
            .map(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Corrupt {
                    tree: "session".to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn set_session_token(&self, token: Option<&str>) -> Result<(), StoreError> {
        match token {
            Some(token) => {
                self.session.insert(SESSION_KEY, token.as_bytes())?;
            }
            None => {
                self.session.remove(SESSION_KEY)?;
            }
        }
        self.db.flush()?;
        Ok(())
    }
}
