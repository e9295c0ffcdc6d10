use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;

use crate::aggregation::{sum_prices, ListTotals, ProductsSnapshot};
use crate::backend::Backend;
use crate::error::{Error, StoreError};
use crate::live::LiveValue;
use crate::models::{
    from_documents, now_millis, Identity, NewProduct, Product, ShoppingList, FIELD_CREATED_AT,
    FIELD_LIST_ID, FIELD_USER_ID, LISTS, PRODUCTS,
};
use crate::query::{Direction, Query};

/// `products where userId == owner`
pub fn owner_products_query(owner: &Identity) -> Query {
    Query::new(PRODUCTS).where_eq(FIELD_USER_ID, owner.uid.as_str())
}

/// `products where listId == list_id and userId == owner order by createdAt desc`
pub fn list_products_query(owner: &Identity, list_id: &str) -> Query {
    Query::new(PRODUCTS)
        .where_eq(FIELD_LIST_ID, list_id)
        .where_eq(FIELD_USER_ID, owner.uid.as_str())
        .order_by(FIELD_CREATED_AT, Direction::Desc)
}

/// The list open in the detail screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedList {
    pub id: String,
    /// Fetched once when the list is opened; `None` until then or if the
    /// list does not exist.
    pub list: Option<ShoppingList>,
}

/// Live products of the signed-in identity.
///
/// Holds two independent subscriptions: every product of the owner (feeding
/// the per-list totals) and the products of the focused list.
pub struct ProductStore {
    backend: Arc<dyn Backend>,
    owner: Mutex<Option<Identity>>,
    all: LiveValue<ProductsSnapshot>,
    /// `None` while the focused list's first snapshot is pending.
    detail: LiveValue<Option<Vec<Product>>>,
    focused: Mutex<Option<FocusedList>>,
}

impl ProductStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            owner: Mutex::new(None),
            all: LiveValue::new(),
            detail: LiveValue::new(),
            focused: Mutex::new(None),
        }
    }

    fn focused_lock(&self) -> MutexGuard<'_, Option<FocusedList>> {
        self.focused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn owner(&self) -> Option<Identity> {
        self.owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scope the all-products subscription to `owner`. Closes any open list.
    pub fn bind(&self, owner: &Identity) -> Result<(), StoreError> {
        self.close_list();
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(owner.clone());
        self.all.bind(&*self.backend, owner_products_query(owner), |docs| {
            ProductsSnapshot::new(from_documents(docs))
        })
    }

    pub fn unbind(&self) {
        self.close_list();
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.all.unbind();
    }

    pub fn all_products(&self) -> Vec<Product> {
        self.all.with(|snapshot| snapshot.products.clone())
    }

    pub fn totals(&self) -> ListTotals {
        self.all.with(|snapshot| snapshot.totals.clone())
    }

    /// Dashboard total of one list.
    pub fn total_for(&self, list_id: &str) -> Decimal {
        self.all.with(|snapshot| snapshot.totals.get(list_id))
    }

    /// Focus `list_id`: subscribe to its products and fetch the list itself.
    pub async fn open_list(&self, list_id: &str) -> Result<(), Error> {
        let owner = self.owner().ok_or(Error::NotSignedIn)?;
        self.close_list();

        *self.focused_lock() = Some(FocusedList {
            id: list_id.to_string(),
            list: None,
        });
        self.detail.bind(
            &*self.backend,
            list_products_query(&owner, list_id),
            |docs| Some(from_documents(docs)),
        )?;

        let list = self
            .backend
            .get(LISTS, list_id)
            .await?
            .and_then(|doc| ShoppingList::try_from(&doc).ok())
            .filter(|list| list.owner_id == owner.uid);
        if list.is_none() {
            tracing::warn!(list_id, "opened list not found");
        }

        if let Some(focused) = self.focused_lock().as_mut().filter(|f| f.id == list_id) {
            focused.list = list;
        }
        Ok(())
    }

    pub fn close_list(&self) {
        self.focused_lock().take();
        self.detail.unbind();
    }

    pub fn focused(&self) -> Option<FocusedList> {
        self.focused_lock().clone()
    }

    /// Products of the focused list, newest first. `None` while loading or
    /// when no list is open.
    pub fn detail_products(&self) -> Option<Vec<Product>> {
        self.detail.get()
    }

    /// Total of the focused list, summed directly over its own subscription.
    pub fn detail_total(&self) -> Decimal {
        self.detail
            .with(|products| products.as_deref().map(sum_prices).unwrap_or_default())
    }

    /// Add a product to `list_id`. Blank names and prices outside
    /// `0..=MAX_PRICE` are ignored and return `Ok(None)`.
    pub async fn add_product(
        &self,
        list_id: &str,
        name: &str,
        price: &str,
        store: &str,
        link: &str,
    ) -> Result<Option<String>, Error> {
        let Some(product) = NewProduct::parse(list_id, name, price, store, link) else {
            tracing::debug!(list_id, "ignoring product with blank name or invalid price");
            return Ok(None);
        };
        let owner = self.owner().ok_or(Error::NotSignedIn)?;

        let id = self
            .backend
            .insert(PRODUCTS, product.into_fields(&owner, now_millis()))
            .await?;
        tracing::info!(product_id = %id, list_id, "added product");
        Ok(Some(id))
    }
}
