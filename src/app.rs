//! Wires the session, the stores and the router together.
//!
//! Every session change moves the router and rescopes both stores to the new
//! identity. Screens read plain snapshots from here and never touch the
//! backend themselves.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;

use crate::aggregation::sum_prices;
use crate::backend::Backend;
use crate::config::Locale;
use crate::error::AuthError;
use crate::lists::ListStore;
use crate::models::{Identity, Product, ShoppingList};
use crate::products::ProductStore;
use crate::router::{View, ViewRouter};
use crate::session::{SessionManager, SessionState};

/// A list as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub list: ShoppingList,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardScreen {
    pub identity: Identity,
    /// Newest first.
    pub lists: Vec<ListSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDetailScreen {
    pub list_id: String,
    /// List name, once fetched.
    pub title: Option<String>,
    /// True until the first product snapshot arrives.
    pub loading: bool,
    /// Newest first.
    pub products: Vec<Product>,
    pub total: Decimal,
}

pub struct App {
    session: SessionManager,
    router: Mutex<ViewRouter>,
    lists: ListStore,
    products: ProductStore,
    locale: Locale,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, locale: Locale) -> Arc<Self> {
        Arc::new(Self {
            session: SessionManager::new(Arc::clone(&backend)),
            router: Mutex::new(ViewRouter::new()),
            lists: ListStore::new(Arc::clone(&backend)),
            products: ProductStore::new(backend),
            locale,
        })
    }

    fn router(&self) -> MutexGuard<'_, ViewRouter> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start following the session. The first resolution arrives before this
    /// returns when the backend already knows the session.
    pub fn start(self: &Arc<Self>) {
        let app = Arc::downgrade(self);
        self.session.start(move |state| {
            if let Some(app) = app.upgrade() {
                app.on_session(state);
            }
        });
    }

    fn on_session(&self, state: &SessionState) {
        let identity = state.identity();
        self.router().session_resolved(identity.is_some());

        match identity {
            Some(identity) => {
                if let Err(err) = self.lists.bind(identity) {
                    tracing::error!(%err, "failed to subscribe to lists");
                }
                if let Err(err) = self.products.bind(identity) {
                    tracing::error!(%err, "failed to subscribe to products");
                }
            }
            None => {
                self.lists.unbind();
                self.products.unbind();
            }
        }
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
        self.lists.unbind();
        self.products.unbind();
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn view(&self) -> View {
        self.router().view().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.router().is_loading()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.current()
    }

    pub fn start_auth(&self) -> bool {
        self.router().start()
    }

    pub fn cancel_auth(&self) -> bool {
        self.router().cancel()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.session.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.session.sign_up(email, password).await
    }

    /// Localized text for an auth failure.
    pub fn auth_message(&self, err: &AuthError) -> &'static str {
        err.message(self.locale)
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
    }

    /// Open the detail screen of `list_id`. Returns `false` outside the
    /// dashboard.
    pub async fn select_list(&self, list_id: &str) -> bool {
        if !self.router().select_list(list_id) {
            return false;
        }
        if let Err(err) = self.products.open_list(list_id).await {
            tracing::error!(%err, list_id, "failed to open list");
        }
        true
    }

    pub fn back(&self) -> bool {
        let moved = self.router().back();
        if moved {
            self.products.close_list();
        }
        moved
    }

    /// Create a list; failures are logged and yield `None`.
    pub async fn create_list(&self, name: &str) -> Option<String> {
        self.lists.create_list(name).await.unwrap_or_else(|err| {
            tracing::error!(%err, "failed to create list");
            None
        })
    }

    /// Add a product; failures are logged and yield `None`.
    pub async fn add_product(
        &self,
        list_id: &str,
        name: &str,
        price: &str,
        store: &str,
        link: &str,
    ) -> Option<String> {
        self.products
            .add_product(list_id, name, price, store, link)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(%err, list_id, "failed to add product");
                None
            })
    }

    pub fn dashboard(&self) -> Option<DashboardScreen> {
        let identity = self.session.current()?;
        let totals = self.products.totals();
        let lists = self
            .lists
            .lists()
            .into_iter()
            .map(|list| ListSummary {
                total: totals.get(&list.id),
                list,
            })
            .collect();
        Some(DashboardScreen { identity, lists })
    }

    pub fn list_detail(&self) -> Option<ListDetailScreen> {
        let list_id = self.router().focused_list()?.to_string();
        let title = self
            .products
            .focused()
            .filter(|focused| focused.id == list_id)
            .and_then(|focused| focused.list)
            .map(|list| list.name);
        let (loading, products) = match self.products.detail_products() {
            Some(products) => (false, products),
            None => (true, Vec::new()),
        };
        let total = sum_prices(&products);
        Some(ListDetailScreen {
            list_id,
            title,
            loading,
            products,
            total,
        })
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
