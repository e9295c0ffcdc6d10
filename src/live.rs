//! Live subscriptions: cancellable handles and the listener registry behind
//! them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use crate::backend::Backend;
use crate::error::StoreError;
use crate::query::Query;
use crate::storage::Document;

/// Callback receiving every new snapshot.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle to one live subscription. Cancelling (or dropping) it stops
/// further deliveries.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Listeners keyed by what they observe (a query, or nothing for session
/// listeners).
pub struct Registry<K, T: ?Sized> {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (K, Listener<T>)>>,
}

impl<K, T> Registry<K, T>
where
    K: Clone + Send + 'static,
    T: ?Sized + 'static,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, (K, Listener<T>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(self: &Arc<Self>, key: K, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, (key, listener));

        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().remove(&id);
            }
        })
    }

    /// Snapshot of the listeners whose key matches. Callers invoke them after
    /// the registry lock is released.
    pub fn matching(&self, pred: impl Fn(&K) -> bool) -> Vec<(K, Listener<T>)> {
        self.lock()
            .values()
            .filter(|(key, _)| pred(key))
            .map(|(key, listener)| (key.clone(), Arc::clone(listener)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Binding {
    generation: u64,
    subscription: Option<Subscription>,
}

/// A value derived from one live query at a time.
///
/// Rebinding cancels the previous subscription and resets the value before
/// the new query delivers, so observers never see a mix of old and new
/// scopes. Deliveries from a cancelled subscription that race with the
/// rebind are dropped.
pub struct LiveValue<T> {
    value: Arc<watch::Sender<T>>,
    binding: Arc<Mutex<Binding>>,
}

impl<T> LiveValue<T>
where
    T: Default + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            value: Arc::new(watch::Sender::new(T::default())),
            binding: Arc::new(Mutex::new(Binding {
                generation: 0,
                subscription: None,
            })),
        }
    }

    fn lock(binding: &Mutex<Binding>) -> MutexGuard<'_, Binding> {
        binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to `query`, publishing `map(snapshot)` on every delivery.
    pub fn bind<F>(&self, backend: &dyn Backend, query: Query, map: F) -> Result<(), StoreError>
    where
        F: Fn(&[Document]) -> T + Send + Sync + 'static,
    {
        let generation = self.unbind();

        let value = Arc::clone(&self.value);
        let binding = Arc::clone(&self.binding);
        let subscription = backend.observe_query(
            query,
            Arc::new(move |docs: &[Document]| {
                let current = Self::lock(&binding);
                if current.generation == generation {
                    value.send_replace(map(docs));
                }
            }),
        )?;

        let replaced = {
            let mut current = Self::lock(&self.binding);
            if current.generation == generation {
                current.subscription.replace(subscription)
            } else {
                // Unbound while subscribing.
                Some(subscription)
            }
        };
        drop(replaced);
        Ok(())
    }

    /// Cancel the current subscription and reset the value. Returns the new
    /// generation.
    pub fn unbind(&self) -> u64 {
        let (generation, previous) = {
            let mut current = Self::lock(&self.binding);
            current.generation += 1;
            self.value.send_replace(T::default());
            (current.generation, current.subscription.take())
        };
        drop(previous);
        generation
    }

    pub fn is_bound(&self) -> bool {
        Self::lock(&self.binding).subscription.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }
}

impl<T> Default for LiveValue<T>
where
    T: Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn cancel_and_drop_both_unregister() {
        let registry: Arc<Registry<&'static str, str>> = Registry::new();
        let a = registry.register("a", Arc::new(|_: &str| {}));
        let b = registry.register("b", Arc::new(|_: &str| {}));
        assert_eq!(registry.len(), 2);

        a.cancel();
        assert_eq!(registry.len(), 1);
        drop(b);
        assert!(registry.is_empty());
    }

    #[test]
    fn matching_filters_by_key() {
        let registry: Arc<Registry<u8, u32>> = Registry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _even = registry.register(
            2,
            Arc::new(move |n: &u32| {
                counter.fetch_add(*n as usize, Ordering::SeqCst);
            }),
        );
        let _odd = registry.register(3, Arc::new(|_: &u32| panic!("odd listener called")));

        for (_, listener) in registry.matching(|k| k % 2 == 0) {
            listener(&5);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let registry: Arc<Registry<(), ()>> = Registry::new();
        let sub = registry.register((), Arc::new(|_: &()| {}));
        drop(registry);
        sub.cancel();
    }

    mod live_value {
        use super::super::*;
        use crate::backend::Backend;
        use crate::test_support::temporary_backend;
        use serde_json::json;

        fn owned_by(owner: &str) -> serde_json::Map<String, serde_json::Value> {
            json!({"userId": owner}).as_object().cloned().unwrap()
        }

        #[tokio::test]
        async fn rebinding_replaces_scope() {
            let backend = temporary_backend();
            backend.insert("lists", owned_by("u1")).await.unwrap();
            backend.insert("lists", owned_by("u2")).await.unwrap();
            backend.insert("lists", owned_by("u2")).await.unwrap();

            let count: LiveValue<usize> = LiveValue::new();
            count
                .bind(&*backend, Query::new("lists").where_eq("userId", "u1"), |docs| docs.len())
                .unwrap();
            assert_eq!(count.get(), 1);

            count
                .bind(&*backend, Query::new("lists").where_eq("userId", "u2"), |docs| docs.len())
                .unwrap();
            assert_eq!(count.get(), 2);

            // Writes for the old scope no longer reach the value.
            backend.insert("lists", owned_by("u1")).await.unwrap();
            assert_eq!(count.get(), 2);
        }

        #[tokio::test]
        async fn unbind_resets_and_stops_updates() {
            let backend = temporary_backend();
            let count: LiveValue<usize> = LiveValue::new();
            count
                .bind(&*backend, Query::new("lists"), |docs| docs.len())
                .unwrap();
            backend.insert("lists", owned_by("u1")).await.unwrap();
            assert_eq!(count.get(), 1);
            assert!(count.is_bound());

            count.unbind();
            assert_eq!(count.get(), 0);
            assert!(!count.is_bound());
            backend.insert("lists", owned_by("u1")).await.unwrap();
            assert_eq!(count.get(), 0);
        }

        #[tokio::test]
        async fn receivers_observe_changes() {
            let backend = temporary_backend();
            let count: LiveValue<usize> = LiveValue::new();
            let mut rx = count.subscribe();
            count
                .bind(&*backend, Query::new("lists"), |docs| docs.len())
                .unwrap();
            backend.insert("lists", owned_by("u1")).await.unwrap();

            assert!(rx.has_changed().unwrap());
            assert_eq!(*rx.borrow_and_update(), 1);
        }
    }
}
