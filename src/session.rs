use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::backend::Backend;
use crate::error::AuthError;
use crate::live::{Listener, Subscription};
use crate::models::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The backend has not reported the initial session yet.
    #[default]
    Unresolved,
    SignedOut,
    SignedIn(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

impl From<Option<Identity>> for SessionState {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Self::SignedOut, Self::SignedIn)
    }
}

struct Shared {
    state: watch::Sender<SessionState>,
    on_change: Mutex<Option<Listener<SessionState>>>,
}

impl Shared {
    /// Publish `next` and run the change hook, unless nothing changed.
    fn apply(&self, next: SessionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if !changed {
            return;
        }

        match &next {
            SessionState::SignedIn(identity) => tracing::info!(uid = %identity.uid, "session signed in"),
            SessionState::SignedOut => tracing::info!("session signed out"),
            SessionState::Unresolved => {}
        }
        let hook = self
            .on_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(&next);
        }
    }
}

/// Tracks the signed-in identity and reports every change.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                state: watch::Sender::new(SessionState::Unresolved),
                on_change: Mutex::new(None),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to the backend's session notifications. `on_change` runs on
    /// every state change, starting with the initial resolution. Calling this
    /// again while started does nothing.
    pub fn start(&self, on_change: impl Fn(&SessionState) + Send + Sync + 'static) {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            tracing::debug!("session manager already started");
            return;
        }

        *self
            .shared
            .on_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(on_change));

        let shared = Arc::clone(&self.shared);
        *subscription = Some(self.backend.observe_session(Arc::new(
            move |identity: &Option<Identity>| shared.apply(identity.clone().into()),
        )));
    }

    /// Stop listening to the backend. The last known state is kept.
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        self.shared
            .on_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Identity> {
        self.shared.state.borrow().identity().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        match self.backend.sign_in(email, password).await {
            Ok(identity) => {
                self.shared.apply(SessionState::SignedIn(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                tracing::warn!(%err, "sign-in rejected");
                Err(err)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        match self.backend.sign_up(email, password).await {
            Ok(identity) => {
                self.shared.apply(SessionState::SignedIn(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                tracing::warn!(%err, "sign-up rejected");
                Err(err)
            }
        }
    }

    /// Clear the identity locally, then tell the backend. Never fails.
    pub async fn sign_out(&self) {
        self.shared.apply(SessionState::SignedOut);
        if let Err(err) = self.backend.sign_out().await {
            tracing::error!(%err, "backend sign-out failed");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
