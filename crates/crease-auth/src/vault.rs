//! Token access for the request path
//!
//! `TokenVault` wraps the injected `TokenStore` and never fails. When a write
//! to the store errors, the vault logs a warning and remembers the value (or,
//! for a removal, that the key is cleared) in an in-process overlay. An
//! overlay entry is always newer than the store and shadows it until a later
//! write for that key succeeds. The overlay dies with the process, so a
//! session written during a storage outage has to log in again after a
//! restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::extract::Credentials;
use crate::store::TokenStore;

/// Infallible access/refresh token accessors over a `TokenStore`.
pub struct TokenVault {
    store: Arc<dyn TokenStore>,
    /// Values whose last store write failed. `None` marks a failed removal.
    overlay: Mutex<HashMap<&'static str, Option<String>>>,
}

impl TokenVault {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            overlay: Mutex::new(HashMap::new()),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY).await
    }

    /// `None` removes the stored token.
    pub async fn set_access_token(&self, token: Option<&str>) {
        self.write(ACCESS_TOKEN_KEY, token).await;
    }

    /// `None` removes the stored token.
    pub async fn set_refresh_token(&self, token: Option<&str>) {
        self.write(REFRESH_TOKEN_KEY, token).await;
    }

    /// Current pair as stored.
    pub async fn credentials(&self) -> Credentials {
        Credentials {
            access: self.access_token().await.map(Into::into),
            refresh: self.refresh_token().await.map(Into::into),
        }
    }

    /// Persist whichever halves of `credentials` are present; absent halves
    /// leave the stored value untouched.
    pub async fn store_credentials(&self, credentials: &Credentials) {
        if let Some(access) = &credentials.access {
            self.set_access_token(Some(access.expose())).await;
        }
        if let Some(refresh) = &credentials.refresh {
            self.set_refresh_token(Some(refresh.expose())).await;
        }
    }

    /// Remove both tokens.
    pub async fn clear(&self) {
        self.write(ACCESS_TOKEN_KEY, None).await;
        self.write(REFRESH_TOKEN_KEY, None).await;
        debug!("cleared stored tokens");
    }

    async fn read(&self, key: &'static str) -> Option<String> {
        if let Some(pending) = self.overlay_get(key) {
            return pending;
        }
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "token storage read failed");
                None
            }
        }
    }

    async fn write(&self, key: &'static str, value: Option<&str>) {
        let result = match value {
            Some(v) => self.store.set(key, v).await,
            None => self.store.remove(key).await,
        };

        let mut overlay = self.overlay.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                overlay.remove(key);
            }
            Err(e) => {
                warn!(
                    key,
                    error = %e,
                    cleared = value.is_none(),
                    "token storage write failed, keeping latest value in memory"
                );
                overlay.insert(key, value.map(str::to_owned));
            }
        }
    }

    /// `Some(_)` when the overlay has the newest value for `key`.
    fn overlay_get(&self, key: &str) -> Option<Option<String>> {
        self.overlay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
