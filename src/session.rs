//! Per-session access-token slot.
//!
//! A [`Session`] holds at most one short-lived bearer token, in memory only.
//! It is passed explicitly to every API call; clones share the same slot,
//! while two sessions created with [`Session::new`] never see each other's
//! token. The durable refresh credential never appears here: it lives in
//! the HTTP client's cookie jar, opaque to this crate.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct TokenSlot {
    token: Option<SecretString>,
    expires_at: Option<Instant>,
}

/// Handle to one session's in-memory credentials.
#[derive(Clone, Default)]
pub struct Session {
    slot: Arc<RwLock<TokenSlot>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held token. `expires_in` comes from the token response.
    pub fn set_token(&self, token: impl Into<String>, expires_in: Duration) {
        let mut slot = self.write();
        slot.token = Some(SecretString::from(token.into()));
        slot.expires_at = Instant::now().checked_add(expires_in);
    }

    pub fn clear(&self) {
        let mut slot = self.write();
        slot.token = None;
        slot.expires_at = None;
    }

    pub fn has_token(&self) -> bool {
        self.read().token.is_some()
    }

    /// True when a token is held and its advertised lifetime has elapsed.
    pub fn is_expired(&self) -> bool {
        let slot = self.read();
        match (&slot.token, slot.expires_at) {
            (Some(_), Some(at)) => Instant::now() >= at,
            _ => false,
        }
    }

    /// `Authorization` header value, if a token is held.
    pub fn authorization(&self) -> Option<String> {
        self.read()
            .token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }

    /// Whether two handles point at the same slot.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    fn read(&self) -> RwLockReadGuard<'_, TokenSlot> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TokenSlot> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_token", &self.has_token())
            .finish()
    }
}
