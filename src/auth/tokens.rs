//! Bearer token values and the per-scope cache

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Tokens closer than this to expiry are treated as already expired.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Cached bearer credential for one scope
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    scope: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    /// `lifetime` is the `expires_in` reported by the identity provider.
    /// Without one the token is kept until invalidated.
    pub fn new(value: impl Into<String>, scope: impl Into<String>, lifetime: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            scope: scope.into(),
            expires_at: lifetime.map(|d| Instant::now() + d),
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Instant::now() + EXPIRY_MARGIN >= exp,
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// In-memory token cache keyed by scope
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: HashMap<String, AccessToken>,
}

impl TokenCache {
    /// Usable token for `scope`; expired entries are evicted on the way.
    pub fn get(&mut self, scope: &str) -> Option<AccessToken> {
        match self.entries.get(scope) {
            Some(token) if !token.is_expired() => Some(token.clone()),
            Some(_) => {
                tracing::debug!("Cached token for {} is expired", scope);
                self.entries.remove(scope);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, token: AccessToken) {
        self.entries.insert(token.scope.clone(), token);
    }

    pub fn remove(&mut self, scope: &str) -> bool {
        self.entries.remove(scope).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
