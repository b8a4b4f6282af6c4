//! Display name resolution with a time-bounded cache.
//!
//! Resolving a user id needs a `users.info` round trip, so results are
//! cached for a configured TTL. Resolution never fails: any lookup error
//! yields [`UNKNOWN_USER`], which is cached like a real name.
//!
//! Concurrent misses for the same id are not coalesced; each performs its
//! own lookup and the last write wins.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Name used when a user cannot be resolved.
pub const UNKNOWN_USER: &str = "(unknown user)";

/// Profile fields relevant for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name_normalized: Option<String>,
    pub real_name_normalized: Option<String>,
}

impl UserProfile {
    /// Preferred presentation name, skipping empty fields.
    pub fn preferred_name(&self) -> Option<&str> {
        [&self.display_name_normalized, &self.real_name_normalized]
            .into_iter()
            .filter_map(|name| name.as_deref())
            .find(|name| !name.is_empty())
    }
}

/// Why a profile lookup failed.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

/// Remote user profile lookup.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Result<UserProfile, LookupError>;
}

#[async_trait]
impl<T: ProfileLookup + ?Sized> ProfileLookup for std::sync::Arc<T> {
    async fn lookup(&self, user_id: &str) -> Result<UserProfile, LookupError> {
        (**self).lookup(user_id).await
    }
}

/// Anything that can turn a user id into a display name.
#[async_trait]
pub trait DisplayNames: Send + Sync {
    async fn display_name(&self, user_id: &str) -> String;

    /// Drop any cached name for `user_id`.
    async fn forget(&self, user_id: &str);
}

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    display_name: String,
    expires_at: DateTime<Utc>,
}

/// Caching display name resolver.
pub struct DisplayNameResolver<L, C = SystemClock> {
    lookup: L,
    clock: C,
    ttl: TimeDelta,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<L: ProfileLookup> DisplayNameResolver<L, SystemClock> {
    pub fn new(lookup: L, ttl: Duration) -> Self {
        Self::with_clock(lookup, SystemClock, ttl)
    }
}

impl<L: ProfileLookup, C: Clock> DisplayNameResolver<L, C> {
    pub fn with_clock(lookup: L, clock: C, ttl: Duration) -> Self {
        Self {
            lookup,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a user id to a display name.
    pub async fn resolve(&self, user_id: &str) -> String {
        if let Some(name) = self.cached(user_id).await {
            return name;
        }

        let display_name = match self.lookup.lookup(user_id).await {
            Ok(profile) => profile.preferred_name().unwrap_or(UNKNOWN_USER).to_string(),
            Err(LookupError::NotFound) => {
                error!("Display name lookup failed for {}: user not found", user_id);
                UNKNOWN_USER.to_string()
            }
            Err(LookupError::Other(e)) => {
                error!("Display name lookup failed for {}: {}", user_id, e);
                UNKNOWN_USER.to_string()
            }
        };

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.cache.write().await.insert(
            user_id.to_string(),
            CacheEntry {
                display_name: display_name.clone(),
                expires_at,
            },
        );

        display_name
    }

    /// Forget the cached name so the next `resolve` does a fresh lookup.
    pub async fn invalidate(&self, user_id: &str) {
        if self.cache.write().await.remove(user_id).is_some() {
            debug!("Invalidated cached display name for {}", user_id);
        }
    }

    async fn cached(&self, user_id: &str) -> Option<String> {
        let now = self.clock.now();
        let cache = self.cache.read().await;
        cache
            .get(user_id)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.display_name.clone())
    }

    #[cfg(test)]
    async fn entries(&self) -> HashMap<String, String> {
        self.cache
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.display_name.clone()))
            .collect()
    }
}

#[async_trait]
impl<L: ProfileLookup, C: Clock> DisplayNames for DisplayNameResolver<L, C> {
    async fn display_name(&self, user_id: &str) -> String {
        self.resolve(user_id).await
    }

    async fn forget(&self, user_id: &str) {
        self.invalidate(user_id).await
    }
}
