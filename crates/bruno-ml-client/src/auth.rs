//! Bearer credentials for the remote services.
//!
//! Google APIs use a cached OAuth access token from a service account; the
//! other services use a static API key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{MlClientError, MlClientResult};

/// Refresh a token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Something that yields a bearer token for an `Authorization` header.
#[async_trait]
pub trait BearerSource: Send + Sync {
    async fn bearer(&self) -> MlClientResult<String>;
}

/// A fixed token, e.g. an API key.
#[derive(Clone)]
pub struct StaticBearer(String);

impl StaticBearer {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticBearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticBearer(***)")
    }
}

#[async_trait]
impl BearerSource for StaticBearer {
    async fn bearer(&self) -> MlClientResult<String> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// OAuth token cache with single-flight refresh.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    scope: &'static str,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, scope: &'static str) -> Self {
        Self {
            provider,
            scope,
            cache: RwLock::new(None),
        }
    }

    /// Build from the service account named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> MlClientResult<Self> {
        let account = CustomServiceAccount::from_env()
            .map_err(|e| MlClientError::Auth(format!("failed to load service account: {}", e)))?
            .ok_or_else(|| MlClientError::config("GOOGLE_APPLICATION_CREDENTIALS is not set"))?;
        Ok(Self::new(Arc::new(account), CLOUD_PLATFORM_SCOPE))
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn refresh(&self, cache: &mut Option<CachedToken>) -> MlClientResult<String> {
        match self.provider.token(&[self.scope]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                // An already expired token forces a refresh on the next call.
                let expires_at = match (token.expires_at() - Utc::now()).to_std() {
                    Ok(ttl) => Instant::now() + ttl,
                    Err(_) => Instant::now(),
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!(scope = self.scope, "refreshed access token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!(error = %e, "token refresh failed, reusing current token");
                    return Ok(cached.access_token.clone());
                }
                Err(MlClientError::Auth(format!("failed to obtain access token: {}", e)))
            }
        }
    }
}

#[async_trait]
impl BearerSource for TokenCache {
    async fn bearer(&self) -> MlClientResult<String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while this one waited.
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }
        self.refresh(&mut cache).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_bearer() {
        let bearer = StaticBearer::new("sk-test");
        assert_eq!(bearer.bearer().await.unwrap(), "sk-test");
        assert_eq!(format!("{:?}", bearer), "StaticBearer(***)");
    }

    #[test]
    fn test_cached_token_margin() {
        let stale = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!stale.is_fresh());
        assert!(stale.is_usable());
    }
}
