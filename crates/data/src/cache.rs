//! On-disk TTL cache in front of a [`MarketDataProvider`].
//!
//! Entries are JSON envelopes `{stored_at, payload}` named by the SHA-256 of
//! the request. Writes go through a temp file and a rename so readers never
//! observe a partial entry. Expired, unreadable and corrupt entries are
//! treated as misses.

use crate::error::{DataError, Result as DataResult};
use crate::provider::MarketDataProvider;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smirk_trade_core::OptionsChainSnapshot;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    stored_at: DateTime<Utc>,
    payload: Vec<OptionsChainSnapshot>,
}

pub struct CachedProvider<P> {
    inner: P,
    cache_dir: PathBuf,
    ttl: Duration,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    #[must_use]
    pub fn new(inner: P, cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
            ttl,
        }
    }

    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the entry for this request.
    #[must_use]
    pub fn cache_path(&self, symbol: &str, expiries: &[String]) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", cache_key(self.inner.name(), symbol, expiries)))
    }

    /// Fetches from the inner provider and overwrites the cached entry.
    ///
    /// # Errors
    /// Propagates inner provider failures. Cache write failures are logged only.
    pub async fn refresh(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>> {
        let snapshots = self.inner.fetch_options_chain(symbol, expiries).await?;
        if snapshots.is_empty() {
            return Ok(snapshots);
        }

        let path = self.cache_path(symbol, expiries);
        if let Err(e) = self.store(&path, &snapshots).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write chain cache");
        }
        Ok(snapshots)
    }

    async fn load(&self, path: &Path) -> Option<Vec<OptionsChainSnapshot>> {
        let raw = tokio::fs::read(path).await.ok()?;
        let envelope: CacheEnvelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(envelope.stored_at);
        let fresh = age
            .to_std()
            .map(|age| age <= self.ttl)
            .unwrap_or(false);
        if !fresh {
            tracing::debug!(path = %path.display(), age_secs = age.num_seconds(), "Cache entry expired");
            return None;
        }
        Some(envelope.payload)
    }

    async fn store(&self, path: &Path, snapshots: &[OptionsChainSnapshot]) -> DataResult<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let envelope = CacheEnvelope {
            stored_at: Utc::now(),
            payload: snapshots.to_vec(),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| DataError::Cache(format!("rename {}: {e}", tmp.display())))
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>> {
        let path = self.cache_path(symbol, expiries);
        if let Some(snapshots) = self.load(&path).await {
            tracing::debug!(symbol, snapshots = snapshots.len(), "Chain cache hit");
            return Ok(snapshots);
        }
        self.refresh(symbol, expiries).await
    }
}

/// Stable key over provider, symbol and the sorted expiry requests.
fn cache_key(provider: &str, symbol: &str, expiries: &[String]) -> String {
    let mut sorted: Vec<&str> = expiries.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let material = serde_json::json!({
        "provider": provider,
        "symbol": symbol.to_uppercase(),
        "expiries": sorted,
    });
    hex::encode(Sha256::digest(material.to_string().as_bytes()))
}
