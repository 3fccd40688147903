//! Snapshot cache with separate freshness rules for today's bulletin and
//! historical ones.

use crate::core::cache::{KeyValueCollection, Store};
use crate::core::rates::RateSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const RATES_COLLECTION: &str = "rates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    Today,
    Historical,
}

impl Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheScope::Today => write!(f, "today"),
            CacheScope::Historical => write!(f, "historical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub scope: CacheScope,
}

impl CacheKey {
    pub fn new(date: NaiveDate, is_today: bool) -> Self {
        let scope = if is_today {
            CacheScope::Today
        } else {
            CacheScope::Historical
        };
        Self { date, scope }
    }

    pub fn is_today(&self) -> bool {
        self.scope == CacheScope::Today
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.date.format("%Y-%m-%d"), self.scope)
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let (date, scope) = text.split_once(':')?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let scope = match scope {
            "today" => CacheScope::Today,
            "historical" => CacheScope::Historical,
            _ => return None,
        };
        Some(Self { date, scope })
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub snapshot: RateSnapshot,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        let ttl_millis = i64::try_from(self.ttl_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        age.num_milliseconds() < ttl_millis
    }
}

/// Summary of one stored entry, for listing.
#[derive(Debug, Clone, Serialize)]
pub struct CachedEntryInfo {
    pub date: NaiveDate,
    pub scope: CacheScope,
    pub fetched_at: DateTime<Utc>,
    pub fresh: bool,
    pub currencies: usize,
}

/// Typed view over the `rates` collection. A cache without a collection
/// (disabled or failed to open) misses every lookup and drops every write.
#[derive(Clone)]
pub struct RateCache {
    collection: Option<Arc<dyn KeyValueCollection>>,
    today_ttl: Duration,
    historical_ttl: Duration,
}

impl RateCache {
    pub fn new(
        collection: Option<Arc<dyn KeyValueCollection>>,
        today_ttl: Duration,
        historical_ttl: Duration,
    ) -> Self {
        Self {
            collection,
            today_ttl,
            historical_ttl,
        }
    }

    /// Opens the persistent `rates` collection of `store`.
    pub fn from_store(store: &dyn Store, today_ttl: Duration, historical_ttl: Duration) -> Self {
        let collection = store.get_collection(RATES_COLLECTION, true, true);
        if collection.is_none() {
            warn!("Rate cache unavailable, every query will hit the network");
        }
        Self::new(collection, today_ttl, historical_ttl)
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.collection.is_some()
    }

    fn ttl_for(&self, key: &CacheKey) -> Duration {
        match key.scope {
            CacheScope::Today => self.today_ttl,
            CacheScope::Historical => self.historical_ttl,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<RateSnapshot> {
        self.get_at(key, Utc::now()).await
    }

    /// Returns the snapshot when an entry exists and is fresh at `now`.
    pub async fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<RateSnapshot> {
        let collection = self.collection.as_ref()?;
        let raw = collection.get(key.encode().as_bytes()).await?;

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                collection.remove(key.encode().as_bytes()).await;
                return None;
            }
        };

        if !entry.is_fresh(now) {
            debug!(key = %key, fetched_at = %entry.fetched_at, "Cache entry expired");
            return None;
        }
        debug!(key = %key, "Cache HIT");
        Some(entry.snapshot)
    }

    pub async fn put(&self, key: &CacheKey, snapshot: &RateSnapshot) {
        self.put_at(key, snapshot, Utc::now()).await
    }

    /// Stores `snapshot` as fetched at `now`, replacing any previous entry.
    pub async fn put_at(&self, key: &CacheKey, snapshot: &RateSnapshot, now: DateTime<Utc>) {
        let Some(collection) = self.collection.as_ref() else {
            return;
        };
        let entry = CacheEntry {
            snapshot: snapshot.clone(),
            fetched_at: now,
            ttl_seconds: self.ttl_for(key).as_secs(),
        };
        match serde_json::to_vec(&entry) {
            Ok(bytes) => collection.put(key.encode().as_bytes(), &bytes).await,
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize cache entry"),
        }
    }

    pub async fn entries(&self) -> Vec<CachedEntryInfo> {
        let Some(collection) = self.collection.as_ref() else {
            return Vec::new();
        };
        let now = Utc::now();
        let mut entries = Vec::new();
        for raw_key in collection.keys().await {
            let Some(key) = CacheKey::decode(&raw_key) else {
                continue;
            };
            let Some(raw) = collection.get(&raw_key).await else {
                continue;
            };
            if let Ok(entry) = serde_json::from_slice::<CacheEntry>(&raw) {
                entries.push(CachedEntryInfo {
                    date: key.date,
                    scope: key.scope,
                    fetched_at: entry.fetched_at,
                    fresh: entry.is_fresh(now),
                    currencies: entry.snapshot.rates.len(),
                });
            }
        }
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    pub async fn clear(&self) {
        if let Some(collection) = self.collection.as_ref() {
            collection.clear().await;
        }
    }
}
