//! Orchestrates resolver, cache, feed client and parser.

use crate::core::analytics::{ComparePeriod, Comparison, compare_between, compare_on};
use crate::core::calendar::{DateResolver, validate_range};
use crate::core::error::RateError;
use crate::core::rates::{RateKind, RateSnapshot};
use crate::providers::feed::parse_bulletin;
use crate::providers::tcmb::FeedSource;
use crate::store::rates::{CacheKey, RateCache};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

type FetchCell = Arc<OnceCell<Result<RateSnapshot, RateError>>>;

/// A snapshot together with how it was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRates {
    pub requested_date: NaiveDate,
    pub effective_date: NaiveDate,
    pub snapshot: RateSnapshot,
    pub from_cache: bool,
    /// Set when the rates come from another day than requested.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
    pub name_tr: String,
    pub unit: u32,
}

#[derive(Debug, Clone)]
pub struct CurrencyList {
    pub date: NaiveDate,
    pub currencies: Vec<CurrencyInfo>,
}

/// Snapshots for a date range. Failed days do not fail the whole range.
#[derive(Debug, Clone)]
pub struct RangeRates {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub snapshots: Vec<ResolvedRates>,
    pub failed: Vec<(NaiveDate, RateError)>,
}

/// Today's date in Istanbul, where bulletins are published.
pub fn istanbul_today() -> NaiveDate {
    match FixedOffset::east_opt(3 * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

pub struct RateService {
    resolver: DateResolver,
    cache: RateCache,
    source: Arc<dyn FeedSource>,
    fetch_limit: Semaphore,
    inflight: Mutex<HashMap<CacheKey, FetchCell>>,
    today: Box<dyn Fn() -> NaiveDate + Send + Sync>,
}

impl RateService {
    pub fn new(
        resolver: DateResolver,
        cache: RateCache,
        source: Arc<dyn FeedSource>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            resolver,
            cache,
            source,
            fetch_limit: Semaphore::new(max_concurrent_fetches.max(1)),
            inflight: Mutex::new(HashMap::new()),
            today: Box::new(istanbul_today),
        }
    }

    /// Replaces the clock used to decide what "today" is.
    pub fn with_today(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    pub fn resolver(&self) -> &DateResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// The rolling "today" bulletin, which always holds the latest published rates.
    pub async fn current_rates(&self) -> Result<ResolvedRates, RateError> {
        let today = self.today();
        let (snapshot, from_cache) = self.snapshot(CacheKey::new(today, true)).await?;
        let notice = (snapshot.date != today).then(|| {
            format!(
                "No bulletin published for {today} yet, showing the latest one from {}",
                snapshot.date
            )
        });
        Ok(ResolvedRates {
            requested_date: today,
            effective_date: snapshot.date,
            snapshot,
            from_cache,
            notice,
        })
    }

    /// Rates in effect on `requested`, walking back over weekends and holidays.
    pub async fn rates_for_date(&self, requested: NaiveDate) -> Result<ResolvedRates, RateError> {
        self.resolved(requested, true).await
    }

    async fn resolved(
        &self,
        requested: NaiveDate,
        allow_fallback: bool,
    ) -> Result<ResolvedRates, RateError> {
        let today = self.today();
        let effective = self.resolver.resolve(requested, today)?;
        if effective == today {
            let mut current = self.current_rates().await?;
            current.requested_date = requested;
            return Ok(current);
        }

        let (effective, (snapshot, from_cache)) =
            match self.snapshot(CacheKey::new(effective, false)).await {
                Ok(found) => (effective, found),
                Err(e) if allow_fallback && e.is_not_found() => {
                    let previous = self.resolver.previous_business_day(effective)?;
                    info!(
                        "No bulletin for {}, falling back to {}",
                        effective, previous
                    );
                    (previous, self.snapshot(CacheKey::new(previous, false)).await?)
                }
                Err(e) => return Err(e),
            };

        Ok(ResolvedRates {
            requested_date: requested,
            effective_date: effective,
            notice: self.fallback_notice(requested, effective),
            snapshot,
            from_cache,
        })
    }

    fn fallback_notice(&self, requested: NaiveDate, effective: NaiveDate) -> Option<String> {
        if requested == effective {
            return None;
        }
        let calendar = self.resolver.calendar();
        let reason = if calendar.is_weekend(requested) {
            format!("{requested} is a weekend")
        } else if let Some(name) = calendar.holiday_name(requested) {
            format!("{requested} is a holiday ({name})")
        } else {
            format!("No bulletin was published on {requested}")
        };
        Some(format!("{reason}, using rates from {effective}"))
    }

    pub async fn list_currencies(&self) -> Result<CurrencyList, RateError> {
        let current = self.current_rates().await?;
        let currencies = current
            .snapshot
            .rates
            .values()
            .map(|record| CurrencyInfo {
                code: record.code.clone(),
                name: record.name.clone(),
                name_tr: record.name_tr.clone(),
                unit: record.unit,
            })
            .collect();
        Ok(CurrencyList {
            date: current.effective_date,
            currencies,
        })
    }

    /// Fetches every business day of `[start, end]` concurrently.
    ///
    /// A range without business days falls back to the day `end` resolves to.
    /// Days whose fetch fails are listed in `failed`.
    pub async fn rates_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeRates, RateError> {
        let today = self.today();
        validate_range(start, end, today)?;

        let mut days = self.resolver.business_days(start, end);
        if days.is_empty() {
            days.push(self.resolver.resolve(end, today)?);
        }
        debug!("Fetching {} days between {} and {}", days.len(), start, end);

        let results =
            futures::future::join_all(days.iter().map(|day| self.resolved(*day, false))).await;

        let mut snapshots = Vec::new();
        let mut failed = Vec::new();
        for (day, result) in days.into_iter().zip(results) {
            match result {
                Ok(resolved) => snapshots.push(resolved),
                Err(e) => {
                    warn!("No rates for {}: {}", day, e);
                    failed.push((day, e));
                }
            }
        }
        snapshots.dedup_by_key(|resolved| resolved.effective_date);

        Ok(RangeRates {
            start,
            end,
            snapshots,
            failed,
        })
    }

    /// Compares `codes` on one date or across a period.
    ///
    /// In a period only the end bulletin is required. A start bulletin that
    /// cannot be fetched leaves the rows without a change and is reported
    /// in `gaps`.
    pub async fn compare(
        &self,
        codes: &[String],
        period: ComparePeriod,
        kind: RateKind,
    ) -> Result<Comparison, RateError> {
        match period {
            ComparePeriod::On(date) => {
                let rates = self.rates_for_date(date).await?;
                Ok(compare_on(&rates.snapshot, codes, kind))
            }
            ComparePeriod::Between { start, end } => {
                validate_range(start, end, self.today())?;
                let (first, last) =
                    tokio::join!(self.rates_for_date(start), self.rates_for_date(end));
                let last = last?;
                let first = match first {
                    Ok(first) => Some(first.snapshot),
                    Err(e) => {
                        warn!("No rates for comparison start {}: {}", start, e);
                        None
                    }
                };
                Ok(compare_between(
                    start,
                    first.as_ref(),
                    &last.snapshot,
                    codes,
                    kind,
                ))
            }
        }
    }

    /// Cache lookup, else a single shared fetch per key.
    async fn snapshot(&self, key: CacheKey) -> Result<(RateSnapshot, bool), RateError> {
        if let Some(snapshot) = self.cache.get(&key).await {
            return Ok((snapshot, true));
        }

        let cell = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inflight.entry(key).or_default())
        };

        let result = cell
            .get_or_init(|| self.fetch_and_store(key))
            .await
            .clone();

        {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if inflight
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                inflight.remove(&key);
            }
        }

        result.map(|snapshot| (snapshot, false))
    }

    async fn fetch_and_store(&self, key: CacheKey) -> Result<RateSnapshot, RateError> {
        // A fetch that finished between our miss and taking the cell.
        if let Some(snapshot) = self.cache.get(&key).await {
            return Ok(snapshot);
        }

        let _permit = self
            .fetch_limit
            .acquire()
            .await
            .map_err(|e| RateError::transient("fetch limiter", None, e))?;

        debug!("Cache MISS for {}, fetching", key);
        let raw = self.source.fetch(key.date, key.is_today()).await?;
        let snapshot = parse_bulletin(&raw)?;
        info!(
            "Fetched bulletin for {} ({} currencies)",
            snapshot.date,
            snapshot.rates.len()
        );
        self.cache.put(&key, &snapshot).await;
        Ok(snapshot)
    }
}
