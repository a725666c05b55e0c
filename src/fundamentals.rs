//! Fundamental ratios and their cache

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

/// Default time-to-live for cached snapshots
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Valuation and balance-sheet ratios for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalSnapshot {
    pub price_to_book: Option<f64>,
    pub price_to_earnings: Option<f64>,
    /// Fraction, 0.15 = 15%
    pub return_on_equity: Option<f64>,
    /// Percent, 80.0 = 80%
    pub debt_to_equity: Option<f64>,
    pub market_cap: Option<f64>,
}

impl FundamentalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.price_to_book.is_none()
            && self.price_to_earnings.is_none()
            && self.return_on_equity.is_none()
            && self.debt_to_equity.is_none()
            && self.market_cap.is_none()
    }
}

pub trait FundamentalSource: Send + Sync {
    /// `Ok(None)` when the provider has nothing for `symbol`
    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<FundamentalSnapshot>, ProviderError>;
}

impl<T: FundamentalSource + ?Sized> FundamentalSource for Arc<T> {
    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<FundamentalSnapshot>, ProviderError> {
        (**self).fetch_fundamentals(symbol)
    }
}

/// Fixed snapshots keyed by provider symbol
impl FundamentalSource for HashMap<String, FundamentalSnapshot> {
    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<FundamentalSnapshot>, ProviderError> {
        Ok(self.get(symbol).cloned())
    }
}

// ============================================================
// CACHE
// ============================================================

#[derive(Debug, Clone)]
struct Entry {
    value: Option<FundamentalSnapshot>,
    fetched_at: Instant,
}

impl Entry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

type Slot = Arc<Mutex<Option<Entry>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `None` while another thread holds the lock
fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Only the map holds the slot, so no lookup is waiting on it
fn is_idle(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1
}

/// TTL cache in front of a [`FundamentalSource`].
///
/// Each symbol has its own slot lock, so concurrent lookups of one symbol
/// wait for a single upstream fetch while other symbols proceed. Upstream
/// errors are cached as absent until the entry expires. Expired slots stay
/// in the map until [`FundamentalCache::purge_expired`] runs.
#[derive(Debug)]
pub struct FundamentalCache<S> {
    source: S,
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<S: FundamentalSource> FundamentalCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn get(&self, symbol: &str) -> Option<FundamentalSnapshot> {
        let slot: Slot = lock(&self.slots).entry(symbol.to_string()).or_default().clone();
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(self.ttl) {
                return cached.value.clone();
            }
        }

        let value = match self.source.fetch_fundamentals(symbol) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("fundamentals for {symbol} unavailable: {e}");
                None
            }
        };
        *entry = Some(Entry {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        value
    }

    /// Drop the cached entry for `symbol`. A fetch already in flight is
    /// left to finish and its result is kept.
    pub fn invalidate(&self, symbol: &str) {
        let mut slots = lock(&self.slots);
        let Some(slot) = slots.get(symbol) else {
            return;
        };
        if is_idle(slot) {
            slots.remove(symbol);
        } else if let Some(mut entry) = try_lock(slot) {
            *entry = None;
        }
    }

    /// Invalidate every symbol
    pub fn clear(&self) {
        lock(&self.slots).retain(|_, slot| {
            if is_idle(slot) {
                return false;
            }
            if let Some(mut entry) = try_lock(slot) {
                *entry = None;
            }
            true
        });
    }

    /// Evict idle slots whose entry is missing or expired; returns how many
    pub fn purge_expired(&self) -> usize {
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| {
            !is_idle(slot)
                || lock(slot)
                    .as_ref()
                    .is_some_and(|entry| entry.is_fresh(self.ttl))
        });
        let purged = before - slots.len();
        if purged > 0 {
            log::debug!("purged {purged} expired fundamental entries");
        }
        purged
    }

    /// Fresh cached entries; fetches in flight are not counted
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| {
                try_lock(slot).is_some_and(|entry| {
                    entry.as_ref().is_some_and(|entry| entry.is_fresh(self.ttl))
                })
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: FundamentalSource> FundamentalSource for FundamentalCache<S> {
    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<FundamentalSnapshot>, ProviderError> {
        Ok(self.get(symbol))
    }
}
