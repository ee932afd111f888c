//! Memoizing, coalescing BIN lookup cache.

use std::{
    future::Future,
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use lru::LruCache;
use tracing::{debug, instrument, warn};

use super::BinInfo;
use crate::{error::Result, redact::redact_sensitive};

/// Number of digits a BIN lookup is keyed by.
pub const BIN_LENGTH: usize = 6;

/// Default number of BINs kept.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Remote source of BIN metadata.
pub trait BinFetcher: Send + Sync {
    /// Fetches metadata for a 6-digit BIN.
    ///
    /// # Errors
    ///
    /// Any transport or decoding failure. The cache turns errors into an
    /// absent result.
    fn fetch<'a>(&'a self, bin: &'a str) -> impl Future<Output = Result<BinInfo>> + Send + 'a;
}

impl<F: BinFetcher> BinFetcher for Arc<F> {
    fn fetch<'a>(&'a self, bin: &'a str) -> impl Future<Output = Result<BinInfo>> + Send + 'a {
        F::fetch(self, bin)
    }
}

#[derive(Debug)]
enum Slot {
    /// No completed fetch yet.
    Empty,
    Ready(BinInfo),
    /// The fetch this slot was created for failed; the slot is already
    /// unlinked from the cache.
    Failed,
}

type SlotHandle = Arc<tokio::sync::Mutex<Slot>>;

/// Returns true for exactly six ASCII digits.
#[must_use]
pub fn is_valid_bin(bin: &str) -> bool {
    bin.len() == BIN_LENGTH && bin.bytes().all(|b| b.is_ascii_digit())
}

/// Memo in front of a [`BinFetcher`].
///
/// - A cached BIN never triggers another fetch until [`clear`](Self::clear).
/// - Concurrent lookups of the same BIN share one fetch: the first caller
///   fetches while holding the BIN's slot, the others wait on it and observe
///   the same result.
/// - A failed fetch leaves no entry, so the next lookup tries again.
///
/// The memo map is behind a short-lived `std` mutex; the per-BIN slots are
/// async mutexes held across the fetch.
#[derive(Debug)]
pub struct BinLookupCache<F> {
    fetcher: F,
    slots: Mutex<LruCache<String, SlotHandle>>,
}

impl<F: BinFetcher> BinLookupCache<F> {
    /// Creates a cache holding up to [`DEFAULT_CAPACITY`] BINs.
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self::with_capacity(fetcher, DEFAULT_CAPACITY)
    }

    /// Creates a cache holding up to `capacity` BINs (0 means the default).
    #[must_use]
    pub fn with_capacity(fetcher: F, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self { fetcher, slots: Mutex::new(LruCache::new(cap)) }
    }

    /// The underlying fetcher.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn slot(&self, bin: &str) -> SlotHandle {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(bin) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(tokio::sync::Mutex::new(Slot::Empty));
        slots.put(bin.to_owned(), Arc::clone(&slot));
        slot
    }

    fn unlink(&self, bin: &str, slot: &SlotHandle) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.peek(bin).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.pop(bin);
        }
    }

    /// Returns metadata for `bin`, fetching it at most once.
    ///
    /// Returns `None` if `bin` is not six digits or the fetch failed.
    #[instrument(skip(self))]
    pub async fn get(&self, bin: &str) -> Option<BinInfo> {
        if !is_valid_bin(bin) {
            debug!("ignoring lookup for a key that is not a 6-digit BIN");
            return None;
        }

        let slot = self.slot(bin);
        let mut state = slot.lock().await;
        match &*state {
            Slot::Ready(info) => {
                debug!("BIN cache hit");
                return Some(info.clone());
            }
            Slot::Failed => return None,
            Slot::Empty => {}
        }

        match self.fetcher.fetch(bin).await {
            Ok(info) => {
                debug!(brand = info.brand.as_deref(), "BIN lookup succeeded");
                *state = Slot::Ready(info.clone());
                Some(info)
            }
            Err(e) => {
                warn!(error = %redact_sensitive(&e.to_string()), "BIN lookup failed");
                *state = Slot::Failed;
                self.unlink(bin, &slot);
                None
            }
        }
    }

    /// Empties the memo. Fetches already in flight are not cached.
    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
        debug!("BIN cache cleared");
    }

    /// Number of BINs with an entry, including lookups in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the memo is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
