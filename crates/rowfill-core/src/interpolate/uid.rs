//! # Order Id Pool and Allocator
//!
//! Order ids have the shape `<prefix>-<year>-<suffix>`. The numeric suffix
//! is the uniqueness key: the pool holds every suffix in use, seeded from
//! the source rows, and the allocator mints fresh suffixes by rejection
//! sampling over the source's `[min, max]` suffix range.
//!
//! The pool is scoped to a single run and only ever grows.

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, warn};

use crate::dataset::{Dataset, ORDER_ID};
use crate::error::{Result, RowfillError};

/// Consecutive collisions between liveness warnings.
pub const COLLISION_WARN_INTERVAL: u64 = 100_000;

/// A parsed order id borrowing from its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderId<'a> {
    pub prefix: &'a str,
    pub year: &'a str,
    pub suffix: u64,
}

impl<'a> OrderId<'a> {
    /// Split on the last two hyphens, so prefixes may themselves contain `-`.
    pub fn parse(value: &'a str) -> Option<Self> {
        let mut parts = value.rsplitn(3, '-');
        let suffix = parts.next()?;
        let year = parts.next()?;
        let prefix = parts.next()?;

        if prefix.is_empty() || year.is_empty() {
            return None;
        }
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let suffix = suffix.parse::<u64>().ok()?;
        Some(Self {
            prefix,
            year,
            suffix,
        })
    }

    /// Render with a new year and suffix, keeping the prefix.
    pub fn with(&self, year: i32, suffix: u64) -> String {
        format!("{}-{}-{}", self.prefix, year, suffix)
    }
}

/// Set of order id suffixes currently in use.
#[derive(Debug, Clone, Default)]
pub struct UidPool {
    used: HashSet<u64>,
}

impl UidPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every suffix in the dataset's `order_id` column.
    ///
    /// Several source rows may share one order (line items of the same
    /// order), so duplicate suffixes in the source are accepted and
    /// collapse to one pool entry.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let mut pool = Self::new();
        for (row_index, value) in dataset.column_values(ORDER_ID).enumerate() {
            let text = value.as_str().unwrap_or_default();
            let id = OrderId::parse(text).ok_or_else(|| RowfillError::MalformedOrderId {
                value: value.to_csv_string(),
                row_index,
            })?;
            pool.used.insert(id.suffix);
        }
        debug!(
            "Collected {} distinct order id suffixes from {} rows",
            pool.used.len(),
            dataset.len()
        );
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn contains(&self, suffix: u64) -> bool {
        self.used.contains(&suffix)
    }

    /// Record a suffix. Returns false if it was already in use.
    pub fn insert(&mut self, suffix: u64) -> bool {
        self.used.insert(suffix)
    }

    /// Half-open `[min, max + 1)` range spanned by the suffixes in the pool.
    pub fn range(&self) -> Option<UidRange> {
        let min = *self.used.iter().min()?;
        let max = *self.used.iter().max()?;
        Some(UidRange {
            min,
            max: max.saturating_add(1),
        })
    }
}

/// Half-open range `[min, max)` that new suffixes are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UidRange {
    pub min: u64,
    pub max: u64,
}

impl UidRange {
    pub fn span(&self) -> u64 {
        self.max - self.min
    }
}

/// Mints suffixes that are absent from the pool.
#[derive(Debug, Clone, Copy)]
pub struct UidAllocator {
    range: UidRange,
    max_retries: u64,
}

impl UidAllocator {
    pub fn new(range: UidRange, max_retries: u64) -> Self {
        Self { range, max_retries }
    }

    pub fn range(&self) -> UidRange {
        self.range
    }

    /// Draw uniformly from the range until an unused suffix comes up, then
    /// claim it in the pool.
    ///
    /// Expected redraws grow as the pool fills. A warning is logged every
    /// [`COLLISION_WARN_INTERVAL`] consecutive collisions and the call fails
    /// with `UidExhausted` after `max_retries` of them.
    pub fn allocate<R: Rng + ?Sized>(&self, pool: &mut UidPool, rng: &mut R) -> Result<u64> {
        let mut collisions: u64 = 0;
        loop {
            let candidate = rng.random_range(self.range.min..self.range.max);
            if pool.insert(candidate) {
                return Ok(candidate);
            }

            collisions += 1;
            if collisions >= self.max_retries {
                return Err(RowfillError::UidExhausted {
                    min: self.range.min,
                    max: self.range.max,
                    retries: collisions,
                });
            }
            if collisions.is_multiple_of(COLLISION_WARN_INTERVAL) {
                warn!(
                    "Order id allocation is hanging: {} consecutive collisions in [{}, {}), {} ids in use",
                    collisions,
                    self.range.min,
                    self.range.max,
                    pool.len()
                );
            }
        }
    }
}
