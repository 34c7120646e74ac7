//! # Interpolation Plan
//!
//! Resolves a validated [`RowfillConfig`] into the concrete values one run
//! uses: day ranges with their inclusivity applied, ship delay and discount
//! lookups, and a fixed seed. Building the plan touches nothing on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::Rng;
use tracing::info;

use crate::config::RowfillConfig;
use crate::error::{Result, RowfillError};

/// A discrete range of day offsets.
///
/// With `inclusive` set the range is `[low, high]`, otherwise `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub low: i64,
    pub high: i64,
    pub inclusive: bool,
}

impl DayRange {
    pub fn new(low: i64, high: i64, inclusive: bool) -> Self {
        Self {
            low,
            high,
            inclusive,
        }
    }

    /// Draw one offset uniformly from the range.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.inclusive {
            rng.random_range(self.low..=self.high)
        } else {
            rng.random_range(self.low..self.high)
        }
    }

    /// Largest offset [`DayRange::draw`] can return.
    pub fn max_offset(&self) -> i64 {
        if self.inclusive {
            self.high
        } else {
            self.high - 1
        }
    }

    pub fn contains(&self, offset: i64) -> bool {
        offset >= self.low && offset <= self.max_offset()
    }
}

/// Ship delay range plus the ship mode it implies, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipDelay {
    pub days: DayRange,
    pub mode: Option<String>,
}

/// Ship delay lookup: per category/sub-category first, flat range second.
#[derive(Debug, Clone, Default)]
pub struct ShipDelayTable {
    flat: Option<ShipDelay>,
    by_category: BTreeMap<String, BTreeMap<String, ShipDelay>>,
}

impl ShipDelayTable {
    pub fn lookup(&self, category: &str, sub_category: &str) -> Result<&ShipDelay> {
        self.by_category
            .get(category)
            .and_then(|subs| subs.get(sub_category))
            .or(self.flat.as_ref())
            .ok_or_else(|| RowfillError::Config {
                message: format!(
                    "no ship delay configured for category '{}' / sub-category '{}' \
                     and no ship_date_low/ship_date_high fallback",
                    category, sub_category
                ),
            })
    }
}

/// Discount amount per order year.
#[derive(Debug, Clone, Default)]
pub struct DiscountTable {
    by_year: BTreeMap<i32, f64>,
}

impl DiscountTable {
    pub fn amount(&self, year: i32) -> Result<f64> {
        self.by_year
            .get(&year)
            .copied()
            .ok_or_else(|| RowfillError::Config {
                message: format!("no discount configured for year {}", year),
            })
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.by_year.contains_key(&year)
    }
}

/// Everything one interpolation run needs, resolved from config.
#[derive(Debug, Clone)]
pub struct InterpolationPlan {
    pub desired_output_rows: usize,
    pub shard_size: usize,
    pub order_days: DayRange,
    pub ship_delays: ShipDelayTable,
    pub discounts: DiscountTable,
    pub seed: u64,
    pub max_uid_retries: u64,
    pub resample_ship_mode: bool,
    pub retain_shards: bool,
    pub output_dir: PathBuf,
}

impl InterpolationPlan {
    /// Resolve a config into a plan. Fails with `Config` on missing keys.
    ///
    /// When no seed is configured one is drawn from OS entropy so the run
    /// can still be reproduced from its manifest.
    pub fn from_config(config: &RowfillConfig) -> Result<Self> {
        config.require_complete()?;

        let inclusive = config.inclusive_upper;
        let range = |low: i64, high: i64| DayRange::new(low, high, inclusive);

        // require_complete guarantees these are present
        let (Some(desired_output_rows), Some(shard_size), Some(od_low), Some(od_high)) = (
            config.desired_output_rows,
            config.shard_size,
            config.order_date_low,
            config.order_date_high,
        ) else {
            return Err(RowfillError::Config {
                message: "incomplete configuration".to_string(),
            });
        };

        let flat = config.flat_ship_delay().map(|(low, high)| ShipDelay {
            days: range(low, high),
            mode: None,
        });
        let by_category = config
            .ship_delay
            .iter()
            .map(|(category, subs)| {
                let subs = subs
                    .iter()
                    .map(|(sub, entry)| {
                        let (low, high) = entry.bounds();
                        let delay = ShipDelay {
                            days: range(low, high),
                            mode: entry.mode().map(str::to_string),
                        };
                        (sub.clone(), delay)
                    })
                    .collect();
                (category.clone(), subs)
            })
            .collect();

        let mut by_year = BTreeMap::new();
        for (year, amount) in &config.discounts {
            let year: i32 = year.trim().parse().map_err(|_| RowfillError::Config {
                message: format!("discounts key '{}' is not a year", year),
            })?;
            by_year.insert(year, *amount);
        }

        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::rng().random();
                info!("No seed configured, using {}", seed);
                seed
            }
        };

        Ok(Self {
            desired_output_rows,
            shard_size,
            order_days: range(od_low, od_high),
            ship_delays: ShipDelayTable { flat, by_category },
            discounts: DiscountTable { by_year },
            seed,
            max_uid_retries: config.max_uid_retries,
            resample_ship_mode: config.resample_ship_mode,
            retain_shards: config.retain_shards,
            output_dir: config.output_dir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CONFIG: &str = r#"
desired_output_rows = 100
shard_size = 10
order_date_low = 0
order_date_high = 3
seed = 11
ship_date_low = 1
ship_date_high = 2

[ship_delay.Furniture]
Chairs = [5, 8, "First Class"]

[discounts]
"2014" = 0.1
"#;

    #[test]
    fn test_inclusive_draw_hits_both_bounds() {
        let range = DayRange::new(0, 3, true);
        let mut rng = StdRng::seed_from_u64(1);
        let draws: Vec<i64> = (0..500).map(|_| range.draw(&mut rng)).collect();
        assert!(draws.iter().all(|d| (0..=3).contains(d)));
        assert!(draws.contains(&0));
        assert!(draws.contains(&3));
    }

    #[test]
    fn test_half_open_draw_excludes_high() {
        let range = DayRange::new(0, 3, false);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let d = range.draw(&mut rng);
            assert!((0..3).contains(&d), "offset {} outside [0, 3)", d);
        }
        assert_eq!(range.max_offset(), 2);
        assert!(!range.contains(3));
    }

    #[test]
    fn test_plan_from_config() {
        let config = parse_config(CONFIG).unwrap();
        let plan = InterpolationPlan::from_config(&config).unwrap();

        assert_eq!(plan.desired_output_rows, 100);
        assert_eq!(plan.seed, 11);
        assert_eq!(plan.order_days, DayRange::new(0, 3, true));
        assert_eq!(plan.discounts.amount(2014).unwrap(), 0.1);
        assert!(plan.discounts.amount(2015).is_err());
    }

    #[test]
    fn test_ship_delay_lookup_prefers_category_entry() {
        let config = parse_config(CONFIG).unwrap();
        let plan = InterpolationPlan::from_config(&config).unwrap();

        let chairs = plan.ship_delays.lookup("Furniture", "Chairs").unwrap();
        assert_eq!(chairs.days, DayRange::new(5, 8, true));
        assert_eq!(chairs.mode.as_deref(), Some("First Class"));

        let fallback = plan.ship_delays.lookup("Technology", "Phones").unwrap();
        assert_eq!(fallback.days, DayRange::new(1, 2, true));
        assert!(fallback.mode.is_none());
    }

    #[test]
    fn test_ship_delay_lookup_without_fallback_fails() {
        let config = parse_config(
            r#"
desired_output_rows = 100
shard_size = 10
order_date_low = 0
order_date_high = 3
[ship_delay.Furniture]
Chairs = [5, 8]
"#,
        )
        .unwrap();
        let plan = InterpolationPlan::from_config(&config).unwrap();
        let err = plan.ship_delays.lookup("Technology", "Phones").unwrap_err();
        assert!(format!("{}", err).contains("Phones"));
    }

    #[test]
    fn test_unseeded_plan_draws_a_seed() {
        let config = parse_config(&CONFIG.replace("seed = 11\n", "")).unwrap();
        assert!(config.seed.is_none());
        // Any value is fine; the plan must still resolve.
        assert!(InterpolationPlan::from_config(&config).is_ok());
    }
}
