//! # Field Synthesizer
//!
//! Turns one sampled source row into a new row. Pass-through columns are
//! copied verbatim; the following are rewritten:
//!
//! - `order_date`: sampled order date plus a draw from the order day range
//! - `order_id`: same prefix, the new order year, a freshly minted suffix
//! - `ship_date`: the *new* order date plus a draw from the ship delay
//!   range of the row's category/sub-category (or the flat fallback)
//! - `discount` / `profit`: `d + a` and `d - d * a`, where `d` is the source
//!   discount and `a` the configured amount for the new order year
//! - `ship_mode`: redrawn from observed frequencies when resampling is on,
//!   otherwise taken from the ship delay entry when it names a mode
//!
//! Random draws happen in that order, so a seeded run is reproducible.

use rand::Rng;

use crate::dataset::{
    Row, Temporal, Value, CATEGORY, DISCOUNT, ORDER_DATE, ORDER_ID, PROFIT, SHIP_DATE, SHIP_MODE,
    SUB_CATEGORY,
};
use crate::error::{Result, RowfillError};
use crate::interpolate::plan::InterpolationPlan;
use crate::interpolate::sampler::Categorical;
use crate::interpolate::uid::{OrderId, UidAllocator, UidPool};

/// Derive the synthesized `(discount, profit)` pair.
///
/// Profit is computed from the discount, not from sales or cost.
pub fn discount_and_profit(base_discount: f64, amount: f64) -> (f64, f64) {
    (base_discount + amount, base_discount - base_discount * amount)
}

/// Produces synthesized rows for one interpolation run.
pub struct Synthesizer<'a> {
    plan: &'a InterpolationPlan,
    allocator: UidAllocator,
    ship_modes: Option<Categorical>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        plan: &'a InterpolationPlan,
        allocator: UidAllocator,
        ship_modes: Option<Categorical>,
    ) -> Self {
        Self {
            plan,
            allocator,
            ship_modes,
        }
    }

    /// Build a new row from `base`. `source_index` is used for error context.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        base: &Row,
        source_index: usize,
        pool: &mut UidPool,
        rng: &mut R,
    ) -> Result<Row> {
        let base_order_date = read_date(base, ORDER_DATE, source_index)?;
        let order_date = shift(
            base_order_date,
            self.plan.order_days.draw(rng),
            ORDER_DATE,
            source_index,
        )?;
        let year = order_date.year();

        let base_id = text(base, ORDER_ID);
        let parsed = OrderId::parse(base_id).ok_or_else(|| RowfillError::MalformedOrderId {
            value: base_id.to_string(),
            row_index: source_index,
        })?;
        let suffix = self.allocator.allocate(pool, rng)?;
        let order_id = parsed.with(year, suffix);

        let delay = self
            .plan
            .ship_delays
            .lookup(text(base, CATEGORY), text(base, SUB_CATEGORY))?;
        let ship_date = shift(order_date, delay.days.draw(rng), SHIP_DATE, source_index)?;

        let base_discount = base
            .get(DISCOUNT)
            .and_then(Value::as_f64)
            .ok_or_else(|| RowfillError::Data {
                message: format!(
                    "non-numeric discount '{}' at row {}",
                    base.get(DISCOUNT).map(Value::to_csv_string).unwrap_or_default(),
                    source_index
                ),
            })?;
        let amount = self.plan.discounts.amount(year)?;
        let (discount, profit) = discount_and_profit(base_discount, amount);

        let ship_mode = match &self.ship_modes {
            Some(dist) => Some(dist.sample(rng).to_string()),
            None => delay.mode.clone(),
        };

        let mut row = base.clone();
        row.insert(ORDER_ID.to_string(), Value::String(order_id.into()));
        row.insert(ORDER_DATE.to_string(), order_date.into());
        row.insert(SHIP_DATE.to_string(), ship_date.into());
        row.insert(DISCOUNT.to_string(), Value::Float(discount));
        row.insert(PROFIT.to_string(), Value::Float(profit));
        if let Some(mode) = ship_mode {
            row.insert(SHIP_MODE.to_string(), Value::String(mode.into()));
        }
        Ok(row)
    }
}

fn text<'r>(row: &'r Row, column: &str) -> &'r str {
    row.get(column).and_then(Value::as_str).unwrap_or_default()
}

fn read_date(row: &Row, column: &str, row_index: usize) -> Result<Temporal> {
    let value = row.get(column).cloned().unwrap_or(Value::Null);
    Temporal::from_value(&value).ok_or_else(|| RowfillError::InvalidDate {
        column: column.to_string(),
        value: value.to_csv_string(),
        row_index,
    })
}

fn shift(date: Temporal, days: i64, column: &str, row_index: usize) -> Result<Temporal> {
    date.checked_add_days(days).ok_or_else(|| RowfillError::Data {
        message: format!(
            "shifting {} at row {} by {} days leaves the supported calendar",
            column, row_index, days
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::interpolate::uid::UidRange;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CONFIG: &str = r#"
desired_output_rows = 10
shard_size = 5
order_date_low = 10
order_date_high = 20
seed = 1
ship_date_low = 1
ship_date_high = 3

[ship_delay.Furniture]
Chairs = [4, 6, "Second Class"]

[discounts]
"2014" = 0.1
"2015" = 0.2
"#;

    fn base_row(category: &str, sub: &str) -> Row {
        [
            (ORDER_ID, "CA-2014-500"),
            (ORDER_DATE, "2014-03-01"),
            (SHIP_DATE, "2014-03-04"),
            (CATEGORY, category),
            (SUB_CATEGORY, sub),
            (DISCOUNT, "0.5"),
            ("customer_name", "Jane Doe"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from_cell(v)))
        .collect()
    }

    fn setup() -> (InterpolationPlan, UidPool) {
        let plan = InterpolationPlan::from_config(&parse_config(CONFIG).unwrap()).unwrap();
        let mut pool = UidPool::new();
        pool.insert(500);
        (plan, pool)
    }

    fn allocator() -> UidAllocator {
        UidAllocator::new(UidRange { min: 100, max: 1000 }, 10_000)
    }

    #[test]
    fn test_discount_and_profit_formula() {
        let (d, p) = discount_and_profit(0.5, 0.2);
        assert!((d - 0.7).abs() < 1e-12);
        assert!((p - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_synthesized_fields() {
        let (plan, mut pool) = setup();
        let synth = Synthesizer::new(&plan, allocator(), None);
        let base = base_row("Technology", "Phones");
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let row = synth.synthesize(&base, 0, &mut pool, &mut rng).unwrap();

            let od = Temporal::from_value(&row[ORDER_DATE]).unwrap();
            let sd = Temporal::from_value(&row[SHIP_DATE]).unwrap();
            let base_od = Temporal::parse("2014-03-01").unwrap();
            assert!((10..=20).contains(&od.days_since(&base_od)));
            assert!((1..=3).contains(&sd.days_since(&od)));

            let id = OrderId::parse(row[ORDER_ID].as_str().unwrap()).unwrap();
            assert_eq!(id.prefix, "CA");
            assert_eq!(id.year, od.year().to_string());
            assert_ne!(id.suffix, 500);
            assert!((100..1000).contains(&id.suffix));

            let (d, p) = discount_and_profit(0.5, 0.1);
            assert_eq!(row[DISCOUNT], Value::Float(d));
            assert_eq!(row[PROFIT], Value::Float(p));

            assert_eq!(row["customer_name"].as_str(), Some("Jane Doe"));
            assert!(!row.contains_key(SHIP_MODE));
        }
    }

    #[test]
    fn test_category_delay_sets_ship_mode() {
        let (plan, mut pool) = setup();
        let synth = Synthesizer::new(&plan, allocator(), None);
        let mut rng = StdRng::seed_from_u64(8);

        let row = synth
            .synthesize(&base_row("Furniture", "Chairs"), 0, &mut pool, &mut rng)
            .unwrap();
        let od = Temporal::from_value(&row[ORDER_DATE]).unwrap();
        let sd = Temporal::from_value(&row[SHIP_DATE]).unwrap();
        assert!((4..=6).contains(&sd.days_since(&od)));
        assert_eq!(row[SHIP_MODE].as_str(), Some("Second Class"));
    }

    #[test]
    fn test_column_order_preserved_profit_appended() {
        let (plan, mut pool) = setup();
        let synth = Synthesizer::new(&plan, allocator(), None);
        let base = base_row("Technology", "Phones");
        let mut rng = StdRng::seed_from_u64(2);

        let row = synth.synthesize(&base, 0, &mut pool, &mut rng).unwrap();
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = base.keys().map(String::as_str).collect();
        expected.push(PROFIT);
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_missing_discount_year_is_config_error() {
        let (mut plan, mut pool) = setup();
        plan.order_days = crate::interpolate::plan::DayRange::new(400, 400, true);
        let synth = Synthesizer::new(&plan, allocator(), None);
        let mut rng = StdRng::seed_from_u64(2);

        // 2014-03-01 + 400 days lands in 2015, which is configured.
        assert!(synth
            .synthesize(&base_row("Technology", "Phones"), 0, &mut pool, &mut rng)
            .is_ok());

        plan.order_days = crate::interpolate::plan::DayRange::new(800, 800, true);
        let synth = Synthesizer::new(&plan, allocator(), None);
        let err = synth
            .synthesize(&base_row("Technology", "Phones"), 0, &mut pool, &mut rng)
            .unwrap_err();
        assert!(format!("{}", err).contains("2016"));
    }

    #[test]
    fn test_non_numeric_discount_is_data_error() {
        let (plan, mut pool) = setup();
        let synth = Synthesizer::new(&plan, allocator(), None);
        let mut base = base_row("Technology", "Phones");
        base.insert(DISCOUNT.to_string(), Value::from_cell("ten percent"));
        let mut rng = StdRng::seed_from_u64(2);

        let err = synth.synthesize(&base, 3, &mut pool, &mut rng).unwrap_err();
        assert!(matches!(err, RowfillError::Data { .. }));
        assert!(format!("{}", err).contains("row 3"));
    }
}
