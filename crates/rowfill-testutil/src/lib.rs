use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;

use rowfill_core::config::{RowfillConfig, ShipDelayEntry};
use rowfill_core::dataset::csv::create_writer;
use rowfill_core::dataset::{Dataset, Row, Value};

/// Category pairs the fixture cycles through.
pub const CATEGORY_PAIRS: [(&str, &str); 3] = [
    ("Furniture", "Chairs"),
    ("Technology", "Phones"),
    ("Office Supplies", "Paper"),
];

/// Gap between consecutive order id suffixes in [`order_dataset`].
pub const SUFFIX_STRIDE: u64 = 1_000;

/// First order id suffix in [`order_dataset`].
pub const FIRST_SUFFIX: u64 = 100_000;

/// Create an order dataset with `n` rows for testing.
///
/// Order dates increase by one day from 2014-01-01, suffixes are distinct
/// and [`SUFFIX_STRIDE`] apart, and every third row repeats the previous
/// order id (a second line item of the same order). Columns:
/// `order_id, order_date, ship_date, ship_mode, customer_name, category,
/// sub_category, sales, discount`.
pub fn order_dataset(n: usize) -> Dataset {
    let start = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
    let modes = ["Standard Class", "Second Class", "First Class", "Standard Class"];

    let mut rows = Vec::with_capacity(n);
    let mut suffix = FIRST_SUFFIX;
    for i in 0..n {
        if i > 0 && i % 3 != 0 {
            suffix += SUFFIX_STRIDE;
        }
        let order_date = start.checked_add_days(Days::new(i as u64)).unwrap();
        let ship_date = order_date.checked_add_days(Days::new(3)).unwrap();
        let (category, sub_category) = CATEGORY_PAIRS[i % CATEGORY_PAIRS.len()];

        let mut row: Row = IndexMap::new();
        row.insert(
            "order_id".to_string(),
            Value::String(format!("CA-{}-{}", order_date.format("%Y"), suffix).into()),
        );
        row.insert("order_date".to_string(), Value::Date(order_date));
        row.insert("ship_date".to_string(), Value::Date(ship_date));
        row.insert(
            "ship_mode".to_string(),
            Value::String(modes[i % modes.len()].into()),
        );
        row.insert(
            "customer_name".to_string(),
            Value::String(format!("Customer {}", i).into()),
        );
        row.insert("category".to_string(), Value::String(category.into()));
        row.insert("sub_category".to_string(), Value::String(sub_category.into()));
        row.insert("sales".to_string(), Value::Float(10.0 + i as f64));
        row.insert("discount".to_string(), Value::Float((i % 5) as f64 / 10.0));
        rows.push(row);
    }
    Dataset::from_rows(rows)
}

/// A complete config for [`order_dataset`].
///
/// Order dates shift by 0..=30 days; discounts cover 2010 through 2040.
/// `Furniture/Chairs` ships in 2..=4 days as "Second Class"; everything else
/// falls back to the flat 1..=7 day delay.
pub fn fixture_config(desired_output_rows: usize, shard_size: usize, output_dir: &Path) -> RowfillConfig {
    let mut chairs = BTreeMap::new();
    chairs.insert(
        "Chairs".to_string(),
        ShipDelayEntry::WithMode(2, 4, "Second Class".to_string()),
    );
    let mut ship_delay = BTreeMap::new();
    ship_delay.insert("Furniture".to_string(), chairs);

    let discounts = (2010..=2040)
        .map(|year| (year.to_string(), 0.01 * (year - 2009) as f64))
        .collect();

    RowfillConfig {
        desired_output_rows: Some(desired_output_rows),
        shard_size: Some(shard_size),
        order_date_low: Some(0),
        order_date_high: Some(30),
        ship_date_low: Some(1),
        ship_date_high: Some(7),
        seed: Some(42),
        ship_delay,
        discounts,
        output_dir: output_dir.to_path_buf(),
        ..RowfillConfig::default()
    }
}

/// Write `dataset` as a headed CSV at `dir/name` and return the path.
pub fn write_dataset_csv(dataset: &Dataset, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut writer = create_writer(&path).unwrap();
    writer.write_record(&dataset.columns).unwrap();
    for row in &dataset.rows {
        let record: Vec<String> = dataset
            .columns
            .iter()
            .map(|c| row.get(c).map(Value::to_csv_string).unwrap_or_default())
            .collect();
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
    path
}
