//! # Row Samplers
//!
//! [`RecencySampler`] resamples source rows with replacement, biased toward
//! recent orders: rows are ranked by order date and drawn with probability
//! proportional to their rank. [`Categorical`] redraws a categorical column
//! from its observed frequencies.
//!
//! Both precompute cumulative weights once per run; a draw is one uniform
//! integer plus a binary search.

use std::collections::BTreeMap;

use rand::Rng;

use crate::dataset::{Dataset, Temporal, ORDER_DATE};
use crate::error::{Result, RowfillError};

/// Rank-weighted sampler over the rows of one dataset.
#[derive(Debug, Clone)]
pub struct RecencySampler {
    /// Row indices sorted by order date; position in this vec is the rank.
    ranked: Vec<usize>,
    /// `cumulative[i]` is the sum of weights for ranks `0..=i`.
    cumulative: Vec<u64>,
}

impl RecencySampler {
    /// Rank the dataset's rows by parsed order date.
    ///
    /// The sort is stable, so rows sharing an order date keep their input
    /// order. Fails on an empty dataset or an unparseable date.
    pub fn new(dataset: &Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(RowfillError::Data {
                message: "cannot sample from an empty dataset".to_string(),
            });
        }

        let mut keyed = Vec::with_capacity(dataset.len());
        for (row_index, value) in dataset.column_values(ORDER_DATE).enumerate() {
            let date = Temporal::from_value(value).ok_or_else(|| RowfillError::InvalidDate {
                column: ORDER_DATE.to_string(),
                value: value.to_csv_string(),
                row_index,
            })?;
            keyed.push((date.to_datetime(), row_index));
        }
        keyed.sort_by_key(|(date, _)| *date);

        let ranked: Vec<usize> = keyed.into_iter().map(|(_, idx)| idx).collect();
        let mut cumulative = Vec::with_capacity(ranked.len());
        let mut total: u64 = 0;
        for rank in 0..ranked.len() {
            total += Self::weight(rank);
            cumulative.push(total);
        }

        Ok(Self { ranked, cumulative })
    }

    /// Selection weight of the row at `rank`. The oldest row (rank 0) has
    /// weight zero and is only drawn when it is the sole row.
    pub fn weight(rank: usize) -> u64 {
        rank as u64
    }

    /// Row indices in rank order (oldest first).
    pub fn ranked(&self) -> &[usize] {
        &self.ranked
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Draw one row index, with replacement.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let total = self.cumulative.last().copied().unwrap_or(0);
        if total == 0 {
            return self.ranked[0];
        }
        let roll = rng.random_range(0..total);
        let rank = self.cumulative.partition_point(|&c| c <= roll);
        self.ranked[rank]
    }
}

/// Frequency-weighted distribution over the distinct values of a column.
#[derive(Debug, Clone)]
pub struct Categorical {
    values: Vec<String>,
    cumulative: Vec<u64>,
}

impl Categorical {
    /// Count the non-null values of `column`. Returns `None` if there are none.
    ///
    /// Values are ordered lexicographically so a seeded run is reproducible
    /// regardless of row order.
    pub fn from_column(dataset: &Dataset, column: &str) -> Option<Self> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for value in dataset.column_values(column) {
            if value.is_null() {
                continue;
            }
            *counts.entry(value.to_csv_string()).or_default() += 1;
        }
        if counts.is_empty() {
            return None;
        }

        let mut values = Vec::with_capacity(counts.len());
        let mut cumulative = Vec::with_capacity(counts.len());
        let mut total = 0;
        for (value, count) in counts {
            total += count;
            values.push(value);
            cumulative.push(total);
        }
        Some(Self { values, cumulative })
    }

    /// Observed values with their relative frequencies.
    pub fn frequencies(&self) -> Vec<(&str, f64)> {
        let total = self.cumulative.last().copied().unwrap_or(0) as f64;
        let mut prev = 0;
        self.values
            .iter()
            .zip(&self.cumulative)
            .map(|(value, &c)| {
                let freq = (c - prev) as f64 / total;
                prev = c;
                (value.as_str(), freq)
            })
            .collect()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let total = self.cumulative.last().copied().unwrap_or(0);
        let roll = rng.random_range(0..total);
        let idx = self.cumulative.partition_point(|&c| c <= roll);
        &self.values[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Row, Value};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dated(dates: &[&str]) -> Dataset {
        Dataset::from_rows(
            dates
                .iter()
                .map(|d| {
                    let mut r = Row::new();
                    r.insert(ORDER_DATE.to_string(), Value::from_cell(d));
                    r.insert("ship_mode".to_string(), Value::from_cell(""));
                    r
                })
                .collect(),
        )
    }

    #[test]
    fn test_ranks_by_date_not_input_order() {
        let ds = dated(&["2015-06-01", "2014-01-01", "2016-03-01", "2014-01-01"]);
        let sampler = RecencySampler::new(&ds).unwrap();
        // Stable: the two 2014-01-01 rows keep input order (1 before 3).
        assert_eq!(sampler.ranked(), &[1, 3, 0, 2]);
    }

    #[test]
    fn test_sample_frequency_tracks_rank() {
        let ds = dated(&["2014-01-01", "2014-02-01", "2014-03-01", "2014-04-01"]);
        let sampler = RecencySampler::new(&ds).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut counts = [0usize; 4];
        for _ in 0..60_000 {
            counts[sampler.sample(&mut rng)] += 1;
        }
        // Weights 0:1:2:3 over a total of 6.
        assert_eq!(counts[0], 0, "oldest row has zero weight");
        assert!((9_000..11_000).contains(&counts[1]), "{:?}", counts);
        assert!((19_000..21_000).contains(&counts[2]), "{:?}", counts);
        assert!((29_000..31_000).contains(&counts[3]), "{:?}", counts);
    }

    #[test]
    fn test_single_row_is_always_drawn() {
        let ds = dated(&["2014-01-01"]);
        let sampler = RecencySampler::new(&ds).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.sample(&mut rng), 0);
    }

    #[test]
    fn test_invalid_date_is_reported() {
        let ds = dated(&["2014-01-01", "someday"]);
        let err = RecencySampler::new(&ds).unwrap_err();
        assert!(matches!(err, RowfillError::InvalidDate { row_index: 1, .. }));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert!(RecencySampler::new(&Dataset::default()).is_err());
    }

    #[test]
    fn test_categorical_follows_frequencies() {
        let mut ds = dated(&["2014-01-01"; 4]);
        for (row, mode) in ds.rows.iter_mut().zip(["Standard", "Standard", "Standard", "Same Day"]) {
            row.insert("ship_mode".to_string(), Value::from_cell(mode));
        }
        let cat = Categorical::from_column(&ds, "ship_mode").unwrap();
        assert_eq!(cat.frequencies(), vec![("Same Day", 0.25), ("Standard", 0.75)]);

        let mut rng = StdRng::seed_from_u64(9);
        let standard = (0..4_000)
            .filter(|_| cat.sample(&mut rng) == "Standard")
            .count();
        assert!((2_800..3_200).contains(&standard), "{}", standard);
    }

    #[test]
    fn test_categorical_skips_nulls() {
        let ds = dated(&["2014-01-01", "2014-01-02"]);
        assert!(Categorical::from_column(&ds, "ship_mode").is_none());
    }
}
