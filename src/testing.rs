//! Synthetic housing data for tests and smoke runs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::record::{Record, CATEGORY_FIELD, LABEL_FIELD, NUMERIC_FIELDS};

/// Category labels used by the California housing data.
pub const OCEAN_PROXIMITY: [&str; 5] = ["<1H OCEAN", "INLAND", "ISLAND", "NEAR BAY", "NEAR OCEAN"];

/// Generate `n` plausible records with labels driven mostly by income and
/// proximity to the coast.
pub fn synthetic_housing(n: usize, seed: u64) -> (Vec<Record>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);

    for i in 0..n {
        let category = OCEAN_PROXIMITY[i % 4 + usize::from(i % 4 >= 2)];
        let households: f64 = rng.gen_range(50.0..1500.0f64).round();
        let total_rooms = (households * rng.gen_range(3.0..7.0)).round();
        let total_bedrooms = (total_rooms * rng.gen_range(0.15..0.3)).round();
        let population = (households * rng.gen_range(2.0..4.0)).round();
        let median_income: f64 = rng.gen_range(0.5..12.0);

        let record = Record::from_values(
            [
                rng.gen_range(-124.3..-114.3),
                rng.gen_range(32.5..42.0),
                rng.gen_range(1.0..52.0f64).round(),
                total_rooms,
                total_bedrooms,
                population,
                households,
                median_income,
            ],
            Some(category.to_string()),
        );

        let coastal = if category == "INLAND" { 0.0 } else { 60_000.0 };
        let label = 40_000.0 * median_income + coastal + 15.0 * (total_rooms / households)
            + rng.gen_range(-10_000.0..10_000.0);

        records.push(record);
        labels.push(label);
    }

    (records, labels)
}

/// Write records and labels as a CSV with the dataset's header layout.
pub fn write_csv(path: &Path, records: &[Record], labels: &[f64]) -> Result<()> {
    let mut columns: Vec<Series> = NUMERIC_FIELDS
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<f64> = records.iter().map(|r| r.numeric_values()[idx]).collect();
            Series::new(name, values)
        })
        .collect();
    columns.push(Series::new(LABEL_FIELD, labels));
    let categories: Vec<Option<&str>> = records.iter().map(|r| r.ocean_proximity.as_deref()).collect();
    columns.push(Series::new(CATEGORY_FIELD, categories));

    let mut df = DataFrame::new(columns)?;
    let mut out = BufWriter::new(File::create(path)?);
    CsvWriter::new(&mut out).include_header(true).finish(&mut df)?;
    out.flush()?;
    Ok(())
}
