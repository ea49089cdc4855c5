//! Shared fixtures for unit tests

use rand::Rng;

use crate::core::dataset::{Dataset, Row};

const ASSETS: [&str; 3] = ["Pump", "Fan", "Valve"];
const COMPONENTS: [&str; 4] = ["Seal", "Motor", "Bearing", "Impeller"];
const LOCATIONS: [&str; 3] = ["P-100", "F-200", "V-300"];
const EFFECTS: [&str; 4] = ["", "Leak", "Trip", "Noise"];

pub fn fmeca_row(asset: &str, component: &str, floc: &str, severity: &str) -> Row {
    Row::from([
        ("AssetType", asset),
        ("Component", component),
        ("FLOC", floc),
        ("Severity", severity),
    ])
}

/// Dataset whose columns are taken from the rows themselves
pub fn with_columns(rows: Vec<Row>) -> Dataset {
    Dataset::from_rows(rows)
}

pub fn fmeca_columns() -> Vec<String> {
    ["AssetType", "Component", "FLOC", "Severity", "Effect"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn pick<'a, R: Rng>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool[rng.random_range(0..pool.len())]
}

fn random_row<R: Rng>(rng: &mut R) -> Row {
    let mut row = fmeca_row(
        pick(rng, &ASSETS),
        pick(rng, &COMPONENTS),
        pick(rng, &LOCATIONS),
        &rng.random_range(1..=10).to_string(),
    );
    let effect = pick(rng, &EFFECTS);
    // Leave some cells absent rather than blank
    if rng.random_bool(0.5) {
        row.set("Effect", effect);
    }
    row
}

/// Small pools on purpose: duplicate keys show up regularly
pub fn random_dataset<R: Rng>(rng: &mut R, max_rows: usize) -> Dataset {
    let n = rng.random_range(0..=max_rows);
    Dataset::new(fmeca_columns(), (0..n).map(|_| random_row(rng)).collect())
}

/// A plausible proposal: some cells edited, some rows dropped, some added
pub fn random_edit<R: Rng>(rng: &mut R, original: &Dataset) -> Dataset {
    let mut rows = Vec::new();
    for row in &original.rows {
        if rng.random_bool(0.15) {
            continue;
        }
        let mut row = row.clone();
        if rng.random_bool(0.3) {
            row.set("Severity", rng.random_range(1..=10).to_string());
        }
        if rng.random_bool(0.2) {
            row.set("Effect", pick(rng, &EFFECTS));
        }
        rows.push(row);
    }
    for _ in 0..rng.random_range(0..3) {
        let at = rng.random_range(0..=rows.len());
        rows.insert(at, random_row(rng));
    }
    if rows.len() > 1 && rng.random_bool(0.3) {
        let a = rng.random_range(0..rows.len());
        let b = rng.random_range(0..rows.len());
        rows.swap(a, b);
    }
    Dataset::new(fmeca_columns(), rows)
}
