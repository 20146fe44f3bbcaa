
use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::data_types::pedigree::{Pedigree, PedigreeRecord, SuperPopulation};

/// One row of the panel metadata table. Description columns are optional, the panel
/// files in the wild frequently omit them.
#[derive(Debug, Deserialize)]
struct PedigreeRow {
    /// Sample identifier, must match the VCF sample names
    sample: String,
    /// Fine-grained population code
    population: String,
    /// Human-readable population description
    #[serde(default)]
    population_description: String,
    /// Super-population code, e.g. "AFR"
    super_population: String,
    /// Human-readable super-population description
    #[serde(default)]
    super_population_description: String
}

/// Loads a tab-separated panel metadata file into a `Pedigree`. Rows with an unknown
/// super-population code are skipped with a warning; the affected genomes will later be
/// skipped by the evaluator the same way genomes missing from the file are.
/// # Arguments
/// * `pedigree_fn` - path to the tab-separated panel file with a header row
/// # Errors
/// * on I/O failures or rows that do not deserialize
pub fn load_pedigree(pedigree_fn: &Path) -> anyhow::Result<Pedigree> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(pedigree_fn)
        .with_context(|| format!("Error while opening {pedigree_fn:?}:"))?;

    let mut pedigree = Pedigree::default();
    let mut skipped: usize = 0;
    for result in csv_reader.deserialize() {
        let row: PedigreeRow = result
            .with_context(|| format!("Error while parsing {pedigree_fn:?}:"))?;

        let super_population = match SuperPopulation::from_str(&row.super_population) {
            Ok(sp) => sp,
            Err(_) => {
                warn!("Skipping pedigree row for {}: unknown super-population code {:?}", row.sample, row.super_population);
                skipped += 1;
                continue;
            }
        };

        pedigree.insert(PedigreeRecord::new(
            row.sample,
            row.population,
            row.population_description,
            super_population,
            row.super_population_description
        ));
    }

    info!("Loaded {} pedigree records from {pedigree_fn:?} ({skipped} skipped)", pedigree.len());
    Ok(pedigree)
}
