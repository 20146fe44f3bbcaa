
use anyhow::Context;
use indicatif::ParallelProgressIterator;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::hash::{Hash, Hasher};

use crate::data_types::locus_results::{InbreedingOutputResults, LocusResults, ResultsMap};
use crate::data_types::parameters::InbreedingParameters;
use crate::data_types::pedigree::{Pedigree, SuperPopulation};
use crate::data_types::population::Population;
use crate::estimators::estimate_genome;
use crate::locus_sampler::{build_locus_catalog, offset_after_count};
use crate::util::progress_bar::get_progress_style;

/// Windows holding fewer loci than this are the termination signal; estimates over a
/// handful of loci are statistically meaningless
pub const MIN_WINDOW_LOCI: usize = 100;

/// Derives a stable per-genome seed so stochastic estimators are reproducible across runs
/// and independent across genomes.
fn genome_seed(base_seed: u64, genome_id: &str) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    genome_id.hash(&mut hasher);
    base_seed ^ hasher.finish()
}

/// The distinct super-populations observed among the samples' pedigree records, plus the
/// pooled ALL grouping used for window sizing.
fn observed_super_populations(samples: &Population, pedigree: &Pedigree) -> Vec<SuperPopulation> {
    let mut observed = vec![SuperPopulation::All];
    for genome in samples.genomes().iter() {
        if let Some(record) = pedigree.lookup(genome.identifier()) {
            if !observed.contains(&record.super_population()) {
                observed.push(record.super_population());
            }
        }
    }
    observed
}

/// Evaluates the inbreeding coefficient of every sample genome, window by window.
///
/// Each window: sample the locus catalog per super-population, fan one estimator task per
/// genome out to the rayon pool, merge the per-genome results, then slide the window
/// (the next lower bound is the current upper bound). Windows are strictly sequential;
/// the catalog and parameters are shared read-only across the worker tasks of a window.
///
/// Genomes without a pedigree record, or whose super-population has no locus list, are
/// skipped with a warning; they are skipped in every window, so the output schema stays
/// consistent. The run terminates at the configured final offset (clamped to the contig
/// end) or after the first window with fewer than `MIN_WINDOW_LOCI` loci.
/// # Arguments
/// * `reference` - the frequency-source population, one pooled genome with one contig
/// * `samples` - the diploid genomes to evaluate
/// * `pedigree` - super-population metadata per genome
/// * `params` - the evaluation configuration; a local copy is advanced per window
/// # Errors
/// * if the reference is not a single-genome, single-contig population
/// * if the final results fail the consistent-genome-set validation
pub fn evaluate_population(
    reference: &Population,
    samples: &Population,
    pedigree: &Pedigree,
    params: &InbreedingParameters
) -> anyhow::Result<InbreedingOutputResults> {
    // structural preconditions for the pooled reference
    let reference_genome = reference.single_genome()
        .with_context(|| "Reference population failed validation:")?;
    let reference_contig = reference_genome.single_contig()
        .with_context(|| "Reference population failed validation:")?;
    let contig_name = reference_contig.name().to_string();

    let super_populations = observed_super_populations(samples, pedigree);
    debug!("Observed super-populations: {super_populations:?}");

    let overall_bound = params.final_offset().min(reference_contig.end_position());
    let mut local_params = params.clone();
    let mut output = InbreedingOutputResults::new(samples.name().to_string());
    let mut lower_offset = params.lower_offset();

    loop {
        // place the window upper bound after the target locus count, using pooled frequencies
        let (upper_offset, available) = offset_after_count(
            reference, &contig_name, SuperPopulation::All, &local_params, lower_offset, local_params.locus_count()
        )?;
        if available == 0 || upper_offset <= lower_offset {
            debug!("No usable loci past offset {lower_offset}, stopping");
            break;
        }
        local_params.set_window(lower_offset, upper_offset);

        let catalog = build_locus_catalog(reference, &super_populations, &local_params)?;
        let locus_map = catalog.get(&contig_name)
            .with_context(|| format!("Locus catalog is missing contig {contig_name:?}"))?;

        info!("Window {}: {} loci, evaluating {} genomes...", local_params.window_label(), available, samples.len());
        let window_results: Vec<Option<(String, LocusResults)>> = samples.genomes().par_iter()
            .map(|genome| {
                let genome_id = genome.identifier();
                let Some(record) = pedigree.lookup(genome_id) else {
                    warn!("Genome {genome_id} has no pedigree record, skipping");
                    return None;
                };
                let Some(loci) = locus_map.get(&record.super_population()) else {
                    warn!("Genome {genome_id} has no locus set for super-population {}, skipping", record.super_population());
                    return None;
                };

                let seed = genome_seed(local_params.random_seed(), genome_id);
                let results = estimate_genome(genome, &contig_name, loci, &local_params, seed);
                Some((genome_id.to_string(), results))
            })
            .progress_with_style(get_progress_style())
            .collect();

        // merge is commutative, but we collect in genome order anyway for stable reports
        let mut results_map = ResultsMap::default();
        for (genome_id, results) in window_results.into_iter().flatten() {
            results_map.insert(genome_id, results);
        }
        output.add_window(local_params.clone(), results_map);

        if upper_offset >= overall_bound {
            debug!("Window reached the overall bound at offset {upper_offset}, stopping");
            break;
        }
        if available < MIN_WINDOW_LOCI {
            debug!("Only {available} loci remained in the final window, stopping");
            break;
        }
        lower_offset = upper_offset;
    }

    output.validate_consistent_genomes()
        .with_context(|| "Window results failed schema validation:")?;
    Ok(output)
}
