/*!
# Estimators module
The four inbreeding estimators plus their shared classification pass and the
convergence/retry machinery. All estimators share one entry point, `estimate_genome`,
dispatched on the configured `EstimatorKind`.
*/
/// Shared first pass: per-locus genotype classification and accumulation
pub mod classify;
/// Convergence windows for iterative loops and random-restart policies
pub mod convergence;
/// Hall expectation-maximization estimator
pub mod hall_em;
/// Maximum-likelihood estimator with the bounded Nelder-Mead optimizer
pub mod log_likelihood;
/// Ritland moment-based estimator, the default
pub mod ritland;
/// Simple excess-homozygosity estimator
pub mod simple;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data_types::locus_results::LocusResults;
use crate::data_types::parameters::{EstimatorKind, InbreedingParameters};
use crate::data_types::population::Genome;
use crate::locus_sampler::LocusVariant;

/// Runs the configured estimator for one genome against one locus list and returns the
/// filled-in `LocusResults`. This is the unit of work the evaluator fans out per genome;
/// it is a pure function of its inputs plus the seed, so tasks can run concurrently
/// without coordination.
/// # Arguments
/// * `genome` - the sample genome to evaluate
/// * `contig_name` - the contig the locus list was sampled from
/// * `loci` - the shared locus catalog for the genome's super-population
/// * `params` - the current window parameters
/// * `seed` - per-genome seed for the stochastic estimators
pub fn estimate_genome(
    genome: &Genome,
    contig_name: &str,
    loci: &[LocusVariant],
    params: &InbreedingParameters,
    seed: u64
) -> LocusResults {
    let (mut results, classified) = classify::classify_loci(genome, contig_name, loci);

    let estimate = match params.estimator() {
        EstimatorKind::Ritland => ritland::estimate_ritland(&classified),
        EstimatorKind::Simple => simple::estimate_simple(&results, params.simple_form()),
        EstimatorKind::HallEm => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            hall_em::estimate_hall_em(&classified, params, &mut rng)
        },
        EstimatorKind::LogLikelihood => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            log_likelihood::estimate_log_likelihood(&classified, params, &mut rng)
        }
    };

    results.set_estimate(estimate);
    results
}
