
use log::{debug, warn};
use rand::Rng;

use crate::data_types::parameters::InbreedingParameters;
use crate::estimators::classify::ClassifiedLocus;
use crate::estimators::convergence::{ConvergenceState, RestartTracker};

/// Probability floor inside the log terms; keeps log(0) out of the objective
const LIKELIHOOD_EPSILON: f64 = 1e-10;

/// Lower bound of the F search domain
const F_LOWER_BOUND: f64 = -1.0;
/// Upper bound of the F search domain
const F_UPPER_BOUND: f64 = 1.0;

/// The log-likelihood of inbreeding coefficient `f` given the classified loci. Homozygous
/// loci contribute log(F*p + (1-F)*p^2), heterozygous loci log(2*(1-F)*p_i*p_j), each
/// clamped away from zero.
/// # Arguments
/// * `f` - the candidate inbreeding coefficient
/// * `classified` - the per-locus classification records for the genome
pub fn log_likelihood(f: f64, classified: &[ClassifiedLocus]) -> f64 {
    let mut total = 0.0;
    for locus in classified.iter() {
        let genotype_class = locus.genotype_class();
        let p = genotype_class.primary_frequency();
        let term = if genotype_class.class_type().is_homozygous() {
            f * p + (1.0 - f) * p * p
        } else {
            // both heterozygous classes carry a second frequency
            let q = genotype_class.secondary_frequency().unwrap_or(0.0);
            2.0 * (1.0 - f) * p * q
        };
        total += term.clamp(LIKELIHOOD_EPSILON, 1.0).ln();
    }
    total
}

/// Derivative-free bound-constrained minimizer over a single parameter: a two-point
/// Nelder-Mead simplex with reflection, expansion, contraction, and shrink steps, every
/// candidate clamped into [lower, upper]. Returns the best parameter and whether the
/// simplex collapsed within tolerance before the evaluation budget ran out.
/// # Arguments
/// * `objective` - the function to minimize
/// * `start` - initial parameter value
/// * `lower` / `upper` - the parameter bounds
/// * `tolerance` - simplex-width stopping criterion
/// * `max_evaluations` - objective evaluation budget
fn nelder_mead_minimize<F: Fn(f64) -> f64>(
    objective: F,
    start: f64,
    lower: f64,
    upper: f64,
    tolerance: f64,
    max_evaluations: usize
) -> (f64, bool) {
    let step = 0.25 * (upper - lower);
    let mut best = start.clamp(lower, upper);
    let mut worst = (start + step).clamp(lower, upper);
    if (worst - best).abs() < f64::EPSILON {
        worst = (start - step).clamp(lower, upper);
    }

    let mut best_value = objective(best);
    let mut worst_value = objective(worst);
    let mut evaluations = 2;

    let converged = loop {
        if worst_value < best_value {
            std::mem::swap(&mut best, &mut worst);
            std::mem::swap(&mut best_value, &mut worst_value);
        }

        if (worst - best).abs() < tolerance {
            break true;
        }
        if evaluations >= max_evaluations {
            break false;
        }

        // reflect the worst point through the best
        let reflected = (2.0 * best - worst).clamp(lower, upper);
        let reflected_value = objective(reflected);
        evaluations += 1;

        if reflected_value < best_value {
            // the reflection improved on the best, try going further
            let expanded = (3.0 * best - 2.0 * worst).clamp(lower, upper);
            let expanded_value = objective(expanded);
            evaluations += 1;
            if expanded_value < reflected_value {
                worst = expanded;
                worst_value = expanded_value;
            } else {
                worst = reflected;
                worst_value = reflected_value;
            }
        } else {
            // contract toward the best point
            let contracted = best + 0.5 * (worst - best);
            let contracted_value = objective(contracted);
            evaluations += 1;
            if contracted_value < worst_value {
                worst = contracted;
                worst_value = contracted_value;
            } else {
                // shrink as the last resort
                worst = best + 0.5 * (worst - best);
                worst_value = objective(worst);
                evaluations += 1;
            }
        }
    };

    if best_value <= worst_value {
        (best, converged)
    } else {
        (worst, converged)
    }
}

/// The maximum-likelihood estimator: maximizes `log_likelihood` over F in [-1, 1] with
/// the bounded Nelder-Mead routine, wrapped in the same random-restart policy as Hall EM.
/// An optimizer run that exhausts its evaluation budget is logged but its parameter still
/// counts as that restart's sample; only restart-level exhaustion falls back to 0.0.
/// # Arguments
/// * `classified` - the per-locus classification records for the genome
/// * `params` - optimizer and restart tunables
/// * `rng` - seeded source for the restart draws
pub fn estimate_log_likelihood(classified: &[ClassifiedLocus], params: &InbreedingParameters, rng: &mut impl Rng) -> f64 {
    if classified.is_empty() {
        warn!("Log-likelihood estimator has no classified loci, reporting 0.0");
        return 0.0;
    }

    let mut tracker = RestartTracker::new(params.restart_convergence());
    loop {
        let start: f64 = rng.random_range(F_LOWER_BOUND..=F_UPPER_BOUND);
        let (sample, optimizer_converged) = nelder_mead_minimize(
            |f| -log_likelihood(f, classified),
            start,
            F_LOWER_BOUND,
            F_UPPER_BOUND,
            params.mle_tolerance(),
            params.mle_max_evaluations()
        );
        if !optimizer_converged {
            debug!("Nelder-Mead ran out of evaluations from start {start:.4}, keeping {sample:.6} as the restart sample");
        }

        match tracker.add_sample(sample) {
            ConvergenceState::Converged => {
                debug!("Log-likelihood estimate stabilized after {} restarts", tracker.restarts());
                return tracker.mean();
            },
            ConvergenceState::Exhausted => {
                warn!("Log-likelihood estimate failed to stabilize after {} restarts, reporting 0.0", tracker.restarts());
                return 0.0;
            },
            ConvergenceState::Continue => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::data_types::allele_freq::{AlleleFreqRecord, AlleleFreqVector};
    use crate::data_types::parameters::InbreedingParametersBuilder;
    use crate::estimators::classify::classify_loci;
    use crate::data_types::population::{Contig, DiploidGenotype, Genome, VariantRecord};
    use crate::locus_sampler::LocusVariant;

    /// Builds classification records for a genome with the given per-locus calls over a
    /// single-minor catalog at frequency `af`.
    fn classify_calls(af: f64, calls: &[Option<(&[u8], &[u8])>]) -> Vec<ClassifiedLocus> {
        let mut contig = Contig::new("chr1".to_string());
        let mut loci = vec![];
        for (i, call) in calls.iter().enumerate() {
            let position = (i as u64 + 1) * 100;
            let vector = AlleleFreqVector::new(vec![
                AlleleFreqRecord::new(b"C".to_vec(), af, "AF".to_string()).unwrap()
            ]).unwrap();
            loci.push(LocusVariant::new(position, vector));

            if let Some((a1, a2)) = call {
                let mut variant = VariantRecord::new(position, vec![b"A".to_vec(), b"C".to_vec()]).unwrap();
                variant.set_genotype(DiploidGenotype::new(vec![a1.to_vec(), a2.to_vec()]).unwrap());
                contig.add_variant(variant).unwrap();
            }
        }

        let mut genome = Genome::new("sample1".to_string());
        genome.add_contig(contig).unwrap();
        let (_results, classified) = classify_loci(&genome, "chr1", &loci);
        classified
    }

    #[test]
    fn test_nelder_mead_on_parabola() {
        // minimum of (x - 0.3)^2 inside the bounds
        let (x, converged) = nelder_mead_minimize(|x| (x - 0.3) * (x - 0.3), -0.9, -1.0, 1.0, 1e-6, 500);
        assert!(converged);
        assert!((x - 0.3).abs() < 1e-4);

        // minimum outside the bounds pins to the boundary
        let (x, _converged) = nelder_mead_minimize(|x| (x - 5.0) * (x - 5.0), 0.0, -1.0, 1.0, 1e-6, 500);
        assert!((x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_likelihood_prefers_observed_mixture() {
        // a Hardy-Weinberg mixture at af=0.5 should peak near F=0:
        // 25% minor homo, 50% het, 25% major homo
        let mut calls: Vec<Option<(&[u8], &[u8])>> = vec![];
        for i in 0..100 {
            calls.push(match i % 4 {
                0 => Some((b"C", b"C")),
                1 | 2 => Some((b"A", b"C")),
                _ => None
            });
        }
        let classified = classify_calls(0.5, &calls);

        let ll_zero = log_likelihood(0.0, &classified);
        assert!(ll_zero > log_likelihood(0.5, &classified));
        assert!(ll_zero > log_likelihood(-0.5, &classified));
    }

    #[test]
    fn test_empty_locus_list_falls_back() {
        let params = InbreedingParametersBuilder::default().build().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let estimate = estimate_log_likelihood(&[], &params, &mut rng);
        assert_eq!(estimate, 0.0);
    }

    #[test]
    fn test_mle_recovers_outbred_mixture() {
        let mut calls: Vec<Option<(&[u8], &[u8])>> = vec![];
        for i in 0..200 {
            calls.push(match i % 4 {
                0 => Some((b"C", b"C")),
                1 | 2 => Some((b"A", b"C")),
                _ => None
            });
        }
        let classified = classify_calls(0.5, &calls);

        let params = InbreedingParametersBuilder::default().build().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let estimate = estimate_log_likelihood(&classified, &params, &mut rng);
        assert!(estimate.abs() < 0.05, "expected ~0, got {estimate}");
    }
}
