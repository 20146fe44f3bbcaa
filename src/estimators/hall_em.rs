
use log::{debug, warn};
use rand::Rng;

use crate::data_types::parameters::InbreedingParameters;
use crate::estimators::classify::ClassifiedLocus;
use crate::estimators::convergence::{ConvergenceState, ConvergenceWindow, RestartTracker};

/// Runs the inner fixed-point iteration from one starting value. The update is restricted
/// to homozygous-class loci: each contributes its posterior identity-by-descent weight
/// F / (F + (1-F) * p), and the next iterate is the mean weight.
/// Returns the final iterate; an exhausted inner window is only a debug event since the
/// restart layer decides what stabilizes.
/// # Arguments
/// * `homozygote_frequencies` - allele frequency per homozygous-class locus, all > 0
/// * `start` - the restart's initial F value
/// * `params` - supplies the inner convergence window
fn em_fixed_point(homozygote_frequencies: &[f64], start: f64, params: &InbreedingParameters) -> f64 {
    let mut window = ConvergenceWindow::new(params.inner_convergence());
    let mut f = start;
    loop {
        let mut weight_sum = 0.0;
        for &p in homozygote_frequencies.iter() {
            let denominator = f + (1.0 - f) * p;
            if denominator.abs() > f64::EPSILON {
                weight_sum += f / denominator;
            }
        }
        let next = weight_sum / homozygote_frequencies.len() as f64;

        let state = window.update(next);
        f = next;
        match state {
            ConvergenceState::Converged => break,
            ConvergenceState::Exhausted => {
                debug!("Hall EM inner loop exhausted after {} iterations, using current iterate", window.attempts());
                break;
            },
            ConvergenceState::Continue => {}
        }
    }
    f
}

/// The Hall expectation-maximization estimator. The inner fixed-point loop is wrapped in
/// a random-restart layer: fresh uniform starting values are drawn until the running mean
/// of restart estimates stabilizes, and that mean is the final estimate. Exceeding the
/// restart budget logs a warning and reports the 0.0 fallback rather than erroring.
/// # Arguments
/// * `classified` - the per-locus classification records for the genome
/// * `params` - convergence tunables
/// * `rng` - seeded source for the restart draws
pub fn estimate_hall_em(classified: &[ClassifiedLocus], params: &InbreedingParameters, rng: &mut impl Rng) -> f64 {
    let homozygote_frequencies: Vec<f64> = classified.iter()
        .filter(|locus| locus.genotype_class().class_type().is_homozygous())
        .map(|locus| locus.genotype_class().primary_frequency())
        .filter(|&p| p > 0.0)
        .collect();

    if homozygote_frequencies.is_empty() {
        warn!("Hall EM has no homozygous loci to iterate on, reporting 0.0");
        return 0.0;
    }

    let mut tracker = RestartTracker::new(params.restart_convergence());
    loop {
        let start: f64 = rng.random_range(0.0..=1.0);
        let sample = em_fixed_point(&homozygote_frequencies, start, params);

        match tracker.add_sample(sample) {
            ConvergenceState::Converged => {
                debug!("Hall EM stabilized after {} restarts", tracker.restarts());
                return tracker.mean();
            },
            ConvergenceState::Exhausted => {
                warn!("Hall EM failed to stabilize after {} restarts, reporting 0.0", tracker.restarts());
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

    /// A genome homozygous for the minor allele at every one of `count` loci
    fn all_minor_homozygous(af: f64, count: usize) -> Vec<ClassifiedLocus> {
        let mut contig = Contig::new("chr1".to_string());
        let mut loci = vec![];
        for i in 0..count {
            let position = (i as u64 + 1) * 100;
            let vector = AlleleFreqVector::new(vec![
                AlleleFreqRecord::new(b"C".to_vec(), af, "AF".to_string()).unwrap()
            ]).unwrap();
            loci.push(LocusVariant::new(position, vector));

            let mut variant = VariantRecord::new(position, vec![b"A".to_vec(), b"C".to_vec()]).unwrap();
            variant.set_genotype(DiploidGenotype::new(vec![b"C".to_vec(), b"C".to_vec()]).unwrap());
            contig.add_variant(variant).unwrap();
        }

        let mut genome = Genome::new("sample1".to_string());
        genome.add_contig(contig).unwrap();
        let (_results, classified) = classify_loci(&genome, "chr1", &loci);
        classified
    }

    #[test]
    fn test_empty_locus_list_falls_back() {
        let params = InbreedingParametersBuilder::default().build().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let estimate = estimate_hall_em(&[], &params, &mut rng);
        assert_eq!(estimate, 0.0);
    }

    #[test]
    fn test_estimate_is_bounded_and_deterministic() {
        let params = InbreedingParametersBuilder::default().build().unwrap();
        let classified = all_minor_homozygous(0.3, 50);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let first = estimate_hall_em(&classified, &params, &mut rng);
        assert!((0.0..=1.0).contains(&first));
        // fully homozygous data should read as strongly inbred
        assert!(first > 0.5);

        // same seed, same answer
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let second = estimate_hall_em(&classified, &params, &mut rng);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_point_stays_at_zero() {
        let params = InbreedingParametersBuilder::default().build().unwrap();
        // F=0 is a fixed point of the update regardless of the frequency mix
        let estimate = em_fixed_point(&[0.2, 0.4, 0.9], 0.0, &params);
        assert_eq!(estimate, 0.0);
    }
}
