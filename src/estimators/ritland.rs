
use crate::estimators::classify::ClassifiedLocus;

/// Homozygotes at alleles rarer than this are excluded; 1/p explodes below it
pub const MIN_HOMOZYGOTE_FREQUENCY: f64 = 0.001;

/// The Ritland moment-based estimator, the default algorithm. Closed form, no iteration:
/// each homozygous locus with allele frequency p contributes (1/p - 1), each heterozygous
/// locus contributes -1, and the estimate is the mean contribution. Low-frequency
/// homozygotes are excluded as numerically unstable.
/// # Arguments
/// * `classified` - the per-locus classification records for the genome
pub fn estimate_ritland(classified: &[ClassifiedLocus]) -> f64 {
    let mut sum = 0.0;
    let mut contributing = 0_usize;

    for locus in classified.iter() {
        let genotype_class = locus.genotype_class();
        if genotype_class.class_type().is_homozygous() {
            let p = genotype_class.primary_frequency();
            if p > MIN_HOMOZYGOTE_FREQUENCY {
                sum += 1.0 / p - 1.0;
                contributing += 1;
            }
        } else {
            sum += -1.0;
            contributing += 1;
        }
    }

    if contributing == 0 {
        0.0
    } else {
        sum / contributing as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    use crate::data_types::allele_freq::{classify_genotype, AlleleFreqRecord, AlleleFreqVector};
    use crate::estimators::classify::classify_loci;
    use crate::data_types::population::{Contig, DiploidGenotype, Genome, VariantRecord};
    use crate::locus_sampler::LocusVariant;

    /// Builds classification records via the real pipeline: a genome with the given calls
    /// at loci that all share one minor allele at frequency `af`.
    fn classify_calls(af: f64, calls: &[Option<(&[u8], &[u8])>]) -> Vec<crate::estimators::classify::ClassifiedLocus> {
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
    fn test_hand_computed_estimate() {
        // minor AF 0.25, major AF 0.75:
        //   locus 1: minor homozygote  => 1/0.25 - 1 = 3.0
        //   locus 2: heterozygote      => -1.0
        //   locus 3: major homozygote  => 1/0.75 - 1 = 1/3
        let classified = classify_calls(0.25, &[
            Some((b"C", b"C")),
            Some((b"A", b"C")),
            None
        ]);
        let estimate = estimate_ritland(&classified);
        assert_approx_eq!(estimate, (3.0 - 1.0 + 1.0 / 3.0) / 3.0);
    }

    #[test]
    fn test_low_frequency_exclusion() {
        // direct classification so we can craft a sub-threshold homozygote
        let vector = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.0005, "AF".to_string()).unwrap()
        ]).unwrap();
        let genotype_class = classify_genotype(&[b"C", b"C"], &vector).unwrap();
        assert!(genotype_class.class_type().is_homozygous());
        assert!(genotype_class.primary_frequency() <= MIN_HOMOZYGOTE_FREQUENCY);

        // the only locus is excluded, so the estimate falls back to 0
        let classified = classify_calls(0.0005, &[Some((b"C", b"C"))]);
        assert_eq!(estimate_ritland(&classified), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(estimate_ritland(&[]), 0.0);
    }
}
