
use log::warn;

use crate::data_types::locus_results::LocusResults;
use crate::data_types::parameters::SimpleForm;

/// The simple excess-homozygosity estimator. Two algebraically equivalent forms exist and
/// the choice is explicit configuration: the homozygous form compares observed vs
/// expected homozygote counts, the heterozygous form compares heterozygote counts.
/// A degenerate denominator falls back to 0.0 with a warning.
/// # Arguments
/// * `results` - the accumulated class counts and expected frequencies for the genome
/// * `form` - which algebraic form to apply
pub fn estimate_simple(results: &LocusResults, form: SimpleForm) -> f64 {
    match form {
        SimpleForm::Homozygous => {
            let observed = results.observed_homozygous() as f64;
            let expected = results.expected_homozygous();
            let denominator = results.total_allele_count() as f64 - expected;
            if denominator.abs() < f64::EPSILON {
                warn!("Simple estimator (homozygous form) has a zero denominator for genome {}, reporting 0.0", results.genome_id());
                return 0.0;
            }
            (observed - expected) / denominator
        },
        SimpleForm::Heterozygous => {
            let observed = results.observed_heterozygous() as f64;
            let expected = results.expected_heterozygous();
            if expected.abs() < f64::EPSILON {
                warn!("Simple estimator (heterozygous form) has a zero expected heterozygosity for genome {}, reporting 0.0", results.genome_id());
                return 0.0;
            }
            1.0 - observed / expected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    use crate::data_types::allele_freq::{AlleleClassFrequencies, AlleleClassType, AlleleFreqRecord, AlleleFreqVector};

    /// Accumulates `homozygous` + `heterozygous` loci over a single-minor catalog at the
    /// given frequency.
    fn build_results(af: f64, homozygous: usize, heterozygous: usize) -> LocusResults {
        let vector = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), af, "AF".to_string()).unwrap()
        ]).unwrap();
        let expected = AlleleClassFrequencies::from_vector(&vector, 0.0);

        let mut results = LocusResults::new("sample1".to_string());
        for _ in 0..homozygous {
            results.add_locus(AlleleClassType::MinorHomozygous, &expected);
        }
        for _ in 0..heterozygous {
            results.add_locus(AlleleClassType::MajorHeterozygous, &expected);
        }
        results
    }

    #[test]
    fn test_homozygous_form() {
        // af=0.5: per-locus expected homozygosity 0.5, heterozygosity 0.5
        let results = build_results(0.5, 8, 2);
        // F = (8 - 5) / (10 - 5) = 0.6
        assert_approx_eq!(estimate_simple(&results, SimpleForm::Homozygous), 0.6);
    }

    #[test]
    fn test_heterozygous_form() {
        let results = build_results(0.5, 8, 2);
        // F = 1 - 2/5 = 0.6, the forms agree at this symmetric frequency
        assert_approx_eq!(estimate_simple(&results, SimpleForm::Heterozygous), 0.6);
    }

    #[test]
    fn test_outbred_is_near_zero() {
        // observed counts matching expectation imply F ~ 0
        let results = build_results(0.5, 5, 5);
        assert_eq!(estimate_simple(&results, SimpleForm::Homozygous), 0.0);
        assert_eq!(estimate_simple(&results, SimpleForm::Heterozygous), 0.0);
    }

    #[test]
    fn test_empty_results_fall_back() {
        let results = LocusResults::new("sample1".to_string());
        assert_eq!(estimate_simple(&results, SimpleForm::Homozygous), 0.0);
        assert_eq!(estimate_simple(&results, SimpleForm::Heterozygous), 0.0);
    }
}
