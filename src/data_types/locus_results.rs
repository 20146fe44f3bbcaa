
use anyhow::bail;
use indexmap::IndexMap;

use crate::data_types::allele_freq::{AlleleClassFrequencies, AlleleClassType};
use crate::data_types::parameters::InbreedingParameters;

/// Per-genome accumulator for one parameter window: observed counts and expected (F=0)
/// frequencies per zygosity class, plus the final scalar estimate. Built up during the
/// classification pass and frozen once the estimator has filled in `inbred_allele_sum`.
#[derive(Clone, Debug, PartialEq)]
pub struct LocusResults {
    /// The genome this accumulator belongs to
    genome_id: String,
    /// Observed locus count per class, indexed by `AlleleClassType`
    class_counts: [u64; 4],
    /// Summed expected class frequencies at F=0, indexed by `AlleleClassType`
    expected_frequencies: [f64; 4],
    /// Number of loci successfully classified for this genome
    total_allele_count: u64,
    /// The estimator output, i.e. the point estimate of F
    inbred_allele_sum: f64
}

impl LocusResults {
    /// Creates an empty accumulator for a genome
    pub fn new(genome_id: String) -> Self {
        Self {
            genome_id,
            class_counts: [0; 4],
            expected_frequencies: [0.0; 4],
            total_allele_count: 0,
            inbred_allele_sum: 0.0
        }
    }

    /// Records one classified locus: bumps the observed class count and folds the locus's
    /// expected class distribution (evaluated at F=0) into the running sums.
    /// # Arguments
    /// * `class_type` - the observed zygosity class
    /// * `expected` - the locus's theoretical class probabilities at F=0
    pub fn add_locus(&mut self, class_type: AlleleClassType, expected: &AlleleClassFrequencies) {
        self.class_counts[class_type.index()] += 1;
        for class in AlleleClassType::ALL_CLASSES {
            self.expected_frequencies[class.index()] += expected.get(class);
        }
        self.total_allele_count += 1;
    }

    /// Stores the estimator output; called exactly once, after which the struct is read-only
    pub fn set_estimate(&mut self, estimate: f64) {
        self.inbred_allele_sum = estimate;
    }

    /// Observed count for one class
    pub fn count(&self, class_type: AlleleClassType) -> u64 {
        self.class_counts[class_type.index()]
    }

    /// Summed expected frequency for one class
    pub fn expected_frequency(&self, class_type: AlleleClassType) -> f64 {
        self.expected_frequencies[class_type.index()]
    }

    /// Observed count across both homozygous classes
    pub fn observed_homozygous(&self) -> u64 {
        self.count(AlleleClassType::MajorHomozygous) + self.count(AlleleClassType::MinorHomozygous)
    }

    /// Observed count across both heterozygous classes
    pub fn observed_heterozygous(&self) -> u64 {
        self.count(AlleleClassType::MajorHeterozygous) + self.count(AlleleClassType::MinorHeterozygous)
    }

    /// Expected frequency sum across both homozygous classes
    pub fn expected_homozygous(&self) -> f64 {
        self.expected_frequency(AlleleClassType::MajorHomozygous) + self.expected_frequency(AlleleClassType::MinorHomozygous)
    }

    /// Expected frequency sum across both heterozygous classes
    pub fn expected_heterozygous(&self) -> f64 {
        self.expected_frequency(AlleleClassType::MajorHeterozygous) + self.expected_frequency(AlleleClassType::MinorHeterozygous)
    }

    // getters
    pub fn genome_id(&self) -> &str {
        &self.genome_id
    }

    pub fn total_allele_count(&self) -> u64 {
        self.total_allele_count
    }

    pub fn inbred_allele_sum(&self) -> f64 {
        self.inbred_allele_sum
    }
}

/// One window's results, keyed by genome id. Insertion order is preserved so the report
/// rows come out in a stable order.
pub type ResultsMap = IndexMap<String, LocusResults>;

/// The full output of an evaluation: an identifier for the genome set plus the ordered
/// sequence of (window parameters, per-genome results) pairs.
#[derive(Clone, Debug, Default)]
pub struct InbreedingOutputResults {
    /// Identifier for the population / genome set these results describe
    identifier: String,
    /// Ordered windows with their results
    windows: Vec<(InbreedingParameters, ResultsMap)>
}

impl InbreedingOutputResults {
    /// Constructor
    pub fn new(identifier: String) -> Self {
        Self {
            identifier,
            windows: vec![]
        }
    }

    /// Appends one completed window
    pub fn add_window(&mut self, params: InbreedingParameters, results: ResultsMap) {
        self.windows.push((params, results));
    }

    /// Verifies that every window covers exactly the same genome-id set as the first
    /// window. Reports with ragged columns are worse than no report, so a mismatch is a
    /// hard failure for the caller.
    /// # Errors
    /// * if any window's genome set differs from the first window's
    pub fn validate_consistent_genomes(&self) -> anyhow::Result<()> {
        let Some((_first_params, first_map)) = self.windows.first() else {
            return Ok(());
        };

        for (index, (params, map)) in self.windows.iter().enumerate().skip(1) {
            if map.len() != first_map.len() || !first_map.keys().all(|k| map.contains_key(k)) {
                bail!(
                    "Window {} ({}) holds {} genomes but the first window holds {}; result schemas are mismatched",
                    index, params.window_label(), map.len(), first_map.len()
                );
            }
        }
        Ok(())
    }

    /// The genome ids of the first window, which validation guarantees to be the schema
    /// for every other window
    pub fn genome_ids(&self) -> Vec<&str> {
        self.windows.first()
            .map(|(_p, map)| map.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }

    // getters
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn windows(&self) -> &[(InbreedingParameters, ResultsMap)] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    use crate::data_types::allele_freq::{AlleleFreqRecord, AlleleFreqVector};

    #[test]
    fn test_locus_accumulation() {
        let vector = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.3, "AF".to_string()).unwrap()
        ]).unwrap();
        let expected = AlleleClassFrequencies::from_vector(&vector, 0.0);

        let mut results = LocusResults::new("HG00096".to_string());
        results.add_locus(AlleleClassType::MinorHomozygous, &expected);
        results.add_locus(AlleleClassType::MajorHeterozygous, &expected);

        assert_eq!(results.count(AlleleClassType::MinorHomozygous), 1);
        assert_eq!(results.count(AlleleClassType::MajorHeterozygous), 1);
        assert_eq!(results.count(AlleleClassType::MajorHomozygous), 0);
        assert_eq!(results.total_allele_count(), 2);
        assert_eq!(results.observed_homozygous(), 1);
        assert_eq!(results.observed_heterozygous(), 1);

        // two loci worth of expected frequencies, each summing to ~1
        assert_approx_eq!(results.expected_homozygous() + results.expected_heterozygous(), 2.0);

        results.set_estimate(0.25);
        assert_approx_eq!(results.inbred_allele_sum(), 0.25);
    }

    #[test]
    fn test_window_schema_validation() {
        let params = InbreedingParameters::default();

        let mut output = InbreedingOutputResults::new("test_pop".to_string());
        assert!(output.validate_consistent_genomes().is_ok());

        let mut window1 = ResultsMap::default();
        window1.insert("HG00096".to_string(), LocusResults::new("HG00096".to_string()));
        window1.insert("HG00097".to_string(), LocusResults::new("HG00097".to_string()));
        output.add_window(params.clone(), window1);
        assert!(output.validate_consistent_genomes().is_ok());

        // same set, different insertion order is fine
        let mut window2 = ResultsMap::default();
        window2.insert("HG00097".to_string(), LocusResults::new("HG00097".to_string()));
        window2.insert("HG00096".to_string(), LocusResults::new("HG00096".to_string()));
        output.add_window(params.clone(), window2);
        assert!(output.validate_consistent_genomes().is_ok());

        // a dropped genome breaks the schema
        let mut window3 = ResultsMap::default();
        window3.insert("HG00096".to_string(), LocusResults::new("HG00096".to_string()));
        output.add_window(params, window3);
        assert!(output.validate_consistent_genomes().is_err());
    }
}
