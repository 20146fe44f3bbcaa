
use itertools::Itertools;

/// Allowed slack when checking that minor-allele frequencies sum to at most 1.0
pub const FREQ_SUM_EPSILON: f64 = 1e-3;

/// The four zygosity classes a diploid genotype can fall into relative to a locus's minor-allele catalog
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, strum_macros::AsRefStr)]
pub enum AlleleClassType {
    /// No minor alleles called; both alleles are the (unrecorded) major allele
    #[strum(serialize = "MAJOR_HOM")]
    MajorHomozygous=0,
    /// Exactly one minor allele called alongside the major allele
    #[strum(serialize = "MAJOR_HET")]
    MajorHeterozygous,
    /// Two identical minor alleles called
    #[strum(serialize = "MINOR_HOM")]
    MinorHomozygous,
    /// Two distinct minor alleles called
    #[strum(serialize = "MINOR_HET")]
    MinorHeterozygous // make sure this stays the last one, tests iterate via ALL_CLASSES
}

impl AlleleClassType {
    /// All classes in index order, mostly for iteration in accumulators and tests
    pub const ALL_CLASSES: [AlleleClassType; 4] = [
        AlleleClassType::MajorHomozygous,
        AlleleClassType::MajorHeterozygous,
        AlleleClassType::MinorHomozygous,
        AlleleClassType::MinorHeterozygous
    ];

    /// Index into count/frequency arrays
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// True for the two homozygous classes
    pub fn is_homozygous(&self) -> bool {
        matches!(self, AlleleClassType::MajorHomozygous | AlleleClassType::MinorHomozygous)
    }

    /// True for the two heterozygous classes
    pub fn is_heterozygous(&self) -> bool {
        !self.is_homozygous()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AlleleFreqError {
    #[error("duplicate minor allele in frequency vector: {allele:?}")]
    DuplicateAllele { allele: String },
    #[error("minor allele frequencies sum to {sum}, which is > 1+epsilon")]
    ExcessiveFrequencySum { sum: f64 },
    #[error("allele frequency {frequency} is outside [0, 1]")]
    FrequencyOutOfRange { frequency: f64 },
    #[error("genotype has {count} called alleles, at most 2 are supported")]
    TooManyAlleles { count: usize }
}

/// A single minor-allele observation at a locus: the allele sequence, its population
/// frequency, and the source INFO field the frequency was read from.
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct AlleleFreqRecord {
    /// The minor allele sequence
    allele: Vec<u8>,
    /// Population frequency of this allele
    frequency: f64,
    /// The INFO field name the frequency was pulled from, e.g. "AF_afr"
    field_name: String
}

impl AlleleFreqRecord {
    /// Constructor, verifies the frequency is a valid probability
    /// # Arguments
    /// * `allele` - the minor allele sequence
    /// * `frequency` - the population frequency of the allele
    /// * `field_name` - the source INFO field name
    /// # Errors
    /// * if the frequency is outside [0, 1]
    pub fn new(allele: Vec<u8>, frequency: f64, field_name: String) -> Result<Self, AlleleFreqError> {
        if !(0.0..=1.0).contains(&frequency) {
            return Err(AlleleFreqError::FrequencyOutOfRange { frequency });
        }

        Ok(Self {
            allele,
            frequency,
            field_name
        })
    }

    // getters
    pub fn allele(&self) -> &[u8] {
        &self.allele
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

/// The set of all minor-allele frequency records observed at one locus for one super-population.
/// Invariants are enforced at construction: no duplicate alleles, and the summed minor
/// frequency can exceed 1.0 by at most `FREQ_SUM_EPSILON`.
#[derive(Clone, Debug, PartialEq)]
pub struct AlleleFreqVector {
    /// The minor-allele records at this locus
    records: Vec<AlleleFreqRecord>,
    /// Cached sum of the minor frequencies
    minor_sum: f64
}

impl AlleleFreqVector {
    /// Constructor, verifies the catalog invariants
    /// # Arguments
    /// * `records` - all minor-allele records at the locus
    /// # Errors
    /// * if two records share an allele sequence
    /// * if the summed minor frequency exceeds 1 + epsilon
    pub fn new(records: Vec<AlleleFreqRecord>) -> Result<Self, AlleleFreqError> {
        for (i, r1) in records.iter().enumerate() {
            for r2 in records[(i+1)..].iter() {
                if r1.allele() == r2.allele() {
                    return Err(AlleleFreqError::DuplicateAllele {
                        allele: String::from_utf8_lossy(r1.allele()).to_string()
                    });
                }
            }
        }

        let minor_sum: f64 = records.iter().map(|r| r.frequency()).sum();
        if minor_sum > 1.0 + FREQ_SUM_EPSILON {
            return Err(AlleleFreqError::ExcessiveFrequencySum { sum: minor_sum });
        }

        Ok(Self {
            records,
            minor_sum
        })
    }

    /// The major-allele frequency, defined as 1 - sum(minor frequencies) and clamped to [0, 1]
    pub fn major_frequency(&self) -> f64 {
        (1.0 - self.minor_sum).clamp(0.0, 1.0)
    }

    /// Finds the record for a called allele, or None if the allele is not a catalogued minor
    /// # Arguments
    /// * `allele` - the called allele sequence to look up
    pub fn find(&self, allele: &[u8]) -> Option<&AlleleFreqRecord> {
        self.records.iter().find(|r| r.allele() == allele)
    }

    // getters
    pub fn records(&self) -> &[AlleleFreqRecord] {
        &self.records
    }

    pub fn minor_sum(&self) -> f64 {
        self.minor_sum
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The four theoretical class probabilities for a locus under a given inbreeding coefficient F.
/// For any F in [-1, 1] the four values sum to 1 (within float tolerance), which is the core
/// invariant of the genotype model.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlleleClassFrequencies {
    /// P(both alleles are the major allele) = F*p + (1-F)*p^2
    pub major_homozygous: f64,
    /// P(one major, one minor) = (1-F) * 2p * sum(q_i)
    pub major_heterozygous: f64,
    /// P(two copies of the same minor) = sum(F*q_i + (1-F)*q_i^2)
    pub minor_homozygous: f64,
    /// P(two distinct minors) = (1-F) * sum_{i<j}(2 * q_i * q_j)
    pub minor_heterozygous: f64
}

impl AlleleClassFrequencies {
    /// Computes the class probabilities for a frequency vector under inbreeding coefficient `f`
    /// # Arguments
    /// * `vector` - the minor-allele catalog for the locus
    /// * `f` - the inbreeding coefficient, expected in [-1, 1]
    pub fn from_vector(vector: &AlleleFreqVector, f: f64) -> Self {
        let p_major = vector.major_frequency();

        let major_homozygous = f * p_major + (1.0 - f) * p_major * p_major;

        let mut major_heterozygous = 0.0;
        let mut minor_homozygous = 0.0;
        for record in vector.records().iter() {
            let q = record.frequency();
            major_heterozygous += (1.0 - f) * 2.0 * p_major * q;
            minor_homozygous += f * q + (1.0 - f) * q * q;
        }

        let minor_heterozygous: f64 = vector.records().iter()
            .tuple_combinations()
            .map(|(r1, r2)| (1.0 - f) * 2.0 * r1.frequency() * r2.frequency())
            .sum();

        Self {
            major_homozygous,
            major_heterozygous,
            minor_homozygous,
            minor_heterozygous
        }
    }

    /// Returns the probability for one class
    pub fn get(&self, class_type: AlleleClassType) -> f64 {
        match class_type {
            AlleleClassType::MajorHomozygous => self.major_homozygous,
            AlleleClassType::MajorHeterozygous => self.major_heterozygous,
            AlleleClassType::MinorHomozygous => self.minor_homozygous,
            AlleleClassType::MinorHeterozygous => self.minor_heterozygous
        }
    }

    /// Sum over all four classes, should always be 1.0 within tolerance
    pub fn sum(&self) -> f64 {
        self.major_homozygous + self.major_heterozygous + self.minor_homozygous + self.minor_heterozygous
    }
}

/// The outcome of classifying one diploid genotype against a locus catalog: the zygosity
/// class plus the one or two allele frequencies the estimators need downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedGenotype {
    /// The assigned zygosity class
    class_type: AlleleClassType,
    /// Homozygous classes: the homozygote allele frequency. Heterozygous classes: the first allele frequency.
    primary_frequency: f64,
    /// Heterozygous classes only: the second allele frequency
    secondary_frequency: Option<f64>
}

impl ClassifiedGenotype {
    // getters
    pub fn class_type(&self) -> AlleleClassType {
        self.class_type
    }

    pub fn primary_frequency(&self) -> f64 {
        self.primary_frequency
    }

    pub fn secondary_frequency(&self) -> Option<f64> {
        self.secondary_frequency
    }
}

/// Classifies a diploid genotype at a locus by comparing the called alleles against the
/// minor-allele catalog. Alleles absent from the catalog count as the major allele.
/// An absent or empty call set means zero minor alleles and classifies as major-homozygous.
/// # Arguments
/// * `called_alleles` - the 0, 1, or 2 called allele sequences for the sample at this locus
/// * `vector` - the minor-allele catalog for the locus
/// # Errors
/// * if more than 2 alleles are called, which is a data error the caller should skip and log
pub fn classify_genotype(called_alleles: &[&[u8]], vector: &AlleleFreqVector) -> Result<ClassifiedGenotype, AlleleFreqError> {
    if called_alleles.len() > 2 {
        return Err(AlleleFreqError::TooManyAlleles { count: called_alleles.len() });
    }

    // collect the calls that match a catalogued minor allele
    let minor_hits: Vec<&AlleleFreqRecord> = called_alleles.iter()
        .filter_map(|a| vector.find(a))
        .collect();

    let p_major = vector.major_frequency();
    let classified = match minor_hits.len() {
        0 => ClassifiedGenotype {
            class_type: AlleleClassType::MajorHomozygous,
            primary_frequency: p_major,
            secondary_frequency: None
        },
        1 => ClassifiedGenotype {
            class_type: AlleleClassType::MajorHeterozygous,
            primary_frequency: p_major,
            secondary_frequency: Some(minor_hits[0].frequency())
        },
        _ => {
            if minor_hits[0].allele() == minor_hits[1].allele() {
                ClassifiedGenotype {
                    class_type: AlleleClassType::MinorHomozygous,
                    primary_frequency: minor_hits[0].frequency(),
                    secondary_frequency: None
                }
            } else {
                ClassifiedGenotype {
                    class_type: AlleleClassType::MinorHeterozygous,
                    primary_frequency: minor_hits[0].frequency(),
                    secondary_frequency: Some(minor_hits[1].frequency())
                }
            }
        }
    };

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    /// Builds a two-minor test vector: q1=0.2, q2=0.1, p_major=0.7
    fn test_vector() -> AlleleFreqVector {
        AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.2, "AF_afr".to_string()).unwrap(),
            AlleleFreqRecord::new(b"T".to_vec(), 0.1, "AF_afr".to_string()).unwrap()
        ]).unwrap()
    }

    #[test]
    fn test_major_frequency() {
        let vector = test_vector();
        assert_approx_eq!(vector.major_frequency(), 0.7);
        assert_approx_eq!(vector.minor_sum(), 0.3);
    }

    #[test]
    fn test_duplicate_allele() {
        let result = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.2, "AF".to_string()).unwrap(),
            AlleleFreqRecord::new(b"C".to_vec(), 0.1, "AF".to_string()).unwrap()
        ]);
        assert!(matches!(result, Err(AlleleFreqError::DuplicateAllele { .. })));
    }

    #[test]
    fn test_excessive_frequency_sum() {
        let result = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.8, "AF".to_string()).unwrap(),
            AlleleFreqRecord::new(b"T".to_vec(), 0.3, "AF".to_string()).unwrap()
        ]);
        assert!(matches!(result, Err(AlleleFreqError::ExcessiveFrequencySum { .. })));

        // right at the epsilon boundary is still allowed
        let boundary = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"C".to_vec(), 0.5005, "AF".to_string()).unwrap(),
            AlleleFreqRecord::new(b"T".to_vec(), 0.5, "AF".to_string()).unwrap()
        ]);
        assert!(boundary.is_ok());
        // the major frequency clamps at 0 rather than going negative
        assert_eq!(boundary.unwrap().major_frequency(), 0.0);
    }

    #[test]
    fn test_class_frequencies_sum_to_one() {
        // scan F across the full domain, the four classes must always total 1.0
        let vector = test_vector();
        let mut f = -1.0;
        while f <= 1.0 {
            let frequencies = AlleleClassFrequencies::from_vector(&vector, f);
            assert!((frequencies.sum() - 1.0).abs() < 1e-4, "sum invariant failed at F={f}");
            f += 0.01;
        }

        // also check a single-minor vector
        let single = AlleleFreqVector::new(vec![
            AlleleFreqRecord::new(b"A".to_vec(), 0.3, "AF".to_string()).unwrap()
        ]).unwrap();
        let mut f = -1.0;
        while f <= 1.0 {
            let frequencies = AlleleClassFrequencies::from_vector(&single, f);
            assert!((frequencies.sum() - 1.0).abs() < 1e-4, "sum invariant failed at F={f}");
            f += 0.01;
        }
    }

    #[test]
    fn test_class_frequencies_at_zero() {
        // F=0 is plain Hardy-Weinberg
        let vector = test_vector();
        let frequencies = AlleleClassFrequencies::from_vector(&vector, 0.0);
        assert_approx_eq!(frequencies.major_homozygous, 0.49);
        assert_approx_eq!(frequencies.major_heterozygous, 2.0 * 0.7 * 0.3);
        assert_approx_eq!(frequencies.minor_homozygous, 0.04 + 0.01);
        assert_approx_eq!(frequencies.minor_heterozygous, 2.0 * 0.2 * 0.1);
    }

    #[test]
    fn test_classify_genotype() {
        let vector = test_vector();

        // no calls at all => major homozygous
        let classified = classify_genotype(&[], &vector).unwrap();
        assert_eq!(classified.class_type(), AlleleClassType::MajorHomozygous);
        assert_approx_eq!(classified.primary_frequency(), 0.7);

        // a call that is not in the catalog counts as major
        let classified = classify_genotype(&[b"G", b"G"], &vector).unwrap();
        assert_eq!(classified.class_type(), AlleleClassType::MajorHomozygous);

        // one minor call
        let classified = classify_genotype(&[b"C"], &vector).unwrap();
        assert_eq!(classified.class_type(), AlleleClassType::MajorHeterozygous);
        assert_approx_eq!(classified.primary_frequency(), 0.7);
        assert_approx_eq!(classified.secondary_frequency().unwrap(), 0.2);

        // two identical minors
        let classified = classify_genotype(&[b"T", b"T"], &vector).unwrap();
        assert_eq!(classified.class_type(), AlleleClassType::MinorHomozygous);
        assert_approx_eq!(classified.primary_frequency(), 0.1);

        // two distinct minors
        let classified = classify_genotype(&[b"C", b"T"], &vector).unwrap();
        assert_eq!(classified.class_type(), AlleleClassType::MinorHeterozygous);
        assert_approx_eq!(classified.primary_frequency(), 0.2);
        assert_approx_eq!(classified.secondary_frequency().unwrap(), 0.1);

        // ploidy violation is an error, not a panic
        let result = classify_genotype(&[b"C", b"T", b"G"], &vector);
        assert!(matches!(result, Err(AlleleFreqError::TooManyAlleles { count: 3 })));
    }
}
