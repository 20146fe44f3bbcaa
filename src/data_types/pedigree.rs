
use rustc_hash::FxHashMap;

/// Canonical super-population (coarse ancestry) codes used to select the matching
/// allele-frequency field in the reference data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumString)]
pub enum SuperPopulation {
    #[strum(serialize = "AFR")]
    African,
    #[strum(serialize = "AMR")]
    Admixed,
    #[strum(serialize = "EAS")]
    EastAsian,
    #[strum(serialize = "EUR")]
    European,
    #[strum(serialize = "SAS")]
    SouthAsian,
    /// The pooled cross-population grouping, also the fallback for unknown codes
    #[strum(serialize = "ALL")]
    All
}

impl SuperPopulation {
    /// All ancestry-specific codes, excluding the pooled ALL grouping
    pub const ANCESTRY_CODES: [SuperPopulation; 5] = [
        SuperPopulation::African,
        SuperPopulation::Admixed,
        SuperPopulation::EastAsian,
        SuperPopulation::European,
        SuperPopulation::SouthAsian
    ];
}

/// Pedigree metadata for one sample genome.
#[derive(Clone, Debug, PartialEq)]
pub struct PedigreeRecord {
    /// The sample / genome identifier
    sample_id: String,
    /// Fine-grained population code, e.g. "YRI"
    population: String,
    /// Human-readable population description
    population_description: String,
    /// The super-population the sample belongs to
    super_population: SuperPopulation,
    /// Human-readable super-population description
    super_population_description: String
}

impl PedigreeRecord {
    /// Constructor
    pub fn new(
        sample_id: String, population: String, population_description: String,
        super_population: SuperPopulation, super_population_description: String
    ) -> Self {
        Self {
            sample_id,
            population,
            population_description,
            super_population,
            super_population_description
        }
    }

    // getters
    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn population(&self) -> &str {
        &self.population
    }

    pub fn population_description(&self) -> &str {
        &self.population_description
    }

    pub fn super_population(&self) -> SuperPopulation {
        self.super_population
    }

    pub fn super_population_description(&self) -> &str {
        &self.super_population_description
    }
}

/// The pedigree provider: genome id to metadata lookup. A missing record is an expected
/// condition the caller skips and warns about, never an error from this type.
#[derive(Clone, Debug, Default)]
pub struct Pedigree {
    /// Records keyed by sample id
    records: FxHashMap<String, PedigreeRecord>
}

impl Pedigree {
    /// Builds a pedigree from a record list. Later duplicates replace earlier ones.
    pub fn from_records(records: Vec<PedigreeRecord>) -> Self {
        let mut pedigree = Self::default();
        for record in records {
            pedigree.insert(record);
        }
        pedigree
    }

    /// Adds or replaces one record
    pub fn insert(&mut self, record: PedigreeRecord) {
        self.records.insert(record.sample_id().to_string(), record);
    }

    /// Looks up the metadata for a genome; None means "skip this genome and warn"
    pub fn lookup(&self, genome_id: &str) -> Option<&PedigreeRecord> {
        self.records.get(genome_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_super_population_codes() {
        assert_eq!(SuperPopulation::from_str("AFR").unwrap(), SuperPopulation::African);
        assert_eq!(SuperPopulation::from_str("EAS").unwrap(), SuperPopulation::EastAsian);
        assert_eq!(SuperPopulation::from_str("ALL").unwrap(), SuperPopulation::All);
        assert!(SuperPopulation::from_str("XYZ").is_err());

        assert_eq!(SuperPopulation::African.to_string(), "AFR");
    }

    #[test]
    fn test_pedigree_lookup() {
        let record = PedigreeRecord::new(
            "HG00096".to_string(),
            "GBR".to_string(), "British".to_string(),
            SuperPopulation::European, "European ancestry".to_string()
        );
        let pedigree = Pedigree::from_records(vec![record.clone()]);

        assert_eq!(pedigree.lookup("HG00096"), Some(&record));
        assert_eq!(pedigree.lookup("HG99999"), None);
        assert_eq!(pedigree.len(), 1);
    }
}
