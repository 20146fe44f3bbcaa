
use log::warn;

use crate::data_types::allele_freq::{classify_genotype, AlleleClassFrequencies, ClassifiedGenotype};
use crate::data_types::locus_results::LocusResults;
use crate::data_types::population::Genome;
use crate::locus_sampler::LocusVariant;

/// One locus's classification outcome for a genome, retained alongside the aggregate
/// counts because the estimators need the per-locus frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedLocus {
    /// 0-based contig offset of the locus
    position: u64,
    /// The class assignment plus the relevant allele frequencies
    genotype_class: ClassifiedGenotype
}

impl ClassifiedLocus {
    // getters
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn genotype_class(&self) -> &ClassifiedGenotype {
        &self.genotype_class
    }
}

/// The shared first pass of every estimator: walks the locus list, classifies the
/// genome's genotype at each locus, and accumulates both the observed class counts and
/// the theoretical class frequencies at the F=0 baseline.
///
/// A genome with no variant record at a locus called zero minor alleles and classifies as
/// major-homozygous. Loci with malformed genotypes (more than two calls) are skipped with
/// a warning; everything else continues.
/// # Arguments
/// * `genome` - the sample genome being evaluated
/// * `contig_name` - the contig the locus list was sampled from
/// * `loci` - the shared locus catalog for the genome's super-population
pub fn classify_loci(genome: &Genome, contig_name: &str, loci: &[LocusVariant]) -> (LocusResults, Vec<ClassifiedLocus>) {
    let mut results = LocusResults::new(genome.identifier().to_string());
    let mut classified = Vec::with_capacity(loci.len());

    for locus in loci.iter() {
        let vector = locus.frequencies();

        // no record or no call means zero minor alleles were observed
        let called = genome.genotype_at(contig_name, locus.position())
            .map(|g| g.called_alleles())
            .unwrap_or_default();

        let genotype_class = match classify_genotype(&called, vector) {
            Ok(gc) => gc,
            Err(e) => {
                warn!(
                    "Skipping locus at {}:{} for genome {}: {e}",
                    contig_name, locus.position(), genome.identifier()
                );
                continue;
            }
        };

        let expected = AlleleClassFrequencies::from_vector(vector, 0.0);
        results.add_locus(genotype_class.class_type(), &expected);
        classified.push(ClassifiedLocus {
            position: locus.position(),
            genotype_class
        });
    }

    (results, classified)
}
