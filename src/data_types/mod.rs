
/// Minor-allele frequency catalogs, zygosity classes, and the class-probability model
pub mod allele_freq;
/// Per-genome result accumulators and the windowed output structure
pub mod locus_results;
/// Evaluation configuration: estimator selection, frequency bounds, windows, tunables
pub mod parameters;
/// Super-population codes and the pedigree metadata provider
pub mod pedigree;
/// Arena-indexed Population/Genome/Contig/VariantRecord storage
pub mod population;
