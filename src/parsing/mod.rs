/*!
# Parsing module
Thin ingestion layer: VCF files become in-memory `Population` arenas and the panel
metadata table becomes a `Pedigree`. Everything downstream is file-format agnostic.
*/
/// Loads the tab-separated panel metadata into a Pedigree
pub mod pedigree_file;
/// Loads reference (frequency) and sample VCFs into Population arenas
pub mod population_vcf;
