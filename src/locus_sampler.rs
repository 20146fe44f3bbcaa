
use anyhow::{bail, Context};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::data_types::allele_freq::{AlleleFreqError, AlleleFreqRecord, AlleleFreqVector};
use crate::data_types::parameters::InbreedingParameters;
use crate::data_types::pedigree::SuperPopulation;
use crate::data_types::population::{Population, VariantRecord};
use crate::frequency_fields::resolve_frequency_field;

/// One sampled locus: its contig offset plus the full minor-allele catalog, retained so
/// the estimators never have to touch the reference population again.
#[derive(Clone, Debug, PartialEq)]
pub struct LocusVariant {
    /// 0-based contig offset
    position: u64,
    /// The minor-allele catalog for the selected super-population
    frequencies: AlleleFreqVector
}

impl LocusVariant {
    /// Constructor
    pub fn new(position: u64, frequencies: AlleleFreqVector) -> Self {
        Self {
            position,
            frequencies
        }
    }

    // getters
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn frequencies(&self) -> &AlleleFreqVector {
        &self.frequencies
    }
}

/// An ordered, spacing-thinned list of sampled loci
pub type LocusList = Vec<LocusVariant>;

/// Super-population to shared locus list, for one contig and one window
pub type LocusMap = FxHashMap<SuperPopulation, Arc<LocusList>>;

/// Contig name to its per-super-population locus lists; rebuilt every window and shared
/// read-only across all worker threads evaluating that window
pub type ContigLocusMap = FxHashMap<String, LocusMap>;

/// Builds the minor-allele catalog for one reference variant from the resolved INFO
/// field. Returns None when the field is absent or no ALT carries a positive frequency,
/// which the sampler treats as "no minor alleles here".
/// Duplicate ALT alleles surface as a construction error so the sampler can reject the locus.
/// # Arguments
/// * `variant` - the reference variant record
/// * `field_name` - the source-specific frequency field to read
fn build_frequency_vector(variant: &VariantRecord, field_name: &str) -> Option<Result<AlleleFreqVector, AlleleFreqError>> {
    let values = variant.info_values(field_name)?;

    let mut records = vec![];
    for (alt_index, alt) in variant.alt_alleles().iter().enumerate() {
        let Some(&frequency) = values.get(alt_index) else {
            continue;
        };
        if frequency <= 0.0 {
            // an allele this population never carries is not a minor allele here
            continue;
        }
        match AlleleFreqRecord::new(alt.clone(), frequency, field_name.to_string()) {
            Ok(record) => records.push(record),
            Err(e) => return Some(Err(e))
        }
    }

    if records.is_empty() {
        None
    } else {
        Some(AlleleFreqVector::new(records))
    }
}

/// Core decision: is this reference variant a usable locus for the given window settings?
/// Checks SNV-ness, upstream filters, catalog construction, and the summed-frequency
/// bounds; spacing is applied by the caller since it depends on scan state.
fn qualify_locus(variant: &VariantRecord, field_name: &str, params: &InbreedingParameters) -> Option<AlleleFreqVector> {
    if !variant.is_snv() || !variant.passed_filters() {
        return None;
    }

    let vector = match build_frequency_vector(variant, field_name)? {
        Ok(v) => v,
        Err(e) => {
            debug!("Rejecting locus at offset {}: {e}", variant.position());
            return None;
        }
    };

    let minor_sum = vector.minor_sum();
    if minor_sum < params.min_allele_frequency() || minor_sum > params.max_allele_frequency() {
        return None;
    }

    Some(vector)
}

/// Samples the spacing/frequency-filtered locus list for one contig and super-population.
/// Pure function of its inputs: scans the reference variants in increasing offset order
/// over the window `[lower_offset, upper_offset)`, keeps qualifying SNVs, and greedily
/// thins them to the configured spacing. An empty result is valid.
/// # Arguments
/// * `reference` - the frequency-source population, must hold exactly one pooled genome
/// * `contig_name` - the contig to sample from
/// * `super_population` - selects the frequency field via the source schema
/// * `params` - window bounds, frequency bounds, spacing, and source
/// # Errors
/// * if the reference population does not hold exactly one genome
/// * if the named contig does not exist in the reference
pub fn sample_loci(
    reference: &Population,
    contig_name: &str,
    super_population: SuperPopulation,
    params: &InbreedingParameters
) -> anyhow::Result<LocusList> {
    let genome = reference.single_genome()
        .with_context(|| "Reference population is not a pooled single-genome representation:")?;
    let Some(contig) = genome.contig(contig_name) else {
        bail!("Contig {contig_name:?} was not found in reference population {:?}", reference.name());
    };

    let field_name = resolve_frequency_field(params.source(), super_population);

    let mut accepted: LocusList = vec![];
    let mut last_accepted: Option<u64> = None;
    for variant in contig.variants().iter() {
        let position = variant.position();
        if position < params.lower_offset() {
            continue;
        }
        if position >= params.upper_offset() {
            break;
        }

        let Some(vector) = qualify_locus(variant, field_name, params) else {
            continue;
        };

        // greedy left-to-right thinning; this controls linkage, it is not optimal selection
        if let Some(last) = last_accepted {
            if position < last + params.locus_spacing() {
                continue;
            }
        }

        last_accepted = Some(position);
        accepted.push(LocusVariant::new(position, vector));
    }

    Ok(accepted)
}

/// Windowing helper: starting at `lower_offset`, scans forward and returns the exclusive
/// upper offset just past the `target_count`-th accepted locus, plus the number of loci
/// actually accepted. When the reference runs out first, the upper offset is the contig
/// end (clamped to the configured final offset).
/// # Arguments
/// * `reference` - the frequency-source population, must hold exactly one pooled genome
/// * `contig_name` - the contig to scan
/// * `super_population` - selects the frequency field used for qualification
/// * `params` - frequency bounds, spacing, source, and the overall final offset
/// * `lower_offset` - where this window starts
/// * `target_count` - how many accepted loci the window should hold
/// # Errors
/// * same preconditions as `sample_loci`
pub fn offset_after_count(
    reference: &Population,
    contig_name: &str,
    super_population: SuperPopulation,
    params: &InbreedingParameters,
    lower_offset: u64,
    target_count: usize
) -> anyhow::Result<(u64, usize)> {
    let genome = reference.single_genome()
        .with_context(|| "Reference population is not a pooled single-genome representation:")?;
    let Some(contig) = genome.contig(contig_name) else {
        bail!("Contig {contig_name:?} was not found in reference population {:?}", reference.name());
    };

    let field_name = resolve_frequency_field(params.source(), super_population);
    let scan_end = params.final_offset().min(contig.end_position().max(lower_offset));

    let mut count = 0;
    let mut last_accepted: Option<u64> = None;
    for variant in contig.variants().iter() {
        let position = variant.position();
        if position < lower_offset {
            continue;
        }
        if position >= scan_end {
            break;
        }

        if qualify_locus(variant, field_name, params).is_none() {
            continue;
        }

        if let Some(last) = last_accepted {
            if position < last + params.locus_spacing() {
                continue;
            }
        }

        last_accepted = Some(position);
        count += 1;
        if count >= target_count {
            return Ok((position + 1, count));
        }
    }

    Ok((scan_end, count))
}

/// Builds the full per-window locus catalog: every contig of the reference crossed with
/// every requested super-population. Lists are wrapped in `Arc` since all worker threads
/// of the window share them read-only.
/// # Arguments
/// * `reference` - the frequency-source population
/// * `super_populations` - the super-populations observed among the samples
/// * `params` - the current window parameters
/// # Errors
/// * same preconditions as `sample_loci`
pub fn build_locus_catalog(
    reference: &Population,
    super_populations: &[SuperPopulation],
    params: &InbreedingParameters
) -> anyhow::Result<ContigLocusMap> {
    let genome = reference.single_genome()
        .with_context(|| "Reference population is not a pooled single-genome representation:")?;

    let mut catalog: ContigLocusMap = Default::default();
    for contig in genome.contigs().iter() {
        let mut locus_map: LocusMap = Default::default();
        for &super_population in super_populations.iter() {
            let loci = sample_loci(reference, contig.name(), super_population, params)?;
            debug!("Sampled {} loci for {} / {} in window {}", loci.len(), contig.name(), super_population, params.window_label());
            locus_map.insert(super_population, Arc::new(loci));
        }
        catalog.insert(contig.name().to_string(), locus_map);
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data_types::parameters::InbreedingParametersBuilder;
    use crate::data_types::population::{Contig, Genome};

    /// Builds a pooled single-genome reference with SNVs every `step` offsets on "chr1",
    /// each carrying `af` under both the pooled and AFR gnomad 2.1 fields.
    fn build_reference(num_variants: u64, step: u64, af: f64) -> Population {
        let mut contig = Contig::new("chr1".to_string());
        for i in 0..num_variants {
            let mut variant = VariantRecord::new(i * step, vec![b"A".to_vec(), b"C".to_vec()]).unwrap();
            variant.add_info_field("AF".to_string(), vec![af]);
            variant.add_info_field("AF_afr".to_string(), vec![af]);
            contig.add_variant(variant).unwrap();
        }

        let mut genome = Genome::new("pooled".to_string());
        genome.add_contig(contig).unwrap();

        let mut population = Population::new("reference".to_string());
        population.add_genome(genome);
        population
    }

    #[test]
    fn test_spacing_invariant() {
        let reference = build_reference(100, 100, 0.3);
        let params = InbreedingParametersBuilder::default()
            .upper_offset(10000_u64)
            .locus_spacing(250_u64)
            .build().unwrap();

        let loci = sample_loci(&reference, "chr1", SuperPopulation::All, &params).unwrap();
        assert!(!loci.is_empty());
        for pair in loci.windows(2) {
            assert!(pair[1].position() >= pair[0].position() + 250);
        }
    }

    #[test]
    fn test_frequency_bounds() {
        // af=0.02 is below the default 0.05 floor, everything is rejected
        let reference = build_reference(50, 100, 0.02);
        let params = InbreedingParametersBuilder::default()
            .upper_offset(10000_u64)
            .locus_spacing(1_u64)
            .build().unwrap();
        let loci = sample_loci(&reference, "chr1", SuperPopulation::All, &params).unwrap();
        assert!(loci.is_empty());

        // af=0.6 is above the default 0.5 ceiling
        let reference = build_reference(50, 100, 0.6);
        let loci = sample_loci(&reference, "chr1", SuperPopulation::All, &params).unwrap();
        assert!(loci.is_empty());

        // widen the bounds and the same loci qualify
        let params = InbreedingParametersBuilder::default()
            .upper_offset(10000_u64)
            .locus_spacing(1_u64)
            .max_allele_frequency(0.9)
            .build().unwrap();
        let loci = sample_loci(&reference, "chr1", SuperPopulation::All, &params).unwrap();
        assert_eq!(loci.len(), 50);
    }

    #[test]
    fn test_window_bounds_and_skips() {
        // SNV grid at 0..=900, then a failed-filter SNV and a non-SNV indel past the grid
        let mut contig = Contig::new("chr1".to_string());
        for i in 0..10 {
            let mut variant = VariantRecord::new(i * 100, vec![b"A".to_vec(), b"C".to_vec()]).unwrap();
            variant.add_info_field("AF".to_string(), vec![0.3]);
            contig.add_variant(variant).unwrap();
        }

        let mut failed = VariantRecord::new(2000, vec![b"A".to_vec(), b"C".to_vec()]).unwrap();
        failed.add_info_field("AF".to_string(), vec![0.3]);
        failed.set_filter_status(false);
        contig.add_variant(failed).unwrap();

        let mut indel = VariantRecord::new(2100, vec![b"AT".to_vec(), b"A".to_vec()]).unwrap();
        indel.add_info_field("AF".to_string(), vec![0.3]);
        contig.add_variant(indel).unwrap();

        let mut genome = Genome::new("pooled".to_string());
        genome.add_contig(contig).unwrap();
        let mut reference = Population::new("reference".to_string());
        reference.add_genome(genome);

        let params = InbreedingParametersBuilder::default()
            .lower_offset(300_u64)
            .upper_offset(3000_u64)
            .locus_spacing(1_u64)
            .build().unwrap();
        let loci = sample_loci(&reference, "chr1", SuperPopulation::All, &params).unwrap();

        // offsets 300..900 qualify; 2000 fails filters, 2100 is not a SNV
        assert_eq!(loci.len(), 7);
        assert_eq!(loci[0].position(), 300);
        assert_eq!(loci.last().unwrap().position(), 900);
    }

    #[test]
    fn test_missing_field_is_not_an_error() {
        let reference = build_reference(10, 100, 0.3);
        let params = InbreedingParametersBuilder::default()
            .upper_offset(10000_u64)
            .build().unwrap();

        // EAS frequencies were never annotated, so nothing qualifies
        let loci = sample_loci(&reference, "chr1", SuperPopulation::EastAsian, &params).unwrap();
        assert!(loci.is_empty());
    }

    #[test]
    fn test_precondition_errors() {
        let params = InbreedingParametersBuilder::default().build().unwrap();

        // two pooled genomes is a structural error
        let mut population = build_reference(5, 100, 0.3);
        population.add_genome(Genome::new("extra".to_string()));
        assert!(sample_loci(&population, "chr1", SuperPopulation::All, &params).is_err());

        // unknown contig is an error, not a crash
        let reference = build_reference(5, 100, 0.3);
        assert!(sample_loci(&reference, "chrX", SuperPopulation::All, &params).is_err());
    }

    #[test]
    fn test_offset_after_count() {
        let reference = build_reference(100, 100, 0.3);
        let params = InbreedingParametersBuilder::default()
            .locus_spacing(100_u64)
            .final_offset(u64::MAX)
            .build().unwrap();

        // 25 loci starting at 0: offsets 0, 100, ..., 2400 => upper is 2401
        let (upper, count) = offset_after_count(&reference, "chr1", SuperPopulation::All, &params, 0, 25).unwrap();
        assert_eq!(count, 25);
        assert_eq!(upper, 2401);

        // asking past the end returns the contig end and the leftover count
        let (upper, count) = offset_after_count(&reference, "chr1", SuperPopulation::All, &params, 9000, 25).unwrap();
        assert_eq!(count, 10);
        assert_eq!(upper, 9901);
    }

    #[test]
    fn test_catalog_build() {
        let reference = build_reference(20, 100, 0.3);
        let params = InbreedingParametersBuilder::default()
            .upper_offset(10000_u64)
            .locus_spacing(1_u64)
            .build().unwrap();

        let catalog = build_locus_catalog(
            &reference, &[SuperPopulation::All, SuperPopulation::African, SuperPopulation::EastAsian], &params
        ).unwrap();
        let locus_map = catalog.get("chr1").unwrap();
        assert_eq!(locus_map.get(&SuperPopulation::All).unwrap().len(), 20);
        assert_eq!(locus_map.get(&SuperPopulation::African).unwrap().len(), 20);
        // no EAS annotations in the test reference
        assert!(locus_map.get(&SuperPopulation::EastAsian).unwrap().is_empty());
    }
}
