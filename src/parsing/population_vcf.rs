
use anyhow::{anyhow, bail, Context};
use log::{debug, info, warn};
use noodles::vcf;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use noodles_util::variant::io::reader::Builder as VcfBuilder;
use std::path::Path;

use crate::data_types::parameters::FrequencySource;
use crate::data_types::population::{Contig, DiploidGenotype, Genome, Population, VariantRecord};
use crate::frequency_fields::all_frequency_fields;

/// Pulls the float values out of one INFO field, handling both scalar and per-ALT array
/// encodings. Returns Ok(None) when the field is absent, and an error when the field is
/// present but not numeric; the caller decides skip-vs-abort per the data-error policy.
/// # Arguments
/// * `record` - the parsed record
/// * `field_name` - the INFO field to read
fn info_float_values(record: &vcf::variant::RecordBuf, field_name: &str) -> anyhow::Result<Option<Vec<f64>>> {
    use vcf::variant::record_buf::info::field::{value::Array, Value};

    let Some(Some(value)) = record.info().get(field_name) else {
        return Ok(None);
    };

    match value {
        Value::Float(f) => Ok(Some(vec![*f as f64])),
        Value::Array(Array::Float(values)) => {
            Ok(Some(values.iter().map(|v| v.unwrap_or(0.0) as f64).collect()))
        },
        other => Err(anyhow!("INFO field {field_name} has non-float value {other:?}"))
    }
}

/// True if the record passed upstream quality filters: either no filters were applied or
/// the only entry is PASS.
fn passed_filters(record: &vcf::variant::RecordBuf) -> bool {
    let filters = record.filters().as_ref();
    filters.is_empty() || (filters.len() == 1 && filters.contains("PASS"))
}

/// Shared record unpacking: 0-based position plus all allele sequences, REF first.
fn unpack_site(record: &vcf::variant::RecordBuf) -> anyhow::Result<(u64, Vec<Vec<u8>>)> {
    let position = record.variant_start().ok_or(anyhow!("Missing POS"))?;
    let zero_based = (position.get() - 1) as u64;

    let mut alleles = vec![record.reference_bases().as_bytes().to_vec()];
    for alt in record.alternate_bases().as_ref().iter() {
        alleles.push(alt.as_bytes().to_vec());
    }
    Ok((zero_based, alleles))
}

/// Loads a frequency-source VCF into the pooled single-genome reference representation:
/// one genome holding every record's alleles, filter status, and the INFO frequency
/// annotations for all six fields of the configured source schema.
/// # Arguments
/// * `vcf_fn` - the reference VCF path, plain or compressed
/// * `source` - which frequency schema's fields to pre-load
/// * `contig_filter` - if set, only records on this contig are kept
/// # Errors
/// * on any I/O or header parsing failure
pub fn load_reference_population(
    vcf_fn: &Path,
    source: FrequencySource,
    contig_filter: Option<&str>
) -> anyhow::Result<Population> {
    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?}:"))?;
    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

    let frequency_fields = all_frequency_fields(source);

    let mut genome = Genome::new("pooled".to_string());
    let mut record_count: usize = 0;
    for result in vcf_reader.records(&vcf_header) {
        let record = result?;
        let record_buf = vcf::variant::RecordBuf::try_from_variant_record(&vcf_header, record.as_ref())?;

        let chrom = record_buf.reference_sequence_name().to_string();
        if let Some(only) = contig_filter {
            if chrom != only {
                continue;
            }
        }

        let (position, alleles) = unpack_site(&record_buf)
            .with_context(|| format!("Error while unpacking record in {vcf_fn:?}:"))?;
        let mut variant = VariantRecord::new(position, alleles)?;
        variant.set_filter_status(passed_filters(&record_buf));

        for &field_name in frequency_fields.iter() {
            match info_float_values(&record_buf, field_name) {
                Ok(Some(values)) => variant.add_info_field(field_name.to_string(), values),
                Ok(None) => {},
                Err(e) => {
                    warn!("Skipping INFO field at {chrom}:{position}: {e}");
                }
            }
        }

        if genome.contig(&chrom).is_none() {
            genome.add_contig(Contig::new(chrom.clone()))?;
        }
        let contig = genome.contig_mut(&chrom).unwrap();
        if let Err(e) = contig.add_variant(variant) {
            debug!("Skipping out-of-order record at {chrom}:{position}: {e}");
            continue;
        }
        record_count += 1;
    }

    info!("Loaded {record_count} reference records from {vcf_fn:?}");
    let name = vcf_fn.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "reference".to_string());
    let mut population = Population::new(name);
    population.add_genome(genome);
    Ok(population)
}

/// Converts one sample's GT value into called allele sequences. Returns None when the
/// genotype is missing or partially missing; more than two calls is a data error.
/// # Arguments
/// * `gt` - the GT field value
/// * `alleles` - the site's allele sequences, REF first
fn parse_called_alleles(
    gt: &vcf::variant::record_buf::samples::sample::Value,
    alleles: &[Vec<u8>]
) -> anyhow::Result<Option<Vec<Vec<u8>>>> {
    let vcf::variant::record_buf::samples::sample::Value::Genotype(genotype) = gt else {
        return Ok(None);
    };

    let genotype_alleles = genotype.as_ref();
    if genotype_alleles.len() > 2 {
        bail!("genotype has {} alleles, diploid data expects at most 2", genotype_alleles.len());
    }

    let mut called = vec![];
    for allele in genotype_alleles.iter() {
        let Some(index) = allele.position() else {
            // a missing call invalidates the genotype for this site
            return Ok(None);
        };
        let Some(sequence) = alleles.get(index) else {
            bail!("genotype allele index {index} is out of range for the site");
        };
        called.push(sequence.clone());
    }

    if called.is_empty() {
        Ok(None)
    } else {
        Ok(Some(called))
    }
}

/// Loads a multi-sample VCF into the diploid sample population: one genome per sample,
/// each holding the records where that sample has a usable genotype call. Sites where a
/// sample has no call are simply absent, which downstream classification reads as
/// major-homozygous.
/// # Arguments
/// * `vcf_fn` - the sample VCF path, plain or compressed
/// * `contig_filter` - if set, only records on this contig are kept
/// # Errors
/// * on any I/O or header parsing failure, or a VCF without samples
pub fn load_sample_population(vcf_fn: &Path, contig_filter: Option<&str>) -> anyhow::Result<Population> {
    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?}:"))?;
    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

    let sample_names: Vec<String> = vcf_header.sample_names().iter().cloned().collect();
    if sample_names.is_empty() {
        bail!("Sample VCF {vcf_fn:?} declares no samples");
    }

    let mut genomes: Vec<Genome> = sample_names.iter()
        .map(|name| Genome::new(name.clone()))
        .collect();

    let mut record_count: usize = 0;
    for result in vcf_reader.records(&vcf_header) {
        let record = result?;
        let record_buf = vcf::variant::RecordBuf::try_from_variant_record(&vcf_header, record.as_ref())?;

        let chrom = record_buf.reference_sequence_name().to_string();
        if let Some(only) = contig_filter {
            if chrom != only {
                continue;
            }
        }

        let (position, alleles) = unpack_site(&record_buf)
            .with_context(|| format!("Error while unpacking record in {vcf_fn:?}:"))?;

        let all_samples = record_buf.samples();
        for (sample_index, genome) in genomes.iter_mut().enumerate() {
            let Some(sample) = all_samples.get_index(sample_index) else {
                continue;
            };
            let Some(Some(gt)) = sample.get(vcf_key::GENOTYPE) else {
                continue;
            };

            let called = match parse_called_alleles(gt, &alleles) {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping genotype for {} at {chrom}:{position}: {e}", genome.identifier());
                    continue;
                }
            };

            let mut variant = VariantRecord::new(position, alleles.clone())?;
            variant.set_filter_status(passed_filters(&record_buf));
            variant.set_genotype(DiploidGenotype::new(called)?);

            if genome.contig(&chrom).is_none() {
                genome.add_contig(Contig::new(chrom.clone()))?;
            }
            let contig = genome.contig_mut(&chrom).unwrap();
            if let Err(e) = contig.add_variant(variant) {
                debug!("Skipping out-of-order record for {} at {chrom}:{position}: {e}", genome.identifier());
            }
        }
        record_count += 1;
    }

    info!("Loaded {record_count} records across {} samples from {vcf_fn:?}", sample_names.len());
    let name = vcf_fn.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "samples".to_string());
    let mut population = Population::new(name);
    for genome in genomes {
        population.add_genome(genome);
    }
    Ok(population)
}
