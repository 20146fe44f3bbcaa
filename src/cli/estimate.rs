
use anyhow::{bail, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::parameters::{
    EstimatorKind, FrequencySource, InbreedingParameters, InbreedingParametersBuilder, SimpleForm
};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct EstimateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    meerkat_version: String,

    /// Reference allele-frequency VCF, the pooled frequency source
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_vcf_filename: PathBuf,

    /// Sample variant call file with one genotyped sample per genome (VCF)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "sample-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub sample_vcf_filename: PathBuf,

    /// Pedigree / panel metadata table (TSV)
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "pedigree")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub pedigree_filename: PathBuf,

    /// The contig to evaluate
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "contig")]
    #[clap(value_name = "CONTIG")]
    #[clap(help_heading = Some("Input/Output"))]
    pub contig: String,

    /// Output directory containing the summary report
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// The estimation algorithm: ritland, simple, hall, or loglikelihood
    #[clap(long = "algorithm")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Estimation parameters"))]
    #[clap(default_value = "ritland")]
    pub algorithm: String,

    /// The Simple estimator form: homozygous or heterozygous
    #[clap(long = "simple-form")]
    #[clap(value_name = "FORM")]
    #[clap(help_heading = Some("Estimation parameters"))]
    #[clap(default_value = "homozygous")]
    pub simple_form: String,

    /// Frequency source schema [default: identified from the reference filename]
    #[clap(long = "frequency-source")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Estimation parameters"))]
    #[clap(default_value = "", hide_default_value = true)]
    pub frequency_source: String,

    /// Minimum summed minor-allele frequency for a sampled locus
    #[clap(long = "min-af")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "0.05")]
    pub min_allele_frequency: f64,

    /// Maximum summed minor-allele frequency for a sampled locus
    #[clap(long = "max-af")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "0.5")]
    pub max_allele_frequency: f64,

    /// Minimum spacing (bp) between sampled loci
    #[clap(long = "locus-spacing")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "1000")]
    pub locus_spacing: u64,

    /// Target number of loci per window
    #[clap(long = "locus-count")]
    #[clap(value_name = "COUNT")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "100")]
    pub locus_count: usize,

    /// First contig offset to evaluate
    #[clap(long = "lower-offset")]
    #[clap(value_name = "OFFSET")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "0")]
    pub lower_offset: u64,

    /// Stop evaluating past this contig offset; 0 means the contig end
    #[clap(long = "final-offset")]
    #[clap(value_name = "OFFSET")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "0")]
    pub final_offset: u64,

    /// Seed for the stochastic estimators
    #[clap(long = "seed")]
    #[clap(value_name = "SEED")]
    #[clap(help_heading = Some("Estimation parameters"))]
    #[clap(default_value = "0")]
    pub random_seed: u64,

    /// Number of threads to use in the estimation step
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_estimate_settings(mut settings: EstimateSettings) -> anyhow::Result<EstimateSettings> {
    // hard code the version in
    settings.meerkat_version = FULL_VERSION.clone();
    info!("Meerkat version: {:?}", &settings.meerkat_version);
    info!("Sub-command: estimate");
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.reference_vcf_filename, "Reference VCF")?;
    check_required_filename(&settings.sample_vcf_filename, "Sample VCF")?;
    check_required_filename(&settings.pedigree_filename, "Pedigree table")?;
    check_optional_filename(settings.debug_folder.as_deref(), "Debug folder")?;

    // dump stuff to the logger
    info!("\tReference VCF: {:?}", &settings.reference_vcf_filename);
    info!("\tSample VCF: {:?}", &settings.sample_vcf_filename);
    info!("\tPedigree: {:?}", &settings.pedigree_filename);
    info!("\tContig: {:?}", &settings.contig);

    // outputs
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    // estimation parameters, including name parse checks so bad configs fail before loading
    let estimator = EstimatorKind::from_str(&settings.algorithm)
        .with_context(|| format!("Unknown estimation algorithm {:?}", settings.algorithm))?;
    SimpleForm::from_str(&settings.simple_form)
        .with_context(|| format!("Unknown simple-form {:?}", settings.simple_form))?;
    info!("Estimation parameters:");
    info!("\tAlgorithm: {estimator}");
    if estimator == EstimatorKind::Simple {
        info!("\tSimple form: {}", settings.simple_form);
    }
    info!("\tFrequency source: {}", resolve_frequency_source(&settings));
    info!("\tSeed: {}", settings.random_seed);

    // locus sampling parameters
    if settings.min_allele_frequency <= 0.0 || settings.min_allele_frequency >= settings.max_allele_frequency {
        bail!("--min-af must be >0 and less than --max-af");
    }
    if settings.max_allele_frequency > 1.0 {
        bail!("--max-af must be <=1.0");
    }
    if settings.locus_spacing == 0 {
        bail!("--locus-spacing must be >0");
    }
    if settings.locus_count == 0 {
        bail!("--locus-count must be >0");
    }
    info!("Locus sampling:");
    info!("\tAllele frequency range: [{}, {}]", settings.min_allele_frequency, settings.max_allele_frequency);
    info!("\tLocus spacing: {}", settings.locus_spacing);
    info!("\tLoci per window: {}", settings.locus_count);
    info!("\tOffset range: [{}, {})", settings.lower_offset, if settings.final_offset == 0 {
        "contig end".to_string()
    } else {
        settings.final_offset.to_string()
    });

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

/// The frequency source: explicit configuration when given, otherwise identified from the
/// reference filename.
pub fn resolve_frequency_source(settings: &EstimateSettings) -> FrequencySource {
    if settings.frequency_source.is_empty() {
        FrequencySource::identify(&settings.reference_vcf_filename.to_string_lossy())
    } else {
        FrequencySource::from_str(&settings.frequency_source)
            .unwrap_or_else(|_| FrequencySource::identify(&settings.frequency_source))
    }
}

/// Converts the validated CLI settings into the engine's parameter record
pub fn build_parameters(settings: &EstimateSettings) -> anyhow::Result<InbreedingParameters> {
    let estimator = EstimatorKind::from_str(&settings.algorithm)
        .with_context(|| format!("Unknown estimation algorithm {:?}", settings.algorithm))?;
    let simple_form = SimpleForm::from_str(&settings.simple_form)
        .with_context(|| format!("Unknown simple-form {:?}", settings.simple_form))?;

    // 0 is just a sentinel for "run to the contig end"
    let final_offset = if settings.final_offset == 0 {
        u64::MAX
    } else {
        settings.final_offset
    };

    let params = InbreedingParametersBuilder::default()
        .min_allele_frequency(settings.min_allele_frequency)
        .max_allele_frequency(settings.max_allele_frequency)
        .lower_offset(settings.lower_offset)
        .final_offset(final_offset)
        .locus_spacing(settings.locus_spacing)
        .locus_count(settings.locus_count)
        .estimator(estimator)
        .simple_form(simple_form)
        .source(resolve_frequency_source(settings))
        .random_seed(settings.random_seed)
        .build()?;
    Ok(params)
}
