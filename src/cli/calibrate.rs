
use anyhow::{bail, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::parameters::{
    EstimatorKind, FrequencySource, InbreedingParameters, InbreedingParametersBuilder, SimpleForm
};
use crate::data_types::pedigree::SuperPopulation;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct CalibrateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    meerkat_version: String,

    /// Reference allele-frequency VCF used to sample the calibration loci
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_vcf_filename: PathBuf,

    /// The contig to sample calibration loci from
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "contig")]
    #[clap(value_name = "CONTIG")]
    #[clap(help_heading = Some("Input/Output"))]
    pub contig: String,

    /// Output directory containing the calibration report
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Super-population whose frequencies drive the synthetic genotypes
    #[clap(long = "super-population")]
    #[clap(value_name = "CODE")]
    #[clap(help_heading = Some("Synthetic grid"))]
    #[clap(default_value = "ALL")]
    pub super_population: String,

    /// First inbreeding coefficient on the grid
    #[clap(long = "lower-f")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Synthetic grid"))]
    #[clap(default_value = "-0.5")]
    pub lower_f: f64,

    /// Last inbreeding coefficient on the grid
    #[clap(long = "upper-f")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Synthetic grid"))]
    #[clap(default_value = "0.5")]
    pub upper_f: f64,

    /// Grid step between synthetic genomes
    #[clap(long = "step-f")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Synthetic grid"))]
    #[clap(default_value = "0.01")]
    pub step_f: f64,

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

    /// Number of calibration loci to sample
    #[clap(long = "locus-count")]
    #[clap(value_name = "COUNT")]
    #[clap(help_heading = Some("Locus sampling"))]
    #[clap(default_value = "1000")]
    pub locus_count: usize,

    /// Seed for the synthetic generator and the stochastic estimators
    #[clap(long = "seed")]
    #[clap(value_name = "SEED")]
    #[clap(help_heading = Some("Synthetic grid"))]
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

pub fn check_calibrate_settings(mut settings: CalibrateSettings) -> anyhow::Result<CalibrateSettings> {
    // hard code the version in
    settings.meerkat_version = FULL_VERSION.clone();
    info!("Meerkat version: {:?}", &settings.meerkat_version);
    info!("Sub-command: calibrate");
    info!("Inputs:");

    check_required_filename(&settings.reference_vcf_filename, "Reference VCF")?;
    info!("\tReference VCF: {:?}", &settings.reference_vcf_filename);
    info!("\tContig: {:?}", &settings.contig);

    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);

    // grid checks
    SuperPopulation::from_str(&settings.super_population)
        .with_context(|| format!("Unknown super-population code {:?}", settings.super_population))?;
    if settings.step_f <= 0.0 {
        bail!("--step-f must be >0");
    }
    if settings.upper_f < settings.lower_f {
        bail!("--upper-f must be >= --lower-f");
    }
    if settings.lower_f < -1.0 || settings.upper_f > 1.0 {
        bail!("the inbreeding grid must stay within [-1, 1]");
    }
    info!("Synthetic grid:");
    info!("\tSuper-population: {}", settings.super_population);
    info!("\tInbreeding range: [{}, {}] step {}", settings.lower_f, settings.upper_f, settings.step_f);
    info!("\tSeed: {}", settings.random_seed);

    // estimation parameter checks
    let estimator = EstimatorKind::from_str(&settings.algorithm)
        .with_context(|| format!("Unknown estimation algorithm {:?}", settings.algorithm))?;
    SimpleForm::from_str(&settings.simple_form)
        .with_context(|| format!("Unknown simple-form {:?}", settings.simple_form))?;
    info!("Estimation parameters:");
    info!("\tAlgorithm: {estimator}");

    if settings.min_allele_frequency <= 0.0 || settings.min_allele_frequency >= settings.max_allele_frequency {
        bail!("--min-af must be >0 and less than --max-af");
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
    info!("\tCalibration loci: {}", settings.locus_count);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

/// Converts the validated CLI settings into the engine's parameter record. The window is
/// primed later, once the locus scan has found the offset covering the requested count.
pub fn build_parameters(settings: &CalibrateSettings) -> anyhow::Result<InbreedingParameters> {
    let estimator = EstimatorKind::from_str(&settings.algorithm)
        .with_context(|| format!("Unknown estimation algorithm {:?}", settings.algorithm))?;
    let simple_form = SimpleForm::from_str(&settings.simple_form)
        .with_context(|| format!("Unknown simple-form {:?}", settings.simple_form))?;

    let source = if settings.frequency_source.is_empty() {
        FrequencySource::identify(&settings.reference_vcf_filename.to_string_lossy())
    } else {
        FrequencySource::from_str(&settings.frequency_source)
            .unwrap_or_else(|_| FrequencySource::identify(&settings.frequency_source))
    };

    let params = InbreedingParametersBuilder::default()
        .min_allele_frequency(settings.min_allele_frequency)
        .max_allele_frequency(settings.max_allele_frequency)
        .locus_spacing(settings.locus_spacing)
        .locus_count(settings.locus_count)
        .estimator(estimator)
        .simple_form(simple_form)
        .source(source)
        .random_seed(settings.random_seed)
        .build()?;
    Ok(params)
}
