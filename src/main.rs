
use indicatif::ParallelProgressIterator;
use log::{LevelFilter, error, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use meerkat::cli::calibrate::{self, CalibrateSettings, check_calibrate_settings};
use meerkat::cli::core::{Commands, get_cli};
use meerkat::cli::estimate::{self, EstimateSettings, check_estimate_settings};
use meerkat::data_types::locus_results::{InbreedingOutputResults, LocusResults, ResultsMap};
use meerkat::data_types::pedigree::SuperPopulation;
use meerkat::estimators::estimate_genome;
use meerkat::evaluator::evaluate_population;
use meerkat::locus_sampler::{offset_after_count, sample_loci};
use meerkat::parsing::pedigree_file::load_pedigree;
use meerkat::parsing::population_vcf::{load_reference_population, load_sample_population};
use meerkat::synthetic::{decode_inbreeding, generate};
use meerkat::util::json_io::save_json;
use meerkat::util::progress_bar::get_progress_style;
use meerkat::writers::inbreeding_summary::{write_pedigree_summary, write_synthetic_summary};
use meerkat::writers::window_summary::WindowSummaryWriter;
use std::str::FromStr;

fn run_estimate(settings: EstimateSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_estimate_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // create a debug folder if specified, files might get created in sub-routines
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("Creating debug folder at {debug_folder:?}...");
        match std::fs::create_dir_all(debug_folder) {
            Ok(()) => {},
            Err(e) => {
                error!("Error while creating debug folder: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }

        // save the CLI options
        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(&settings, &cli_json) {
            error!("Error while saving CLI options: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // convert the CLI options into engine parameters
    let params = match estimate::build_parameters(&settings) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while building parameters: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // load all the inputs into memory
    info!("Pre-loading reference frequencies into memory...");
    let reference = match load_reference_population(&settings.reference_vcf_filename, params.source(), Some(&settings.contig)) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading reference VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Pre-loading sample genotypes into memory...");
    let samples = match load_sample_population(&settings.sample_vcf_filename, Some(&settings.contig)) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while loading sample VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Loading pedigree metadata...");
    let pedigree = match load_pedigree(&settings.pedigree_filename) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while loading pedigree: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    // the core analysis
    info!("Evaluating {} genomes...", samples.len());
    let results = match evaluate_population(&reference, &samples, &pedigree, &params) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while evaluating population: {e:#}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    if results.is_empty() {
        warn!("No windows were evaluated; check the offset range and frequency bounds.");
    }

    // per-window summary logging
    for (window_params, map) in results.windows().iter() {
        let mean = if map.is_empty() {
            0.0
        } else {
            map.values().map(|r| r.inbred_allele_sum()).sum::<f64>() / map.len() as f64
        };
        info!("Window {}: mean F = {mean:.4} over {} genomes", window_params.window_label(), map.len());
    }

    // optional debug output with the full class breakdown
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        let window_fn = debug_folder.join("window_summary.tsv.gz");
        info!("Saving window breakdown to {window_fn:?}...");
        let write_result = WindowSummaryWriter::new(&window_fn)
            .and_then(|mut writer| {
                for (window_params, map) in results.windows().iter() {
                    writer.write_window(window_params, map)?;
                }
                writer.finalize()?;
                Ok(())
            });
        if let Err(e) = write_result {
            error!("Error while saving window breakdown: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // now write things
    let summary_fn = settings.output_folder.join("inbreeding_summary.tsv");
    info!("Saving output summary to {summary_fn:?}...");
    if let Err(e) = write_pedigree_summary(&results, &pedigree, &summary_fn) {
        error!("Error while saving summary file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Estimation completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_calibrate(settings: CalibrateSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_calibrate_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    let mut params = match calibrate::build_parameters(&settings) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while building parameters: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // checked during settings validation
    let super_population = SuperPopulation::from_str(&settings.super_population).unwrap();

    info!("Pre-loading reference frequencies into memory...");
    let reference = match load_reference_population(&settings.reference_vcf_filename, params.source(), Some(&settings.contig)) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading reference VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    // one calibration window covering the requested locus count
    let window = offset_after_count(&reference, &settings.contig, super_population, &params, 0, settings.locus_count);
    let (upper_offset, available) = match window {
        Ok(w) => w,
        Err(e) => {
            error!("Error while scanning for calibration loci: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    params.set_window(0, upper_offset);

    let loci = match sample_loci(&reference, &settings.contig, super_population, &params) {
        Ok(l) => l,
        Err(e) => {
            error!("Error while sampling calibration loci: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    if loci.is_empty() {
        error!("No qualifying loci found on {:?} for {super_population}", settings.contig);
        std::process::exit(exitcode::DATAERR);
    }
    if available < settings.locus_count {
        warn!("Only {available} of the requested {} calibration loci are available.", settings.locus_count);
    }
    info!("Sampled {} calibration loci over offsets [0, {upper_offset}).", loci.len());

    // build the synthetic population with known ground truth
    info!("Generating synthetic population...");
    let population = match generate(
        settings.lower_f, settings.upper_f, settings.step_f,
        super_population, &settings.contig, &loci, settings.random_seed
    ) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while generating synthetic population: {e:#}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    info!("Generated {} synthetic genomes.", population.len());

    // run the configured estimator over every synthetic genome
    let style = get_progress_style();
    info!("Estimating inbreeding coefficients...");
    let estimates: Vec<(String, LocusResults)> = population.genomes().par_iter()
        .enumerate()
        .map(|(index, genome)| {
            let seed = settings.random_seed.wrapping_add(index as u64 + 1);
            let results = estimate_genome(genome, &settings.contig, &loci, &params, seed);
            (genome.identifier().to_string(), results)
        })
        .progress_with_style(style)
        .collect();

    // collect into the single-window output structure
    let mut results_map = ResultsMap::default();
    let mut total_error = 0.0;
    let mut decoded_count = 0;
    for (genome_id, results) in estimates {
        match decode_inbreeding(&genome_id) {
            Ok(truth) => {
                total_error += (results.inbred_allele_sum() - truth).abs();
                decoded_count += 1;
            },
            Err(e) => warn!("Could not decode truth from {genome_id}: {e}")
        }
        results_map.insert(genome_id, results);
    }
    let mut output = InbreedingOutputResults::new(population.name().to_string());
    output.add_window(params, results_map);

    if decoded_count > 0 {
        info!("Mean absolute calibration error: {:.4} over {decoded_count} genomes", total_error / decoded_count as f64);
    }

    // now write things
    let summary_fn = settings.output_folder.join("calibration_summary.tsv");
    info!("Saving calibration summary to {summary_fn:?}...");
    if let Err(e) = write_synthetic_summary(&output, &summary_fn) {
        error!("Error while saving calibration file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Calibration completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Estimate(settings) => {
            run_estimate(*settings);
        },
        Commands::Calibrate(settings) => {
            run_calibrate(*settings);
        }
    }

    info!("Process finished successfully.");
}
