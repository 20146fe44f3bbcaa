
use anyhow::Context;
use log::warn;
use std::fs::File;
use std::path::Path;

use crate::data_types::locus_results::InbreedingOutputResults;
use crate::data_types::parameters::InbreedingParameters;
use crate::data_types::pedigree::Pedigree;
use crate::synthetic::decode_inbreeding;

/// Builds the delimiter-aware writer; "," for .csv outputs, tabs for everything else.
/// Rows are written as raw records since the window columns are dynamic, so the writer
/// must be flexible about field counts (the metadata record is shorter than the rows).
fn open_report_writer(filename: &Path) -> csv::Result<csv::Writer<File>> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(filename)
}

/// The leading metadata record embedding the run configuration into the report
fn metadata_record(params: &InbreedingParameters) -> Vec<String> {
    vec![
        format!("#algorithm={}", params.estimator()),
        format!("min_af={}", params.min_allele_frequency()),
        format!("max_af={}", params.max_allele_frequency()),
        format!("spacing={}", params.locus_spacing()),
        format!("locus_count={}", params.locus_count())
    ]
}

/// Writes the per-genome inbreeding report: one row per genome with its pedigree
/// metadata followed by one estimate column per window, labeled by the zero-padded
/// window offsets. A genome without a pedigree record keeps its row with empty
/// metadata columns.
/// # Arguments
/// * `results` - the completed evaluation output, already schema-validated
/// * `pedigree` - the metadata provider for the report's pedigree columns
/// * `filename` - output path, .csv or .tsv
/// # Errors
/// * if the file cannot be created or a record fails to write
pub fn write_pedigree_summary(
    results: &InbreedingOutputResults,
    pedigree: &Pedigree,
    filename: &Path
) -> anyhow::Result<()> {
    let mut csv_writer = open_report_writer(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    if let Some((params, _map)) = results.windows().first() {
        csv_writer.write_record(&metadata_record(params))?;
    }

    // header: pedigree columns then one column per window
    let mut header = vec![
        "sample_id".to_string(),
        "population".to_string(),
        "population_description".to_string(),
        "super_population".to_string(),
        "super_population_description".to_string()
    ];
    for (params, _map) in results.windows().iter() {
        header.push(params.window_label());
    }
    csv_writer.write_record(&header)?;

    for genome_id in results.genome_ids() {
        let mut row = match pedigree.lookup(genome_id) {
            Some(record) => vec![
                genome_id.to_string(),
                record.population().to_string(),
                record.population_description().to_string(),
                record.super_population().to_string(),
                record.super_population_description().to_string()
            ],
            None => {
                warn!("Genome {genome_id} has no pedigree record for the report, leaving metadata columns empty");
                vec![genome_id.to_string(), String::new(), String::new(), String::new(), String::new()]
            }
        };

        for (_params, map) in results.windows().iter() {
            let estimate = map.get(genome_id)
                .map(|r| format!("{:.6}", r.inbred_allele_sum()))
                .unwrap_or_default();
            row.push(estimate);
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// The synthetic-population variant of the report: pedigree columns are replaced by the
/// ground-truth F decoded from each genome identifier, so calibration runs can diff the
/// truth against every window's estimate directly.
/// # Arguments
/// * `results` - the completed evaluation output over a synthetic population
/// * `filename` - output path, .csv or .tsv
/// # Errors
/// * if the file cannot be created or a record fails to write
pub fn write_synthetic_summary(results: &InbreedingOutputResults, filename: &Path) -> anyhow::Result<()> {
    let mut csv_writer = open_report_writer(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    if let Some((params, _map)) = results.windows().first() {
        csv_writer.write_record(&metadata_record(params))?;
    }

    let mut header = vec!["sample_id".to_string(), "true_inbreeding".to_string()];
    for (params, _map) in results.windows().iter() {
        header.push(params.window_label());
    }
    csv_writer.write_record(&header)?;

    for genome_id in results.genome_ids() {
        let truth = match decode_inbreeding(genome_id) {
            Ok(f) => format!("{f:.6}"),
            Err(e) => {
                warn!("Could not decode ground truth from {genome_id}: {e}");
                String::new()
            }
        };

        let mut row = vec![genome_id.to_string(), truth];
        for (_params, map) in results.windows().iter() {
            let estimate = map.get(genome_id)
                .map(|r| format!("{:.6}", r.inbred_allele_sum()))
                .unwrap_or_default();
            row.push(estimate);
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data_types::locus_results::{LocusResults, ResultsMap};
    use crate::data_types::parameters::InbreedingParametersBuilder;
    use crate::data_types::pedigree::{PedigreeRecord, SuperPopulation};

    fn build_results() -> InbreedingOutputResults {
        let mut output = InbreedingOutputResults::new("test".to_string());
        for window in 0..2_u64 {
            let params = InbreedingParametersBuilder::default()
                .lower_offset(window * 1000)
                .upper_offset((window + 1) * 1000)
                .build().unwrap();
            let mut map = ResultsMap::default();
            for sample in ["HG00096", "AFR_125000_0"] {
                let mut results = LocusResults::new(sample.to_string());
                results.set_estimate(0.125);
                map.insert(sample.to_string(), results);
            }
            output.add_window(params, map);
        }
        output
    }

    #[test]
    fn test_pedigree_report() {
        let output = build_results();
        let pedigree = Pedigree::from_records(vec![
            PedigreeRecord::new(
                "HG00096".to_string(),
                "GBR".to_string(), "British".to_string(),
                SuperPopulation::European, "European ancestry".to_string()
            )
        ]);

        let report_fn = std::env::temp_dir().join(format!("meerkat_report_{}.tsv", std::process::id()));
        write_pedigree_summary(&output, &pedigree, &report_fn).unwrap();
        let content = std::fs::read_to_string(&report_fn).unwrap();
        std::fs::remove_file(&report_fn).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("#algorithm=ritland"));
        assert!(lines[1].starts_with("sample_id\tpopulation"));
        assert!(lines[1].contains("000000000_000001000"));
        assert!(lines[1].contains("000001000_000002000"));

        // one row per genome: HG00096 has pedigree columns, the other is empty-padded
        assert!(lines[2].starts_with("HG00096\tGBR\tBritish\tEUR"));
        assert!(lines[2].ends_with("0.125000\t0.125000"));
        assert!(lines[3].starts_with("AFR_125000_0\t\t\t\t"));
    }

    #[test]
    fn test_synthetic_report() {
        let output = build_results();

        let report_fn = std::env::temp_dir().join(format!("meerkat_synth_report_{}.csv", std::process::id()));
        write_synthetic_summary(&output, &report_fn).unwrap();
        let content = std::fs::read_to_string(&report_fn).unwrap();
        std::fs::remove_file(&report_fn).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[1].starts_with("sample_id,true_inbreeding"));

        // the synthetic genome decodes its truth; the real sample id cannot
        let synthetic_row = lines.iter().find(|l| l.starts_with("AFR_125000_0")).unwrap();
        assert!(synthetic_row.contains("0.125000"));
        let plain_row = lines.iter().find(|l| l.starts_with("HG00096")).unwrap();
        assert!(plain_row.starts_with("HG00096,,"));
    }
}
