
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::allele_freq::AlleleClassType;
use crate::data_types::locus_results::ResultsMap;
use crate::data_types::parameters::InbreedingParameters;

/// Debug writer with one row per (window, genome): the full class breakdown behind each
/// estimate. This table gets large, so it is always gzipped.
pub struct WindowSummaryWriter {
    /// Handle on the writer
    csv_writer: csv::Writer<GzEncoder<File>>
}

/// Contains all the data written to each row of our debug file
#[derive(Serialize)]
struct WindowSummaryRow {
    /// Zero-padded window label
    window: String,
    /// Genome identifier
    sample_id: String,
    /// Observed major-homozygous loci
    major_hom_count: u64,
    /// Observed major-heterozygous loci
    major_het_count: u64,
    /// Observed minor-homozygous loci
    minor_hom_count: u64,
    /// Observed minor-heterozygous loci
    minor_het_count: u64,
    /// Expected major-homozygous frequency sum at F=0
    major_hom_expected: f64,
    /// Expected major-heterozygous frequency sum at F=0
    major_het_expected: f64,
    /// Expected minor-homozygous frequency sum at F=0
    minor_hom_expected: f64,
    /// Expected minor-heterozygous frequency sum at F=0
    minor_het_expected: f64,
    /// Loci classified for this genome in this window
    total_allele_count: u64,
    /// The estimator output
    inbred_allele_sum: f64
}

impl WindowSummaryWriter {
    /// Creates a new writer. The output will be tab-delimited and gzipped.
    /// # Arguments
    /// * `filename` - path to the filename that will get opened; expected to be .tsv.gz
    pub fn new(filename: &Path) -> anyhow::Result<Self> {
        let gzip_writer = GzEncoder::new(
            File::create(filename)?,
            flate2::Compression::default()
        );

        let csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(gzip_writer);
        Ok(Self {
            csv_writer
        })
    }

    /// Writes one window's per-genome breakdown
    /// # Arguments
    /// * `params` - the window parameters, supplies the label
    /// * `results` - the window's per-genome results
    pub fn write_window(&mut self, params: &InbreedingParameters, results: &ResultsMap) -> csv::Result<()> {
        let window = params.window_label();
        for (sample_id, locus_results) in results.iter() {
            let row = WindowSummaryRow {
                window: window.clone(),
                sample_id: sample_id.clone(),
                major_hom_count: locus_results.count(AlleleClassType::MajorHomozygous),
                major_het_count: locus_results.count(AlleleClassType::MajorHeterozygous),
                minor_hom_count: locus_results.count(AlleleClassType::MinorHomozygous),
                minor_het_count: locus_results.count(AlleleClassType::MinorHeterozygous),
                major_hom_expected: locus_results.expected_frequency(AlleleClassType::MajorHomozygous),
                major_het_expected: locus_results.expected_frequency(AlleleClassType::MajorHeterozygous),
                minor_hom_expected: locus_results.expected_frequency(AlleleClassType::MinorHomozygous),
                minor_het_expected: locus_results.expected_frequency(AlleleClassType::MinorHeterozygous),
                total_allele_count: locus_results.total_allele_count(),
                inbred_allele_sum: locus_results.inbred_allele_sum()
            };
            self.csv_writer.serialize(&row)?;
        }
        Ok(())
    }

    /// Flushes the underlying gzip stream; call once after the final window
    pub fn finalize(mut self) -> csv::Result<()> {
        self.csv_writer.flush()?;
        Ok(())
    }
}
