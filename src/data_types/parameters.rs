
use derive_builder::Builder;
use log::error;
use serde::Serialize;

/// Known sources for reference allele frequencies. Each source encodes the same
/// biological concept under a different INFO field naming scheme.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumString)]
pub enum FrequencySource {
    #[strum(serialize = "gnomad2.1")]
    Gnomad2_1,
    #[strum(serialize = "gnomad3.1")]
    Gnomad3_1,
    #[strum(serialize = "1000genomes")]
    Genomes1000
}

impl FrequencySource {
    /// Best-effort identification of a frequency source from a free-form identifier, such
    /// as a population name or filename. Unmatched inputs log an error and default to
    /// Gnomad 2.1 rather than failing the run.
    /// # Arguments
    /// * `identifier` - the population/file identifier to match against known fragments
    pub fn identify(identifier: &str) -> Self {
        let lowered = identifier.to_lowercase();
        if lowered.contains("gnomad") {
            if lowered.contains("3.1") || lowered.contains("v3") {
                FrequencySource::Gnomad3_1
            } else {
                FrequencySource::Gnomad2_1
            }
        } else if lowered.contains("1000") || lowered.contains("1kg") {
            FrequencySource::Genomes1000
        } else {
            error!("Unrecognized frequency source in {identifier:?}, defaulting to {}", FrequencySource::Gnomad2_1);
            FrequencySource::Gnomad2_1
        }
    }
}

/// The closed set of inbreeding estimators. Selection by configuration name goes
/// through the strum string forms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumString)]
pub enum EstimatorKind {
    /// Moment-based closed-form estimator, the default
    #[strum(serialize = "ritland")]
    Ritland,
    /// Observed vs expected homozygosity ratio
    #[strum(serialize = "simple")]
    Simple,
    /// Hall expectation-maximization over homozygous loci
    #[strum(serialize = "hall")]
    HallEm,
    /// Numerically maximized log-likelihood
    #[strum(serialize = "loglikelihood")]
    LogLikelihood
}

/// Which algebraic form the Simple estimator uses. The two forms are equivalent in
/// expectation but not numerically identical, so the choice is explicit configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumString)]
pub enum SimpleForm {
    /// F = (observedHomo - expectedHomo) / (total - expectedHomo)
    #[strum(serialize = "homozygous")]
    Homozygous,
    /// F = 1 - observedHet / expectedHet
    #[strum(serialize = "heterozygous")]
    Heterozygous
}

/// Bounds for an iterative refinement loop: at least `min_attempts` passes, at most
/// `max_attempts`, converged once successive values differ by less than `tolerance`.
/// The defaults are empirically tuned rather than derived, treat them as tunables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ConvergenceSettings {
    min_attempts: usize,
    max_attempts: usize,
    tolerance: f64
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            min_attempts: 50,
            max_attempts: 1000,
            tolerance: 1e-4
        }
    }
}

impl ConvergenceSettings {
    /// Constructor
    pub fn new(min_attempts: usize, max_attempts: usize, tolerance: f64) -> Self {
        Self {
            min_attempts,
            max_attempts,
            tolerance
        }
    }

    /// The restart-policy defaults shared by the iterative estimators
    pub fn restart_defaults() -> Self {
        Self {
            min_attempts: 5,
            max_attempts: 50,
            tolerance: 1e-4
        }
    }

    // getters
    pub fn min_attempts(&self) -> usize {
        self.min_attempts
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// Full configuration for one inbreeding evaluation. Immutable from the estimators'
/// point of view; the orchestrator advances a local copy window by window.
#[derive(Builder, Clone, Debug, Serialize)]
#[builder(default)]
pub struct InbreedingParameters {
    /// Minimum summed minor-allele frequency for a locus to be sampled
    min_allele_frequency: f64,
    /// Maximum summed minor-allele frequency for a locus to be sampled
    max_allele_frequency: f64,
    /// Inclusive lower bound of the current contig offset window
    lower_offset: u64,
    /// Exclusive upper bound of the current contig offset window
    upper_offset: u64,
    /// Overall evaluation stops once windows reach this offset
    final_offset: u64,
    /// Minimum spacing between accepted loci, thins linkage disequilibrium
    locus_spacing: u64,
    /// Target number of loci per window
    locus_count: usize,
    /// The configured estimator
    estimator: EstimatorKind,
    /// Algebraic form used when the Simple estimator is selected
    simple_form: SimpleForm,
    /// Which reference frequency schema the INFO fields follow
    source: FrequencySource,
    /// Base seed for all stochastic estimator / generator paths
    random_seed: u64,
    /// Convergence bounds for the inner fixed-point / optimizer loop
    inner_convergence: ConvergenceSettings,
    /// Convergence bounds across random restarts
    restart_convergence: ConvergenceSettings,
    /// Parameter tolerance for the log-likelihood optimizer
    mle_tolerance: f64,
    /// Evaluation budget for the log-likelihood optimizer
    mle_max_evaluations: usize
}

impl Default for InbreedingParameters {
    fn default() -> Self {
        Self {
            min_allele_frequency: 0.05,
            max_allele_frequency: 0.5,
            lower_offset: 0,
            upper_offset: 0,
            final_offset: u64::MAX,
            locus_spacing: 1000,
            locus_count: 100,
            estimator: EstimatorKind::Ritland,
            simple_form: SimpleForm::Homozygous,
            source: FrequencySource::Gnomad2_1,
            random_seed: 0,
            inner_convergence: ConvergenceSettings::default(),
            restart_convergence: ConvergenceSettings::restart_defaults(),
            mle_tolerance: 1e-6,
            mle_max_evaluations: 500
        }
    }
}

impl InbreedingParameters {
    /// Moves this copy to the next window: the new lower bound is the previous upper bound.
    /// # Arguments
    /// * `new_upper` - the exclusive upper bound of the next window
    pub fn advance_window(&mut self, new_upper: u64) {
        self.lower_offset = self.upper_offset;
        self.upper_offset = new_upper;
    }

    /// Sets both window bounds at once, used when priming the first window
    pub fn set_window(&mut self, lower_offset: u64, upper_offset: u64) {
        self.lower_offset = lower_offset;
        self.upper_offset = upper_offset;
    }

    /// Zero-padded window label used for report columns, e.g. "000000000_000125000"
    pub fn window_label(&self) -> String {
        format!("{:09}_{:09}", self.lower_offset, self.upper_offset)
    }

    // getters
    pub fn min_allele_frequency(&self) -> f64 {
        self.min_allele_frequency
    }

    pub fn max_allele_frequency(&self) -> f64 {
        self.max_allele_frequency
    }

    pub fn lower_offset(&self) -> u64 {
        self.lower_offset
    }

    pub fn upper_offset(&self) -> u64 {
        self.upper_offset
    }

    pub fn final_offset(&self) -> u64 {
        self.final_offset
    }

    pub fn locus_spacing(&self) -> u64 {
        self.locus_spacing
    }

    pub fn locus_count(&self) -> usize {
        self.locus_count
    }

    pub fn estimator(&self) -> EstimatorKind {
        self.estimator
    }

    pub fn simple_form(&self) -> SimpleForm {
        self.simple_form
    }

    pub fn source(&self) -> FrequencySource {
        self.source
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn inner_convergence(&self) -> ConvergenceSettings {
        self.inner_convergence
    }

    pub fn restart_convergence(&self) -> ConvergenceSettings {
        self.restart_convergence
    }

    pub fn mle_tolerance(&self) -> f64 {
        self.mle_tolerance
    }

    pub fn mle_max_evaluations(&self) -> usize {
        self.mle_max_evaluations
    }
}
