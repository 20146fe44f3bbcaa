
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// The four inbreeding estimators and their shared machinery
pub mod estimators;
/// Window-sliding orchestrator that fans estimator tasks out per genome
pub mod evaluator;
/// Maps frequency sources and super-populations onto INFO field names
pub mod frequency_fields;
/// Builds spacing/frequency-filtered locus catalogs from the reference
pub mod locus_sampler;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Synthetic-population generator with known ground-truth inbreeding
pub mod synthetic;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
