/*!
# CLI module
Command line interface functionality that is specific to Meerkat.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The calibrate CLI subcommand
pub mod calibrate;
/// The estimate CLI subcommand
pub mod estimate;
