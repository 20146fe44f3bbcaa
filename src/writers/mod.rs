/*!
# Writers module
Contains the logic for writing the output files for the estimate and calibrate commands.
*/
/// Generates the per-genome inbreeding report with one estimate column per window
pub mod inbreeding_summary;
/// Generates the gzipped per-window class-breakdown debug table
pub mod window_summary;
