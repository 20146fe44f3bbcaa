
use anyhow::Context;
use std::io::{BufWriter, Write};
use std::fs::File;
use std::path::Path;

/// This will save a generic serializable struct to JSON, mostly used to snapshot the CLI
/// settings of a run next to its outputs.
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let file: Box<dyn std::io::Write> = if out_filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::write::GzEncoder::new(
                File::create(out_filename)?,
                flate2::Compression::default()
            )
        )
    } else {
        Box::new(File::create(out_filename)?)
    };
    let mut buffered = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut buffered, data)
        .with_context(|| format!("Error while serializing to {out_filename:?}:"))?;
    buffered.flush()?;
    Ok(())
}
