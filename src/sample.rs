//! Sample data files for local runs and benchmarks

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `Line 0` through `Line {count - 1}`, one per line.
///
/// Parent directories are created as needed. Returns the file size in bytes.
pub fn generate_sample_file(path: &Path, count: u64) -> std::io::Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for i in 0..count {
        writeln!(writer, "Line {}", i)?;
    }
    writer.flush()?;

    let size = std::fs::metadata(path)?.len();
    tracing::info!("Generated {} lines ({} bytes) at {:?}", count, size, path);
    Ok(size)
}
