use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::Result;

/// Archive every regular file of `dir` (sorted by name, no recursion)
/// into a single deflated zip at `dest`.
pub fn zip_dir(dir: &Path, dest: &Path) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(File::create(dest)?);

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        writer.start_file(name, options)?;
        writer.write_all(&fs::read(&path)?)?;
    }
    writer.finish()?;
    tracing::info!(archive = %dest.display(), "bundled output directory");
    Ok(())
}
