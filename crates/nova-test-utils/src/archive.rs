use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Writes `(internal_name, bytes)` pairs as `<dir>/<internal_name>.class`.
pub fn write_class_dir(dir: &Path, classes: &[(&str, Vec<u8>)]) -> io::Result<()> {
    for (name, bytes) in classes {
        let path = dir.join(format!("{name}.class"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
    }
    Ok(())
}

/// Writes `(entry_name, bytes)` pairs into a new jar at `path`.
pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options).map_err(io::Error::other)?;
        zip.write_all(bytes)?;
    }
    zip.finish().map_err(io::Error::other)?;
    Ok(())
}
