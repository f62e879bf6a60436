//! File helpers: zipped table fallback and human-readable sizes.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{TableError, TableResult};

/// Path of the zipped variant of a table file.
pub fn zipped_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

/// The file actually backing `path`: the path itself, or `<path>.zip` when only that exists.
pub fn resolve(path: &Path) -> PathBuf {
    if path.exists() {
        path.to_path_buf()
    } else {
        zipped_path(path)
    }
}

/// Open a table file, falling back to the first entry of `<path>.zip`.
pub fn open_source(path: &Path) -> TableResult<Box<dyn Read + Send>> {
    if path.exists() {
        let file = File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(Box::new(file));
    }
    let zipped = zipped_path(path);
    let file = File::open(&zipped).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let zip_error = |source: zip::result::ZipError| TableError::Zip {
        path: zipped.clone(),
        source,
    };
    let mut archive = zip::ZipArchive::new(file).map_err(zip_error)?;
    let mut entry = archive.by_index(0).map_err(zip_error)?;
    let mut content = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut content).map_err(|source| TableError::Io {
        path: zipped.clone(),
        source,
    })?;
    Ok(Box::new(Cursor::new(content)))
}

/// File size as `12.3KB`, one decimal, binary units.
pub fn formatted_size(path: &Path) -> std::io::Result<String> {
    Ok(format_size(std::fs::metadata(path)?.len()))
}

pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["bytes", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1}{}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1}TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12.0bytes");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5MB");
    }

    #[test]
    fn test_open_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "ID\n1\n").unwrap();
        let mut content = String::new();
        open_source(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "ID\n1\n");
        assert_eq!(resolve(&path), path);
    }

    #[test]
    fn test_zip_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let mut writer = zip::ZipWriter::new(File::create(zipped_path(&path)).unwrap());
        writer
            .start_file("a.csv", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"ID\n2\n").unwrap();
        writer.finish().unwrap();

        let mut content = String::new();
        open_source(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "ID\n2\n");
        assert_eq!(resolve(&path), dir.path().join("a.csv.zip"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_source(&dir.path().join("nope.csv")),
            Err(TableError::Io { .. })
        ));
    }
}
