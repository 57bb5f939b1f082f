//! Extraction of `.tar.gz` toolchain artifacts.

use std::fs;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::{IoContext, Result, ZirconError};

/// Extracts a `.tar.gz` archive into `dest_dir`.
///
/// Entries are unpacked with [`tar::Entry::unpack_in`], which refuses absolute paths and
/// `..` components. If everything ends up under one top-level directory (for example
/// `zrc-linux-x64/bin/zrc`), that directory is hoisted so `bin/` sits directly in `dest_dir`.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let extraction_error = |reason: String| ZirconError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path)
        .io_context(|| format!("failed to open archive {}", archive_path.display()))?;
    fs::create_dir_all(dest_dir)
        .io_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut archive = Archive::new(GzDecoder::new(file));
    let mut count = 0usize;
    for entry in archive.entries().map_err(|e| extraction_error(e.to_string()))? {
        let mut entry = entry.map_err(|e| extraction_error(e.to_string()))?;
        let unpacked = entry
            .unpack_in(dest_dir)
            .map_err(|e| extraction_error(e.to_string()))?;
        if !unpacked {
            let path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
            return Err(extraction_error(format!("refusing to extract unsafe path '{path}'")));
        }
        count += 1;
    }
    if count == 0 {
        return Err(extraction_error("archive is empty".to_string()));
    }
    debug!(entries = count, dest = %dest_dir.display(), "extracted archive");

    hoist_single_root(dest_dir)
}

/// Moves the children of a lone top-level directory up into `dir`.
fn hoist_single_root(dir: &Path) -> Result<()> {
    let entries: Vec<_> = fs::read_dir(dir)
        .io_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .collect();

    let [only] = entries.as_slice() else {
        return Ok(());
    };
    let is_dir = only.file_type().map(|t| t.is_dir()).unwrap_or(false);
    if !is_dir || only.file_name() == "bin" {
        return Ok(());
    }

    // Rename first so a child sharing the root's name cannot collide with it.
    let parked = dir.join(".hoist");
    fs::rename(only.path(), &parked)
        .io_context(|| format!("failed to move {}", only.path().display()))?;
    for child in fs::read_dir(&parked).io_context(|| format!("failed to read {}", parked.display()))? {
        let child = child.io_context(|| format!("failed to read {}", parked.display()))?;
        let target = dir.join(child.file_name());
        fs::rename(child.path(), &target)
            .io_context(|| format!("failed to move {}", child.path().display()))?;
    }
    fs::remove_dir(&parked).io_context(|| format!("failed to remove {}", parked.display()))?;
    debug!(root = ?only.file_name(), "hoisted single archive root");
    Ok(())
}

/// Builds a `.tar.gz` from the contents of `src_dir`. Used by `import` round trips and tests.
pub fn create_tar_gz(src_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = fs::File::create(archive_path)
        .io_context(|| format!("failed to create {}", archive_path.display()))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", src_dir)
        .io_context(|| format!("failed to archive {}", src_dir.display()))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .io_context(|| format!("failed to finish {}", archive_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (path, content) in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
    }

    #[test]
    fn extracts_flat_layout() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write_tree(&src, &[("bin/zrc", "#!/bin/sh\n"), ("include/std.zh", "")]);
        let archive = dir.path().join("zrc.tar.gz");
        create_tar_gz(&src, &archive).unwrap();

        let dest = dir.path().join("dest");
        extract_tar_gz(&archive, &dest).unwrap();
        assert!(dest.join("bin/zrc").is_file());
        assert!(dest.join("include/std.zh").is_file());
    }

    #[test]
    fn hoists_single_top_level_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write_tree(
            &src,
            &[("zrc-linux-x64/bin/zrc", "x"), ("zrc-linux-x64/zrc-linux-x64", "same name")],
        );
        let archive = dir.path().join("zrc.tar.gz");
        create_tar_gz(&src, &archive).unwrap();

        let dest = dir.path().join("dest");
        extract_tar_gz(&archive, &dest).unwrap();
        assert!(dest.join("bin/zrc").is_file());
        assert!(dest.join("zrc-linux-x64").is_file());
        assert!(!dest.join(".hoist").exists());
    }

    #[test]
    fn garbage_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        fs::write(&archive, b"this is not gzip").unwrap();
        let err = extract_tar_gz(&archive, &dir.path().join("dest")).unwrap_err();
        assert!(matches!(err, ZirconError::Extraction { .. }));
    }
}
