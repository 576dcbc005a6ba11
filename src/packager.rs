//! Bundle several files and directories into one temporary ZIP payload

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cleanup::{CleanupGuard, CleanupRegistry};
use crate::error::Result;
use crate::fs_enum::enumerate_members;

// Entries at or above 4 GiB need ZIP64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Temporary archive; the file is deleted when this is dropped
pub struct TempArchive {
    path: TempPath,
    _guard: CleanupGuard,
    members: Vec<String>,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Member names in the order they were written
    pub fn members(&self) -> &[String] {
        &self.members
    }
}

/// Pack `paths` into `fileway_XXXX.zip` in the system temp directory
pub fn pack(paths: &[PathBuf], registry: &CleanupRegistry) -> Result<TempArchive> {
    pack_in(&std::env::temp_dir(), paths, registry)
}

pub fn pack_in(dir: &Path, paths: &[PathBuf], registry: &CleanupRegistry) -> Result<TempArchive> {
    // Validate every input before creating anything on disk
    let members = enumerate_members(paths)?;

    let named = tempfile::Builder::new()
        .prefix("fileway_")
        .suffix(".zip")
        .rand_bytes(4)
        .tempfile_in(dir)?;
    let guard = registry.register(named.path());
    let (file, path) = named.into_parts();

    // On any error below, `path` and `guard` drop and the partial archive goes away
    let mut zip = ZipWriter::new(file);
    let mut names = Vec::with_capacity(members.len());
    for member in &members {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(member.size >= ZIP64_THRESHOLD);
        zip.start_file(member.name.as_str(), options)?;
        let mut src = File::open(&member.source)?;
        io::copy(&mut src, &mut zip)?;
        names.push(member.name.clone());
    }
    zip.finish()?;

    Ok(TempArchive {
        path,
        _guard: guard,
        members: names,
    })
}
