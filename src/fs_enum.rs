//! Archive member enumeration for `--zip`

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// A file to store in the archive and the name it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub source: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Expand the caller's paths into archive members.
///
/// Plain files are stored under their base name. Directories are walked
/// recursively and each file is stored relative to the directory's parent,
/// so `data/a/b.txt` keeps its `data/` prefix. Any missing path aborts.
pub fn enumerate_members(paths: &[PathBuf]) -> Result<Vec<ArchiveMember>> {
    let mut members = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|_| Error::PathNotFound(path.clone()))?;

        if metadata.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::PathNotFound(path.clone()))?;
            members.push(ArchiveMember {
                source: path.clone(),
                name,
                size: metadata.len(),
            });
        } else if metadata.is_dir() {
            enumerate_directory(path, &mut members)?;
        }
    }

    let mut seen = HashSet::new();
    for member in &members {
        if !seen.insert(member.name.as_str()) {
            return Err(Error::Packaging(format!(
                "two inputs map to the same archive member '{}'",
                member.name
            )));
        }
    }

    Ok(members)
}

fn enumerate_directory(root: &Path, members: &mut Vec<ArchiveMember>) -> Result<()> {
    use walkdir::WalkDir;

    let root = named_root(root)?;
    let base = root.parent().unwrap_or(Path::new("")).to_path_buf();

    for entry in WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(&base).unwrap_or(entry.path());
        members.push(ArchiveMember {
            source: entry.path().to_path_buf(),
            name: member_name(rel),
            size: entry.metadata()?.len(),
        });
    }
    Ok(())
}

/// Keep the name the caller gave, symlink or not. Only `.`, `..` or `/`
/// have no final name and get resolved to the real directory.
fn named_root(root: &Path) -> Result<PathBuf> {
    if root.file_name().is_some() {
        return Ok(root.to_path_buf());
    }
    Ok(std::fs::canonicalize(root)?)
}

/// Archive names always use `/`, whatever the host separator
fn member_name(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
