//! Filesystem helpers: extension scans, path decomposition,
//! per-directory bundling, and the lossless folder merge.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const AUDIO_EXTS: &[&str] = &["flac", "m4a", "mp3", "mp4", "shn", "wav"];
pub const IMAGE_EXTS: &[&str] = &["gif", "jpeg", "jpg", "png"];

/// Decomposition of a file path relative to a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub fullpath: PathBuf,
    pub fulldir: PathBuf,
    /// Directory portion of the relative path; falls back to the base
    /// directory's own name when the file sits directly in it.
    pub dir: String,
    /// File name without extension.
    pub file: String,
    pub ext: String,
}

impl PathInfo {
    pub fn new(base: &Path, rel_path: &str) -> Self {
        let fullpath = base.join(rel_path);
        let fulldir = fullpath
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let rel = Path::new(rel_path);
        let dir = match rel.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
            _ => base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let file = rel
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = rel
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        PathInfo {
            fullpath,
            fulldir,
            dir,
            file,
            ext,
        }
    }
}

/// Ensure a path exists and is a directory.
pub fn check_dir(path: &Path) -> Result<&Path> {
    if !path.is_dir() {
        return Err(Error::InvalidDirectory(path.to_path_buf()));
    }
    Ok(path)
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| exts.contains(&e.as_str()))
}

/// Relative paths of all files under `dir` with one of `exts`,
/// lexicographically sorted. The sort guarantees all files of a nested
/// subdirectory are contiguous, which is what makes single-pass
/// bundling correct.
pub fn files_by_extension(dir: &Path, exts: &[&str]) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_ext(e.path(), exts))
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();

    files.sort();
    files
}

pub fn files_audio(dir: &Path) -> Vec<String> {
    files_by_extension(dir, AUDIO_EXTS)
}

pub fn files_images(dir: &Path) -> Vec<String> {
    files_by_extension(dir, IMAGE_EXTS)
}

/// Walk a sorted relative file list once, emitting each run of indices
/// that shares one immediate parent directory as a bundle.
pub fn bundle_files<F>(files: &[String], mut f: F) -> Result<()>
where
    F: FnMut(&[usize]) -> Result<()>,
{
    let mut current: Option<String> = None;
    let mut indexes: Vec<usize> = Vec::new();

    for (x, file) in files.iter().enumerate() {
        let dir = Path::new(file)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        if current.as_deref() != Some(dir.as_str()) {
            if !indexes.is_empty() {
                f(&indexes)?;
                indexes.clear();
            }
            current = Some(dir);
        }
        indexes.push(x);
    }

    if !indexes.is_empty() {
        f(&indexes)?;
    }
    Ok(())
}

/// Rename a folder, never overwriting: when the destination exists the
/// lowest free `"dst (n)"` variant is used instead. Parent directories
/// are created as needed. Returns the path actually renamed to.
pub fn rename_folder(src: &Path, dst: &Path) -> Result<PathBuf> {
    let dst = next_free_dir(dst);

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    // If rename fails (cross-device), try copy + delete
    if fs::rename(src, &dst).is_err() {
        copy_dir(src, &dst)?;
        fs::remove_dir_all(src)?;
    }
    Ok(dst)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn next_free_dir(dst: &Path) -> PathBuf {
    if !dst.exists() {
        return dst.to_path_buf();
    }
    let base = dst.to_string_lossy();
    let mut n = 1;
    loop {
        let candidate = PathBuf::from(format!("{base} ({n})"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Merge the audio contents of `src` into `dst` without ever
/// overwriting or losing a file.
///
/// `key` maps a file name (without extension) to a composite identity;
/// files whose key is absent from `dst` move over, and if any did, the
/// source's image files come along too. Files whose key collides stay
/// behind; when any remain, the whole leftover folder is renamed to the
/// lowest free `"dst (n)"` rather than merged a second time. Returns
/// the path the source contents ended up at.
pub fn merge_folder<F>(src: &Path, dst: &Path, key: F) -> Result<PathBuf>
where
    F: Fn(&str) -> (i64, String),
{
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    // claim the target name outright when it is free; a rename refused
    // because the name is taken falls through to the key merge
    match fs::rename(src, dst) {
        Ok(()) => return Ok(dst.to_path_buf()),
        Err(_) if dst.exists() => {}
        Err(_) => {
            copy_dir(src, dst)?;
            fs::remove_dir_all(src)?;
            return Ok(dst.to_path_buf());
        }
    }

    // identity of everything already in the destination
    let mut existing: HashMap<i64, String> = HashMap::new();
    for f in files_audio(dst) {
        let pi = PathInfo::new(dst, &f);
        let (k, title) = key(&pi.file);
        existing.insert(k, title);
    }

    let mut moved_any = false;
    for f in files_audio(src) {
        let pi = PathInfo::new(src, &f);
        let (k, title) = key(&pi.file);
        if existing.contains_key(&k) {
            continue;
        }

        let target = dst.join(
            pi.fullpath
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default(),
        );
        fs::copy(&pi.fullpath, &target)?;
        existing.insert(k, title);
        fs::remove_file(&pi.fullpath)?;
        moved_any = true;
    }

    if moved_any {
        // bring cover art along; losing an image is not worth aborting
        for f in files_images(src) {
            let pi = PathInfo::new(src, &f);
            let target = dst.join(
                pi.fullpath
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_default(),
            );
            if let Err(e) = fs::copy(&pi.fullpath, &target) {
                warn!(src = %pi.fullpath.display(), error = %e, "image copy failed");
            }
        }
    }

    if files_audio(src).is_empty() {
        fs::remove_dir_all(src)?;
        Ok(dst.to_path_buf())
    } else {
        // every remaining file collided; park the folder aside intact
        rename_folder(src, dst)
    }
}

/// Among `files`, the full path of the smallest (or largest) by size.
pub fn nth_file_size(files: &[PathBuf], smallest: bool) -> Result<PathBuf> {
    let mut found: Option<(u64, &PathBuf)> = None;
    for f in files {
        let size = fs::metadata(f)?.len();
        let better = match found {
            None => true,
            Some((best, _)) => {
                if smallest {
                    size < best
                } else {
                    size > best
                }
            }
        };
        if better {
            found = Some((size, f));
        }
    }

    match found {
        Some((_, f)) => Ok(f.clone()),
        None => Err(Error::merge("no files to compare by size")),
    }
}

/// True when `src` exists and is strictly larger than `dst`.
pub fn is_larger(src: &Path, dst: &Path) -> bool {
    match (fs::metadata(src), fs::metadata(dst)) {
        (Ok(s), Ok(d)) => s.len() > d.len(),
        _ => false,
    }
}
