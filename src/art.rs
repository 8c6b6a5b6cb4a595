//! Album art resolution.
//!
//! One sidecar image per album folder, named `folder.jpg`. Embedded
//! artwork wins when present; otherwise an existing `folder.jpg` takes
//! precedence over other images, then the largest image file. A parent
//! folder holding no audio of its own can lend its images to the album
//! folder as a last resort.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::fsutil;
use crate::probe::Prober;
use crate::transcode::Transcoder;

pub trait ArtResolver: Send + Sync {
    /// Resolve cover art for the folder containing `fullpath`. Returns
    /// the path of the installed sidecar image, or `None` when the
    /// folder has no art to offer.
    fn resolve(&self, fullpath: &Path, with_parent_dir: bool) -> Result<Option<PathBuf>>;
}

/// Resolver that installs art as a `folder.jpg` next to the audio.
pub struct SidecarArt {
    prober: Arc<dyn Prober>,
    transcoder: Arc<dyn Transcoder>,
}

impl SidecarArt {
    pub fn new(prober: Arc<dyn Prober>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self { prober, transcoder }
    }

    /// Install `src` as the folder's sidecar image. A larger image
    /// already in place is kept aside as `folder-orig.jpg` so repeated
    /// runs never destroy the best copy.
    fn install(&self, src: &Path, dir: &Path) -> Result<PathBuf> {
        let folder = dir.join("folder.jpg");
        if src == folder {
            return Ok(folder);
        }

        let orig = dir.join("folder-orig.jpg");
        if fsutil::is_larger(&folder, src) {
            fs::copy(&folder, &orig)?;
        }

        fs::copy(src, &folder)?;
        debug!(folder = %folder.display(), "installed album art");
        Ok(folder)
    }

    fn from_embedded(&self, fullpath: &Path) -> Result<Option<PathBuf>> {
        if !fullpath.exists() || self.prober.embedded_image(fullpath).is_none() {
            return Ok(None);
        }
        let Some(dir) = fullpath.parent() else {
            return Ok(None);
        };

        let scratch = tempfile::tempdir()?;
        let extracted = scratch.path().join("embedded.jpg");
        self.transcoder.extract_image(fullpath, &extracted)?;
        if !extracted.exists() {
            return Ok(None);
        }

        Ok(Some(self.install(&extracted, dir)?))
    }

    fn from_folder(&self, dir: &Path) -> Result<Option<PathBuf>> {
        match best_image(dir)? {
            Some(found) => Ok(Some(self.install(&found, dir)?)),
            None => Ok(None),
        }
    }

    /// Copy top-level images from a parent folder that holds no audio
    /// of its own, then retry the folder search.
    fn from_parent(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(parent) = dir.parent() else {
            return Ok(None);
        };

        // a parent with its own audio is a sibling album, not a shared
        // art folder
        let parent_owns_audio = fsutil::files_audio(parent)
            .iter()
            .any(|f| !f.contains(std::path::MAIN_SEPARATOR));
        if parent_owns_audio {
            return Ok(None);
        }

        let mut copied = false;
        for img in fsutil::files_images(parent) {
            if img.contains(std::path::MAIN_SEPARATOR) {
                continue;
            }
            if fs::copy(parent.join(&img), dir.join(&img)).is_ok() {
                copied = true;
            }
        }

        if copied {
            return self.from_folder(dir);
        }
        Ok(None)
    }
}

impl ArtResolver for SidecarArt {
    fn resolve(&self, fullpath: &Path, with_parent_dir: bool) -> Result<Option<PathBuf>> {
        if let Some(found) = self.from_embedded(fullpath)? {
            return Ok(Some(found));
        }

        let Some(dir) = fullpath.parent() else {
            return Ok(None);
        };
        if let Some(found) = self.from_folder(dir)? {
            return Ok(Some(found));
        }

        if with_parent_dir {
            return self.from_parent(dir);
        }
        Ok(None)
    }
}

/// Best image in a folder: a top-level `folder.jpg` beats everything,
/// then the largest image by file size.
fn best_image(dir: &Path) -> Result<Option<PathBuf>> {
    let images = fsutil::files_images(dir);
    if images.is_empty() {
        return Ok(None);
    }

    for img in &images {
        if img.eq_ignore_ascii_case("folder.jpg") {
            return Ok(Some(dir.join(img)));
        }
    }

    let full: Vec<PathBuf> = images.iter().map(|i| dir.join(i)).collect();
    Ok(Some(fsutil::nth_file_size(&full, false)?))
}
