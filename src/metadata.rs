//! Per-file binding of derived [`Info`] to filesystem context.

use std::path::Path;

use crate::error::Result;
use crate::info::Info;
use crate::probe::Prober;

/// One audio file's derived metadata plus the bookkeeping the pipeline
/// needs: the per-segment leftovers of the path walk, the match verdict
/// against embedded tags, and the computed destination path.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Path relative to the entry directory.
    pub rel_path: String,
    /// Leftover text per directory segment after marker extraction;
    /// empty entries mark segments with nothing album-worthy in them.
    pub stripped: Vec<String>,
    pub info: Info,
    /// True when on-disk layout and embedded tags already agree.
    pub matched: bool,
    /// Destination relative path, set once reconciliation has run.
    pub result_path: String,
}

impl Metadata {
    /// Derive info for one file. `seed` carries externally known fields
    /// (artist from a flag or collection layout, an album override);
    /// path and file parsing only fill what the seed left empty.
    ///
    /// When the file sits directly in the entry directory there are no
    /// path segments to read, so the entry directory's own name serves
    /// as the album candidate instead.
    pub fn new(base: &Path, rel_path: &str, seed: Info) -> Self {
        let path = Path::new(rel_path);
        let mut info = seed;

        let parent = path.parent().unwrap_or(Path::new(""));
        let stripped = if parent.as_os_str().is_empty() {
            if let Some(name) = base.file_name() {
                info.from_album(&name.to_string_lossy());
            }
            Vec::new()
        } else {
            info.from_path(parent)
        };

        if let Some(stem) = path.file_stem() {
            info.from_file(&stem.to_string_lossy());
        }

        Metadata {
            rel_path: rel_path.to_string(),
            stripped,
            info,
            matched: false,
            result_path: String::new(),
        }
    }

    /// Probe embedded tags and fold them into the derived info, setting
    /// the match verdict. An empty artist falls back to the tag value
    /// before reconciling so both sides agree on it.
    pub fn probe_and_reconcile(&mut self, prober: &dyn Prober, full_path: &Path) -> Result<()> {
        let tags = prober.probe(full_path)?;

        if self.info.artist.is_empty() {
            self.info.artist = tags.artist.clone();
        }

        let (info, matched) = self.info.reconcile(&tags);
        self.info = info;
        self.matched = matched;
        Ok(())
    }
}
