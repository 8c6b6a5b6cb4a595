//! The bundle-processing pipeline.
//!
//! Files are grouped into per-directory bundles and each bundle runs
//! its full pipeline before the next begins: resolve album art once,
//! reconcile and convert every file on a worker pool, then merge the
//! folder to its canonical location and clean up an emptied parent.

mod pool;

use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::art::ArtResolver;
use crate::error::{Error, Result, ResultExt};
use crate::fsutil;
use crate::info::Info;
use crate::metadata::Metadata;
use crate::parse;
use crate::probe::Prober;
use crate::transcode::{Quality, TagMeta, TranscodeJob, Transcoder};

/// Run configuration, handed in by the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Collection root or artist directory to process.
    pub dir: PathBuf,
    /// Artist name override; implies the entry directory belongs to one
    /// artist.
    pub artist: String,
    /// Album override applied to every file.
    pub album: String,
    /// Entry directory holds `Artist/Year/Album` subtrees; artist names
    /// come from the first path component.
    pub collection: bool,
    pub bitrate: Quality,
    /// Re-encode to repair broken duration headers.
    pub fix: bool,
    /// Process files even when tags and layout already agree.
    pub force: bool,
    /// Apply changes; without this everything is inference and
    /// reporting only.
    pub write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dir: PathBuf::new(),
            artist: String::new(),
            album: String::new(),
            collection: false,
            bitrate: Quality::V0,
            fix: false,
            force: false,
            write: false,
        }
    }
}

/// State shared by the workers of one bundle.
struct BundleCtx {
    base: PathBuf,
    files: Vec<String>,
    /// Resolved album art path, empty when none was found.
    image: String,
    /// Scratch directory for staged conversion output.
    workdir: PathBuf,
}

pub struct Organizer {
    config: Config,
    prober: Arc<dyn Prober>,
    transcoder: Arc<dyn Transcoder>,
    art: Arc<dyn ArtResolver>,
    workers: usize,
}

impl Organizer {
    pub fn new(
        config: Config,
        prober: Arc<dyn Prober>,
        transcoder: Arc<dyn Transcoder>,
        art: Arc<dyn ArtResolver>,
    ) -> Self {
        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Organizer {
            config,
            prober,
            transcoder,
            art,
            workers,
        }
    }

    #[cfg(test)]
    fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Process the whole entry directory, bundle by bundle.
    pub fn process(&self) -> Result<()> {
        if !self.config.write {
            info!("dry run, pass --write to apply changes");
        }

        fsutil::check_dir(&self.config.dir)?;

        let mut base = self.config.dir.clone();
        let mut files = fsutil::files_audio(&base);

        // in artist mode the entry directory itself may be the album
        // name, so shift it into each relative path where the path walk
        // can see it
        if !self.config.artist.is_empty() {
            if let (Some(parent), Some(name)) = (base.parent(), base.file_name()) {
                let prefix = name.to_string_lossy().into_owned();
                for f in &mut files {
                    *f = format!("{prefix}{MAIN_SEPARATOR}{f}");
                }
                base = parent.to_path_buf();
            }
        }

        fsutil::bundle_files(&files, |bundle| self.process_bundle(&base, &files, bundle))?;

        info!("finished");
        Ok(())
    }

    /// Full pipeline for one directory's worth of files.
    fn process_bundle(&self, base: &Path, files: &[String], indexes: &[usize]) -> Result<()> {
        let first = &files[indexes[0]];
        let full_dir = base
            .join(first)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if !self.config.force && self.skip_folder(first) {
            debug!(dir = %full_dir.display(), "already canonical, skipping");
            return Ok(());
        }

        info!(dir = %full_dir.display(), "processing");

        let mut image = String::new();
        let mut workdir = PathBuf::new();
        let mut scratch = None;
        if self.config.write {
            image = self
                .art
                .resolve(&base.join(first), true)?
                .map(|p| p.display().to_string())
                .unwrap_or_default();

            let td = tempfile::tempdir_in(&full_dir)
                .with_context(format!("creating scratch dir in {}", full_dir.display()))?;
            workdir = td.path().to_path_buf();
            scratch = Some(td);
        }

        let ctx = BundleCtx {
            base: base.to_path_buf(),
            files: files.to_vec(),
            image,
            workdir,
        };

        let results = pool::run(self.workers, indexes, |index| self.process_file(&ctx, index))?;

        if self.config.write {
            // remove scratch before the folder possibly moves
            drop(scratch);

            let Some(md) = results.first() else {
                return Ok(());
            };
            let result_dir = base
                .join(&md.result_path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            if full_dir != result_dir {
                fsutil::merge_folder(&full_dir, &result_dir, merge_key)
                    .with_context(format!("merging into {}", result_dir.display()))?;
            }

            // drop a parent folder that no longer holds any audio
            if let Some(parent) = full_dir.parent() {
                if parent != base && parent.is_dir() && fsutil::files_audio(parent).is_empty() {
                    fs::remove_dir_all(parent)?;
                }
            }
        }

        Ok(())
    }

    /// Whether a bundle is already canonically named, judged by the
    /// first file's album folder. Deriving fresh info from the folder
    /// name and rendering it back unchanged means there is nothing to
    /// fix.
    fn skip_folder(&self, path: &str) -> bool {
        let pa: Vec<&str> = path.split(MAIN_SEPARATOR).collect();

        let mut album = "";
        if self.config.collection {
            // an unorganized artist folder is never canonical
            if pa[0].contains(" - ") {
                return true;
            }
            if pa.len() > 3 {
                // Artist / Year / Album / File
                album = pa[2];
            }
        } else if pa.len() > 1 {
            album = pa[pa.len() - 2];
        }

        if album.is_empty() {
            return false;
        }

        if !self.config.album.is_empty() {
            return self.config.album == album;
        }

        let mut derived = Info::new();
        derived.from_album(album);
        derived.to_album() == album
    }

    /// Reconcile one file and, when writing, convert and rename it.
    fn process_file(&self, ctx: &BundleCtx, index: usize) -> Result<Metadata> {
        let rel = &ctx.files[index];
        let full_path = ctx.base.join(rel);

        let mut seed = Info::new();
        if !self.config.artist.is_empty() {
            seed.artist = self.config.artist.clone();
        }
        if self.config.collection {
            seed.artist = rel
                .split(MAIN_SEPARATOR)
                .next()
                .unwrap_or_default()
                .to_string();
        }
        if !self.config.album.is_empty() {
            seed.set_album(&self.config.album);
        }

        let mut m = Metadata::new(&ctx.base, rel, seed);
        m.probe_and_reconcile(self.prober.as_ref(), &full_path)?;

        // already canonical, nothing to do
        if m.matched && !self.config.force {
            m.result_path = rel.clone();
            return Ok(m);
        }

        let mut result = self.result_dir(&m, rel);
        result.push(m.info.to_album());
        result.push(m.info.to_file());
        let mut result_path = result.to_string_lossy().into_owned();

        if !m.matched {
            debug!(file = %full_path.display(), info = ?m.info, "updating tags");
        }

        let ext = Path::new(rel)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if ext == "flac" && flac_passthrough(rel) {
            // explicitly curated lossless folders stay lossless
            result_path.push_str(".flac");
        } else {
            result_path.push_str(".mp3");
            self.convert_mp3(ctx, &full_path, &ext, &m.info)?;
        }

        if *rel != result_path {
            info!(from = %rel, to = %result_path, "rename");
        }

        m.result_path = result_path;
        Ok(m)
    }

    /// Directory part of the canonical result path, above the album
    /// folder itself.
    fn result_dir(&self, m: &Metadata, rel: &str) -> PathBuf {
        let fpa: Vec<&str> = rel.split(MAIN_SEPARATOR).collect();

        // collection layout, or an artist/year prefix already in place
        if self.config.collection
            || (fpa.len() > 2 && fpa[0] == m.info.artist && fpa[1] == m.info.year)
        {
            let mut dir = PathBuf::from(&m.info.artist);
            dir.push(&m.info.year);
            return dir;
        }

        // keep outer folders that carried real text; the innermost one
        // with text is the album folder and is replaced by to_album,
        // while marker-only folders (cd1 and friends) vanish
        let mut dir = PathBuf::new();
        let mut prefix: Vec<&str> = Vec::new();
        let mut found_album = false;
        for x in (0..m.stripped.len()).rev() {
            if m.stripped[x].is_empty() {
                continue;
            }
            if found_album {
                prefix.insert(0, fpa[x]);
            } else {
                found_album = true;
            }
        }
        for seg in prefix {
            dir.push(seg);
        }
        dir
    }

    /// Convert (or stream-copy) into the scratch dir, verify the output,
    /// then swap it in place of the original.
    fn convert_mp3(&self, ctx: &BundleCtx, full_path: &Path, ext: &str, info: &Info) -> Result<()> {
        if !self.config.write {
            return Ok(());
        }

        let quality = if ext == "mp3" {
            Quality::Copy
        } else {
            self.config.bitrate
        };

        let staged = ctx.workdir.join(format!("{}.mp3", info.to_file()));
        let job = TranscodeJob {
            input: full_path.to_path_buf(),
            output: staged,
            quality,
            meta: TagMeta {
                artist: info.artist.clone(),
                album: info.to_album(),
                disc: info.disc.clone(),
                track: info.track.clone(),
                title: info.title.clone(),
                artwork: ctx.image.clone(),
            },
            fix_duration: self.config.fix,
        };

        let out = self.transcoder.to_mp3(&job)?;

        // the original is only deleted once the replacement checks out
        let size = fs::metadata(&out)?.len();
        if size == 0 {
            return Err(Error::EmptyOutput(out));
        }

        let dest = full_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(format!("{}.mp3", info.to_file()));

        // set the original aside until the replacement is in place; a
        // failed swap puts it back instead of losing the track
        let mut aside = full_path.as_os_str().to_os_string();
        aside.push(".orig");
        let aside = PathBuf::from(aside);

        fs::rename(full_path, &aside)?;
        if let Err(e) = fs::rename(&out, &dest) {
            let _ = fs::rename(&aside, full_path);
            return Err(Error::Io(e))
                .with_context(format!("moving converted file to {}", dest.display()));
        }
        fs::remove_file(&aside)?;
        Ok(())
    }
}

/// Composite identity of an audio file for merging: disc and track
/// combined into one integer so `(1, 2)` and `(0, 12)` stay distinct.
fn merge_key(file: &str) -> (i64, String) {
    let mut i = Info::new();
    i.from_file(file);

    let disc: i64 = parse::leading_digits(&i.disc).parse().unwrap_or(0);
    let track: i64 = parse::leading_digits(&i.track).parse().unwrap_or(0);
    (disc * 1000 + track, i.title)
}

/// Folders explicitly suffixed `" - FLAC"` are kept as flac.
fn flac_passthrough(rel: &str) -> bool {
    Path::new(rel)
        .parent()
        .map(|p| p.to_string_lossy().ends_with(" - FLAC"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::art::SidecarArt;
    use crate::probe::TagData;
    use crate::test_utils::{MockProber, MockTranscoder, create_files};
    use tempfile::tempdir;

    fn organizer(config: Config) -> Organizer {
        let prober = Arc::new(MockProber::default());
        let transcoder = Arc::new(MockTranscoder::default());
        let art = Arc::new(SidecarArt::new(prober.clone(), transcoder.clone()));
        Organizer::new(config, prober, transcoder, art).with_workers(1)
    }

    #[test]
    fn test_merge_key() {
        assert_eq!(merge_key("1-02 Title").0, 1002);
        assert_eq!(merge_key("12 Other").0, 12);
        assert_eq!(merge_key("1-02 Title").1, "Title");
    }

    #[test]
    fn test_flac_passthrough() {
        assert!(flac_passthrough("1995.12.09 Album - FLAC/01 One.flac"));
        assert!(!flac_passthrough("1995.12.09 Album/01 One.flac"));
    }

    #[test]
    fn test_skip_folder_collection() {
        let tests = [
            // missing album folder
            ("Jerry Garcia Band/1.mp3", false),
            // unorganized artist folder
            ("Grateful Dead - Unorganized/Album1/1.mp3", true),
            // artist, year, album all in place and canonical
            (
                "Phish/2003/2003.07.09 Shoreline Amphitheatre, Mountain View, CA/1.mp3",
                true,
            ),
        ];

        for (path, expected) in tests {
            let o = organizer(Config {
                collection: true,
                ..Config::default()
            });
            assert_eq!(o.skip_folder(path), expected, "path {path:?}");
        }
    }

    #[test]
    fn test_skip_folder_artist() {
        let tests = [
            ("Grateful Dead - Unorganized/1.mp3", "Grateful Dead", true),
            ("Random Dir/1.mp3", "Anyone", true),
        ];

        for (path, artist, expected) in tests {
            let o = organizer(Config {
                artist: artist.to_string(),
                ..Config::default()
            });
            assert_eq!(o.skip_folder(path), expected, "path {path:?}");
        }
    }

    #[test]
    fn test_skip_folder_album_override() {
        let tests = [
            ("1980 Go To Heaven/1.mp3", "1980 Go To Heaven", true),
            ("1980 Go To Heaven/1.mp3", "Go To Heaven", false),
        ];

        for (path, album, expected) in tests {
            let o = organizer(Config {
                artist: "Whoever".to_string(),
                album: album.to_string(),
                ..Config::default()
            });
            assert_eq!(o.skip_folder(path), expected, "path {path:?}");
        }
    }

    #[test]
    fn test_process_rejects_missing_dir() {
        let o = organizer(Config {
            dir: PathBuf::from("organizer-dir-does-not-exist"),
            ..Config::default()
        });
        assert!(matches!(o.process(), Err(Error::InvalidDirectory(_))));
    }

    #[test]
    fn test_process_end_to_end() {
        let td = tempdir().unwrap();
        let entry = td.path().join("Phish");

        let tagged = serde_json::to_string(&serde_json::json!({
            "album": "2003.07.18 Alpine Valley, East Troy, WI",
            "track": "01",
            "title": "Axilla I",
        }))
        .unwrap();

        create_files(
            &entry,
            &[
                (
                    "2003/2003.07.17 Bonner Springs, KS/1-01 Chalk Dust Torture.flac",
                    "{}",
                ),
                ("dir2/file2.mp3", tagged.as_str()),
            ],
        );

        let o = organizer(Config {
            dir: entry,
            artist: "Phish".to_string(),
            force: true,
            write: true,
            ..Config::default()
        });
        o.process().unwrap();

        assert_eq!(
            fsutil::files_audio(td.path()),
            vec![
                "Phish/2003.07.18 Alpine Valley, East Troy, WI/01 Axilla I.mp3",
                "Phish/2003/2003.07.17 Bonner Springs, KS/01-01 Chalk Dust Torture.mp3",
            ]
        );

        // converted file carries the reconciled tags
        let converted = td
            .path()
            .join("Phish/2003.07.18 Alpine Valley, East Troy, WI/01 Axilla I.mp3");
        let job: TranscodeJob =
            serde_json::from_slice(&fs::read(&converted).unwrap()).unwrap();
        assert_eq!(job.meta.artist, "Phish");
        assert_eq!(job.meta.album, "2003.07.18 Alpine Valley, East Troy, WI");
        assert_eq!(job.meta.title, "Axilla I");
        assert_eq!(job.quality, Quality::Copy);
    }

    #[test]
    fn test_process_idempotent_second_run() {
        let td = tempdir().unwrap();
        let entry = td.path().join("collection");

        let tags = TagData {
            artist: "Grateful Dead".into(),
            album: "Blues For Allah".into(),
            track: "1".into(),
            title: "Help on the Way".into(),
            ..TagData::default()
        };
        // tags that agree exactly with the canonical layout
        let contents = serde_json::to_string(&serde_json::json!({
            "artist": tags.artist,
            "album": format!("1975 {}", tags.album),
            "track": tags.track,
            "title": tags.title,
        }))
        .unwrap();

        create_files(
            &entry,
            &[(
                "Grateful Dead/1975/1975 Blues For Allah/01 Help on the Way.mp3",
                contents.as_str(),
            )],
        );

        let before = fsutil::files_audio(&entry);

        let o = organizer(Config {
            dir: entry.clone(),
            collection: true,
            write: true,
            ..Config::default()
        });
        o.process().unwrap();

        // canonical folder recognized, nothing moved or rewritten
        assert_eq!(fsutil::files_audio(&entry), before);
        assert_eq!(
            fs::read_to_string(entry.join(&before[0])).unwrap(),
            contents
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let td = tempdir().unwrap();
        let entry = td.path().join("Phish");
        create_files(&entry, &[("dir2/file2.mp3", "{}")]);

        let o = organizer(Config {
            dir: entry.clone(),
            artist: "Phish".to_string(),
            force: true,
            write: false,
            ..Config::default()
        });
        o.process().unwrap();

        assert_eq!(fsutil::files_audio(&entry), vec!["dir2/file2.mp3"]);
        assert_eq!(fs::read_to_string(entry.join("dir2/file2.mp3")).unwrap(), "{}");
    }

    #[test]
    fn test_failed_swap_keeps_original() {
        let td = tempdir().unwrap();
        let entry = td.path().join("Phish");
        create_files(&entry, &[("album/1-01 Foo.flac", "{}")]);
        // a directory squatting on the converted file's destination name
        // makes the final rename fail after conversion succeeded
        fs::create_dir_all(entry.join("album/01-01 Foo.mp3")).unwrap();

        let o = organizer(Config {
            dir: entry.clone(),
            artist: "Phish".to_string(),
            force: true,
            write: true,
            ..Config::default()
        });
        assert!(o.process().is_err());

        // the source track survives the failed swap
        assert_eq!(fsutil::files_audio(&entry), vec!["album/1-01 Foo.flac"]);
        assert_eq!(
            fs::read_to_string(entry.join("album/1-01 Foo.flac")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_probe_error_aborts() {
        let td = tempdir().unwrap();
        let entry = td.path().join("Phish");
        create_files(&entry, &[("dir2/file2.mp3", "not json at all")]);

        let o = organizer(Config {
            dir: entry,
            artist: "Phish".to_string(),
            force: true,
            write: true,
            ..Config::default()
        });
        assert!(o.process().is_err());
    }
}
