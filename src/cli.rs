//! Command-line interface.
//!
//! Flag parsing stays out of the core: this module turns arguments into
//! an [`Config`], wires up the real ffmpeg/ffprobe collaborators, and
//! hands off to the organizer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;

use crate::art::SidecarArt;
use crate::organizer::{Config, Organizer};
use crate::probe::Ffprobe;
use crate::transcode::{Ffmpeg, Quality};

/// Clean up an audio collection: infer metadata, rewrite tags, and
/// rename folders into a canonical layout.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to process
    pub path: PathBuf,

    /// Treat PATH as one artist's directory (mode; artist name used for
    /// all files)
    #[arg(long)]
    pub artist: Option<String>,

    /// Album override applied to every file (requires --artist)
    #[arg(long, requires = "artist")]
    pub album: Option<String>,

    /// Treat PATH as a collection of Artist/Year/Album subtrees (mode)
    #[arg(long, conflicts_with = "artist")]
    pub collection: bool,

    /// MP3 encoding quality: V0 (variable ~256kbps) or 320 (constant)
    #[arg(long, default_value = "V0")]
    pub bitrate: String,

    /// Re-encode to fix an incorrect track length (ie 1035:36:51)
    #[arg(long)]
    pub fix: bool,

    /// Process all files, even when path info already matches tag info
    #[arg(long)]
    pub force: bool,

    /// Write changes to disk (dry run without it)
    #[arg(long)]
    pub write: bool,
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    if !cli.collection && cli.artist.is_none() {
        bail!("must provide a mode: --artist \"NAME\" or --collection");
    }

    let bitrate: Quality = cli
        .bitrate
        .parse()
        .with_context(|| format!("invalid --bitrate {:?}", cli.bitrate))?;

    let config = Config {
        dir: cli.path.clone(),
        artist: cli.artist.clone().unwrap_or_default(),
        album: cli.album.clone().unwrap_or_default(),
        collection: cli.collection,
        bitrate,
        fix: cli.fix,
        force: cli.force,
        write: cli.write,
    };

    let prober = Arc::new(Ffprobe::new());
    let transcoder = Arc::new(Ffmpeg::new());
    let art = Arc::new(SidecarArt::new(prober.clone(), transcoder.clone()));

    Organizer::new(config, prober, transcoder, art)
        .process()
        .context("processing failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_artist_mode() {
        let cli = Cli::parse_from(["audiotidy", "--artist", "Phish", "--write", "/music/Phish"]);
        assert_eq!(cli.artist.as_deref(), Some("Phish"));
        assert!(cli.write);
        assert!(!cli.force);
        assert_eq!(cli.path, PathBuf::from("/music/Phish"));
        assert_eq!(cli.bitrate, "V0");
    }

    #[test]
    fn test_collection_conflicts_with_artist() {
        let res = Cli::try_parse_from([
            "audiotidy",
            "--collection",
            "--artist",
            "Phish",
            "/music",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_album_requires_artist() {
        let res = Cli::try_parse_from(["audiotidy", "--album", "Go To Heaven", "/music"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_mode_is_required_to_run() {
        let cli = Cli::parse_from(["audiotidy", "/music"]);
        assert!(run(&cli).is_err());
    }
}
