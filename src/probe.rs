//! Audio stream probing boundary.
//!
//! The pipeline never parses audio containers itself; it shells out to
//! ffprobe and consumes its JSON output. Everything downstream depends
//! only on the [`Prober`] trait so tests can substitute a mock.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded tag data for one audio file. All fields are raw tag text;
/// cleanup happens during reconciliation, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagData {
    #[serde(alias = "ARTIST", alias = "Artist")]
    pub artist: String,
    #[serde(alias = "ALBUM", alias = "Album")]
    pub album: String,
    #[serde(alias = "DISC", alias = "Disc", alias = "disc_number")]
    pub disc: String,
    #[serde(alias = "TRACK", alias = "Track", alias = "track_number")]
    pub track: String,
    #[serde(alias = "TITLE", alias = "Title")]
    pub title: String,
}

/// External prober interface.
pub trait Prober: Send + Sync {
    /// Read embedded tags. Errors when the file is unreadable or the
    /// prober does not understand the container.
    fn probe(&self, path: &Path) -> Result<TagData>;

    /// Dimensions of embedded cover art, if any.
    fn embedded_image(&self, path: &Path) -> Option<(u32, u32)>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: TagData,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// [`Prober`] backed by the ffprobe binary.
pub struct Ffprobe {
    bin: String,
}

impl Ffprobe {
    pub fn new() -> Self {
        Self {
            bin: "ffprobe".to_string(),
        }
    }

    fn run(&self, path: &Path) -> Result<ProbeOutput> {
        let output = Command::new(&self.bin)
            .args(["-v", "quiet", "-print_format", "json"])
            .args(["-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| Error::probe(path, format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            return Err(Error::probe(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        debug!(path = %path.display(), "probed");
        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::probe(path, format!("unparseable probe output: {e}")))
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for Ffprobe {
    fn probe(&self, path: &Path) -> Result<TagData> {
        Ok(self.run(path)?.format.tags)
    }

    fn embedded_image(&self, path: &Path) -> Option<(u32, u32)> {
        let out = self.run(path).ok()?;
        out.streams
            .iter()
            .find(|s| s.codec_type == "video" && s.width > 0)
            .map(|s| (s.width, s.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_data_from_probe_json() {
        let raw = r#"{
            "format": {
                "tags": {
                    "artist": "Phish",
                    "album": "2003.07.18 Alpine Valley, East Troy, WI",
                    "track": "01",
                    "title": "Axilla I"
                }
            }
        }"#;

        let out: ProbeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(out.format.tags.artist, "Phish");
        assert_eq!(out.format.tags.track, "01");
        assert_eq!(out.format.tags.disc, "");
    }

    #[test]
    fn test_tag_data_uppercase_aliases() {
        let raw = r#"{"format":{"tags":{"ARTIST":"x","TITLE":"y"}}}"#;
        let out: ProbeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(out.format.tags.artist, "x");
        assert_eq!(out.format.tags.title, "y");
    }

    #[test]
    fn test_video_stream_is_embedded_image() {
        let raw = r#"{
            "format": {"tags": {}},
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 600, "height": 600}
            ]
        }"#;

        let out: ProbeOutput = serde_json::from_str(raw).unwrap();
        let img = out
            .streams
            .iter()
            .find(|s| s.codec_type == "video" && s.width > 0);
        assert_eq!(img.map(|s| (s.width, s.height)), Some((600, 600)));
    }
}
