//! Transcoding boundary: converting audio to tagged MP3 via ffmpeg.
//!
//! The transcoder writes the converted file to the requested output
//! path and nothing more. Verifying the output and swapping it into
//! place is the caller's job.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// MP3 encoding profile. `Copy` passes the stream through untouched and
/// is used when the input already is an MP3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    V0,
    Cbr320,
    Copy,
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "v0" => Ok(Quality::V0),
            "320" => Ok(Quality::Cbr320),
            "copy" => Ok(Quality::Copy),
            other => Err(Error::transcode(
                Path::new(""),
                format!("unknown bitrate {other:?}, expected V0 or 320"),
            )),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::V0 => write!(f, "V0"),
            Quality::Cbr320 => write!(f, "320"),
            Quality::Copy => write!(f, "copy"),
        }
    }
}

/// Tag values to embed in the output file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMeta {
    pub artist: String,
    pub album: String,
    pub disc: String,
    pub track: String,
    pub title: String,
    /// Path to cover art to embed; empty for none.
    pub artwork: String,
}

/// One conversion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
    pub meta: TagMeta,
    /// Re-encode even when copying would do, to rebuild a broken
    /// duration header.
    pub fix_duration: bool,
}

/// External transcoder interface.
pub trait Transcoder: Send + Sync {
    /// Convert or re-tag into an MP3 at `job.output`.
    fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf>;

    /// Extract embedded cover art to an image file.
    fn extract_image(&self, input: &Path, output: &Path) -> Result<()>;
}

/// [`Transcoder`] backed by the ffmpeg binary.
pub struct Ffmpeg {
    bin: String,
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self {
            bin: "ffmpeg".to_string(),
        }
    }

    fn run(&self, cmd: &mut Command, input: &Path) -> Result<()> {
        let output = cmd
            .output()
            .map_err(|e| Error::transcode(input, format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            return Err(Error::transcode(
                input,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for Ffmpeg {
    fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf> {
        // a duration fix requires a real re-encode, stream copy would
        // carry the broken header along
        let quality = match job.quality {
            Quality::Copy if job.fix_duration => Quality::V0,
            q => q,
        };

        let mut cmd = Command::new(&self.bin);
        cmd.arg("-y").arg("-i").arg(&job.input);

        if !job.meta.artwork.is_empty() {
            cmd.arg("-i").arg(&job.meta.artwork);
            cmd.args(["-map", "0:a", "-map", "1:0"]);
            cmd.args(["-metadata:s:v", "title=Album cover"]);
        }

        match quality {
            Quality::Copy => {
                cmd.args(["-codec:a", "copy"]);
            }
            Quality::V0 => {
                cmd.args(["-codec:a", "libmp3lame", "-qscale:a", "0"]);
            }
            Quality::Cbr320 => {
                cmd.args(["-codec:a", "libmp3lame", "-b:a", "320k"]);
            }
        }

        cmd.args(["-id3v2_version", "3"]);
        let tags = [
            ("artist", &job.meta.artist),
            ("album", &job.meta.album),
            ("disc", &job.meta.disc),
            ("track", &job.meta.track),
            ("title", &job.meta.title),
        ];
        for (key, value) in tags {
            if !value.is_empty() {
                cmd.arg("-metadata").arg(format!("{key}={value}"));
            }
        }

        cmd.arg(&job.output);
        debug!(input = %job.input.display(), %quality, "transcoding");
        self.run(&mut cmd, &job.input)?;
        Ok(job.output.clone())
    }

    fn extract_image(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-an", "-codec:v", "copy"])
            .arg(output);
        self.run(&mut cmd, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_str() {
        assert_eq!("V0".parse::<Quality>().unwrap(), Quality::V0);
        assert_eq!("v0".parse::<Quality>().unwrap(), Quality::V0);
        assert_eq!("320".parse::<Quality>().unwrap(), Quality::Cbr320);
        assert_eq!("copy".parse::<Quality>().unwrap(), Quality::Copy);
        assert!("192".parse::<Quality>().is_err());
    }

    #[test]
    fn test_quality_display_round_trip() {
        for q in [Quality::V0, Quality::Cbr320, Quality::Copy] {
            assert_eq!(q.to_string().parse::<Quality>().unwrap(), q);
        }
    }

    #[test]
    fn test_job_serializes() {
        let job = TranscodeJob {
            input: PathBuf::from("in.flac"),
            output: PathBuf::from("out.mp3"),
            quality: Quality::V0,
            meta: TagMeta {
                artist: "Phish".into(),
                ..TagMeta::default()
            },
            fix_duration: false,
        };

        let raw = serde_json::to_string(&job).unwrap();
        let back: TranscodeJob = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.meta.artist, "Phish");
        assert_eq!(back.quality, Quality::V0);
    }
}
