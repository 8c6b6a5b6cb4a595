//! Shared helpers and mock collaborators for tests.
//!
//! The mock prober reads a file's contents as a JSON tag bundle, and
//! the mock transcoder writes its whole job back out as JSON, so tests
//! can assert on exactly what the pipeline asked for without ffmpeg or
//! ffprobe installed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::probe::{Prober, TagData};
use crate::transcode::{TranscodeJob, Transcoder};

/// Create files (and their parent directories) under `base`.
pub fn create_files(base: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = base.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

/// Prober whose tag data is the probed file's own contents, as JSON.
#[derive(Debug, Default)]
pub struct MockProber {
    embedded: Option<(u32, u32)>,
}

impl MockProber {
    pub fn with_embedded_image(width: u32, height: u32) -> Self {
        Self {
            embedded: Some((width, height)),
        }
    }
}

impl Prober for MockProber {
    fn probe(&self, path: &Path) -> Result<TagData> {
        let raw = fs::read(path)?;
        serde_json::from_slice(&raw).map_err(|e| Error::probe(path, e.to_string()))
    }

    fn embedded_image(&self, _path: &Path) -> Option<(u32, u32)> {
        self.embedded
    }
}

/// Transcoder that serializes the requested job into the output file.
#[derive(Debug, Default)]
pub struct MockTranscoder {
    embedded: Vec<u8>,
}

impl MockTranscoder {
    pub fn with_embedded(bytes: Vec<u8>) -> Self {
        Self { embedded: bytes }
    }
}

impl Transcoder for MockTranscoder {
    fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf> {
        let raw = serde_json::to_vec(job)
            .map_err(|e| Error::transcode(&job.input, e.to_string()))?;
        fs::write(&job.output, raw)?;
        Ok(job.output.clone())
    }

    fn extract_image(&self, _input: &Path, output: &Path) -> Result<()> {
        fs::write(output, &self.embedded)?;
        Ok(())
    }
}
