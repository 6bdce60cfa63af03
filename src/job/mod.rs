use std::path::{Path, PathBuf};

use crate::decoder::ScanError;

/// A trace file waiting to be scanned
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub path: PathBuf,
    pub decoder: DecoderKind,
}

/// How a trace file is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// `.txt.gz` output of an earlier darshan-parser run
    Decompress,
    /// Binary Darshan log
    DarshanParser,
}

impl DecoderKind {
    pub const COMPRESSED_TEXT_SUFFIX: &'static str = ".txt.gz";

    /// Pick a decoder from the file name; anything unrecognized is a binary log.
    ///
    /// Only the final path component is checked, so a trailing separator
    /// (`x.txt.gz/`) still selects the decompressor.
    pub fn from_path(path: &Path) -> Self {
        let compressed = path
            .file_name()
            .map(|name| name.to_string_lossy().ends_with(Self::COMPRESSED_TEXT_SUFFIX))
            .unwrap_or(false);

        if compressed {
            DecoderKind::Decompress
        } else {
            DecoderKind::DarshanParser
        }
    }
}

impl Job {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let decoder = DecoderKind::from_path(&path);
        Self { path, decoder }
    }
}

/// Outcome of scanning one job
#[derive(Debug)]
pub struct MountCount {
    pub path: PathBuf,
    pub outcome: Result<usize, ScanError>,
}

impl MountCount {
    pub fn new(path: PathBuf, outcome: Result<usize, ScanError>) -> Self {
        Self { path, outcome }
    }

    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }

    /// Number of matching mounts, or -1 if the scan failed
    pub fn count(&self) -> i64 {
        match &self.outcome {
            Ok(count) => *count as i64,
            Err(_) => -1,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        self.outcome.as_ref().err()
    }

    pub fn is_match(&self) -> bool {
        self.count() > 0
    }
}
