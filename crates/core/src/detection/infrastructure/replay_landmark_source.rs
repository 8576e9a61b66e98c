//! Replays recorded landmarks instead of running a model.
//!
//! File format: JSON lines, one line per video frame. Each line is an array
//! of faces, each face an array of points written either as `[x, y]` or
//! `{"x": .., "y": ..}`. `[]` records a frame with no face; blank lines are
//! ignored.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::detection::domain::landmark_source::{LandmarkModelLoader, LandmarkSource};
use crate::shared::frame::Frame;
use crate::shared::landmark::{LandmarkPoint, LandmarkSet};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read landmark recording {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("timestamp {current}ms does not advance past {previous}ms")]
    NonMonotonicTimestamp { previous: f64, current: f64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedPoint {
    Pair([f64; 2]),
    Object { x: f64, y: f64 },
}

impl From<RecordedPoint> for LandmarkPoint {
    fn from(point: RecordedPoint) -> Self {
        match point {
            RecordedPoint::Pair([x, y]) | RecordedPoint::Object { x, y } => LandmarkPoint::new(x, y),
        }
    }
}

/// Parses a recording held in memory; one entry per non-blank line.
pub fn parse_recording(text: &str) -> Result<Vec<Vec<LandmarkSet>>, ReplayError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let faces: Vec<Vec<RecordedPoint>> =
                serde_json::from_str(line).map_err(|source| ReplayError::Parse {
                    line: i + 1,
                    source,
                })?;
            Ok(faces
                .into_iter()
                .map(|face| LandmarkSet::new(face.into_iter().map(Into::into).collect()))
                .collect())
        })
        .collect()
}

pub fn read_recording(path: &Path) -> Result<Vec<Vec<LandmarkSet>>, ReplayError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_recording(&text)
}

/// Hands out one recorded frame per `detect` call, ignoring pixel data.
///
/// Like a video-mode model, it rejects timestamps that fail to increase.
/// Once the recording is exhausted every call reports no face.
pub struct ReplayLandmarkSource {
    frames: Vec<Vec<LandmarkSet>>,
    cursor: usize,
    last_timestamp_ms: Option<f64>,
}

impl ReplayLandmarkSource {
    pub fn new(frames: Vec<Vec<LandmarkSet>>) -> Self {
        Self {
            frames,
            cursor: 0,
            last_timestamp_ms: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl LandmarkSource for ReplayLandmarkSource {
    fn detect(
        &mut self,
        _frame: &Frame,
        timestamp_ms: f64,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
        if let Some(previous) = self.last_timestamp_ms {
            if timestamp_ms <= previous {
                return Err(Box::new(ReplayError::NonMonotonicTimestamp {
                    previous,
                    current: timestamp_ms,
                }));
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        let faces = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(faces)
    }
}

/// Loads a recording from disk, or hands over one parsed up front.
pub struct ReplayLandmarkLoader {
    recording: Recording,
}

enum Recording {
    File(PathBuf),
    Parsed(Option<Vec<Vec<LandmarkSet>>>),
}

impl ReplayLandmarkLoader {
    pub fn from_file(path: &Path) -> Self {
        Self {
            recording: Recording::File(path.to_path_buf()),
        }
    }

    pub fn from_frames(frames: Vec<Vec<LandmarkSet>>) -> Self {
        Self {
            recording: Recording::Parsed(Some(frames)),
        }
    }
}

impl LandmarkModelLoader for ReplayLandmarkLoader {
    fn load(&mut self) -> Result<Box<dyn LandmarkSource>, Box<dyn std::error::Error>> {
        let frames = match &mut self.recording {
            Recording::File(path) => read_recording(path)?,
            Recording::Parsed(frames) => frames.take().ok_or("Recording already loaded")?,
        };
        log::info!("Loaded landmark recording with {} frames", frames.len());
        Ok(Box::new(ReplayLandmarkSource::new(frames)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn frame() -> Frame {
        Frame::blank(2, 2, 0)
    }

    #[test]
    fn test_parse_pair_and_object_points() {
        let text = "[[[0.1, 0.2], {\"x\": 0.3, \"y\": 0.4}]]\n";
        let frames = parse_recording(text).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1);
        assert_eq!(frames[0][0].get(1), Some(&LandmarkPoint::new(0.3, 0.4)));
    }

    #[test]
    fn test_parse_no_face_and_blank_lines() {
        let text = "[]\n\n[[[0.5, 0.5]], [[0.1, 0.1]]]\n";
        let frames = parse_recording(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_empty());
        assert_eq!(frames[1].len(), 2);
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let text = "[]\nnot json\n";
        let err = parse_recording(text).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_detect_replays_in_order_then_runs_dry() {
        let first = vec![LandmarkSet::new(vec![LandmarkPoint::new(0.1, 0.1)])];
        let mut source = ReplayLandmarkSource::new(vec![first.clone(), Vec::new()]);

        assert_eq!(source.detect(&frame(), 1.0).unwrap(), first);
        assert!(source.detect(&frame(), 2.0).unwrap().is_empty());
        assert_eq!(source.remaining(), 0);
        assert!(source.detect(&frame(), 3.0).unwrap().is_empty());
    }

    #[test]
    fn test_detect_rejects_repeated_timestamp() {
        let mut source = ReplayLandmarkSource::new(vec![Vec::new(), Vec::new()]);
        source.detect(&frame(), 10.0).unwrap();
        assert!(source.detect(&frame(), 10.0).is_err());
        assert!(source.detect(&frame(), 11.0).is_ok());
    }

    #[test]
    fn test_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[[0.1, 0.2]]]").unwrap();
        writeln!(file, "[]").unwrap();

        let mut loader = ReplayLandmarkLoader::from_file(file.path());
        let mut source = loader.load().unwrap();

        assert_eq!(source.detect(&frame(), 1.0).unwrap().len(), 1);
        assert!(source.detect(&frame(), 2.0).unwrap().is_empty());
    }

    #[test]
    fn test_loader_missing_file_fails() {
        let mut loader = ReplayLandmarkLoader::from_file(Path::new("/nonexistent/landmarks.jsonl"));
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_loader_from_frames_loads_once() {
        let mut loader = ReplayLandmarkLoader::from_frames(vec![Vec::new()]);
        assert!(loader.load().is_ok());
        assert!(loader.load().is_err());
    }
}
