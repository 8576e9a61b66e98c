//! Stub collaborators shared by the pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::fatigue_tracker::FatigueThresholds;
use crate::detection::domain::index_groups::IndexGroups;
use crate::detection::domain::landmark_source::{LandmarkModelLoader, LandmarkSource};
use crate::shared::frame::Frame;
use crate::shared::landmark::{LandmarkPoint, LandmarkSet};
use crate::video::domain::frame_source::FrameSource;

use super::drowsiness_monitor::{DrowsinessMonitor, MonitorConfig};

pub type ScriptedResult = Result<Vec<LandmarkSet>, String>;

/// Compact 16-point topology: left eye 0..6, right eye 6..12, mouth 12..16.
pub fn test_groups() -> IndexGroups {
    IndexGroups {
        left_eye: [0, 1, 2, 3, 4, 5],
        right_eye: [6, 7, 8, 9, 10, 11],
        mouth: [12, 13, 14, 15],
    }
}

/// A face whose EAR is `eye_gap / 0.2` and MAR is `mouth_gap / 0.2`.
pub fn face(eye_gap: f64, mouth_gap: f64) -> LandmarkSet {
    let h = eye_gap / 2.0;
    let mut points = Vec::new();
    for cx in [0.3, 0.7] {
        points.extend([
            (cx - 0.1, 0.4),
            (cx - 0.05, 0.4 - h),
            (cx + 0.05, 0.4 - h),
            (cx + 0.1, 0.4),
            (cx + 0.05, 0.4 + h),
            (cx - 0.05, 0.4 + h),
        ]);
    }
    let m = mouth_gap / 2.0;
    points.extend([(0.4, 0.7), (0.6, 0.7), (0.5, 0.7 - m), (0.5, 0.7 + m)]);
    LandmarkSet::new(points.into_iter().map(|(x, y)| LandmarkPoint::new(x, y)).collect())
}

/// EAR 0.3, MAR 0.2.
pub fn open_face() -> LandmarkSet {
    face(0.06, 0.04)
}

/// EAR 0.2, MAR 0.2.
pub fn closed_face() -> LandmarkSet {
    face(0.04, 0.04)
}

/// EAR 0.3, MAR 0.8.
pub fn yawning_face() -> LandmarkSet {
    face(0.06, 0.16)
}

/// Replays scripted detection results and records the timestamps it saw.
pub struct ScriptedLandmarkSource {
    script: VecDeque<ScriptedResult>,
    pub timestamps: Arc<Mutex<Vec<f64>>>,
}

impl LandmarkSource for ScriptedLandmarkSource {
    fn detect(
        &mut self,
        _frame: &Frame,
        timestamp_ms: f64,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
        self.timestamps.lock().unwrap().push(timestamp_ms);
        match self.script.pop_front() {
            Some(Ok(faces)) => Ok(faces),
            Some(Err(message)) => Err(message.into()),
            None => Ok(Vec::new()),
        }
    }
}

/// Fails the first `failures` loads, then hands out the scripted source.
/// A gated loader blocks inside `load` until its gate is signalled.
pub struct StubLoader {
    script: Option<VecDeque<ScriptedResult>>,
    failures: usize,
    gate: Option<Receiver<()>>,
    pub loads: Arc<AtomicUsize>,
    pub timestamps: Arc<Mutex<Vec<f64>>>,
}

impl StubLoader {
    pub fn new(script: Vec<ScriptedResult>) -> Self {
        Self {
            script: Some(script.into()),
            failures: 0,
            gate: None,
            loads: Arc::new(AtomicUsize::new(0)),
            timestamps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    /// Each send on the returned sender lets one `load` call finish.
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.gate = Some(rx);
        (self, tx)
    }
}

impl LandmarkModelLoader for StubLoader {
    fn load(&mut self) -> Result<Box<dyn LandmarkSource>, Box<dyn std::error::Error>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if self.failures > 0 {
            self.failures -= 1;
            return Err("network unreachable".into());
        }
        let script = self.script.take().ok_or("already loaded")?;
        Ok(Box::new(ScriptedLandmarkSource {
            script,
            timestamps: self.timestamps.clone(),
        }))
    }
}

/// Yields `frames` blank frames, then reports itself finished.
pub struct StubFrameSource {
    remaining: usize,
    next_index: usize,
    fail_acquire: bool,
    pub acquired: Arc<AtomicBool>,
    pub released: Arc<AtomicBool>,
    pub release_calls: Arc<AtomicUsize>,
}

impl StubFrameSource {
    pub fn new(frames: usize) -> Self {
        Self {
            remaining: frames,
            next_index: 0,
            fail_acquire: false,
            acquired: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
            release_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_acquire() -> Self {
        Self {
            fail_acquire: true,
            ..Self::new(0)
        }
    }
}

impl FrameSource for StubFrameSource {
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.fail_acquire {
            return Err("permission denied".into());
        }
        self.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let frame = Frame::blank(4, 4, self.next_index);
        self.next_index += 1;
        Some(frame)
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Monitor over the 16-point test topology with default thresholds.
pub fn monitor_with(script: Vec<ScriptedResult>) -> (DrowsinessMonitor, Arc<Mutex<Vec<f64>>>) {
    let loader = StubLoader::new(script);
    let timestamps = loader.timestamps.clone();
    let monitor = DrowsinessMonitor::new(Box::new(loader), test_config());
    (monitor, timestamps)
}

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        thresholds: FatigueThresholds::default(),
        index_groups: test_groups(),
    }
}
