use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::detection::domain::aspect_ratio::FaceRatios;
use crate::detection::domain::fatigue_tracker::{FatigueThresholds, FatigueTracker, SignalTransitions};
use crate::detection::domain::index_groups::IndexGroups;
use crate::detection::domain::landmark_source::{LandmarkModelLoader, LandmarkSource};
use crate::video::domain::frame_source::FrameSource;

use super::frame_loop::FrameLoopHandle;
use super::monitor_logger::{MonitorLogger, NullMonitorLogger};
use super::session_state::SessionState;
use super::timestamp_clock::{MonotonicClock, TimestampClock};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to load landmark model: {0}")]
    ModelLoad(String),

    #[error("Failed to acquire frame source: {0}")]
    FrameSourceAcquire(String),
}

/// Tunables for one monitor: debounce thresholds and landmark topology.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorConfig {
    pub thresholds: FatigueThresholds,
    pub index_groups: IndexGroups,
}

/// What a single [`DrowsinessMonitor::process_frame`] call did.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// No active session, or its loop handle was cancelled.
    Inactive,
    /// The frame source had nothing new.
    NoData,
    /// The landmark model returned an error; the frame was skipped.
    DetectionFailed,
    /// No face in the frame; previous values are kept.
    NoFace,
    Updated {
        ratios: FaceRatios,
        transitions: SignalTransitions,
    },
}

impl FrameOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOutcome::Inactive => "inactive",
            FrameOutcome::NoData => "no_data",
            FrameOutcome::DetectionFailed => "detection_failed",
            FrameOutcome::NoFace => "no_face",
            FrameOutcome::Updated { .. } => "updated",
        }
    }
}

/// Progress of a session start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartStatus {
    /// No session is running or starting.
    Idle,
    /// The landmark model is still loading on its background thread.
    Loading,
    Active,
}

/// The loader travels to the load thread and back, so a failed load can
/// be retried.
type LoadOutcome = (
    Box<dyn LandmarkModelLoader>,
    Result<Box<dyn LandmarkSource>, String>,
);

/// Owns one monitoring session: landmark model, frame source, fatigue
/// tracker and the observable [`SessionState`].
///
/// The model is loaded on a background thread by the first session start
/// and reused by later sessions; [`SessionState::is_model_loading`] is set
/// for as long as that thread runs. Dropping the monitor stops any active
/// session.
pub struct DrowsinessMonitor {
    loader: Option<Box<dyn LandmarkModelLoader>>,
    pending_load: Option<Receiver<LoadOutcome>>,
    pending_source: Option<Box<dyn FrameSource>>,
    landmarker: Option<Box<dyn LandmarkSource>>,
    frame_source: Option<Box<dyn FrameSource>>,
    clock: Box<dyn TimestampClock>,
    logger: Box<dyn MonitorLogger>,
    index_groups: IndexGroups,
    tracker: FatigueTracker,
    loop_handle: Option<FrameLoopHandle>,
    state: SessionState,
}

impl DrowsinessMonitor {
    pub fn new(loader: Box<dyn LandmarkModelLoader>, config: MonitorConfig) -> Self {
        Self {
            loader: Some(loader),
            pending_load: None,
            pending_source: None,
            landmarker: None,
            frame_source: None,
            clock: Box::new(MonotonicClock::new()),
            logger: Box::new(NullMonitorLogger),
            index_groups: config.index_groups,
            tracker: FatigueTracker::new(config.thresholds),
            loop_handle: None,
            state: SessionState::default(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn TimestampClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn MonitorLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Starts a session and blocks until the model has loaded.
    ///
    /// Failures are recorded in [`SessionState::last_error`] and returned;
    /// the session stays inactive. Calling this while a session is already
    /// active releases `frame_source` and leaves the running session alone.
    pub fn start_session(&mut self, frame_source: Box<dyn FrameSource>) -> Result<(), SessionError> {
        if self.begin_session(frame_source)? == StartStatus::Loading {
            self.wait_for_start()?;
        }
        Ok(())
    }

    /// Starts a session without blocking on the model load.
    ///
    /// With the model already loaded the frame source is acquired right
    /// away. Otherwise the load runs on a background thread and the session
    /// activates once [`poll_start`](Self::poll_start),
    /// [`wait_for_start`](Self::wait_for_start) or
    /// [`process_frame`](Self::process_frame) sees it finish.
    pub fn begin_session(
        &mut self,
        mut frame_source: Box<dyn FrameSource>,
    ) -> Result<StartStatus, SessionError> {
        if self.state.is_session_active || self.pending_source.is_some() {
            log::warn!("Session already active or starting; ignoring start request");
            frame_source.release();
            return Ok(self.start_status());
        }

        if self.landmarker.is_some() {
            self.activate(frame_source)?;
            return Ok(StartStatus::Active);
        }

        if self.pending_load.is_none() {
            self.spawn_model_load()?;
        }
        self.pending_source = Some(frame_source);
        Ok(StartStatus::Loading)
    }

    /// Checks a pending start without blocking.
    pub fn poll_start(&mut self) -> Result<StartStatus, SessionError> {
        let Some(rx) = self.pending_load.as_ref() else {
            return Ok(self.start_status());
        };
        let received = rx.try_recv();
        match received {
            Ok(outcome) => self.finish_load(outcome),
            Err(TryRecvError::Empty) => Ok(StartStatus::Loading),
            Err(TryRecvError::Disconnected) => self.abandon_load(),
        }
    }

    /// Blocks until a pending start resolves.
    pub fn wait_for_start(&mut self) -> Result<StartStatus, SessionError> {
        let Some(rx) = self.pending_load.as_ref() else {
            return Ok(self.start_status());
        };
        let received = rx.recv();
        match received {
            Ok(outcome) => self.finish_load(outcome),
            Err(_) => self.abandon_load(),
        }
    }

    /// Runs detection on the newest frame and updates the session state.
    ///
    /// Also completes a pending start once its model has loaded.
    pub fn process_frame(&mut self) -> FrameOutcome {
        if self.pending_load.is_some() {
            // Failures land in `last_error`.
            let _ = self.poll_start();
        }

        let outcome = self.advance();
        if outcome != FrameOutcome::Inactive {
            self.logger.frame(&outcome);
        }
        outcome
    }

    /// Deactivates the session, cancels its loop and releases the frame
    /// source. Safe to call at any time, any number of times.
    ///
    /// A model load in flight keeps running; the model is kept for the next
    /// start but no session is activated for it.
    pub fn stop_session(&mut self) {
        let was_active = std::mem::replace(&mut self.state.is_session_active, false);

        if let Some(handle) = self.loop_handle.take() {
            handle.cancel();
        }
        if let Some(mut source) = self.frame_source.take() {
            source.release();
        }
        if let Some(mut source) = self.pending_source.take() {
            source.release();
        }

        if was_active {
            log::info!("Session stopped");
            self.logger.summary();
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle for the active session's frame loop, if any.
    pub fn loop_handle(&self) -> Option<FrameLoopHandle> {
        self.loop_handle.clone()
    }

    pub fn frame_source_finished(&self) -> bool {
        self.frame_source
            .as_ref()
            .map_or(true, |source| source.is_finished())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.landmarker.is_some()
    }

    pub fn closed_frame_count(&self) -> u32 {
        self.tracker.closed_frame_count()
    }

    fn start_status(&self) -> StartStatus {
        if self.state.is_session_active {
            StartStatus::Active
        } else if self.pending_source.is_some() {
            StartStatus::Loading
        } else {
            StartStatus::Idle
        }
    }

    fn spawn_model_load(&mut self) -> Result<(), SessionError> {
        let Some(mut loader) = self.loader.take() else {
            return Err(self.record_failure(SessionError::ModelLoad(
                "landmark model loader is unavailable".to_string(),
            )));
        };

        let (tx, rx) = crossbeam_channel::bounded::<LoadOutcome>(1);
        std::thread::spawn(move || {
            let started = Instant::now();
            let result = loader.load().map_err(|e| e.to_string());
            if result.is_ok() {
                log::info!(
                    "Landmark model loaded in {:.1}ms",
                    started.elapsed().as_secs_f64() * 1000.0
                );
            }
            // The monitor may have been dropped meanwhile.
            let _ = tx.send((loader, result));
        });

        self.pending_load = Some(rx);
        self.state.is_model_loading = true;
        Ok(())
    }

    fn finish_load(&mut self, (loader, result): LoadOutcome) -> Result<StartStatus, SessionError> {
        self.pending_load = None;
        self.loader = Some(loader);
        self.state.is_model_loading = false;

        match result {
            Ok(landmarker) => {
                self.landmarker = Some(landmarker);
                match self.pending_source.take() {
                    Some(source) => {
                        self.activate(source)?;
                        Ok(StartStatus::Active)
                    }
                    None => Ok(StartStatus::Idle),
                }
            }
            Err(message) => {
                if let Some(mut source) = self.pending_source.take() {
                    source.release();
                }
                Err(self.record_failure(SessionError::ModelLoad(message)))
            }
        }
    }

    fn abandon_load(&mut self) -> Result<StartStatus, SessionError> {
        self.pending_load = None;
        self.state.is_model_loading = false;
        if let Some(mut source) = self.pending_source.take() {
            source.release();
        }
        Err(self.record_failure(SessionError::ModelLoad(
            "landmark model loader thread exited without a result".to_string(),
        )))
    }

    /// Acquires `frame_source` and marks the session active.
    fn activate(&mut self, mut frame_source: Box<dyn FrameSource>) -> Result<(), SessionError> {
        if let Err(err) = frame_source.acquire() {
            frame_source.release();
            return Err(self.record_failure(SessionError::FrameSourceAcquire(err.to_string())));
        }

        self.tracker.reset();
        self.state.last_error = None;
        self.state.ear = 0.0;
        self.state.mar = 0.0;
        self.state.is_drowsy = false;
        self.state.is_yawning = false;
        self.state.is_session_active = true;
        self.frame_source = Some(frame_source);
        self.loop_handle = Some(FrameLoopHandle::new());
        log::info!("Session started");
        Ok(())
    }

    fn record_failure(&mut self, err: SessionError) -> SessionError {
        log::warn!("{err}");
        self.state.last_error = Some(err.to_string());
        err
    }

    fn advance(&mut self) -> FrameOutcome {
        if !self.state.is_session_active {
            return FrameOutcome::Inactive;
        }
        if self.loop_handle.as_ref().map_or(true, |h| h.is_cancelled()) {
            return FrameOutcome::Inactive;
        }
        let (Some(source), Some(landmarker)) =
            (self.frame_source.as_mut(), self.landmarker.as_mut())
        else {
            return FrameOutcome::Inactive;
        };

        let Some(frame) = source.next_frame() else {
            return FrameOutcome::NoData;
        };

        let timestamp_ms = self.clock.now_ms();
        let started = Instant::now();
        let detected = landmarker.detect(&frame, timestamp_ms);
        self.logger
            .timing("detect", started.elapsed().as_secs_f64() * 1000.0);

        let faces = match detected {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Landmark detection failed on frame {}: {e}", frame.index());
                return FrameOutcome::DetectionFailed;
            }
        };
        let Some(face) = faces.first() else {
            return FrameOutcome::NoFace;
        };

        let ratios = FaceRatios::measure(face, &self.index_groups);
        let transitions = self.tracker.update(ratios.ear, ratios.mar);

        self.state.ear = ratios.ear;
        self.state.mar = ratios.mar;
        self.state.is_drowsy = self.tracker.is_drowsy();
        self.state.is_yawning = self.tracker.is_yawning();

        self.logger.metric("ear", ratios.ear);
        self.logger.metric("mar", ratios.mar);
        for message in transition_messages(&transitions) {
            self.logger
                .info(&format!("Frame {}: {message}", frame.index()));
        }

        FrameOutcome::Updated {
            ratios,
            transitions,
        }
    }
}

impl Drop for DrowsinessMonitor {
    fn drop(&mut self) {
        self.stop_session();
    }
}

fn transition_messages(transitions: &SignalTransitions) -> Vec<&'static str> {
    let mut messages = Vec::new();
    if transitions.drowsy_started {
        messages.push("drowsiness detected");
    }
    if transitions.drowsy_cleared {
        messages.push("eyes reopened");
    }
    if transitions.yawn_started {
        messages.push("yawn started");
    }
    if transitions.yawn_ended {
        messages.push("yawn ended");
    }
    messages
}
