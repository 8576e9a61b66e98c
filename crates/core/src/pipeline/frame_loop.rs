use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::drowsiness_monitor::{DrowsinessMonitor, FrameOutcome};
use super::session_state::SessionState;

/// Cancellation token for one session's repeating frame task.
///
/// Clones share the flag, so another thread (a signal handler, a UI) can
/// stop the loop. Once cancelled, no further frame is processed, even if a
/// refresh tick is already pending.
#[derive(Clone, Debug, Default)]
pub struct FrameLoopHandle {
    cancelled: Arc<AtomicBool>,
}

impl FrameLoopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Drives [`DrowsinessMonitor::process_frame`] once per display refresh.
///
/// Cooperative and single-threaded: a frame is processed to completion
/// before the loop waits for the next tick. The session's
/// [`FrameLoopHandle`] is checked before every call.
pub struct FrameLoop {
    interval: Option<Duration>,
}

impl FrameLoop {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            interval: Some(Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64)),
        }
    }

    /// Processes frames back to back, without pacing.
    pub fn unpaced() -> Self {
        Self { interval: None }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Runs until the handle is cancelled or the frame source is exhausted,
    /// then stops the session. `on_frame` observes every processed frame.
    ///
    /// Returns the number of `process_frame` calls made; 0 if no session
    /// was active.
    pub fn run<F>(&self, monitor: &mut DrowsinessMonitor, mut on_frame: F) -> usize
    where
        F: FnMut(&FrameOutcome, &SessionState),
    {
        let Some(handle) = monitor.loop_handle() else {
            return 0;
        };
        let ticker = self.interval.map(crossbeam_channel::tick);
        let mut frames = 0;

        loop {
            if handle.is_cancelled() || monitor.frame_source_finished() {
                break;
            }

            let outcome = monitor.process_frame();
            frames += 1;
            on_frame(&outcome, monitor.state());

            if handle.is_cancelled() {
                break;
            }
            if let Some(ref ticker) = ticker {
                if ticker.recv().is_err() {
                    break;
                }
            }
        }

        monitor.stop_session();
        frames
    }
}
