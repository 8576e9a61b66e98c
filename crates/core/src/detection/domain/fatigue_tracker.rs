use serde::{Deserialize, Serialize};

use crate::shared::constants::{EAR_THRESHOLD, FATIGUE_FRAMES, MAR_THRESHOLD};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FatigueThresholds {
    /// EAR strictly below this counts as a closed-eye frame.
    pub ear_threshold: f64,
    /// MAR strictly above this counts as yawning.
    pub mar_threshold: f64,
    /// Drowsiness is flagged once the closed-eye run exceeds this many frames.
    pub fatigue_frames: u32,
}

impl Default for FatigueThresholds {
    fn default() -> Self {
        Self {
            ear_threshold: EAR_THRESHOLD,
            mar_threshold: MAR_THRESHOLD,
            fatigue_frames: FATIGUE_FRAMES,
        }
    }
}

/// Flag changes caused by one [`FatigueTracker::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignalTransitions {
    pub drowsy_started: bool,
    pub drowsy_cleared: bool,
    pub yawn_started: bool,
    pub yawn_ended: bool,
}

impl SignalTransitions {
    pub fn any(&self) -> bool {
        self.drowsy_started || self.drowsy_cleared || self.yawn_started || self.yawn_ended
    }
}

/// Debounces per-frame EAR/MAR into drowsy and yawning signals.
///
/// Drowsiness is slow to set and fast to clear: it needs more than
/// `fatigue_frames` consecutive closed-eye frames, but a single open-eye
/// frame clears it and restarts the count. Yawning follows the current
/// frame's MAR with no debounce at all.
#[derive(Clone, Debug)]
pub struct FatigueTracker {
    thresholds: FatigueThresholds,
    closed_frame_count: u32,
    is_drowsy: bool,
    is_yawning: bool,
}

impl FatigueTracker {
    pub fn new(thresholds: FatigueThresholds) -> Self {
        Self {
            thresholds,
            closed_frame_count: 0,
            is_drowsy: false,
            is_yawning: false,
        }
    }

    pub fn update(&mut self, ear: f64, mar: f64) -> SignalTransitions {
        let was_drowsy = self.is_drowsy;
        let was_yawning = self.is_yawning;

        if ear < self.thresholds.ear_threshold {
            self.closed_frame_count = self.closed_frame_count.saturating_add(1);
        } else {
            self.closed_frame_count = 0;
            self.is_drowsy = false;
        }

        if self.closed_frame_count > self.thresholds.fatigue_frames {
            self.is_drowsy = true;
        }

        self.is_yawning = mar > self.thresholds.mar_threshold;

        SignalTransitions {
            drowsy_started: !was_drowsy && self.is_drowsy,
            drowsy_cleared: was_drowsy && !self.is_drowsy,
            yawn_started: !was_yawning && self.is_yawning,
            yawn_ended: was_yawning && !self.is_yawning,
        }
    }

    pub fn reset(&mut self) {
        self.closed_frame_count = 0;
        self.is_drowsy = false;
        self.is_yawning = false;
    }

    pub fn closed_frame_count(&self) -> u32 {
        self.closed_frame_count
    }

    pub fn is_drowsy(&self) -> bool {
        self.is_drowsy
    }

    pub fn is_yawning(&self) -> bool {
        self.is_yawning
    }

    pub fn thresholds(&self) -> &FatigueThresholds {
        &self.thresholds
    }
}

impl Default for FatigueTracker {
    fn default() -> Self {
        Self::new(FatigueThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPS: f64 = 1e-3;
    const CLOSED: f64 = EAR_THRESHOLD - EPS;
    const OPEN: f64 = EAR_THRESHOLD + EPS;
    const MOUTH_SHUT: f64 = 0.1;

    fn feed_closed(tracker: &mut FatigueTracker, frames: u32) {
        for _ in 0..frames {
            tracker.update(CLOSED, MOUTH_SHUT);
        }
    }

    #[test]
    fn test_new_tracker_is_idle() {
        let tracker = FatigueTracker::default();
        assert_eq!(tracker.closed_frame_count(), 0);
        assert!(!tracker.is_drowsy());
        assert!(!tracker.is_yawning());
    }

    #[test]
    fn test_closed_frames_accumulate() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 5);
        assert_eq!(tracker.closed_frame_count(), 5);
    }

    #[test]
    fn test_thirtieth_closed_frame_is_not_drowsy() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 30);
        assert_eq!(tracker.closed_frame_count(), 30);
        assert!(!tracker.is_drowsy());
    }

    #[test]
    fn test_thirty_first_closed_frame_sets_drowsy() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 30);

        let transitions = tracker.update(CLOSED, MOUTH_SHUT);

        assert!(tracker.is_drowsy());
        assert!(transitions.drowsy_started);
    }

    #[test]
    fn test_open_frame_after_thirty_closed_resets_count() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 30);

        tracker.update(OPEN, MOUTH_SHUT);

        assert!(!tracker.is_drowsy());
        assert_eq!(tracker.closed_frame_count(), 0);
    }

    #[test]
    fn test_drowsy_persists_while_eyes_stay_closed() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 100);
        assert!(tracker.is_drowsy());
        assert_eq!(tracker.closed_frame_count(), 100);
    }

    #[test]
    fn test_single_open_frame_clears_drowsy() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 40);

        let transitions = tracker.update(OPEN, MOUTH_SHUT);

        assert!(!tracker.is_drowsy());
        assert!(transitions.drowsy_cleared);
        assert_eq!(tracker.closed_frame_count(), 0);
    }

    #[test]
    fn test_ear_exactly_at_threshold_counts_as_open() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 10);
        tracker.update(EAR_THRESHOLD, MOUTH_SHUT);
        assert_eq!(tracker.closed_frame_count(), 0);
    }

    #[test]
    fn test_zero_ear_counts_as_closed() {
        // Degenerate geometry reports 0 and is treated like closed eyes.
        let mut tracker = FatigueTracker::default();
        tracker.update(0.0, MOUTH_SHUT);
        assert_eq!(tracker.closed_frame_count(), 1);
    }

    #[rstest]
    #[case::below(MAR_THRESHOLD - EPS, false)]
    #[case::at(MAR_THRESHOLD, false)]
    #[case::above(MAR_THRESHOLD + EPS, true)]
    fn test_yawning_follows_current_mar(#[case] mar: f64, #[case] expected: bool) {
        let mut tracker = FatigueTracker::default();
        tracker.update(OPEN, mar);
        assert_eq!(tracker.is_yawning(), expected);
    }

    #[test]
    fn test_yawning_has_no_lag() {
        let mut tracker = FatigueTracker::default();
        let sequence = [0.9, 0.1, 0.9, 0.9, 0.2, 0.7];
        for mar in sequence {
            let transitions = tracker.update(OPEN, mar);
            assert_eq!(tracker.is_yawning(), mar > MAR_THRESHOLD);
            assert_eq!(transitions.yawn_started || transitions.yawn_ended, transitions.any());
        }
    }

    #[test]
    fn test_yawning_independent_of_eyes() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 31);
        tracker.update(CLOSED, 0.8);
        assert!(tracker.is_drowsy());
        assert!(tracker.is_yawning());
    }

    #[test]
    fn test_custom_fatigue_frames() {
        let mut tracker = FatigueTracker::new(FatigueThresholds {
            fatigue_frames: 2,
            ..FatigueThresholds::default()
        });
        feed_closed(&mut tracker, 2);
        assert!(!tracker.is_drowsy());
        feed_closed(&mut tracker, 1);
        assert!(tracker.is_drowsy());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 40);
        tracker.update(CLOSED, 0.9);

        tracker.reset();

        assert_eq!(tracker.closed_frame_count(), 0);
        assert!(!tracker.is_drowsy());
        assert!(!tracker.is_yawning());
    }

    #[test]
    fn test_steady_state_reports_no_transitions() {
        let mut tracker = FatigueTracker::default();
        feed_closed(&mut tracker, 35);
        assert!(!tracker.update(CLOSED, MOUTH_SHUT).any());
    }
}
