use std::collections::HashMap;
use std::time::Instant;

use super::drowsiness_monitor::FrameOutcome;

/// Cross-cutting observer for per-frame monitoring events.
///
/// Keeps the monitor free of output concerns: the CLI wants a summary,
/// tests want silence.
pub trait MonitorLogger: Send {
    /// Record what one `process_frame` call did.
    fn frame(&mut self, outcome: &FrameOutcome);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame measurement (e.g. EAR, MAR).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullMonitorLogger;

impl MonitorLogger for NullMonitorLogger {
    fn frame(&mut self, _outcome: &FrameOutcome) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects outcome counts, stage timings and metrics, and logs a report
/// when the session stops.
pub struct StdoutMonitorLogger {
    outcomes: HashMap<&'static str, usize>,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    messages: Vec<String>,
    start_time: Instant,
}

impl StdoutMonitorLogger {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            messages: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn outcome_count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Returns the formatted report, or `None` before any frame was seen.
    pub fn summary_string(&self) -> Option<String> {
        let frames: usize = self.outcomes.values().sum();
        if frames == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {elapsed_s:.1}s):"
        )];

        let mut labels: Vec<_> = self.outcomes.iter().collect();
        labels.sort();
        for (label, count) in labels {
            lines.push(format!("  {label:16}: {count}"));
        }

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, durations) in stages {
            lines.push(format!("  {stage:16}: avg {:6.1}ms", mean(durations)));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, values) in names {
            lines.push(format!("  {name:16}: avg {:.3}", mean(values)));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StdoutMonitorLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl MonitorLogger for StdoutMonitorLogger {
    fn frame(&mut self, outcome: &FrameOutcome) {
        *self.outcomes.entry(outcome.label()).or_default() += 1;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullMonitorLogger;
        logger.frame(&FrameOutcome::NoFace);
        logger.timing("detect", 5.0);
        logger.metric("ear", 0.3);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_counts_outcomes_by_label() {
        let mut logger = StdoutMonitorLogger::new();
        logger.frame(&FrameOutcome::NoFace);
        logger.frame(&FrameOutcome::NoFace);
        logger.frame(&FrameOutcome::DetectionFailed);

        assert_eq!(logger.outcome_count("no_face"), 2);
        assert_eq!(logger.outcome_count("detection_failed"), 1);
        assert_eq!(logger.outcome_count("updated"), 0);
    }

    #[test]
    fn test_records_timings_and_metrics() {
        let mut logger = StdoutMonitorLogger::new();
        logger.timing("detect", 10.0);
        logger.timing("detect", 20.0);
        logger.metric("ear", 0.2);

        assert_eq!(logger.timings_for("detect"), Some(&[10.0, 20.0][..]));
        assert_eq!(logger.metrics_for("ear"), Some(&[0.2][..]));
        assert!(logger.metrics_for("mar").is_none());
    }

    #[test]
    fn test_summary_lists_outcomes_timings_and_metrics() {
        let mut logger = StdoutMonitorLogger::new();
        logger.frame(&FrameOutcome::NoData);
        logger.timing("detect", 4.0);
        logger.metric("mar", 0.25);
        logger.metric("mar", 0.75);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (1 frames"));
        assert!(summary.contains("no_data"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("avg 0.500"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutMonitorLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutMonitorLogger::new();
        logger.info("Drowsiness detected");
        assert_eq!(logger.messages, vec!["Drowsiness detected".to_string()]);
    }
}
