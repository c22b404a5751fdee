use std::collections::BTreeMap;
use std::time::Instant;

/// Per-frame observability hook for the processing thread.
///
/// The live pipeline has no known frame total, so progress is reported as a
/// running count.
pub trait PipelineLogger: Send {
    /// Called once per frame that entered tracking.
    fn progress(&mut self, processed: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame metric (region count, dropped frames).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _processed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
struct Series {
    count: usize,
    total: f64,
    max: f64,
}

impl Series {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Accumulates per-stage timings and metrics and logs a throughput summary.
///
/// Only running aggregates are kept, so memory stays flat over a long
/// session. A progress line is logged every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Series>,
    metrics: BTreeMap<String, Series>,
    start_time: Instant,
    frames: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {elapsed_s:.1}s):",
            self.frames
        )];

        for (stage, s) in &self.timings {
            lines.push(format!(
                "  {stage:8}: avg {:6.2}ms  max {:7.2}ms",
                s.avg(),
                s.max
            ));
        }
        for (name, s) in &self.metrics {
            lines.push(format!("  {name}: avg {:.2}  total {:.0}", s.avg(), s.total));
        }
        if self.frames > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames as f64 / elapsed_s
            ));
        }
        Some(lines.join("\n"))
    }

    /// Average duration recorded for `stage`, if any.
    pub fn average_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Series::avg)
    }

    /// Sum of all values recorded for metric `name`, if any.
    pub fn metric_total(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|s| s.total)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, processed: usize) {
        self.frames = processed;
        if processed % self.throttle_frames == 0 {
            let fps = processed as f64 / self.start_time.elapsed().as_secs_f64().max(1e-9);
            log::info!("Processed {processed} frames ({fps:.1} fps)");
        }
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
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1);
        logger.timing("detect", 5.0);
        logger.metric("regions", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_averages() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("render", 10.0);
        logger.timing("render", 20.0);
        logger.timing("render", 30.0);
        assert_relative_eq!(logger.average_timing("render").unwrap(), 20.0);
        assert!(logger.average_timing("detect").is_none());
    }

    #[test]
    fn test_metric_totals() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("dropped_frames", 1.0);
        logger.metric("dropped_frames", 0.0);
        logger.metric("dropped_frames", 1.0);
        assert_relative_eq!(logger.metric_total("dropped_frames").unwrap(), 2.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(4);
        logger.timing("detect", 12.0);
        logger.timing("mask", 1.0);
        logger.metric("regions", 2.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary (4 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("mask"));
        assert!(summary.contains("regions: avg 2.00"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frame_count() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i);
        }
        assert_eq!(logger.frames(), 25);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        let mut logger = StdoutPipelineLogger::new(0);
        logger.progress(1);
        assert_eq!(logger.throttle_frames, 1);
    }
}
