use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for gate run events, kept apart from the `log` facade so
/// tests can run silent and the CLI can aggregate.
///
/// Stage names used by the gate: `detect`, `mesh`, `track`, `recognize`.
/// Metrics: `slots` (tracked faces) and `faces` (faces reported).
pub trait PipelineLogger: Send {
    /// `frames` frames have been emitted so far.
    fn progress(&mut self, frames: usize);

    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Called once when the run ends.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and peak of one series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub total: f64,
    pub peak: f64,
}

impl SeriesStats {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.peak = if self.count == 1 {
            value
        } else {
            self.peak.max(value)
        };
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregating logger for the CLI. Logs progress every `every_frames`
/// frames and a per-stage cost table at the end of the run.
pub struct StdoutPipelineLogger {
    every_frames: usize,
    started: Instant,
    frames: usize,
    stages: BTreeMap<String, SeriesStats>,
    metrics: BTreeMap<String, SeriesStats>,
    events: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(every_frames: usize) -> Self {
        Self {
            every_frames: every_frames.max(1),
            started: Instant::now(),
            frames: 0,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn stage(&self, name: &str) -> Option<SeriesStats> {
        self.stages.get(name).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<SeriesStats> {
        self.metrics.get(name).copied()
    }

    /// Messages passed to `info`, oldest first.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// The end-of-run report, `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let wall_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut out = vec![format!(
            "Gate summary ({} frames, {:.1}s):",
            self.frames,
            wall_ms / 1000.0
        )];

        for (name, s) in &self.stages {
            let share = if wall_ms > 0.0 {
                s.total / wall_ms * 100.0
            } else {
                0.0
            };
            out.push(format!(
                "  {name:10} mean {:6.1}ms  peak {:6.1}ms  {share:4.1}% of wall time",
                s.mean(),
                s.peak
            ));
        }
        for (name, s) in &self.metrics {
            out.push(format!("  {name:10} mean {:.1}  peak {:.0}", s.mean(), s.peak));
        }
        if self.frames > 0 && wall_ms > 0.0 {
            out.push(format!(
                "  {:.1} frames/s",
                self.frames as f64 * 1000.0 / wall_ms
            ));
        }
        Some(out.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, frames: usize) {
        self.frames = frames;
        if frames % self.every_frames == 0 {
            log::info!(
                "{frames} frames in {:.1}s",
                self.started.elapsed().as_secs_f64()
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages.entry(stage.to_string()).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.events.push(message.to_string());
    }

    fn summary(&self) {
        if let Some(report) = self.summary_string() {
            log::info!("\n{report}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1);
        logger.timing("detect", 5.0);
        logger.metric("slots", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_stage_stats_accumulate() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("mesh", 5.0);

        let detect = logger.stage("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_relative_eq!(detect.peak, 30.0);
        assert_eq!(logger.stage("mesh").unwrap().count, 1);
        assert!(logger.stage("recognize").is_none());
    }

    #[test]
    fn test_metric_peak_tracks_maximum() {
        let mut logger = StdoutPipelineLogger::new(10);
        for v in [3.0, 5.0, 1.0] {
            logger.metric("slots", v);
        }
        let slots = logger.metric_stats("slots").unwrap();
        assert_relative_eq!(slots.mean(), 3.0);
        assert_relative_eq!(slots.peak, 5.0);
    }

    #[test]
    fn test_negative_first_value_sets_peak() {
        let mut s = SeriesStats::default();
        s.push(-2.0);
        assert_relative_eq!(s.peak, -2.0);
        assert_relative_eq!(SeriesStats::default().mean(), 0.0);
    }

    #[test]
    fn test_summary_reports_stages_metrics_and_rate() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(100);
        logger.timing("detect", 10.0);
        logger.timing("track", 1.0);
        logger.metric("faces", 2.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Gate summary (100 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("track"));
        assert!(summary.contains("faces"));
        assert!(summary.contains("frames/s"));
    }

    #[test]
    fn test_summary_empty_without_data() {
        assert!(StdoutPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_info_keeps_events_in_order() {
        let mut logger = StdoutPipelineLogger::default();
        logger.info("ada admitted");
        logger.info("grace admitted");
        assert_eq!(logger.events(), ["ada admitted", "grace admitted"]);
    }
}
