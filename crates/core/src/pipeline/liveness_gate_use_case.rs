use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::capture::domain::frame_source::{CaptureError, FrameRead, FrameSource};
use crate::config::{GateConfig, PipelineSettings};
use crate::detection::domain::face_detector::{Detection, FaceDetector};
use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::detection::domain::face_mesher::FaceMesher;
use crate::recognition::domain::face_recognizer::{FaceRecognizer, Identity};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::frame::Frame;
use crate::tracking::domain::face_slot_tracker::{SlotCandidate, SlotTracker};

use super::face_crop::padded_crop;
use super::frame_result::{FaceVerdict, FrameResult};
use super::frame_sink::FrameSink;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::presence_register::PresenceRegister;

type OnFrame = Box<dyn FnMut(&FrameResult) -> bool + Send>;

/// Why a run ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    MaxFrames,
    Callback,
}

#[derive(Debug)]
pub struct RunReport {
    pub frames: usize,
    pub stop: StopReason,
    pub presence: PresenceRegister,
}

/// Per-frame liveness gate: acquire, detect and mesh, track, recognize,
/// emit.
///
/// Frames are processed strictly one after another. Per-face failures
/// (degenerate eye geometry, empty crops, recognizer errors) degrade that
/// face's verdict and never stop the loop. The run stops when the source
/// ends, the cancel flag is set, `max_frames` is reached or the frame
/// callback returns `false`; it fails when capture keeps failing or the
/// sink cannot be written.
pub struct LivenessGateUseCase {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    mesher: Box<dyn FaceMesher>,
    recognizer: Box<dyn FaceRecognizer>,
    sink: Box<dyn FrameSink>,
    tracker: SlotTracker,
    settings: PipelineSettings,
    clock: Box<dyn Clock>,
    logger: Box<dyn PipelineLogger>,
    presence: PresenceRegister,
    on_frame: Option<OnFrame>,
    cancelled: Arc<AtomicBool>,
    max_frames: Option<usize>,
}

impl LivenessGateUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        mesher: Box<dyn FaceMesher>,
        recognizer: Box<dyn FaceRecognizer>,
        sink: Box<dyn FrameSink>,
        config: &GateConfig,
    ) -> Self {
        Self {
            source,
            detector,
            mesher,
            recognizer,
            sink,
            tracker: SlotTracker::new(config.tracker.clone(), config.liveness.clone()),
            settings: config.pipeline.clone(),
            clock: Box::new(SystemClock),
            logger: Box::new(NullPipelineLogger),
            presence: PresenceRegister::new(),
            on_frame: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            max_frames: None,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Called after each emitted frame; returning `false` stops the run.
    pub fn with_on_frame(mut self, on_frame: OnFrame) -> Self {
        self.on_frame = Some(on_frame);
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn tracker(&self) -> &SlotTracker {
        &self.tracker
    }

    /// Runs until a stop condition. The source is closed and the sink
    /// finished on every exit path.
    pub fn run(mut self) -> Result<RunReport, Box<dyn std::error::Error>> {
        let started = Instant::now();
        let outcome = self.run_loop(started);

        self.source.close();
        let finished = self.sink.finish();
        self.logger.summary();

        let (frames, stop) = outcome?;
        finished?;
        log::info!("Gate stopped after {frames} frames ({stop:?})");
        Ok(RunReport {
            frames,
            stop,
            presence: self.presence,
        })
    }

    fn run_loop(
        &mut self,
        started: Instant,
    ) -> Result<(usize, StopReason), Box<dyn std::error::Error>> {
        let mut frames = 0usize;
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Ok((frames, StopReason::Cancelled));
            }
            if self.max_frames.is_some_and(|max| frames >= max) {
                return Ok((frames, StopReason::MaxFrames));
            }

            let Some(frame) = self.acquire()? else {
                return Ok((frames, StopReason::EndOfStream));
            };

            let result = self.process_frame(&frame, started);
            self.sink.emit(&result)?;
            for identity in self.presence.record(&result) {
                self.logger.info(&format!("{identity} admitted"));
            }

            frames += 1;
            self.logger.progress(frames);

            if let Some(on_frame) = self.on_frame.as_mut() {
                if !on_frame(&result) {
                    return Ok((frames, StopReason::Callback));
                }
            }
        }
    }

    /// Next non-empty frame, `None` at end of stream. Empty reads and read
    /// errors both count as failures.
    fn acquire(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut failures = 0u32;
        loop {
            match self.source.read() {
                Ok(FrameRead::Frame(frame)) if !frame.is_empty() => return Ok(Some(frame)),
                Ok(FrameRead::EndOfStream) => return Ok(None),
                Ok(_) => log::debug!("Empty capture read"),
                Err(e) => log::warn!("Capture read failed: {e}"),
            }
            failures += 1;
            if failures >= self.settings.capture_retries {
                return Err(CaptureError::Exhausted { attempts: failures });
            }
        }
    }

    fn process_frame(&mut self, frame: &Frame, started: Instant) -> FrameResult {
        let now = self.clock.now();
        let (detections, meshes) = self.infer(frame);

        let t0 = Instant::now();
        let candidates = match meshes {
            Some(meshes) => self.tracker.update(
                &detections,
                &meshes,
                frame.width(),
                frame.height(),
                now,
            ),
            None => self
                .tracker
                .match_detections(&detections, frame.width(), frame.height()),
        };
        self.logger.timing("track", elapsed_ms(t0));

        let t0 = Instant::now();
        let faces: Vec<FaceVerdict> = candidates
            .iter()
            .map(|c| self.verdict(frame, c, now))
            .collect();
        if !candidates.is_empty() {
            self.logger.timing("recognize", elapsed_ms(t0));
        }

        self.logger.metric("slots", self.tracker.slots().len() as f64);
        self.logger.metric("faces", faces.len() as f64);

        FrameResult {
            frame_index: frame.index(),
            elapsed_ms: elapsed_ms(started),
            captured_at: Utc::now(),
            faces,
        }
    }

    /// Runs both models. A detector failure yields no detections; a mesh
    /// failure yields `None`, which leaves the slot set untouched.
    fn infer(&mut self, frame: &Frame) -> (Vec<Detection>, Option<Vec<LandmarkSet>>) {
        let detector = &mut self.detector;
        let mesher = &mut self.mesher;

        let ((detected, detect_ms), (meshed, mesh_ms)) = if self.settings.parallel_inference {
            std::thread::scope(|s| {
                let detect = s.spawn(|| timed(|| detector.detect(frame)));
                let mesh = timed(|| mesher.mesh(frame));
                let detect = detect
                    .join()
                    .unwrap_or_else(|_| (Err("detector thread panicked".to_string()), 0.0));
                (detect, mesh)
            })
        } else {
            (
                timed(|| detector.detect(frame)),
                timed(|| mesher.mesh(frame)),
            )
        };
        self.logger.timing("detect", detect_ms);
        self.logger.timing("mesh", mesh_ms);

        let detections = detected.unwrap_or_else(|e| {
            log::warn!("Face detection failed on frame {}: {e}", frame.index());
            Vec::new()
        });
        let meshes = match meshed {
            Ok(meshes) => Some(meshes),
            Err(e) => {
                log::warn!("Face mesh failed on frame {}: {e}", frame.index());
                None
            }
        };
        (detections, meshes)
    }

    fn verdict(&self, frame: &Frame, candidate: &SlotCandidate, now: Instant) -> FaceVerdict {
        FaceVerdict::new(
            candidate.slot_id,
            candidate.bbox,
            candidate.confidence,
            self.tracker.liveness(candidate.slot_id, now),
            self.identify(frame, candidate),
        )
    }

    fn identify(&self, frame: &Frame, candidate: &SlotCandidate) -> Identity {
        let crop = match padded_crop(frame, &candidate.bbox, self.settings.crop_padding_px) {
            Ok(crop) => crop,
            Err(e) => {
                log::debug!("Slot {}: {e}", candidate.slot_id);
                return Identity::Unknown;
            }
        };
        match self.recognizer.recognize(&crop) {
            Ok(label) => Identity::from(label),
            Err(e) => {
                log::debug!("Slot {}: recognition failed: {e}", candidate.slot_id);
                Identity::Unknown
            }
        }
    }
}

/// Runs `f`, turning its error into a `String` so the result can cross a
/// thread boundary, and measures it in milliseconds.
fn timed<T>(
    f: impl FnOnce() -> Result<T, Box<dyn std::error::Error>>,
) -> (Result<T, String>, f64) {
    let t0 = Instant::now();
    let result = f().map_err(|e| e.to_string());
    (result, elapsed_ms(t0))
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
