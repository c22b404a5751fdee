use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_region_tracker::{FaceRegionTracker, RegionSource, TrackerState};
use crate::filtering::domain::image_filter_backend::{FilterError, ImageFilterBackend};
use crate::masking::domain::mask_compositor::MaskCompositor;
use crate::parameters::parameter_store::ParameterStore;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::pixelate_blend::PixelateBlend;
use crate::shared::constants::PipelineTuning;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;
use crate::shared::rendered_frame::RenderedFrame;

/// Runs one frame start to finish: parameter snapshot, detection, tracking,
/// mask, pixelate/blend/mirror and materialization.
///
/// Owned by the processing thread. No error escapes [`process`](Self::process):
/// detector failures count as zero detections and backend failures drop the
/// frame.
pub struct FrameProcessor {
    detector: Box<dyn FaceDetector>,
    backend: Box<dyn ImageFilterBackend>,
    parameters: Arc<ParameterStore>,
    tracker: FaceRegionTracker,
    compositor: MaskCompositor,
    stage: PixelateBlend,
    logger: Box<dyn PipelineLogger>,
    frame_index: usize,
    dropped: usize,
    last_source: RegionSource,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        backend: Box<dyn ImageFilterBackend>,
        parameters: Arc<ParameterStore>,
        tuning: PipelineTuning,
    ) -> Self {
        Self {
            detector,
            backend,
            parameters,
            tracker: FaceRegionTracker::new(tuning.grace_frames, tuning.vertical_padding_bias),
            compositor: MaskCompositor::new(tuning.mask_blur_radius, tuning.min_region_extent),
            stage: PixelateBlend::new(tuning.mirror).with_anchor(tuning.pixelate_anchor),
            logger: Box::new(NullPipelineLogger),
            frame_index: 0,
            dropped: 0,
            last_source: RegionSource::Empty,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Number of frames that have entered tracking.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn tracker_state(&self) -> &TrackerState {
        self.tracker.state()
    }

    /// Whether the most recent frame used fresh, held-over or no regions.
    pub fn last_region_source(&self) -> RegionSource {
        self.last_source
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Processes one frame. `None` means the frame was dropped.
    pub fn process(&mut self, frame: &Frame) -> Option<RenderedFrame> {
        let params = self.parameters.snapshot();

        let t0 = Instant::now();
        let faces = self.detector.detect(frame).unwrap_or_else(|e| {
            log::warn!("Face detection failed on frame {}: {e}", frame.index());
            Vec::new()
        });
        self.logger.timing("detect", elapsed_ms(t0));

        self.frame_index += 1;
        let t0 = Instant::now();
        let (regions, source) =
            self.tracker
                .update(&faces, frame.extent(), self.frame_index, params.face_padding);
        self.logger.timing("track", elapsed_ms(t0));
        self.last_source = source;

        self.logger.metric("regions", regions.len() as f64);
        let held = if source == RegionSource::HeldOver {
            regions.len()
        } else {
            0
        };
        self.logger.metric("held_regions", held as f64);

        let result = self.render(frame, &regions, params.pixel_scale);
        self.logger.progress(self.frame_index);

        match result {
            Ok(rendered) => {
                self.logger.metric("dropped_frames", 0.0);
                Some(rendered)
            }
            Err(e) => {
                self.dropped += 1;
                self.logger.metric("dropped_frames", 1.0);
                log::warn!("Dropping frame {}: {e}", self.frame_index);
                None
            }
        }
    }

    fn render(
        &mut self,
        frame: &Frame,
        regions: &[FaceRegion],
        pixel_scale: f64,
    ) -> Result<RenderedFrame, FilterError> {
        let t0 = Instant::now();
        let mask = self
            .compositor
            .compose(self.backend.as_ref(), frame.extent(), regions)?;
        self.logger.timing("mask", elapsed_ms(t0));

        let t0 = Instant::now();
        let rendered = self.stage.render_and_materialize(
            self.backend.as_ref(),
            frame,
            &mask,
            pixel_scale,
            self.frame_index,
        )?;
        self.logger.timing("render", elapsed_ms(t0));
        Ok(rendered)
    }

    pub fn info(&mut self, message: &str) {
        self.logger.info(message);
    }

    pub fn summary(&self) {
        self.logger.summary();
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::fixed_face_detector::FixedFaceDetector;
    use crate::filtering::infrastructure::cpu_filter_backend::CpuFilterBackend;
    use crate::parameters::parameter_store::Parameters;
    use crate::shared::mask::Mask;
    use crate::shared::region::{DetectedFace, NormalizedBox, PixelAnchor, PixelRect};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn gradient(w: u32, h: u32) -> Frame {
        let data: Vec<u8> = (0..w * h)
            .flat_map(|i| {
                let x = i % w;
                let y = i / w;
                [(x * 4 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8]
            })
            .collect();
        Frame::new(data, w, h, 3, 0)
    }

    fn whole_frame_face() -> DetectedFace {
        DetectedFace::new(NormalizedBox::new(0.0, 0.0, 1.0, 1.0), 0.9)
    }

    fn unmirrored() -> PipelineTuning {
        PipelineTuning {
            mirror: false,
            ..PipelineTuning::default()
        }
    }

    fn processor(detector: impl FaceDetector + 'static, tuning: PipelineTuning) -> FrameProcessor {
        FrameProcessor::new(
            Box::new(detector),
            Box::new(CpuFilterBackend::default()),
            Arc::new(ParameterStore::default()),
            tuning,
        )
    }

    /// Replays results in order, then reports no faces.
    struct ScriptedDetector {
        results: VecDeque<Result<Vec<DetectedFace>, String>>,
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
            match self.results.pop_front() {
                Some(Ok(faces)) => Ok(faces),
                Some(Err(e)) => Err(e.into()),
                None => Ok(Vec::new()),
            }
        }
    }

    /// CPU backend whose first `failures` materializations fail.
    struct FlakyBackend {
        inner: CpuFilterBackend,
        failures: Cell<usize>,
    }

    impl ImageFilterBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn pixelate(
            &self,
            frame: &Frame,
            block_size: f64,
            anchor: PixelAnchor,
        ) -> Result<Frame, FilterError> {
            self.inner.pixelate(frame, block_size, anchor)
        }

        fn blur(&self, mask: &Mask, radius: f64) -> Result<Mask, FilterError> {
            self.inner.blur(mask, radius)
        }

        fn composite_over(
            &self,
            background: Mask,
            region: PixelRect,
            opacity: f32,
        ) -> Result<Mask, FilterError> {
            self.inner.composite_over(background, region, opacity)
        }

        fn blend_with_mask(
            &self,
            base: &Frame,
            overlay: &Frame,
            mask: &Mask,
        ) -> Result<Frame, FilterError> {
            self.inner.blend_with_mask(base, overlay, mask)
        }

        fn flip_horizontal(&self, frame: Frame) -> Result<Frame, FilterError> {
            self.inner.flip_horizontal(frame)
        }

        fn materialize(&self, frame: Frame, sequence: usize) -> Result<RenderedFrame, FilterError> {
            let left = self.failures.get();
            if left > 0 {
                self.failures.set(left - 1);
                return Err(FilterError::Materialize("out of memory".into()));
            }
            self.inner.materialize(frame, sequence)
        }
    }

    /// Records the names of every timing and metric it receives.
    struct RecordingLogger {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, processed: usize) {
            self.events.lock().unwrap().push(format!("progress:{processed}"));
        }

        fn timing(&mut self, stage: &str, _duration_ms: f64) {
            self.events.lock().unwrap().push(format!("timing:{stage}"));
        }

        fn metric(&mut self, name: &str, value: f64) {
            self.events.lock().unwrap().push(format!("metric:{name}={value}"));
        }

        fn info(&mut self, message: &str) {
            self.events.lock().unwrap().push(format!("info:{message}"));
        }
    }

    fn rgb_bytes(rendered: &RenderedFrame) -> Vec<u8> {
        rendered.image.to_rgb8().into_raw()
    }

    #[test]
    fn test_no_faces_delivers_original() {
        let frame = gradient(40, 30);
        let mut p = processor(FixedFaceDetector::new(vec![]), unmirrored());
        let out = p.process(&frame).unwrap();
        assert_eq!(rgb_bytes(&out), frame.data());
        assert_eq!(p.last_region_source(), RegionSource::Empty);
    }

    #[test]
    fn test_no_faces_mirrored_flips_original() {
        let frame = gradient(40, 30);
        let mut p = processor(FixedFaceDetector::new(vec![]), PipelineTuning::default());
        let out = p.process(&frame).unwrap().image.to_rgb8();
        assert_eq!(&out.get_pixel(0, 7).0[..], frame.pixel(39, 7));
    }

    #[test]
    fn test_whole_frame_face_is_fully_pixelated() {
        let frame = gradient(64, 48);
        let mut p = processor(FixedFaceDetector::always(vec![whole_frame_face()]), unmirrored());
        let out = p.process(&frame).unwrap();
        let expected = CpuFilterBackend::default()
            .pixelate(&frame, Parameters::default().pixel_scale, PixelAnchor::FrameCentre)
            .unwrap();
        assert_eq!(rgb_bytes(&out), expected.data());
        assert_eq!(p.last_region_source(), RegionSource::Detected);
    }

    #[test]
    fn test_tuned_anchor_positions_grid() {
        let frame = gradient(64, 48);
        let anchor = PixelAnchor::Point { x: 7.0, y: 3.0 };
        let tuning = PipelineTuning {
            mirror: false,
            pixelate_anchor: anchor,
            ..PipelineTuning::default()
        };
        let mut p = processor(FixedFaceDetector::always(vec![whole_frame_face()]), tuning);
        let out = p.process(&frame).unwrap();
        let expected = CpuFilterBackend::default()
            .pixelate(&frame, Parameters::default().pixel_scale, anchor)
            .unwrap();
        assert_eq!(rgb_bytes(&out), expected.data());
    }

    #[test]
    fn test_parameter_change_applies_to_next_frame() {
        let frame = gradient(64, 48);
        let store = Arc::new(ParameterStore::new(Parameters {
            pixel_scale: 20.0,
            face_padding: 0.22,
        }));
        let mut p = FrameProcessor::new(
            Box::new(FixedFaceDetector::always(vec![whole_frame_face()])),
            Box::new(CpuFilterBackend::default()),
            Arc::clone(&store),
            unmirrored(),
        );
        let cpu = CpuFilterBackend::default();

        let first = p.process(&frame).unwrap();
        assert_eq!(rgb_bytes(&first), cpu.pixelate(&frame, 20.0, PixelAnchor::FrameCentre).unwrap().data());

        store.set_pixel_scale(400.0);
        let second = p.process(&frame).unwrap();
        assert_eq!(rgb_bytes(&second), cpu.pixelate(&frame, 400.0, PixelAnchor::FrameCentre).unwrap().data());
        assert_ne!(rgb_bytes(&first), rgb_bytes(&second));
    }

    #[test]
    fn test_sequence_follows_tracking_index() {
        let frame = gradient(16, 16);
        let mut p = processor(FixedFaceDetector::new(vec![]), PipelineTuning::default());
        let seqs: Vec<usize> = (0..3).map(|_| p.process(&frame).unwrap().sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(p.frame_index(), 3);
    }

    #[test]
    fn test_materialize_failure_drops_only_that_frame() {
        let frame = gradient(32, 32);
        let mut p = FrameProcessor::new(
            Box::new(FixedFaceDetector::always(vec![whole_frame_face()])),
            Box::new(FlakyBackend {
                inner: CpuFilterBackend::default(),
                failures: Cell::new(1),
            }),
            Arc::new(ParameterStore::default()),
            unmirrored(),
        );

        assert!(p.process(&frame).is_none());
        let next = p.process(&frame).unwrap();
        assert_eq!(next.sequence, 2);
        assert_eq!(p.dropped(), 1);
        // The dropped frame still refreshed the tracker
        assert_eq!(p.tracker_state().last_refresh_frame, 2);
    }

    #[test]
    fn test_detector_error_is_bridged_by_grace_window() {
        let detector = ScriptedDetector {
            results: VecDeque::from(vec![
                Ok(vec![whole_frame_face()]),
                Err("inference failed".to_string()),
            ]),
        };
        let frame = gradient(32, 32);
        let mut p = processor(detector, unmirrored());

        p.process(&frame).unwrap();
        assert_eq!(p.last_region_source(), RegionSource::Detected);

        let held = p.process(&frame).unwrap();
        assert_eq!(p.last_region_source(), RegionSource::HeldOver);
        let expected = CpuFilterBackend::default()
            .pixelate(&frame, Parameters::default().pixel_scale, PixelAnchor::FrameCentre)
            .unwrap();
        assert_eq!(rgb_bytes(&held), expected.data());
    }

    #[test]
    fn test_regions_expire_after_grace_window() {
        let frame = gradient(24, 24);
        let tuning = PipelineTuning {
            grace_frames: 2,
            mirror: false,
            ..PipelineTuning::default()
        };
        let mut p = processor(FixedFaceDetector::new(vec![vec![whole_frame_face()]]), tuning);

        let sources: Vec<RegionSource> = (0..4)
            .map(|_| {
                p.process(&frame).unwrap();
                p.last_region_source()
            })
            .collect();
        assert_eq!(
            sources,
            vec![
                RegionSource::Detected,
                RegionSource::HeldOver,
                RegionSource::HeldOver,
                RegionSource::Empty,
            ]
        );
        assert!(p.tracker_state().regions.is_empty());
    }

    #[test]
    fn test_logger_receives_stage_timings_and_metrics() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let frame = gradient(16, 16);
        let mut p = processor(FixedFaceDetector::always(vec![whole_frame_face()]), unmirrored())
            .with_logger(Box::new(RecordingLogger {
                events: Arc::clone(&events),
            }));
        p.process(&frame).unwrap();

        let events = events.lock().unwrap();
        for expected in [
            "timing:detect",
            "timing:track",
            "timing:mask",
            "timing:render",
            "metric:regions=1",
            "metric:held_regions=0",
            "metric:dropped_frames=0",
            "progress:1",
        ] {
            assert!(events.iter().any(|e| e == expected), "missing {expected}");
        }
    }
}
