use crate::shared::constants::{GRACE_FRAMES, VERTICAL_PADDING_BIAS};
use crate::shared::frame::Extent;
use crate::shared::region::{DetectedFace, FaceRegion};

/// Last non-empty region set and the frame that produced it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerState {
    pub regions: Vec<FaceRegion>,
    pub last_refresh_frame: usize,
}

/// Where this frame's regions came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionSource {
    Detected,
    HeldOver,
    Empty,
}

/// Turns per-frame detections into the padded region set used for masking.
///
/// When detection misses, the previous regions are reused for up to
/// `grace_frames` frames after the last refresh so the mask does not flicker.
pub struct FaceRegionTracker {
    state: TrackerState,
    grace_frames: usize,
    vertical_bias: f64,
}

impl FaceRegionTracker {
    pub fn new(grace_frames: usize, vertical_bias: f64) -> Self {
        Self {
            state: TrackerState::default(),
            grace_frames,
            vertical_bias,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Pads a single detection into pixel space.
    ///
    /// Horizontal inflation is `padding * width` per side; vertical is
    /// `padding * height * vertical_bias` per side.
    pub fn pad(&self, face: &DetectedFace, extent: Extent, padding: f64) -> FaceRegion {
        let r = FaceRegion::from_normalized(&face.bbox, extent);
        let pad_x = padding * r.width;
        let pad_y = padding * r.height * self.vertical_bias;
        r.inflated(pad_x, pad_y)
    }

    /// Updates the tracker with this frame's detections.
    ///
    /// `frame_index` must increase by one for every frame that reaches the
    /// tracker; the grace arithmetic counts tracked frames, not captured ones.
    pub fn update(
        &mut self,
        faces: &[DetectedFace],
        extent: Extent,
        frame_index: usize,
        padding: f64,
    ) -> (Vec<FaceRegion>, RegionSource) {
        let regions: Vec<FaceRegion> = faces
            .iter()
            .map(|f| self.pad(f, extent, padding))
            .collect();

        if !regions.is_empty() {
            self.state.regions = regions.clone();
            self.state.last_refresh_frame = frame_index;
            return (regions, RegionSource::Detected);
        }

        let gap = frame_index.saturating_sub(self.state.last_refresh_frame);
        if gap <= self.grace_frames && !self.state.regions.is_empty() {
            (self.state.regions.clone(), RegionSource::HeldOver)
        } else {
            self.state.regions.clear();
            (Vec::new(), RegionSource::Empty)
        }
    }
}

impl Default for FaceRegionTracker {
    fn default() -> Self {
        Self::new(GRACE_FRAMES, VERTICAL_PADDING_BIAS)
    }
}
