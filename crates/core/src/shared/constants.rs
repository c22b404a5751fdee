use super::region::PixelAnchor;

pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Frames without any detection during which the last regions are still masked.
pub const GRACE_FRAMES: usize = 10;

/// Extra vertical padding relative to horizontal, widening the chin/forehead margin.
pub const VERTICAL_PADDING_BIAS: f64 = 1.15;

/// Gaussian sigma (pixels) used to soften the mask edge.
pub const MASK_BLUR_RADIUS: f64 = 2.0;

/// Clipped regions at or below this width or height are not composited.
pub const MIN_REGION_EXTENT: f64 = 2.0;

pub const PIXEL_SCALE_MIN: f64 = 20.0;
pub const PIXEL_SCALE_MAX: f64 = 400.0;
pub const DEFAULT_PIXEL_SCALE: f64 = 40.0;

pub const FACE_PADDING_MIN: f64 = 0.0;
pub const FACE_PADDING_MAX: f64 = 1.5;
pub const DEFAULT_FACE_PADDING: f64 = 0.22;

/// Upper bound on pixels the CPU backend will materialize (8K UHD).
pub const MAX_MATERIALIZED_PIXELS: usize = 7680 * 4320;

/// Fixed pixelation anchor for callers that want a grid independent of the
/// frame size.
pub const FIXED_PIXELATE_CENTER: PixelAnchor = PixelAnchor::Point { x: 150.0, y: 150.0 };

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Knobs of the per-frame transform that have fixed defaults but no
/// derivation; kept together so callers can tune them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineTuning {
    pub grace_frames: usize,
    pub vertical_padding_bias: f64,
    pub mask_blur_radius: f64,
    pub min_region_extent: f64,
    pub mirror: bool,
    pub pixelate_anchor: PixelAnchor,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            grace_frames: GRACE_FRAMES,
            vertical_padding_bias: VERTICAL_PADDING_BIAS,
            mask_blur_radius: MASK_BLUR_RADIUS,
            min_region_extent: MIN_REGION_EXTENT,
            mirror: true,
            pixelate_anchor: PixelAnchor::FrameCentre,
        }
    }
}
