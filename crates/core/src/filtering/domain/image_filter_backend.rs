use crate::shared::frame::{Extent, Frame};
use crate::shared::mask::Mask;
use crate::shared::region::{PixelAnchor, PixelRect};
use crate::shared::rendered_frame::RenderedFrame;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error(
        "extent mismatch: expected {}x{}, got {}x{}",
        .expected.width, .expected.height, .actual.width, .actual.height
    )]
    ExtentMismatch { expected: Extent, actual: Extent },
    #[error("failed to materialize frame: {0}")]
    Materialize(String),
    #[error("frame of {pixels} pixels exceeds the {limit} pixel limit")]
    ResourceLimit { pixels: usize, limit: usize },
    #[error("GPU error: {0}")]
    Gpu(String),
}

impl FilterError {
    pub fn extent_mismatch(expected: Extent, actual: Extent) -> Self {
        Self::ExtentMismatch { expected, actual }
    }
}

/// Primitive image operations the per-frame transform is built from.
///
/// Every operation returns a new value; inputs are never modified in place
/// except where ownership is passed in. Any error means the current frame
/// cannot be delivered.
pub trait ImageFilterBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Block-averages `frame` with square blocks of `block_size` pixels,
    /// the grid aligned to `anchor`.
    ///
    /// The result covers at least the source extent; callers crop it back.
    fn pixelate(
        &self,
        frame: &Frame,
        block_size: f64,
        anchor: PixelAnchor,
    ) -> Result<Frame, FilterError>;

    /// Gaussian blur of a mask with the given radius.
    fn blur(&self, mask: &Mask, radius: f64) -> Result<Mask, FilterError>;

    /// Draws an "on" rectangle of the given opacity over `background`
    /// using source-over compositing.
    fn composite_over(
        &self,
        background: Mask,
        region: PixelRect,
        opacity: f32,
    ) -> Result<Mask, FilterError>;

    /// Per-pixel `base + (overlay - base) * mask`.
    fn blend_with_mask(
        &self,
        base: &Frame,
        overlay: &Frame,
        mask: &Mask,
    ) -> Result<Frame, FilterError>;

    /// Mirrors about the vertical axis.
    fn flip_horizontal(&self, frame: Frame) -> Result<Frame, FilterError>;

    /// Converts a frame into a deliverable image.
    fn materialize(&self, frame: Frame, sequence: usize) -> Result<RenderedFrame, FilterError>;
}
