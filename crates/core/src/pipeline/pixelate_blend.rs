use crate::filtering::domain::image_filter_backend::{FilterError, ImageFilterBackend};
use crate::shared::frame::{Extent, Frame};
use crate::shared::mask::Mask;
use crate::shared::region::PixelAnchor;
use crate::shared::rendered_frame::RenderedFrame;

/// Pixelates the frame, blends it over the original through the mask and
/// optionally mirrors the result for a front-camera preview.
pub struct PixelateBlend {
    mirror: bool,
    anchor: PixelAnchor,
}

impl PixelateBlend {
    pub fn new(mirror: bool) -> Self {
        Self {
            mirror,
            anchor: PixelAnchor::FrameCentre,
        }
    }

    /// Aligns the pixelation grid to `anchor` instead of the frame centre.
    pub fn with_anchor(mut self, anchor: PixelAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Produces the output frame, same extent as `original`.
    ///
    /// An all-off mask skips pixelation and blending entirely.
    pub fn render(
        &self,
        backend: &dyn ImageFilterBackend,
        original: &Frame,
        mask: &Mask,
        pixel_scale: f64,
    ) -> Result<Frame, FilterError> {
        let extent = original.extent();
        if mask.extent() != extent {
            return Err(FilterError::extent_mismatch(extent, mask.extent()));
        }

        let blended = if mask.is_off() {
            original.clone()
        } else {
            let pixelated = crop_to(backend.pixelate(original, pixel_scale, self.anchor)?, extent)?;
            backend.blend_with_mask(original, &pixelated, mask)?
        };

        if !self.mirror {
            return Ok(blended);
        }
        crop_to(backend.flip_horizontal(blended)?, extent)
    }

    /// [`render`](Self::render) followed by materialization into a deliverable image.
    pub fn render_and_materialize(
        &self,
        backend: &dyn ImageFilterBackend,
        original: &Frame,
        mask: &Mask,
        pixel_scale: f64,
        sequence: usize,
    ) -> Result<RenderedFrame, FilterError> {
        let frame = self.render(backend, original, mask, pixel_scale)?;
        backend.materialize(frame, sequence)
    }
}

impl Default for PixelateBlend {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Crops a filter result back to the source extent.
fn crop_to(frame: Frame, extent: Extent) -> Result<Frame, FilterError> {
    let actual = frame.extent();
    frame
        .cropped(extent)
        .ok_or_else(|| FilterError::extent_mismatch(extent, actual))
}
