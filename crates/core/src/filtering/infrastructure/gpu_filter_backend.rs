use std::sync::Arc;

use crate::filtering::domain::image_filter_backend::{FilterError, ImageFilterBackend};
use crate::shared::frame::Frame;
use crate::shared::mask::Mask;
use crate::shared::region::{PixelAnchor, PixelRect};
use crate::shared::rendered_frame::RenderedFrame;

use super::cpu_filter_backend::{check_channels, CpuFilterBackend};
use super::gpu_context::{GpuContext, GpuFilterParams, GpuPass};

/// Filter backend that runs the two full-frame passes (pixelate, blend)
/// as wgpu compute shaders.
///
/// The mask primitives work on small single-channel planes and stay on the
/// CPU, as do flipping and materialization.
pub struct GpuFilterBackend {
    ctx: Arc<GpuContext>,
    cpu: CpuFilterBackend,
}

impl GpuFilterBackend {
    pub fn new(ctx: Arc<GpuContext>, cpu: CpuFilterBackend) -> Self {
        Self { ctx, cpu }
    }
}

/// Packs interleaved RGB or RGBA bytes into one `u32` per pixel (R in the low byte).
fn pack_pixels(frame: &Frame) -> Vec<u32> {
    match frame.channels() {
        4 => frame
            .data()
            .chunks_exact(4)
            .map(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
            .collect(),
        _ => frame
            .data()
            .chunks_exact(3)
            .map(|p| u32::from_le_bytes([p[0], p[1], p[2], 255]))
            .collect(),
    }
}

fn unpack_pixels(packed: &[u32], channels: u8) -> Vec<u8> {
    let c = channels as usize;
    let mut out = Vec::with_capacity(packed.len() * c);
    for &p in packed {
        out.extend_from_slice(&p.to_le_bytes()[..c]);
    }
    out
}

/// Block grid for one axis: origin offset, first block index and block count.
fn axis_grid(len: u32, size: f64, anchor: f64) -> (f64, i32, u32) {
    let origin = anchor.rem_euclid(size);
    let first = ((0.5 - origin) / size).floor() as i64;
    let last = ((len as f64 - 0.5 - origin) / size).floor() as i64;
    (origin, first as i32, (last - first + 1).max(0) as u32)
}

impl ImageFilterBackend for GpuFilterBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn pixelate(
        &self,
        frame: &Frame,
        block_size: f64,
        anchor: PixelAnchor,
    ) -> Result<Frame, FilterError> {
        check_channels(frame)?;
        let size = if block_size.is_finite() { block_size.max(1.0) } else { 1.0 };
        let (anchor_x, anchor_y) = anchor.resolve(frame.extent());
        let (origin_x, first_block_x, blocks_x) = axis_grid(frame.width(), size, anchor_x);
        let (origin_y, first_block_y, blocks_y) = axis_grid(frame.height(), size, anchor_y);
        let params = GpuFilterParams {
            width: frame.width(),
            height: frame.height(),
            block_size: size as f32,
            origin_x: origin_x as f32,
            origin_y: origin_y as f32,
            blocks_x,
            blocks_y,
            first_block_x,
            first_block_y,
            ..Default::default()
        };
        let packed = self
            .ctx
            .run(GpuPass::Pixelate, &params, &pack_pixels(frame), &[], &[])?;
        Ok(frame.with_data(unpack_pixels(&packed, frame.channels())))
    }

    fn blur(&self, mask: &Mask, radius: f64) -> Result<Mask, FilterError> {
        self.cpu.blur(mask, radius)
    }

    fn composite_over(
        &self,
        background: Mask,
        region: PixelRect,
        opacity: f32,
    ) -> Result<Mask, FilterError> {
        self.cpu.composite_over(background, region, opacity)
    }

    fn blend_with_mask(
        &self,
        base: &Frame,
        overlay: &Frame,
        mask: &Mask,
    ) -> Result<Frame, FilterError> {
        check_channels(base)?;
        if overlay.extent() != base.extent() {
            return Err(FilterError::extent_mismatch(base.extent(), overlay.extent()));
        }
        if mask.extent() != base.extent() {
            return Err(FilterError::extent_mismatch(base.extent(), mask.extent()));
        }
        if overlay.channels() != base.channels() {
            return Err(FilterError::UnsupportedChannels(overlay.channels()));
        }
        // Nothing to blend; skip the round trip
        if mask.is_off() {
            return Ok(base.clone());
        }
        let params = GpuFilterParams {
            width: base.width(),
            height: base.height(),
            ..Default::default()
        };
        let packed = self.ctx.run(
            GpuPass::Blend,
            &params,
            &pack_pixels(base),
            &pack_pixels(overlay),
            mask.weights(),
        )?;
        Ok(base.with_data(unpack_pixels(&packed, base.channels())))
    }

    fn flip_horizontal(&self, frame: Frame) -> Result<Frame, FilterError> {
        self.cpu.flip_horizontal(frame)
    }

    fn materialize(&self, frame: Frame, sequence: usize) -> Result<RenderedFrame, FilterError> {
        self.cpu.materialize(frame, sequence)
    }
}
