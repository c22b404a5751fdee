use std::cell::RefCell;

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::filtering::domain::image_filter_backend::{FilterError, ImageFilterBackend};
use crate::shared::constants::MAX_MATERIALIZED_PIXELS;
use crate::shared::frame::Frame;
use crate::shared::mask::Mask;
use crate::shared::region::{PixelAnchor, PixelRect};
use crate::shared::rendered_frame::RenderedFrame;

use super::gaussian;

/// Reference implementation of the filter primitives on the CPU.
///
/// Pixelation averages square blocks on a grid aligned to a [`PixelAnchor`].
/// With the default centre anchor, changing the block size grows the blocks
/// outward symmetrically.
pub struct CpuFilterBackend {
    max_pixels: usize,
    blur_temp: RefCell<Vec<f32>>,
}

impl CpuFilterBackend {
    pub fn new(max_pixels: usize) -> Self {
        Self {
            max_pixels,
            blur_temp: RefCell::new(Vec::new()),
        }
    }
}

impl Default for CpuFilterBackend {
    fn default() -> Self {
        Self::new(MAX_MATERIALIZED_PIXELS)
    }
}

pub(crate) fn check_channels(frame: &Frame) -> Result<(), FilterError> {
    match frame.channels() {
        3 | 4 => Ok(()),
        other => Err(FilterError::UnsupportedChannels(other)),
    }
}

/// Maps each pixel along one axis to a zero-based block index.
///
/// Block boundaries sit at `origin + k * size` with `origin = anchor mod size`;
/// a pixel belongs to the block containing its center. Returns the per-pixel
/// indices and the number of blocks.
pub(crate) fn block_indices(len: u32, size: f64, anchor: f64) -> (Vec<usize>, usize) {
    let origin = anchor.rem_euclid(size);
    let raw: Vec<i64> = (0..len)
        .map(|i| ((i as f64 + 0.5 - origin) / size).floor() as i64)
        .collect();
    let first = raw.first().copied().unwrap_or(0);
    let ids: Vec<usize> = raw.into_iter().map(|b| (b - first) as usize).collect();
    let count = ids.last().map_or(0, |&b| b + 1);
    (ids, count)
}

impl ImageFilterBackend for CpuFilterBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn pixelate(
        &self,
        frame: &Frame,
        block_size: f64,
        anchor: PixelAnchor,
    ) -> Result<Frame, FilterError> {
        check_channels(frame)?;
        let size = if block_size.is_finite() { block_size.max(1.0) } else { 1.0 };
        let w = frame.width() as usize;
        let c = frame.channels() as usize;

        let (anchor_x, anchor_y) = anchor.resolve(frame.extent());
        let (cols, blocks_x) = block_indices(frame.width(), size, anchor_x);
        let (rows, blocks_y) = block_indices(frame.height(), size, anchor_y);

        let mut sums = vec![0u64; blocks_x * blocks_y * c];
        let mut counts = vec![0u64; blocks_x * blocks_y];
        let src = frame.data();
        for (y, &by) in rows.iter().enumerate() {
            for (x, &bx) in cols.iter().enumerate() {
                let block = by * blocks_x + bx;
                let offset = (y * w + x) * c;
                counts[block] += 1;
                for ch in 0..c {
                    sums[block * c + ch] += src[offset + ch] as u64;
                }
            }
        }

        let averages: Vec<u8> = sums
            .iter()
            .enumerate()
            .map(|(i, &sum)| {
                let n = counts[i / c].max(1);
                ((sum + n / 2) / n) as u8
            })
            .collect();

        let mut out = Vec::with_capacity(src.len());
        for &by in &rows {
            for &bx in &cols {
                let block = by * blocks_x + bx;
                out.extend_from_slice(&averages[block * c..block * c + c]);
            }
        }
        Ok(frame.with_data(out))
    }

    fn blur(&self, mask: &Mask, radius: f64) -> Result<Mask, FilterError> {
        let kernel = gaussian::gaussian_kernel_1d(radius);
        let mut out = mask.clone();
        let mut temp = self.blur_temp.borrow_mut();
        gaussian::separable_blur_f32(
            out.weights_mut(),
            mask.width() as usize,
            mask.height() as usize,
            &kernel,
            &mut temp,
        );
        Ok(out)
    }

    fn composite_over(
        &self,
        mut background: Mask,
        region: PixelRect,
        opacity: f32,
    ) -> Result<Mask, FilterError> {
        let alpha = opacity.clamp(0.0, 1.0);
        let w = background.width();
        let x1 = (region.x + region.width).min(w);
        let y1 = (region.y + region.height).min(background.height());
        let stride = w as usize;
        let weights = background.weights_mut();
        for y in region.y..y1 {
            let row = y as usize * stride;
            for x in region.x..x1 {
                let m = &mut weights[row + x as usize];
                *m = alpha + (1.0 - alpha) * *m;
            }
        }
        Ok(background)
    }

    fn blend_with_mask(
        &self,
        base: &Frame,
        overlay: &Frame,
        mask: &Mask,
    ) -> Result<Frame, FilterError> {
        if overlay.extent() != base.extent() {
            return Err(FilterError::extent_mismatch(base.extent(), overlay.extent()));
        }
        if mask.extent() != base.extent() {
            return Err(FilterError::extent_mismatch(base.extent(), mask.extent()));
        }
        if overlay.channels() != base.channels() {
            return Err(FilterError::UnsupportedChannels(overlay.channels()));
        }
        let c = base.channels() as usize;
        let out: Vec<u8> = base
            .data()
            .iter()
            .zip(overlay.data())
            .enumerate()
            .map(|(i, (&o, &p))| {
                let m = mask.weights()[i / c];
                let (o, p) = (o as f32, p as f32);
                (o + (p - o) * m).round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Ok(base.with_data(out))
    }

    fn flip_horizontal(&self, mut frame: Frame) -> Result<Frame, FilterError> {
        let c = frame.channels() as usize;
        let row_len = frame.width() as usize * c;
        if row_len == 0 {
            return Ok(frame);
        }
        for row in frame.data_mut().chunks_exact_mut(row_len) {
            let w = row_len / c;
            for x in 0..w / 2 {
                let (a, b) = (x * c, (w - 1 - x) * c);
                for ch in 0..c {
                    row.swap(a + ch, b + ch);
                }
            }
        }
        Ok(frame)
    }

    fn materialize(&self, frame: Frame, sequence: usize) -> Result<RenderedFrame, FilterError> {
        let pixels = frame.extent().pixel_count();
        if pixels > self.max_pixels {
            return Err(FilterError::ResourceLimit {
                pixels,
                limit: self.max_pixels,
            });
        }
        if frame.extent().is_empty() {
            return Err(FilterError::Materialize("empty frame".into()));
        }
        let (w, h, channels) = (frame.width(), frame.height(), frame.channels());
        let image = match channels {
            3 => RgbImage::from_raw(w, h, frame.into_data()).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, frame.into_data()).map(DynamicImage::ImageRgba8),
            other => return Err(FilterError::UnsupportedChannels(other)),
        };
        let image = image.ok_or_else(|| {
            FilterError::Materialize(format!("buffer does not match {w}x{h}x{channels}"))
        })?;
        Ok(RenderedFrame { image, sequence })
    }
}
