use super::frame::Extent;
use super::region::PixelRect;

/// Single-channel blend weight image, one `f32` in `[0, 1]` per pixel.
///
/// `0.0` keeps the original pixel, `1.0` takes the pixelated one.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    weights: Vec<f32>,
    width: u32,
    height: u32,
}

impl Mask {
    /// A fully "off" mask covering `extent`.
    pub fn off(extent: Extent) -> Self {
        Self::filled(extent, 0.0)
    }

    pub fn filled(extent: Extent, value: f32) -> Self {
        Self {
            weights: vec![value; extent.pixel_count()],
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn from_weights(weights: Vec<f32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            weights.len(),
            width as usize * height as usize,
            "weights length must equal width * height"
        );
        Self {
            weights,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.weights[y as usize * self.width as usize + x as usize]
    }

    /// True when every weight is exactly zero.
    pub fn is_off(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    /// Sum of weights inside `rect`.
    pub fn coverage_in(&self, rect: &PixelRect) -> f32 {
        let mut sum = 0.0;
        for y in rect.y..rect.y + rect.height {
            let row = y as usize * self.width as usize;
            for x in rect.x..rect.x + rect.width {
                sum += self.weights[row + x as usize];
            }
        }
        sum
    }
}
