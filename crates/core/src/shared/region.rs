use super::frame::Extent;

/// Bounding box in normalized coordinates: `[0, 1]` relative to frame
/// dimensions, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A face reported by the detector for the current frame only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: NormalizedBox,
    pub confidence: f64,
}

impl DetectedFace {
    pub fn new(bbox: NormalizedBox, confidence: f64) -> Self {
        Self { bbox, confidence }
    }
}

/// Pixel-space rectangle covering a face. May extend beyond the frame;
/// clip with [`FaceRegion::clipped_to`] before rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Maps a normalized box onto a frame of the given extent.
    pub fn from_normalized(bbox: &NormalizedBox, extent: Extent) -> Self {
        let fw = extent.width as f64;
        let fh = extent.height as f64;
        Self::new(bbox.x * fw, bbox.y * fh, bbox.width * fw, bbox.height * fh)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on the top
    /// and bottom. The center stays put.
    pub fn inflated(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Intersection with the frame rectangle `[0, w) x [0, h)`.
    ///
    /// Returns `None` when the region lies entirely outside the frame.
    pub fn clipped_to(&self, extent: Extent) -> Option<Self> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = self.max_x().min(extent.width as f64);
        let y1 = self.max_y().min(extent.height as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Snaps edges to the nearest pixel boundary.
    pub fn to_pixel_rect(&self) -> PixelRect {
        let x0 = self.x.round().max(0.0) as u32;
        let y0 = self.y.round().max(0.0) as u32;
        let x1 = self.max_x().round().max(0.0) as u32;
        let y1 = self.max_y().round().max(0.0) as u32;
        PixelRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// Integer pixel rectangle, always inside the frame it was clipped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Point the pixelation grid is aligned to: a block boundary passes through
/// it on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PixelAnchor {
    /// Centre of whatever frame is being pixelated.
    #[default]
    FrameCentre,
    /// Fixed position in pixels, origin at the top-left corner. Keeps the
    /// grid in place when the frame size changes.
    Point { x: f64, y: f64 },
}

impl PixelAnchor {
    /// Anchor position in pixels within a frame of `extent`.
    pub fn resolve(self, extent: Extent) -> (f64, f64) {
        match self {
            Self::Point { x, y } if x.is_finite() && y.is_finite() => (x, y),
            _ => (extent.width as f64 / 2.0, extent.height as f64 / 2.0),
        }
    }
}
