use crate::filtering::domain::image_filter_backend::{FilterError, ImageFilterBackend};
use crate::shared::constants::{MASK_BLUR_RADIUS, MIN_REGION_EXTENT};
use crate::shared::frame::Extent;
use crate::shared::mask::Mask;
use crate::shared::region::FaceRegion;

/// Builds the soft-edged blend mask for one frame from its face regions.
pub struct MaskCompositor {
    blur_radius: f64,
    min_extent: f64,
}

impl MaskCompositor {
    pub fn new(blur_radius: f64, min_extent: f64) -> Self {
        Self {
            blur_radius,
            min_extent,
        }
    }

    /// Hard-edged composite: every usable region drawn fully "on" over an
    /// "off" background.
    ///
    /// Regions are clipped to the frame; a clipped width or height at or below
    /// the minimum extent is skipped.
    pub fn composite(
        &self,
        backend: &dyn ImageFilterBackend,
        extent: Extent,
        regions: &[FaceRegion],
    ) -> Result<Mask, FilterError> {
        let mut mask = Mask::off(extent);
        for region in regions {
            let Some(clipped) = region.clipped_to(extent) else {
                continue;
            };
            if clipped.width <= self.min_extent || clipped.height <= self.min_extent {
                log::trace!("skipping degenerate region {clipped:?}");
                continue;
            }
            let rect = clipped.to_pixel_rect();
            if rect.is_empty() {
                continue;
            }
            mask = backend.composite_over(mask, rect, 1.0)?;
        }
        Ok(mask)
    }

    /// The blend mask: [`composite`](Self::composite) followed by the edge blur.
    ///
    /// With no usable regions the mask is returned fully off without blurring.
    pub fn compose(
        &self,
        backend: &dyn ImageFilterBackend,
        extent: Extent,
        regions: &[FaceRegion],
    ) -> Result<Mask, FilterError> {
        let mask = self.composite(backend, extent, regions)?;
        if mask.is_off() {
            return Ok(mask);
        }
        backend.blur(&mask, self.blur_radius)
    }
}

impl Default for MaskCompositor {
    fn default() -> Self {
        Self::new(MASK_BLUR_RADIUS, MIN_REGION_EXTENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_region_tracker::FaceRegionTracker;
    use crate::filtering::infrastructure::cpu_filter_backend::CpuFilterBackend;
    use crate::shared::region::{DetectedFace, NormalizedBox, PixelRect};
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn backend() -> CpuFilterBackend {
        CpuFilterBackend::default()
    }

    fn extent() -> Extent {
        Extent::new(100, 80)
    }

    #[test]
    fn test_no_regions_leaves_mask_off() {
        let mask = MaskCompositor::default()
            .compose(&backend(), extent(), &[])
            .unwrap();
        assert_eq!(mask.extent(), extent());
        assert!(mask.is_off());
    }

    #[test]
    fn test_compositing_same_region_twice_is_idempotent() {
        let compositor = MaskCompositor::default();
        let r = FaceRegion::new(10.0, 10.0, 30.0, 20.0);
        let once = compositor.compose(&backend(), extent(), &[r]).unwrap();
        let twice = compositor.compose(&backend(), extent(), &[r, r]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_overlapping_regions_saturate() {
        let compositor = MaskCompositor::default();
        let a = FaceRegion::new(10.0, 10.0, 30.0, 30.0);
        let b = FaceRegion::new(20.0, 20.0, 30.0, 30.0);
        let mask = compositor.composite(&backend(), extent(), &[a, b]).unwrap();
        assert!(mask.weights().iter().all(|&w| w == 0.0 || w == 1.0));
        assert_eq!(mask.at(25, 25), 1.0);
    }

    #[rstest]
    #[case::thin(FaceRegion::new(10.0, 10.0, 2.0, 40.0))]
    #[case::short(FaceRegion::new(10.0, 10.0, 40.0, 1.5))]
    #[case::sliver_at_edge(FaceRegion::new(98.5, 10.0, 40.0, 40.0))]
    #[case::outside(FaceRegion::new(150.0, 10.0, 40.0, 40.0))]
    fn test_degenerate_regions_are_skipped(#[case] region: FaceRegion) {
        let mask = MaskCompositor::default()
            .compose(&backend(), extent(), &[region])
            .unwrap();
        assert!(mask.is_off());
    }

    #[test]
    fn test_region_just_above_threshold_is_drawn() {
        let mask = MaskCompositor::default()
            .composite(&backend(), extent(), &[FaceRegion::new(10.0, 10.0, 3.0, 3.0)])
            .unwrap();
        assert!(!mask.is_off());
    }

    #[test]
    fn test_region_is_clipped_to_frame() {
        let mask = MaskCompositor::default()
            .composite(&backend(), extent(), &[FaceRegion::new(-20.0, -20.0, 40.0, 40.0)])
            .unwrap();
        let on = PixelRect {
            x: 0,
            y: 0,
            width: 20,
            height: 20,
        };
        assert_relative_eq!(mask.coverage_in(&on), 400.0);
        assert_relative_eq!(mask.weights().iter().sum::<f32>(), 400.0);
    }

    #[test]
    fn test_blur_softens_edges() {
        let compositor = MaskCompositor::default();
        let r = FaceRegion::new(30.0, 20.0, 40.0, 40.0);
        let mask = compositor.compose(&backend(), extent(), &[r]).unwrap();
        // Center fully on, inside edge partially on, just outside partially on
        assert_relative_eq!(mask.at(50, 40), 1.0, epsilon = 1e-4);
        assert!(mask.at(30, 40) > 0.5 && mask.at(30, 40) < 1.0);
        assert!(mask.at(29, 40) > 0.0 && mask.at(29, 40) < 0.5);
        assert_relative_eq!(mask.at(5, 5), 0.0);
    }

    #[test]
    fn test_end_to_end_reference_face() {
        // Face (0.4, 0.4, 0.2, 0.2) on 1000x1000 with padding 0.22 inflates to
        // x 356..644 and y 349.4..650.6, which rounds to 356..644 x 349..651.
        let extent = Extent::new(1000, 1000);
        let face = DetectedFace::new(NormalizedBox::new(0.4, 0.4, 0.2, 0.2), 0.9);
        let mut tracker = FaceRegionTracker::default();
        let (regions, _) = tracker.update(&[face], extent, 1, 0.22);

        let compositor = MaskCompositor::default();
        let hard = compositor.composite(&backend(), extent, &regions).unwrap();
        let expected = PixelRect {
            x: 356,
            y: 349,
            width: 288,
            height: 302,
        };
        for y in (0..1000).step_by(7) {
            for x in (0..1000).step_by(7) {
                let on = if expected.contains(x, y) { 1.0 } else { 0.0 };
                assert_eq!(hard.at(x, y), on, "pixel ({x}, {y})");
            }
        }
        assert_relative_eq!(hard.weights().iter().sum::<f32>(), 288.0 * 302.0);

        let soft = compositor.compose(&backend(), extent, &regions).unwrap();
        assert_relative_eq!(soft.at(500, 500), 1.0, epsilon = 1e-4);
        assert_relative_eq!(soft.at(100, 100), 0.0);
        // Blur only reaches ceil(3 * 2.0) = 6 px beyond the hard edge
        assert!(soft.at(350, 500) > 0.0);
        assert_relative_eq!(soft.at(349, 500), 0.0);
        assert!(soft.at(356, 500) < 1.0);
    }
}
