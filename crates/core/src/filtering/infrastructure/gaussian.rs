/// Normalized 1D Gaussian kernel for standard deviation `sigma`.
///
/// The kernel spans `ceil(3 * sigma)` taps on each side of the center.
/// A non-positive sigma yields the identity kernel `[1.0]`.
pub fn gaussian_kernel_1d(sigma: f64) -> Vec<f32> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let half = (3.0 * sigma).ceil() as isize;
    let mut kernel_f64: Vec<f64> = (-half..=half)
        .map(|i| {
            let x = i as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel_f64.iter().sum();
    for v in &mut kernel_f64 {
        *v /= sum;
    }
    kernel_f64.iter().map(|&v| v as f32).collect()
}

/// Separable blur of a single-channel `f32` plane, edges clamped.
///
/// `temp` is scratch space reused across calls.
pub fn separable_blur_f32(
    plane: &mut [f32],
    width: usize,
    height: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    let kernel_size = kernel.len();
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = (kernel_size / 2) as isize;
    temp.resize(width * height, 0.0);

    // Horizontal pass: plane → temp
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                sum += plane[row + sx] * w;
            }
            temp[row + x] = sum;
        }
    }

    // Vertical pass: temp → plane
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                sum += temp[sy * width + x] * w;
            }
            plane[y * width + x] = sum.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel_1d(2.0);
        let sum: f32 = k.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_kernel_width_is_three_sigma() {
        assert_eq!(gaussian_kernel_1d(2.0).len(), 13);
        assert_eq!(gaussian_kernel_1d(0.5).len(), 5);
    }

    #[test]
    fn test_kernel_is_symmetric_and_peaked() {
        let k = gaussian_kernel_1d(2.0);
        let n = k.len();
        for i in 0..n / 2 {
            assert_relative_eq!(k[i], k[n - 1 - i], epsilon = 1e-7);
            assert!(k[i] < k[n / 2]);
        }
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        assert_eq!(gaussian_kernel_1d(0.0), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(f64::NAN), vec![1.0]);
    }

    #[test]
    fn test_uniform_plane_unchanged() {
        let mut plane = vec![0.5f32; 20 * 10];
        let mut temp = Vec::new();
        separable_blur_f32(&mut plane, 20, 10, &gaussian_kernel_1d(2.0), &mut temp);
        for v in plane {
            assert_relative_eq!(v, 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_step_edge_is_softened() {
        // Left half 0, right half 1
        let (w, h) = (20usize, 4usize);
        let mut plane: Vec<f32> = (0..w * h)
            .map(|i| if i % w >= w / 2 { 1.0 } else { 0.0 })
            .collect();
        let mut temp = Vec::new();
        separable_blur_f32(&mut plane, w, h, &gaussian_kernel_1d(2.0), &mut temp);

        let row = &plane[w..2 * w];
        assert!(row[w / 2 - 1] > 0.0 && row[w / 2 - 1] < 0.5);
        assert!(row[w / 2] > 0.5 && row[w / 2] < 1.0);
        assert_relative_eq!(row[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(row[w - 1], 1.0, epsilon = 1e-6);
        // Monotonic across the edge
        for x in 1..w {
            assert!(row[x] >= row[x - 1]);
        }
    }

    #[test]
    fn test_identity_kernel_is_noop() {
        let mut plane = vec![0.0, 1.0, 0.25, 0.75];
        let mut temp = Vec::new();
        separable_blur_f32(&mut plane, 2, 2, &[1.0], &mut temp);
        assert_eq!(plane, vec![0.0, 1.0, 0.25, 0.75]);
    }
}
