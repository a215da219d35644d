pub const KERNEL_RADIUS: i32 = 4;
pub const KERNEL_SIGMA: f64 = 2.15;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tap {
    pub dx: i32,
    pub dy: i32,
    pub w: f64,
}

/// Square Gaussian stamp, normalized so its taps sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    taps: Vec<Tap>,
}

impl Default for GaussianKernel {
    fn default() -> Self {
        Self::new(KERNEL_RADIUS, KERNEL_SIGMA)
    }
}

impl GaussianKernel {
    pub fn new(radius: i32, sigma: f64) -> Self {
        let radius = radius.max(0);
        let denom = 2.0 * sigma * sigma;
        let mut taps = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        let mut sum = 0.0;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d2 = f64::from(dx * dx + dy * dy);
                let w = if denom > 0.0 {
                    (-d2 / denom).exp()
                } else if d2 == 0.0 {
                    1.0
                } else {
                    0.0
                };
                taps.push(Tap { dx, dy, w });
                sum += w;
            }
        }

        if sum > 0.0 {
            for tap in &mut taps {
                tap.w /= sum;
            }
        }
        Self { taps }
    }

    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }
}

#[cfg(test)]
mod tests {
    use super::GaussianKernel;

    #[test]
    fn default_kernel_is_normalized_and_peaked() {
        let k = GaussianKernel::default();
        assert_eq!(k.taps().len(), 81);
        let sum: f64 = k.taps().iter().map(|t| t.w).sum();
        assert!((sum - 1.0).abs() < 1e-12);

        let center = k.taps().iter().find(|t| t.dx == 0 && t.dy == 0).map(|t| t.w);
        let max = k.taps().iter().map(|t| t.w).fold(0.0, f64::max);
        assert_eq!(center, Some(max));
    }

    #[test]
    fn zero_sigma_degenerates_to_a_point() {
        let k = GaussianKernel::new(2, 0.0);
        let nonzero: Vec<_> = k.taps().iter().filter(|t| t.w > 0.0).collect();
        assert_eq!(nonzero.len(), 1);
        assert_eq!((nonzero[0].dx, nonzero[0].dy, nonzero[0].w), (0, 0, 1.0));
    }
}
