/// Equirectangular scalar grid in `[0, 1]`.
///
/// Row 0 is latitude -90, column 0 is longitude -180. Lookups wrap
/// horizontally and clamp vertically, matching how the grid was splatted.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityRaster {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl DensityRaster {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
        }
    }

    pub(crate) fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major values, `width * height` long.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: i64, y: i64) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.values[y * self.width + x]
    }

    /// Value of the cell covering `(lat, lon)` in degrees.
    pub fn sample(&self, lat: f64, lon: f64) -> f32 {
        let u = (lon + 180.0) / 360.0;
        let v = ((lat + 90.0) / 180.0).clamp(0.0, 1.0);
        let x = ((u - u.floor()) * self.width as f64).floor() as i64;
        let y = (v * self.height as f64).floor() as i64;
        self.get(x, y)
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// One byte per cell, `round(v * 255)`.
    pub fn to_gray8(&self) -> Vec<u8> {
        self.values.iter().map(|&v| quantize(v)).collect()
    }

    /// Grey in RGB, opaque alpha.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * 4);
        for &v in &self.values {
            let b = quantize(v);
            out.extend_from_slice(&[b, b, b, 255]);
        }
        out
    }
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
