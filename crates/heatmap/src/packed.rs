use foundation::math::Vec3;
use synth::Route;

use crate::builder::RasterError;

/// Floats per route: `p0`, `p1`, `p2`, `traffic`, `traffic_count`.
pub const PACKED_STRIDE: usize = 11;

/// Flat route buffer handed to the raster worker. Owns its data so it can be
/// moved across threads; nothing else is shared with the worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedRoutes {
    data: Vec<f32>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PackedRoute {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub traffic: f64,
    pub traffic_count: f64,
}

impl PackedRoutes {
    pub fn from_routes(routes: &[Route]) -> Self {
        let mut data = Vec::with_capacity(routes.len() * PACKED_STRIDE);
        for r in routes {
            for p in [r.p0, r.p1, r.p2] {
                data.extend(p.as_array().map(|c| c as f32));
            }
            data.push(r.traffic as f32);
            data.push(f32::from(r.traffic_count));
        }
        Self { data }
    }

    pub fn from_vec(data: Vec<f32>) -> Result<Self, RasterError> {
        if data.len() % PACKED_STRIDE != 0 {
            return Err(RasterError::MalformedPacked {
                len: data.len(),
                stride: PACKED_STRIDE,
            });
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / PACKED_STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = PackedRoute> + '_ {
        self.data.chunks_exact(PACKED_STRIDE).map(|c| {
            let v = |i: usize| Vec3::new(f64::from(c[i]), f64::from(c[i + 1]), f64::from(c[i + 2]));
            PackedRoute {
                p0: v(0),
                p1: v(3),
                p2: v(6),
                traffic: f64::from(c[9]),
                traffic_count: f64::from(c[10]),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{PACKED_STRIDE, PackedRoutes};
    use crate::builder::RasterError;
    use synth::rng::seeded;
    use synth::{Point, RouteOptions, build_routes_with_rng};

    #[test]
    fn packs_control_points_and_traffic() {
        let points = vec![Point::new(0.0, 0.0), Point::new(30.0, 60.0), Point::new(-20.0, 120.0)];
        let routes = build_routes_with_rng(
            &points,
            &RouteOptions { count: 3, radius: 1.0 },
            None,
            &mut seeded(8),
        )
        .routes;
        let packed = PackedRoutes::from_routes(&routes);
        assert_eq!(packed.len(), routes.len());
        assert_eq!(packed.as_slice().len(), routes.len() * PACKED_STRIDE);

        for (r, p) in routes.iter().zip(packed.iter()) {
            assert!((p.p1.x - r.p1.x).abs() < 1e-6);
            assert!((p.p2.z - r.p2.z).abs() < 1e-6);
            assert!((p.traffic - r.traffic).abs() < 1e-6);
            assert_eq!(p.traffic_count, f64::from(r.traffic_count));
        }
    }

    #[test]
    fn rejects_ragged_buffers() {
        assert!(PackedRoutes::from_vec(vec![0.0; 22]).is_ok());
        assert_eq!(
            PackedRoutes::from_vec(vec![0.0; 12]),
            Err(RasterError::MalformedPacked { len: 12, stride: 11 })
        );
    }
}
