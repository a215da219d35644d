use foundation::math::{Vec3, haversine_km, lat_lon_to_vector};
use rand::Rng;

use crate::point::Point;
use crate::rng::unit;

/// Endpoints sit slightly above the sphere surface.
pub const SURFACE_LIFT: f64 = 1.01;
/// Chord length, relative to the radius, that maps to an arc boost of 1.
pub const ARC_REFERENCE: f64 = 1.35;
pub const ARC_BOOST_MIN: f64 = 0.25;
pub const ARC_BOOST_MAX: f64 = 1.25;
pub const TRAFFIC_MIN: f64 = 0.62;
pub const TRAFFIC_MAX: f64 = 1.22;

/// One synthesized connection between two points of the same run.
///
/// `p0`, `p1`, `p2` are the control points of a quadratic arc in sphere
/// space. Selection and hover state live outside this type and refer to a
/// route through its `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: usize,
    /// Index of the origin in the point slice the routes were built from.
    pub from_index: usize,
    pub to_index: usize,
    pub from: Point,
    pub to: Point,
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub arc_boost: f64,
    /// Animation cycles per second.
    pub speed: f64,
    pub phase: f64,
    pub seed: f64,
    pub size: f64,
    pub dir: i8,
    pub traffic: f64,
    /// Discrete traffic tier in `1..=4`.
    pub traffic_count: u8,
    /// Endpoint degree relative to the busiest point, in `[0, 1]`.
    pub hub: f64,
    pub distance_km: f64,
    /// Country codes of the endpoints; empty when unknown.
    pub iso_a: String,
    pub iso_b: String,
}

impl Route {
    /// Point on the quadratic arc at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Vec3 {
        bezier(self.p0, self.p1, self.p2, t)
    }

    pub fn midpoint(&self) -> Vec3 {
        self.point_at(0.5)
    }

    pub fn touches(&self, code: &str) -> bool {
        !code.is_empty() && (self.iso_a == code || self.iso_b == code)
    }
}

pub fn bezier(p0: Vec3, p1: Vec3, p2: Vec3, t: f64) -> Vec3 {
    let omt = 1.0 - t;
    p0 * (omt * omt) + p1 * (2.0 * omt * t) + p2 * (t * t)
}

/// Arc control points for two unit directions on a sphere of `radius`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArcShape {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub arc_boost: f64,
}

impl ArcShape {
    pub fn between(from: &Point, to: &Point, radius: f64) -> Self {
        let p0 = lat_lon_to_vector(from.lat, from.lon, radius * SURFACE_LIFT);
        let p2 = lat_lon_to_vector(to.lat, to.lon, radius * SURFACE_LIFT);

        let chord = p0.distance(p2);
        let arc_boost = (chord / (radius * ARC_REFERENCE)).clamp(ARC_BOOST_MIN, ARC_BOOST_MAX);

        let sum = p0 + p2;
        let bulge = if sum.length() < radius * 1e-9 {
            perpendicular(p0).normalize()
        } else {
            sum.normalize()
        };
        let p1 = bulge * (radius * (1.075 + arc_boost * 0.14));

        Self {
            p0,
            p1,
            p2,
            arc_boost,
        }
    }
}

/// Some direction orthogonal to `v`, for endpoints whose midpoint vanishes.
fn perpendicular(v: Vec3) -> Vec3 {
    let axis = if v.y.abs() < 0.9 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    v.cross(axis)
}

/// `traffic` and its tier for a given arc boost and seed.
pub fn traffic_for(arc_boost: f64, seed: f64) -> (f64, u8) {
    let base = (arc_boost - ARC_BOOST_MIN).clamp(0.0, 1.0);
    let traffic = (TRAFFIC_MIN + base * 0.55 + (seed - 0.5) * 0.16).clamp(TRAFFIC_MIN, TRAFFIC_MAX);
    let traffic01 = ((traffic - TRAFFIC_MIN) / (TRAFFIC_MAX - TRAFFIC_MIN)).clamp(0.0, 0.9999);
    (traffic, 1 + (traffic01 * 4.0).floor() as u8)
}

/// Inputs for deriving one [`Route`].
pub(crate) struct Endpoints<'a> {
    pub from_index: usize,
    pub to_index: usize,
    pub from: &'a Point,
    pub to: &'a Point,
    pub from_degree: usize,
    pub to_degree: usize,
}

pub(crate) fn derive<R: Rng + ?Sized>(
    id: usize,
    ends: Endpoints<'_>,
    max_degree: usize,
    radius: f64,
    rng: &mut R,
) -> Route {
    let shape = ArcShape::between(ends.from, ends.to, radius);
    let phase = unit(rng);
    let seed = unit(rng);
    let (traffic, traffic_count) = traffic_for(shape.arc_boost, seed);
    let hub = ((ends.from_degree + ends.to_degree) as f64 / (2 * max_degree.max(1)) as f64)
        .clamp(0.0, 1.0);

    Route {
        id,
        from_index: ends.from_index,
        to_index: ends.to_index,
        iso_a: ends.from.country.clone().unwrap_or_default(),
        iso_b: ends.to.country.clone().unwrap_or_default(),
        distance_km: haversine_km(ends.from.lat, ends.from.lon, ends.to.lat, ends.to.lon),
        from: ends.from.clone(),
        to: ends.to.clone(),
        p0: shape.p0,
        p1: shape.p1,
        p2: shape.p2,
        arc_boost: shape.arc_boost,
        speed: 0.018 + shape.arc_boost * 0.03,
        phase,
        seed,
        size: 2.6 + shape.arc_boost * 0.95,
        dir: if seed < 0.5 { 1 } else { -1 },
        traffic,
        traffic_count,
        hub,
    }
}
