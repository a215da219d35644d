//! Exact point-in-polygon tests on `(lon, lat)` treated as planar `(x, y)`.

use crate::feature::{Coord, Polygon};

fn is_finite(v: &Coord) -> bool {
    v[0].is_finite() && v[1].is_finite()
}

/// Crossing-number test. Non-finite vertices are skipped; a ring with fewer
/// than three usable vertices contains nothing.
pub fn point_in_ring(lon: f64, lat: f64, ring: &[Coord]) -> bool {
    let Some(&last) = ring.iter().rev().find(|v| is_finite(v)) else {
        return false;
    };

    let mut prev = last;
    let mut usable = 0usize;
    let mut inside = false;
    for &[xi, yi] in ring.iter().filter(|v| is_finite(v)) {
        usable += 1;
        let [xj, yj] = prev;
        // The straddle check guarantees yj != yi.
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        prev = [xi, yi];
    }

    usable >= 3 && inside
}

/// Inside the outer ring and inside none of the holes.
pub fn point_in_polygon(lon: f64, lat: f64, polygon: &Polygon) -> bool {
    let Some((outer, holes)) = polygon.split_first() else {
        return false;
    };
    if !point_in_ring(lon, lat, outer) {
        return false;
    }
    !holes.iter().any(|hole| point_in_ring(lon, lat, hole))
}
