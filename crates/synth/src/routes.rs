use std::collections::HashSet;

use countries::CountryIndex;
use foundation::math::Vec3;
use rand::Rng;
use runtime::AttemptBudget;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::point::Point;
use crate::rng::{index as pick, unit};
use crate::route::{Endpoints, Route, derive};

const HUB_MIN: usize = 6;
const HUB_MAX: usize = 12;
const COINCIDENT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Requested number of distinct routes.
    pub count: usize,
    /// Sphere radius the arc control points are expressed in.
    pub radius: f64,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            count: 220,
            radius: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSet {
    pub routes: Vec<Route>,
}

impl RouteSet {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Hub-weighted random route graph over a point set.
///
/// [`RouteTopologySynthesizer::build`] draws from ambient randomness, so the
/// network differs between runs. Pass a seeded generator to
/// [`RouteTopologySynthesizer::build_with_rng`] for a reproducible one.
#[derive(Debug, Clone, Default)]
pub struct RouteTopologySynthesizer {
    options: RouteOptions,
}

impl RouteTopologySynthesizer {
    pub fn new(options: RouteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn build(&self, points: &[Point], index: Option<&CountryIndex>) -> RouteSet {
        self.build_with_rng(points, index, &mut rand::thread_rng())
    }

    pub fn build_with_rng<R: Rng + ?Sized>(
        &self,
        points: &[Point],
        index: Option<&CountryIndex>,
        rng: &mut R,
    ) -> RouteSet {
        let index = index.filter(|i| !i.is_empty());
        let nodes = Nodes::collect(points, index);
        if nodes.len() < 2 || self.options.count == 0 {
            debug!(valid = nodes.len(), "not enough points for routes");
            return RouteSet::default();
        }

        let hubs = choose_hubs(&nodes.dirs, hub_count(nodes.len()), rng);
        let edges = pick_edges(&nodes.dirs, &hubs, self.options.count, rng);

        let mut degree = vec![0usize; nodes.len()];
        for &(a, b) in &edges {
            degree[a] += 1;
            degree[b] += 1;
        }
        let max_degree = degree.iter().copied().max().unwrap_or(0).max(1);

        let radius = if self.options.radius > 0.0 {
            self.options.radius
        } else {
            RouteOptions::default().radius
        };

        let routes: Vec<Route> = edges
            .iter()
            .enumerate()
            .map(|(id, &(a, b))| {
                derive(
                    id,
                    Endpoints {
                        from_index: nodes.source[a],
                        to_index: nodes.source[b],
                        from: &nodes.points[a],
                        to: &nodes.points[b],
                        from_degree: degree[a],
                        to_degree: degree[b],
                    },
                    max_degree,
                    radius,
                    rng,
                )
            })
            .collect();

        info!(
            points = nodes.len(),
            hubs = hubs.len(),
            requested = self.options.count,
            routes = routes.len(),
            "built route topology"
        );
        RouteSet { routes }
    }
}

/// Shorthand for `RouteTopologySynthesizer::new(*options).build(points, index)`.
pub fn build_routes(
    points: &[Point],
    options: &RouteOptions,
    index: Option<&CountryIndex>,
) -> RouteSet {
    RouteTopologySynthesizer::new(*options).build(points, index)
}

pub fn build_routes_with_rng<R: Rng + ?Sized>(
    points: &[Point],
    options: &RouteOptions,
    index: Option<&CountryIndex>,
    rng: &mut R,
) -> RouteSet {
    RouteTopologySynthesizer::new(*options).build_with_rng(points, index, rng)
}

/// Valid input points with their unit directions and source positions.
struct Nodes {
    points: Vec<Point>,
    dirs: Vec<Vec3>,
    source: Vec<usize>,
}

impl Nodes {
    fn collect(points: &[Point], index: Option<&CountryIndex>) -> Self {
        let mut nodes = Nodes {
            points: Vec::with_capacity(points.len()),
            dirs: Vec::with_capacity(points.len()),
            source: Vec::with_capacity(points.len()),
        };

        for (i, p) in points.iter().enumerate() {
            if !p.is_valid() {
                continue;
            }
            let mut p = p.clone();
            if let Some(index) = index {
                p.country = index.country_code(p.lat, p.lon).map(str::to_owned);
            }
            nodes.dirs.push(p.direction());
            nodes.points.push(p);
            nodes.source.push(i);
        }
        nodes
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

/// `clamp(round(sqrt(n)), 6, 12)`, never more than `n`.
pub fn hub_count(n: usize) -> usize {
    let by_size = (n as f64).sqrt().round() as usize;
    by_size.clamp(HUB_MIN, HUB_MAX).min(n)
}

/// Farthest-point sampling on the `1 - dot` metric from one random start.
///
/// Stops early once every remaining point coincides with a hub.
pub fn choose_hubs<R: Rng + ?Sized>(dirs: &[Vec3], count: usize, rng: &mut R) -> Vec<usize> {
    if dirs.is_empty() || count == 0 {
        return Vec::new();
    }

    let first = pick(rng, dirs.len());
    let mut hubs = vec![first];
    let mut nearest: Vec<f64> = dirs.iter().map(|d| 1.0 - d.dot(dirs[first])).collect();

    while hubs.len() < count {
        let mut best = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (i, &score) in nearest.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best = i;
            }
        }
        if best_score <= COINCIDENT_EPS {
            break;
        }

        hubs.push(best);
        for (i, d) in dirs.iter().enumerate() {
            nearest[i] = nearest[i].min(1.0 - d.dot(dirs[best]));
        }
    }
    hubs
}

#[derive(Debug, Default)]
struct EdgeSet {
    edges: Vec<(usize, usize)>,
    seen: HashSet<(usize, usize)>,
}

impl EdgeSet {
    /// Stores the undirected edge as `(min, max)`. Self loops and repeats are
    /// refused.
    fn try_add(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let key = (a.min(b), a.max(b));
        if !self.seen.insert(key) {
            return false;
        }
        self.edges.push(key);
        true
    }

    fn len(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BucketTally {
    long_haul: usize,
    hub_spoke: usize,
    regional: usize,
    relaxed: usize,
    completion: usize,
}

/// Distinct undirected edges, `min(count, n(n-1)/2)` of them unless every
/// budget runs dry first.
pub fn pick_edges<R: Rng + ?Sized>(
    dirs: &[Vec3],
    hubs: &[usize],
    count: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let n = dirs.len();
    if n < 2 {
        return Vec::new();
    }
    let target = count.min(n * (n - 1) / 2);
    let dot = |a: usize, b: usize| dirs[a].dot(dirs[b]);

    let mut set = EdgeSet::default();
    let mut tally = BucketTally::default();

    let mut budget = AttemptBudget::scaled(800, 140.0, count);
    while set.len() < target && budget.try_consume() {
        let r = unit(rng);

        if r < 0.34 && hubs.len() >= 2 {
            let a = hubs[pick(rng, hubs.len())];
            let b = hubs[pick(rng, hubs.len())];
            if a == b {
                continue;
            }
            let d = dot(a, b);
            if d > 0.65 {
                continue;
            }
            let accept = (0.35 + (1.0 - d) * 0.75).clamp(0.35, 0.98);
            if unit(rng) > accept {
                continue;
            }
            if set.try_add(a, b) {
                tally.long_haul += 1;
            }
            continue;
        }

        if r < 0.72 && !hubs.is_empty() {
            let hub = hubs[pick(rng, hubs.len())];
            let other = pick(rng, n);
            if hub == other {
                continue;
            }
            let d = dot(hub, other);
            if d > 0.92 {
                continue;
            }
            let accept = (0.25 + (1.0 - d) * 0.55).clamp(0.25, 0.92);
            if unit(rng) > accept {
                continue;
            }
            if set.try_add(hub, other) {
                tally.hub_spoke += 1;
            }
            continue;
        }

        let a = pick(rng, n);
        let b = pick(rng, n);
        if a == b {
            continue;
        }
        let d = dot(a, b);
        if !(0.72..=0.975).contains(&d) {
            continue;
        }
        let accept = (0.35 + (d - 0.72) * 0.35).clamp(0.35, 0.85);
        if unit(rng) > accept {
            continue;
        }
        if set.try_add(a, b) {
            tally.regional += 1;
        }
    }

    if set.len() < target {
        let mut budget = AttemptBudget::scaled(300, 80.0, target - set.len());
        while set.len() < target && budget.try_consume() {
            let a = pick(rng, n);
            let b = pick(rng, n);
            if a == b {
                continue;
            }
            let d = dot(a, b);
            if d > 0.985 {
                continue;
            }
            let accept = (0.22 + (1.0 - d) * 0.5).clamp(0.22, 0.9);
            if unit(rng) > accept {
                continue;
            }
            if set.try_add(a, b) {
                tally.relaxed += 1;
            }
        }
    }

    // No distance gate at all: tiny or clustered inputs still connect.
    if set.len() < target {
        let mut budget = AttemptBudget::scaled(300, 40.0, target - set.len());
        while set.len() < target && budget.try_consume() {
            let a = pick(rng, n);
            let b = pick(rng, n);
            if set.try_add(a, b) {
                tally.completion += 1;
            }
        }
    }

    debug!(
        target,
        picked = set.len(),
        long_haul = tally.long_haul,
        hub_spoke = tally.hub_spoke,
        regional = tally.regional,
        relaxed = tally.relaxed,
        completion = tally.completion,
        "picked route edges"
    );
    set.edges
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        RouteOptions, RouteTopologySynthesizer, build_routes, build_routes_with_rng, choose_hubs,
        hub_count,
    };
    use crate::airports::{InflateOptions, inflate};
    use crate::point::Point;
    use crate::rng::seeded;
    use countries::{CountryIndex, FeatureCollection, Geometry, PolygonFeature};
    use pretty_assertions::assert_eq;

    fn grid_points(rows: usize, cols: usize) -> Vec<Point> {
        let mut out = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let lat = -70.0 + 140.0 * r as f64 / (rows.max(2) - 1) as f64;
                let lon = -175.0 + 350.0 * c as f64 / (cols.max(2) - 1) as f64;
                out.push(Point::new(lat, lon));
            }
        }
        out
    }

    fn opts(count: usize) -> RouteOptions {
        RouteOptions { count, radius: 1.0 }
    }

    #[test]
    fn hub_count_scales_with_sqrt() {
        assert_eq!(hub_count(0), 0);
        assert_eq!(hub_count(2), 2);
        assert_eq!(hub_count(9), 6);
        assert_eq!(hub_count(100), 10);
        assert_eq!(hub_count(5000), 12);
    }

    #[test]
    fn hubs_spread_to_opposite_sides() {
        let dirs: Vec<_> = [(0.0, 0.0), (0.0, 1.0), (0.0, 180.0), (1.0, 179.0)]
            .iter()
            .map(|&(lat, lon)| Point::new(lat, lon).direction())
            .collect();
        let mut rng = seeded(3);
        let hubs = choose_hubs(&dirs, 2, &mut rng);
        assert_eq!(hubs.len(), 2);
        let d = dirs[hubs[0]].dot(dirs[hubs[1]]);
        assert!(d < -0.99, "hubs too close: {d}");
    }

    #[test]
    fn coincident_points_stop_hub_selection() {
        let dirs = vec![Point::new(10.0, 10.0).direction(); 5];
        let hubs = choose_hubs(&dirs, 4, &mut seeded(0));
        assert_eq!(hubs.len(), 1);
    }

    #[test]
    fn too_few_points_yield_no_routes() {
        assert!(build_routes(&[], &opts(10), None).is_empty());
        assert!(build_routes(&[Point::new(1.0, 2.0)], &opts(10), None).is_empty());
        let invalid = vec![Point::new(f64::NAN, 0.0), Point::new(0.0, 0.0)];
        assert!(build_routes(&invalid, &opts(10), None).is_empty());
    }

    #[test]
    fn two_points_make_exactly_one_route() {
        let points = vec![Point::new(0.0, 0.0), Point::new(48.0, 2.0)];
        for seed in 0..8 {
            let set = build_routes_with_rng(&points, &opts(5), None, &mut seeded(seed));
            assert_eq!(set.len(), 1);
            let r = &set.routes[0];
            assert_eq!((r.from_index, r.to_index), (0, 1));
            assert_eq!(r.hub, 1.0);
        }
    }

    #[test]
    fn coincident_pair_still_connects() {
        let points = vec![Point::new(5.0, 5.0), Point::new(5.0, 5.0)];
        let set = build_routes(&points, &opts(3), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn source_positions_skip_invalid_points() {
        let points = vec![Point::new(99.0, 0.0), Point::new(0.0, 0.0), Point::new(0.0, 90.0)];
        let set = build_routes_with_rng(&points, &opts(1), None, &mut seeded(9));
        assert_eq!(set.len(), 1);
        assert_eq!((set.routes[0].from_index, set.routes[0].to_index), (1, 2));
    }

    #[test]
    fn no_self_loops_or_duplicate_edges() {
        let points = grid_points(12, 25);
        let set = build_routes_with_rng(&points, &opts(220), None, &mut seeded(11));
        assert_eq!(set.len(), 220);

        let mut seen = HashSet::new();
        for (id, r) in set.routes.iter().enumerate() {
            assert_eq!(r.id, id);
            assert_ne!(r.from_index, r.to_index);
            let key = (r.from_index.min(r.to_index), r.from_index.max(r.to_index));
            assert!(seen.insert(key), "duplicate edge {key:?}");
            assert!((0.25..=1.25).contains(&r.arc_boost));
            assert!((0.0..=1.0).contains(&r.hub));
        }
    }

    #[test]
    fn count_is_capped_by_possible_pairs() {
        let points = grid_points(2, 2);
        let set = build_routes_with_rng(&points, &opts(100), None, &mut seeded(5));
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn seeded_runs_repeat() {
        let points = grid_points(8, 10);
        let synth = RouteTopologySynthesizer::new(opts(60));
        let a = synth.build_with_rng(&points, None, &mut seeded(77));
        let b = synth.build_with_rng(&points, None, &mut seeded(77));
        assert_eq!(a, b);
    }

    #[test]
    fn endpoints_are_tagged_land_points() {
        let fc = FeatureCollection::new(vec![
            PolygonFeature::new(
                "west",
                Geometry::Polygon(vec![vec![
                    [-36.0, 0.0],
                    [-12.0, 0.0],
                    [-12.0, 30.0],
                    [-36.0, 30.0],
                    [-36.0, 0.0],
                ]]),
            )
            .with_property("ISO_A3", "WST"),
            PolygonFeature::new(
                "east",
                Geometry::Polygon(vec![vec![
                    [12.0, -30.0],
                    [36.0, -30.0],
                    [36.0, 0.0],
                    [12.0, 0.0],
                    [12.0, -30.0],
                ]]),
            )
            .with_property("ISO_A3", "EST"),
        ]);
        // Edges on multiples of the 0.12deg land-cache cell.
        let index = CountryIndex::build(fc.shared());

        let base = vec![Point::new(15.0, -25.0), Point::new(-15.0, 25.0)];
        let airports = inflate(
            &base,
            Some(&index),
            &InflateOptions {
                target_count: 120,
                min_spacing_deg: 1.0,
            },
        );
        assert!(airports.len() > 10);

        let set = build_routes_with_rng(&airports, &opts(80), Some(&index), &mut seeded(2));
        assert!(!set.is_empty());
        for r in &set.routes {
            for (p, code) in [(&r.from, &r.iso_a), (&r.to, &r.iso_b)] {
                assert!(index.contains(p.lat, p.lon));
                assert_eq!(index.country_code(p.lat, p.lon), Some(code.as_str()));
                assert_eq!(p.country.as_deref(), Some(code.as_str()));
            }
        }
    }
}
