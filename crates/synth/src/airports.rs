use std::f64::consts::PI;

use countries::CountryIndex;
use foundation::math::{clamp_lat, wrap_lon};
use rand::seq::SliceRandom;
use runtime::{AttemptBudget, Metrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::grid::{LAND_CELL_DEG, LandCache, SpacingGrid};
use crate::point::Point;
use crate::rng::{SynthRng, seeded, unit};

pub const SYNTHETIC_SEED: u64 = 0x51f2_b7ad;
pub const LAT_LIMIT_DEG: f64 = 89.0;
pub const MIN_SPACING_FLOOR_DEG: f64 = 0.15;
/// Targets above this are clamped; stage budgets grow linearly with the target.
pub const MAX_TARGET_COUNT: usize = 100_000;
/// Upper bound on up-front allocation for the output.
const PREALLOC_LIMIT: usize = 1 << 16;

const SOUTH_SHARE: f64 = 0.44;
const SOUTH_POLAR_BAND_LAT: f64 = -70.0;
const SOUTH_POLAR_SHARE: f64 = 0.08;
const REAL_KEEP_SHARE: f64 = 0.04;
const SPREAD_SHARE: f64 = 0.96;
const SPIRAL_STRIDE: usize = 7919;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InflateOptions {
    pub target_count: usize,
    pub min_spacing_deg: f64,
}

impl Default for InflateOptions {
    fn default() -> Self {
        Self {
            target_count: 5200,
            min_spacing_deg: 0.5,
        }
    }
}

impl InflateOptions {
    /// Target clamped to `1..=MAX_TARGET_COUNT`, spacing floored at
    /// [`MIN_SPACING_FLOOR_DEG`].
    pub fn normalized(self) -> Self {
        let spacing = if self.min_spacing_deg.is_finite() {
            self.min_spacing_deg
        } else {
            Self::default().min_spacing_deg
        };
        Self {
            target_count: self.target_count.clamp(1, MAX_TARGET_COUNT),
            min_spacing_deg: spacing.max(MIN_SPACING_FLOOR_DEG),
        }
    }
}

/// Result of [`AirportSynthesizer::inflate_with_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct Inflation {
    pub points: Vec<Point>,
    pub metrics: Metrics,
}

/// Deterministic, land-constrained densification of a sparse point set.
///
/// Output is a pure function of the valid input points, the options and the
/// index: the generator is seeded from a fixed constant mixed with the input
/// size and the target.
#[derive(Debug, Clone, Default)]
pub struct AirportSynthesizer {
    options: InflateOptions,
}

impl AirportSynthesizer {
    pub fn new(options: InflateOptions) -> Self {
        Self {
            options: options.normalized(),
        }
    }

    pub fn options(&self) -> &InflateOptions {
        &self.options
    }

    pub fn inflate(&self, base: &[Point], index: Option<&CountryIndex>) -> Vec<Point> {
        self.inflate_with_report(base, index).points
    }

    pub fn inflate_with_report(&self, base: &[Point], index: Option<&CountryIndex>) -> Inflation {
        let valid: Vec<&Point> = base.iter().filter(|p| p.is_valid()).collect();
        let mut metrics = Metrics::new();
        metrics.set_gauge("airports.input.valid", valid.len() as i64);
        metrics.set_gauge("airports.target", self.options.target_count as i64);

        if valid.is_empty() {
            debug!(input = base.len(), "no valid base points; nothing to inflate");
            metrics.set_gauge("airports.count", 0);
            return Inflation {
                points: Vec::new(),
                metrics,
            };
        }

        let mut run = Run::new(&self.options, valid.len(), index);
        run.keep_real(&valid);
        if run.is_full() {
            run.points.truncate(run.target);
        } else {
            run.fill_polar();
            run.spread();
            run.gap_fill();
            run.relaxed_fill();
        }

        run.finish(&mut metrics);
        Inflation {
            points: run.points,
            metrics,
        }
    }
}

/// Shorthand for `AirportSynthesizer::new(*options).inflate(base, index)`.
pub fn inflate(base: &[Point], index: Option<&CountryIndex>, options: &InflateOptions) -> Vec<Point> {
    AirportSynthesizer::new(*options).inflate(base, index)
}

pub fn inflate_with_report(
    base: &[Point],
    index: Option<&CountryIndex>,
    options: &InflateOptions,
) -> Inflation {
    AirportSynthesizer::new(*options).inflate_with_report(base, index)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Placement {
    Accepted,
    Water,
    Crowded,
}

#[derive(Debug, Default, Clone, Copy)]
struct StageTally {
    attempts: u64,
    accepted: u64,
    water: u64,
    crowded: u64,
    gated: u64,
}

impl StageTally {
    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Accepted => self.accepted += 1,
            Placement::Water => self.water += 1,
            Placement::Crowded => self.crowded += 1,
        }
    }
}

struct Run<'a> {
    rng: SynthRng,
    target: usize,
    spacing: f64,
    grid: SpacingGrid,
    land: LandCache<'a>,
    points: Vec<Point>,
    next_synthetic: usize,
    north: usize,
    south: usize,
    south_polar: usize,
    south_target: usize,
    north_target: usize,
    stages: Vec<(&'static str, StageTally)>,
}

impl<'a> Run<'a> {
    fn new(options: &InflateOptions, valid_len: usize, index: Option<&'a CountryIndex>) -> Self {
        let target = options.target_count;
        let seed = SYNTHETIC_SEED ^ ((valid_len as u64) << 10) ^ target as u64;
        let south_target = (target as f64 * SOUTH_SHARE).floor() as usize;
        Self {
            rng: seeded(seed),
            target,
            spacing: options.min_spacing_deg,
            grid: SpacingGrid::new(options.min_spacing_deg),
            land: LandCache::new(index, LAND_CELL_DEG),
            points: Vec::with_capacity(target.min(PREALLOC_LIMIT)),
            next_synthetic: 1,
            north: 0,
            south: 0,
            south_polar: 0,
            south_target,
            north_target: target - south_target,
            stages: Vec::with_capacity(5),
        }
    }

    fn is_full(&self) -> bool {
        self.points.len() >= self.target
    }

    fn place(&mut self, lat: f64, lon: f64, name: Option<String>) -> Placement {
        let lat = clamp_lat(lat, LAT_LIMIT_DEG);
        let lon = wrap_lon(lon);
        if !self.land.is_land(lat, lon) {
            return Placement::Water;
        }
        if !self.grid.has_room(lat, lon) {
            return Placement::Crowded;
        }

        let name = name.unwrap_or_else(|| {
            let id = self.next_synthetic;
            self.next_synthetic += 1;
            format!("LND-{id:05}")
        });

        self.grid.insert(lat, lon);
        if lat < 0.0 {
            self.south += 1;
        } else {
            self.north += 1;
        }
        if lat <= SOUTH_POLAR_BAND_LAT {
            self.south_polar += 1;
        }
        self.points.push(Point::named(lat, lon, name));
        Placement::Accepted
    }

    /// Accepts with higher probability the further a hemisphere lags its target.
    fn hemisphere_accepts(&mut self, lat: f64) -> bool {
        let (desired, current) = if lat < 0.0 {
            (self.south_target, self.south)
        } else {
            (self.north_target, self.north)
        };
        let pressure = (desired as f64 - current as f64) / desired.max(1) as f64;
        let probability = (0.52 + pressure * 0.9).clamp(0.12, 1.0);
        unit(&mut self.rng) <= probability
    }

    fn sample_sphere(&mut self) -> (f64, f64) {
        let y = unit(&mut self.rng) * 2.0 - 1.0;
        let lat = y.asin().to_degrees() * (LAT_LIMIT_DEG / 90.0);
        let lon = unit(&mut self.rng) * 360.0 - 180.0;
        (lat, lon)
    }

    fn keep_real(&mut self, valid: &[&Point]) {
        let cap = ((self.target as f64 * REAL_KEEP_SHARE).round() as usize)
            .max(1)
            .min(valid.len());

        let (mut south, mut north): (Vec<&Point>, Vec<&Point>) =
            valid.iter().copied().partition(|p| p.lat < 0.0);
        south.shuffle(&mut self.rng);
        north.shuffle(&mut self.rng);

        let mut tally = StageTally::default();
        let mut kept = 0usize;
        while kept < cap {
            let south_ratio = self.south as f64 / self.south_target.max(1) as f64;
            let north_ratio = self.north as f64 / self.north_target.max(1) as f64;
            let pick_south = (south_ratio <= north_ratio && !south.is_empty()) || north.is_empty();
            let Some(src) = (if pick_south { south.pop() } else { north.pop() }) else {
                break;
            };

            tally.attempts += 1;
            let name = src
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("REAL-{}", kept + 1));
            let placement = self.place(src.lat, src.lon, Some(name));
            tally.record(placement);
            if placement == Placement::Accepted {
                kept += 1;
            }
        }

        debug!(cap, kept, "kept real points");
        self.stages.push(("seed", tally));
    }

    fn fill_polar(&mut self) {
        let polar_target = (self.target as f64 * SOUTH_POLAR_SHARE).floor() as usize;
        let mut budget = AttemptBudget::scaled(7000, 24.0, self.target);
        let mut tally = StageTally::default();

        while !self.is_full() && self.south_polar < polar_target && budget.try_consume() {
            tally.attempts += 1;
            let lat = SOUTH_POLAR_BAND_LAT
                - unit(&mut self.rng) * (LAT_LIMIT_DEG - SOUTH_POLAR_BAND_LAT.abs());
            let lon = unit(&mut self.rng) * 360.0 - 180.0;
            let placement = self.place(lat, lon, None);
            tally.record(placement);
        }

        debug!(
            polar_target,
            polar = self.south_polar,
            used = budget.used(),
            "south polar band"
        );
        self.stages.push(("polar", tally));
    }

    fn spread(&mut self) {
        let spread_target = ((self.target as f64 * SPREAD_SHARE).floor() as usize).min(self.target);
        let len = spread_target.saturating_mul(14).max(70_000);
        let stride = coprime_stride(SPIRAL_STRIDE, len);
        let golden_angle = PI * (3.0 - 5f64.sqrt());
        let offset = (unit(&mut self.rng) * len as f64).floor() as usize % len;
        let theta_offset = unit(&mut self.rng) * PI * 2.0;

        let mut budget = AttemptBudget::new(len as u64);
        let mut tally = StageTally::default();
        let mut i = 0usize;

        while self.points.len() < spread_target && budget.try_consume() {
            let ii = (offset + i * stride) % len;
            i += 1;
            tally.attempts += 1;

            let y = 1.0 - 2.0 * (ii as f64 + 0.5) / len as f64;
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden_angle * ii as f64 + theta_offset;

            let lat = y.asin().to_degrees() + (unit(&mut self.rng) - 0.5) * self.spacing * 0.62;
            let lon = (r * theta.sin()).atan2(r * theta.cos()).to_degrees()
                + (unit(&mut self.rng) - 0.5) * self.spacing * 1.12;

            if lat.abs() > LAT_LIMIT_DEG {
                continue;
            }
            if !self.hemisphere_accepts(lat) {
                tally.gated += 1;
                continue;
            }
            let placement = self.place(lat, lon, None);
            tally.record(placement);
        }

        debug!(
            spread_target,
            count = self.points.len(),
            used = budget.used(),
            limit = budget.limit(),
            "spiral spread"
        );
        self.stages.push(("spread", tally));
    }

    fn gap_fill(&mut self) {
        let mut budget = AttemptBudget::scaled(72_000, 52.0, self.target);
        let mut tally = StageTally::default();

        while !self.is_full() && budget.try_consume() {
            tally.attempts += 1;
            let (lat, lon) = self.sample_sphere();
            if !self.hemisphere_accepts(lat) {
                tally.gated += 1;
                continue;
            }
            let placement = self.place(lat, lon, None);
            tally.record(placement);
        }

        debug!(count = self.points.len(), used = budget.used(), "random gap fill");
        self.stages.push(("gap", tally));
    }

    fn relaxed_fill(&mut self) {
        let mut budget = AttemptBudget::scaled(5000, 1.2, self.target);
        let mut tally = StageTally::default();

        while !self.is_full() && budget.try_consume() {
            tally.attempts += 1;
            let (lat, lon) = self.sample_sphere();
            let placement = self.place(lat, lon, None);
            tally.record(placement);
        }

        debug!(count = self.points.len(), used = budget.used(), "relaxed fill");
        self.stages.push(("relaxed", tally));
    }

    fn finish(&self, metrics: &mut Metrics) {
        for (stage, tally) in &self.stages {
            metrics.inc_counter(format!("airports.{stage}.attempts"), tally.attempts);
            metrics.inc_counter(format!("airports.{stage}.accepted"), tally.accepted);
            metrics.inc_counter("airports.rejected.water", tally.water);
            metrics.inc_counter("airports.rejected.spacing", tally.crowded);
            metrics.inc_counter("airports.rejected.hemisphere", tally.gated);
        }
        metrics.inc_counter("airports.land.lookups", self.land.lookups());
        metrics.inc_counter("airports.land.polygon_tests", self.land.polygon_tests());
        metrics.set_gauge("airports.count", self.points.len() as i64);
        metrics.set_gauge("airports.south", self.south as i64);
        metrics.set_gauge("airports.south_polar", self.south_polar as i64);

        if self.points.len() < self.target {
            warn!(
                count = self.points.len(),
                target = self.target,
                "attempt budgets exhausted before reaching target"
            );
        }
        info!(
            count = self.points.len(),
            north = self.north,
            south = self.south,
            south_polar = self.south_polar,
            "inflated airports"
        );
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Smallest stride `>= preferred` sharing no factor with `len`, so that
/// `(offset + i * stride) % len` visits every index exactly once.
fn coprime_stride(preferred: usize, len: usize) -> usize {
    if len <= 1 {
        return 1;
    }
    let mut stride = preferred.max(1);
    while gcd(stride, len) != 1 {
        stride += 1;
    }
    stride
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        AirportSynthesizer, InflateOptions, MAX_TARGET_COUNT, coprime_stride, inflate,
        inflate_with_report,
    };
    use crate::grid::separation_sq;
    use crate::point::Point;
    use countries::{CountryIndex, FeatureCollection, Geometry, PolygonFeature};
    use pretty_assertions::assert_eq;

    fn square_index(min: f64, max: f64) -> CountryIndex {
        let fc = FeatureCollection::new(vec![PolygonFeature::new(
            "sq",
            Geometry::Polygon(vec![vec![
                [min, min],
                [max, min],
                [max, max],
                [min, max],
                [min, min],
            ]]),
        )]);
        CountryIndex::build(fc.shared())
    }

    fn scattered(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let lat = -60.0 + (i % 12) as f64 * 10.0;
                let lon = -170.0 + (i / 12) as f64 * 15.0;
                Point::new(lat, lon)
            })
            .collect()
    }

    fn opts(target_count: usize, min_spacing_deg: f64) -> InflateOptions {
        InflateOptions {
            target_count,
            min_spacing_deg,
        }
    }

    #[test]
    fn empty_or_invalid_input_yields_nothing() {
        assert!(inflate(&[], None, &InflateOptions::default()).is_empty());
        let junk = vec![Point::new(f64::NAN, 0.0), Point::new(95.0, 0.0), Point::new(0.0, 200.0)];
        assert!(inflate(&junk, None, &opts(100, 1.0)).is_empty());
    }

    #[test]
    fn options_are_floored() {
        let o = opts(0, 0.01).normalized();
        assert_eq!(o.target_count, 1);
        assert_eq!(o.min_spacing_deg, 0.15);
        assert_eq!(opts(10, f64::NAN).normalized().min_spacing_deg, 0.5);
    }

    #[test]
    fn oversized_target_is_clamped_not_fatal() {
        let huge = opts(usize::MAX / 2, 80.0);
        assert_eq!(huge.normalized().target_count, MAX_TARGET_COUNT);

        let report = inflate_with_report(&[Point::new(1.0, 1.0)], None, &huge);
        assert!(!report.points.is_empty());
        assert!(report.points.len() < 100);
        assert_eq!(report.metrics.gauge("airports.target"), Some(MAX_TARGET_COUNT as i64));
    }

    #[test]
    fn coprime_stride_skips_shared_factors() {
        assert_eq!(coprime_stride(7919, 70_000), 7919);
        assert_eq!(coprime_stride(7919, 7919 * 10), 7921);
        assert_eq!(coprime_stride(4, 10), 7);
        assert_eq!(coprime_stride(5, 1), 1);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let base = scattered(30);
        let a = inflate(&base, None, &opts(300, 1.5));
        let b = inflate(&base, None, &opts(300, 1.5));
        assert_eq!(a, b);
    }

    #[test]
    fn accepted_points_keep_minimum_spacing() {
        let spacing = 2.0;
        let points = inflate(&scattered(40), None, &opts(400, spacing));
        assert_eq!(points.len(), 400);
        for (i, a) in points.iter().enumerate() {
            assert!(a.is_valid());
            assert!(a.lat.abs() <= 89.0);
            for b in &points[i + 1..] {
                let d = separation_sq(a.lat, a.lon, b.lat, b.lon);
                assert!(d >= spacing * spacing - 1e-9, "{a:?} and {b:?} too close");
            }
        }
    }

    #[test]
    fn output_stays_on_land() {
        let index = square_index(0.0, 30.0);
        let base = vec![
            Point::new(5.0, 5.0),
            Point::new(-20.0, 10.0),
            Point::new(25.0, 25.0),
        ];
        let points = inflate(&base, Some(&index), &opts(200, 0.5));
        assert!(!points.is_empty());
        assert!(points.len() <= 200);
        for p in &points {
            assert!(index.contains(p.lat, p.lon), "{p:?} is off land");
        }
    }

    #[test]
    fn southern_and_polar_shares_are_boosted() {
        let report = inflate_with_report(&scattered(60), None, &opts(500, 0.5));
        let points = &report.points;
        assert_eq!(points.len(), 500);

        let polar = points.iter().filter(|p| p.lat <= -70.0).count();
        assert!(polar >= 40, "polar {polar}");
        let south = points.iter().filter(|p| p.lat < 0.0).count() as f64 / points.len() as f64;
        assert!((0.3..=0.6).contains(&south), "south share {south}");

        assert_eq!(report.metrics.gauge("airports.count"), Some(500));
        assert_eq!(report.metrics.gauge("airports.south_polar"), Some(polar as i64));
        assert!(report.metrics.counter("airports.polar.accepted") >= 40);
    }

    #[test]
    fn keeps_a_capped_share_of_real_points() {
        let mut base: Vec<Point> = scattered(50)
            .into_iter()
            .enumerate()
            .map(|(i, p)| Point::named(p.lat, p.lon, format!("A{i}")))
            .collect();
        base[0].name = None;

        let points = inflate(&base, None, &opts(1000, 0.5));
        let real: Vec<&Point> = points
            .iter()
            .filter(|p| !p.name.as_deref().unwrap_or("").starts_with("LND-"))
            .collect();
        assert_eq!(real.len(), 40);

        let names: HashSet<&str> = points.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names.len(), points.len());
        assert!(names.contains("LND-00001"));
    }

    #[test]
    fn sparse_land_degrades_to_fewer_points() {
        // Edges sit on land-cache cell boundaries (multiples of 0.12deg).
        let index = square_index(0.0, 1.2);
        let synth = AirportSynthesizer::new(opts(1000, 0.5));
        let points = synth.inflate(&[Point::new(0.6, 0.6)], Some(&index));
        assert!(!points.is_empty());
        assert!(points.len() < 1000);
        assert!(points.iter().all(|p| index.contains(p.lat, p.lon)));
    }
}
