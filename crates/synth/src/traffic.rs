use std::collections::BTreeMap;
use std::f64::consts::TAU;

use serde::Serialize;

use crate::route::{Route, TRAFFIC_MIN};

/// Seconds between "now" and the comparison sample in [`CountryFlightStats`].
pub const TEN_MINUTES_S: f64 = 600.0;

/// Route ids grouped by the country codes of their endpoints.
///
/// A route between two points of the same country is listed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRoutes {
    by_code: BTreeMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountryFlightStats {
    pub now: u64,
    pub ten_min_ago: u64,
    pub routes: usize,
}

impl CountryRoutes {
    pub fn from_routes(routes: &[Route]) -> Self {
        let mut by_code: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for route in routes {
            if !route.iso_a.is_empty() {
                by_code.entry(route.iso_a.clone()).or_default().push(route.id);
            }
            if !route.iso_b.is_empty() && route.iso_b != route.iso_a {
                by_code.entry(route.iso_b.clone()).or_default().push(route.id);
            }
        }
        Self { by_code }
    }

    pub fn routes_for(&self, code: &str) -> &[usize] {
        self.by_code.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.by_code.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Synthetic flight counts for `code` at `time_s` and ten minutes earlier.
    /// `routes` must be the slice this grouping was built from.
    pub fn stats(&self, routes: &[Route], code: &str, time_s: f64) -> CountryFlightStats {
        let code = code.trim();
        if code.is_empty() {
            return CountryFlightStats::default();
        }
        let ids = self.routes_for(code);
        CountryFlightStats {
            now: flights_at(routes, ids, time_s),
            ten_min_ago: flights_at(routes, ids, time_s - TEN_MINUTES_S),
            routes: ids.len(),
        }
    }
}

/// Time-modulated activity of one route, in `[0.18, 1.15]`.
pub fn activity(route: &Route, time_s: f64) -> f64 {
    let w1 = 0.6 + 0.4 * (time_s * 0.019 + route.seed * 11.7).sin();
    let w2 = 0.65 + 0.35 * (time_s * 0.007 + route.phase * TAU + route.seed * 3.9).sin();
    let w3 = 0.75 + 0.25 * (time_s * 0.003 + route.id as f64 * 0.8).sin();
    (0.46 * w1 + 0.38 * w2 + 0.16 * w3).clamp(0.18, 1.15)
}

/// Synthetic number of flights airborne on the given routes. Ids that do not
/// resolve to a route are ignored.
pub fn flights_at(routes: &[Route], ids: &[usize], time_s: f64) -> u64 {
    let total: f64 = ids
        .iter()
        .filter_map(|&id| routes.get(id))
        .map(|route| {
            let boost = (0.85 + (route.traffic - TRAFFIC_MIN) * 0.25).clamp(0.82, 1.05);
            f64::from(route.traffic_count) * activity(route, time_s) * boost
        })
        .sum();
    total.round().max(0.0) as u64
}
