use std::sync::Arc;

use countries::{FeatureCollection, IndexCache};
use heatmap::{DensityRaster, DensityRasterBuilder};
use runtime::Metrics;
use synth::rng::seeded;
use synth::{AirportSynthesizer, CountryFlightStats, CountryRoutes, Point, RouteSet, RouteTopologySynthesizer};
use tracing::{debug, info};

use crate::config::SynthConfig;

/// Countries reported in the run summary.
const SUMMARY_COUNTRIES: usize = 5;

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub airports: Vec<Point>,
    pub routes: RouteSet,
    pub heatmap: Arc<DensityRaster>,
    pub heatmap_fell_back: bool,
    pub metrics: Metrics,
    /// Busiest countries by route count, ties broken by code.
    pub busiest: Vec<(String, CountryFlightStats)>,
}

/// Runs inflate, routes and heatmap over one boundary set.
pub fn run(
    config: &SynthConfig,
    countries: &Arc<FeatureCollection>,
    base: &[Point],
    cache: &IndexCache,
) -> Synthesis {
    let index = cache.get_or_build(countries);
    let index = (!index.is_empty()).then_some(index.as_ref());

    let inflation = AirportSynthesizer::new(config.airports).inflate_with_report(base, index);

    let synthesizer = RouteTopologySynthesizer::new(config.routes);
    let routes = match config.route_seed {
        Some(seed) => synthesizer.build_with_rng(&inflation.points, index, &mut seeded(seed)),
        None => synthesizer.build(&inflation.points, index),
    };
    info!(
        routes = routes.len(),
        requested = config.routes.count,
        seeded = config.route_seed.is_some(),
        "route network built"
    );

    let outcome = DensityRasterBuilder::new(config.heatmap)
        .build_async(&routes.routes)
        .wait();

    let busiest = busiest_countries(&routes, SUMMARY_COUNTRIES);
    for (code, stats) in &busiest {
        info!(country = %code, routes = stats.routes, flights = stats.now, earlier = stats.ten_min_ago, "country traffic");
    }

    let mut metrics = inflation.metrics;
    metrics.merge(network_metrics(config, &routes, &outcome.raster, outcome.fell_back));
    let snapshot = metrics.snapshot();
    for (name, value) in &snapshot.counters {
        debug!(metric = %name, value, "run counter");
    }
    for (name, value) in &snapshot.gauges {
        debug!(metric = %name, value, "run gauge");
    }

    Synthesis {
        airports: inflation.points,
        routes,
        heatmap: outcome.raster,
        heatmap_fell_back: outcome.fell_back,
        metrics,
        busiest,
    }
}

fn network_metrics(
    config: &SynthConfig,
    routes: &RouteSet,
    heatmap: &DensityRaster,
    fell_back: bool,
) -> Metrics {
    let mut m = Metrics::new();
    m.set_gauge("routes.requested", config.routes.count as i64);
    m.set_gauge("routes.count", routes.len() as i64);
    let tagged = routes
        .routes
        .iter()
        .filter(|r| !r.iso_a.is_empty() && !r.iso_b.is_empty())
        .count();
    m.set_gauge("routes.tagged", tagged as i64);
    m.set_gauge("heatmap.cells", heatmap.values().len() as i64);
    m.inc_counter("heatmap.fallbacks", u64::from(fell_back));
    m
}

fn busiest_countries(routes: &RouteSet, limit: usize) -> Vec<(String, CountryFlightStats)> {
    let by_country = CountryRoutes::from_routes(&routes.routes);
    let mut rows: Vec<(String, CountryFlightStats)> = by_country
        .codes()
        .map(|code| (code.to_string(), by_country.stats(&routes.routes, code, 0.0)))
        .collect();
    rows.sort_by(|a, b| b.1.routes.cmp(&a.1.routes).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::config::SynthConfig;
    use countries::{FeatureCollection, Geometry, IndexCache, PolygonFeature};
    use pretty_assertions::assert_eq;
    use synth::{InflateOptions, Point, RouteOptions};

    fn square(code: &str, lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> PolygonFeature {
        let ring = vec![[lon0, lat0], [lon1, lat0], [lon1, lat1], [lon0, lat1], [lon0, lat0]];
        PolygonFeature::new(code, Geometry::Polygon(vec![ring])).with_property("ISO_A3", code)
    }

    fn config() -> SynthConfig {
        SynthConfig {
            airports: InflateOptions {
                target_count: 80,
                min_spacing_deg: 1.0,
            },
            routes: RouteOptions {
                count: 40,
                radius: 1.0,
            },
            route_seed: Some(11),
            ..SynthConfig::default()
        }
    }

    #[test]
    fn end_to_end_on_two_countries() {
        let countries = FeatureCollection::new(vec![
            square("WST", -36.0, 0.0, -12.0, 30.0),
            square("EST", 12.0, -30.0, 36.0, 0.0),
        ])
        .shared();
        let base = vec![Point::named(15.0, -24.0, "W1"), Point::named(-15.0, 24.0, "E1")];
        let cache = IndexCache::new();

        let out = run(&config(), &countries, &base, &cache);
        assert_eq!(cache.len(), 1);
        assert!(!out.airports.is_empty());
        assert!(!out.routes.is_empty());
        assert!(out.routes.routes.iter().all(|r| !r.iso_a.is_empty() && !r.iso_b.is_empty()));
        assert!(!out.heatmap_fell_back);
        assert_eq!(out.heatmap.max(), 1.0);

        let routes = out.routes.len() as i64;
        assert_eq!(out.metrics.gauge("routes.count"), Some(routes));
        assert_eq!(out.metrics.gauge("routes.tagged"), Some(routes));
        assert_eq!(out.metrics.gauge("heatmap.cells"), Some(512 * 256));
        assert_eq!(out.metrics.counter("heatmap.fallbacks"), 0);
        assert_eq!(out.metrics.gauge("airports.count"), Some(out.airports.len() as i64));
        assert!(out.busiest.len() <= 2);
        assert!(out.busiest.iter().all(|(code, s)| (code == "WST" || code == "EST") && s.routes > 0));
    }

    #[test]
    fn seeded_runs_repeat() {
        let countries = FeatureCollection::new(vec![square("SQR", 0.0, 0.0, 30.0, 30.0)]).shared();
        let base = vec![Point::new(15.0, 15.0)];
        let cache = IndexCache::new();
        let a = run(&config(), &countries, &base, &cache);
        let b = run(&config(), &countries, &base, &cache);
        assert_eq!(a.airports, b.airports);
        assert_eq!(a.routes, b.routes);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_boundaries_mean_unconstrained() {
        let countries = FeatureCollection::default().shared();
        let base = vec![Point::new(0.0, 0.0)];
        let out = run(&config(), &countries, &base, &IndexCache::new());
        assert_eq!(out.airports.len(), 80);
        assert!(out.routes.routes.iter().all(|r| r.iso_a.is_empty()));
        assert!(out.busiest.is_empty());
    }
}
