use std::sync::Arc;

use foundation::math::vector_to_lat_lon;
use parking_lot::RwLock;
use runtime::{InlineSpawner, OneShot, Spawner, ThreadSpawner, WorkerError};
use serde::{Deserialize, Serialize};
use synth::Route;
use synth::route::{TRAFFIC_MAX, TRAFFIC_MIN, bezier};
use thiserror::Error;
use tracing::{debug, warn};

use crate::kernel::GaussianKernel;
use crate::packed::PackedRoutes;
use crate::raster::DensityRaster;

pub const SAMPLES_PER_ROUTE: usize = 84;
pub const LIFT_EXPONENT: f64 = 0.55;
const NORMALIZE_FLOOR: f64 = 1e-6;
const WORKER_NAME: &str = "route-heatmap";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("raster dimensions must be non-zero, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("packed route buffer of {len} floats is not a multiple of {stride}")]
    MalformedPacked { len: usize, stride: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    pub width: usize,
    pub height: usize,
    /// Build on a worker thread; otherwise the async entry points run inline.
    pub background: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 256,
            background: true,
        }
    }
}

/// Splats every packed route into a fresh `width x height` grid.
///
/// Each route's weight, `traffic_count * (0.75 + 0.55 * traffic01)`, is spread
/// evenly over [`SAMPLES_PER_ROUTE`] points of its arc. The accumulated grid
/// is divided by its maximum (floored at 1e-6) and lifted by
/// `v^LIFT_EXPONENT`.
pub fn rasterize_packed(
    packed: &PackedRoutes,
    width: usize,
    height: usize,
) -> Result<DensityRaster, RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height });
    }

    let kernel = GaussianKernel::default();
    let mut heat = vec![0.0f64; width * height];
    let (w, h) = (width as i64, height as i64);

    for route in packed.iter() {
        let traffic01 = ((route.traffic - TRAFFIC_MIN) / (TRAFFIC_MAX - TRAFFIC_MIN)).clamp(0.0, 1.0);
        let weight = route.traffic_count * (0.75 + traffic01 * 0.55);
        let per_sample = weight / SAMPLES_PER_ROUTE as f64;

        for s in 0..SAMPLES_PER_ROUTE {
            let t = s as f64 / (SAMPLES_PER_ROUTE - 1) as f64;
            let (lat, lon) = vector_to_lat_lon(bezier(route.p0, route.p1, route.p2, t));

            let u = (lon + 180.0) / 360.0;
            let u = u - u.floor();
            let v = ((lat + 90.0) / 180.0).clamp(0.0, 1.0);
            let cx = (u * width as f64).floor() as i64;
            let cy = (v * height as f64).floor() as i64;

            for tap in kernel.taps() {
                let x = (cx + i64::from(tap.dx)).rem_euclid(w);
                let y = (cy + i64::from(tap.dy)).clamp(0, h - 1);
                heat[(y * w + x) as usize] += per_sample * tap.w;
            }
        }
    }

    let max = heat.iter().copied().fold(0.0, f64::max).max(NORMALIZE_FLOOR);
    let values = heat
        .into_iter()
        .map(|v| ((v / max).clamp(0.0, 1.0)).powf(LIFT_EXPONENT) as f32)
        .collect();

    Ok(DensityRaster::from_values(width, height, values))
}

/// Synchronous build. Invalid dimensions yield an empty grid.
pub fn build_raster(routes: &[Route], width: usize, height: usize) -> DensityRaster {
    let packed = PackedRoutes::from_routes(routes);
    rasterize_packed(&packed, width, height).unwrap_or_else(|err| {
        warn!(%err, "route heatmap not built");
        DensityRaster::zeros(width, height)
    })
}

/// Background build on a fresh thread. See [`build_raster_async_with`].
pub fn build_raster_async(routes: &[Route], width: usize, height: usize) -> PendingRaster {
    build_raster_async_with(&ThreadSpawner, routes, width, height)
}

/// Returns at once with an all-zero placeholder while `spawner` runs the
/// build on its own copy of the packed routes. The worker swaps its result
/// into the placeholder's [`RasterHandle`] as soon as it finishes, whether or
/// not the [`PendingRaster`] is still alive.
///
/// If the worker cannot be started, fails, or goes away, the build runs once
/// synchronously on the calling thread instead. The result is the same grid
/// either way.
pub fn build_raster_async_with(
    spawner: &dyn Spawner,
    routes: &[Route],
    width: usize,
    height: usize,
) -> PendingRaster {
    let packed = PackedRoutes::from_routes(routes);
    let handle = RasterHandle::new(DensityRaster::zeros(width, height));
    let mut pending = PendingRaster {
        handle: handle.clone(),
        job: None,
        fallback: Some(packed.clone()),
        width,
        height,
        fell_back: false,
    };

    // The worker publishes straight into the shared handle, so holders of a
    // handle see the finished grid even if nobody polls `pending`.
    let job = OneShot::spawn(spawner, WORKER_NAME, move || {
        rasterize_packed(&packed, width, height).map(|raster| handle.replace(raster))
    });
    match job {
        Ok(job) => {
            debug!(routes = routes.len(), width, height, "route heatmap worker started");
            pending.job = Some(job);
        }
        Err(err) => pending.fall_back(&err),
    }
    pending
}

/// Shared, swappable view of the current grid.
///
/// Readers always get a complete raster: a finished build replaces the inner
/// `Arc` wholesale, it never writes into a grid someone may be reading.
#[derive(Debug, Clone)]
pub struct RasterHandle {
    inner: Arc<RwLock<Arc<DensityRaster>>>,
}

impl RasterHandle {
    fn new(raster: DensityRaster) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(raster))),
        }
    }

    pub fn current(&self) -> Arc<DensityRaster> {
        self.inner.read().clone()
    }

    fn replace(&self, raster: DensityRaster) {
        *self.inner.write() = Arc::new(raster);
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RasterStatus {
    Pending,
    Ready { fell_back: bool },
}

#[derive(Debug, Clone)]
pub struct RasterOutcome {
    pub raster: Arc<DensityRaster>,
    /// The worker path failed and the grid was built on the calling thread.
    pub fell_back: bool,
}

/// A raster that may still be building.
#[derive(Debug)]
pub struct PendingRaster {
    handle: RasterHandle,
    job: Option<OneShot<()>>,
    fallback: Option<PackedRoutes>,
    width: usize,
    height: usize,
    fell_back: bool,
}

impl PendingRaster {
    pub fn handle(&self) -> RasterHandle {
        self.handle.clone()
    }

    /// Current grid: the zero placeholder until the build lands.
    pub fn raster(&self) -> Arc<DensityRaster> {
        self.handle.current()
    }

    /// Non-blocking. Reports whether the worker has answered, and runs the
    /// fallback if it failed.
    pub fn poll(&mut self) -> RasterStatus {
        if let Some(job) = &self.job {
            let Some(result) = job.try_take() else {
                return RasterStatus::Pending;
            };
            self.job = None;
            self.settle(result);
        }
        RasterStatus::Ready {
            fell_back: self.fell_back,
        }
    }

    pub fn wait(mut self) -> RasterOutcome {
        if let Some(job) = self.job.take() {
            let result = job.wait();
            self.settle(result);
        }
        RasterOutcome {
            raster: self.handle.current(),
            fell_back: self.fell_back,
        }
    }

    fn settle(&mut self, result: Result<(), WorkerError>) {
        match result {
            // Already published by the worker.
            Ok(()) => self.fallback = None,
            Err(err) => self.fall_back(&err),
        }
    }

    fn fall_back(&mut self, cause: &WorkerError) {
        warn!(error = %cause, "route heatmap worker unavailable; building synchronously");
        self.fell_back = true;

        let Some(packed) = self.fallback.take() else {
            return;
        };
        let raster = rasterize_packed(&packed, self.width, self.height).unwrap_or_else(|err| {
            warn!(%err, "route heatmap not built");
            DensityRaster::zeros(self.width, self.height)
        });
        self.handle.replace(raster);
    }
}

/// Heatmap builder bound to a set of [`RasterOptions`].
#[derive(Debug, Clone, Default)]
pub struct DensityRasterBuilder {
    options: RasterOptions,
}

impl DensityRasterBuilder {
    pub fn new(options: RasterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    pub fn build(&self, routes: &[Route]) -> DensityRaster {
        build_raster(routes, self.options.width, self.options.height)
    }

    /// Worker-thread build when `background` is set, inline otherwise.
    pub fn build_async(&self, routes: &[Route]) -> PendingRaster {
        let spawner: &dyn Spawner = if self.options.background {
            &ThreadSpawner
        } else {
            &InlineSpawner
        };
        build_raster_async_with(spawner, routes, self.options.width, self.options.height)
    }
}
