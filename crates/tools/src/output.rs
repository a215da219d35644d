use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use heatmap::DensityRaster;
use serde::Serialize;
use synth::{Point, Route};

use crate::error::ToolError;

/// Flat, render-ready view of a [`Route`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord<'a> {
    pub id: usize,
    pub from: &'a Point,
    pub to: &'a Point,
    pub iso_a: &'a str,
    pub iso_b: &'a str,
    pub distance_km: f64,
    pub arc_boost: f64,
    pub traffic: f64,
    pub traffic_count: u8,
    pub hub: f64,
    pub speed: f64,
    pub phase: f64,
    pub seed: f64,
    pub size: f64,
    pub dir: i8,
    pub p0: [f64; 3],
    pub p1: [f64; 3],
    pub p2: [f64; 3],
}

impl<'a> From<&'a Route> for RouteRecord<'a> {
    fn from(r: &'a Route) -> Self {
        Self {
            id: r.id,
            from: &r.from,
            to: &r.to,
            iso_a: &r.iso_a,
            iso_b: &r.iso_b,
            distance_km: r.distance_km,
            arc_boost: r.arc_boost,
            traffic: r.traffic,
            traffic_count: r.traffic_count,
            hub: r.hub,
            speed: r.speed,
            phase: r.phase,
            seed: r.seed,
            size: r.size,
            dir: r.dir,
            p0: r.p0.as_array(),
            p1: r.p1.as_array(),
            p2: r.p2.as_array(),
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, ToolError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ToolError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ToolError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ToolError> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, value).map_err(|source| ToolError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.flush().map_err(|source| ToolError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_airports(path: &Path, points: &[Point]) -> Result<(), ToolError> {
    write_json(path, points)
}

pub fn write_routes(path: &Path, routes: &[Route]) -> Result<(), ToolError> {
    let records: Vec<RouteRecord<'_>> = routes.iter().map(RouteRecord::from).collect();
    write_json(path, &records)
}

/// Binary greymap. Raster row 0 is the south pole, so rows are written in
/// reverse to put north at the top of the image.
pub fn encode_pgm(raster: &DensityRaster) -> Vec<u8> {
    let (w, h) = (raster.width(), raster.height());
    let mut out = format!("P5\n{w} {h}\n255\n").into_bytes();
    let gray = raster.to_gray8();
    if w > 0 {
        for row in gray.chunks_exact(w).rev() {
            out.extend_from_slice(row);
        }
    }
    out
}

pub fn write_pgm(path: &Path, raster: &DensityRaster) -> Result<(), ToolError> {
    let mut out = create(path)?;
    out.write_all(&encode_pgm(raster))
        .and_then(|()| out.flush())
        .map_err(|source| ToolError::Write {
            path: path.to_path_buf(),
            source,
        })
}
