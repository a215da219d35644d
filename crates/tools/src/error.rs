use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("parse json {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("parse geojson {}: {source}", .path.display())]
    GeoJson {
        path: PathBuf,
        source: Box<geojson::Error>,
    },
    #[error("{} holds no polygon features", .path.display())]
    NoPolygons { path: PathBuf },
    #[error("{} holds no usable airport records", .path.display())]
    NoAirports { path: PathBuf },
}
