use std::fs;
use std::path::Path;

use countries::{FeatureCollection, Geometry, PolygonFeature, Ring};
use geojson::{GeoJson, Value, feature::Id};
use synth::Point;
use tracing::{debug, info};

use crate::error::ToolError;

fn read(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads country boundaries. Only Polygon and MultiPolygon features are kept;
/// their order in the file is the overlap tie-break order.
pub fn load_countries(path: &Path) -> Result<FeatureCollection, ToolError> {
    let text = read(path)?;
    let collection = parse_countries(&text).map_err(|source| ToolError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    if collection.is_empty() {
        return Err(ToolError::NoPolygons {
            path: path.to_path_buf(),
        });
    }
    info!(features = collection.len(), path = %path.display(), "loaded countries");
    Ok(collection)
}

pub fn parse_countries(text: &str) -> Result<FeatureCollection, geojson::Error> {
    let geojson: GeoJson = text.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let total = features.len();
    let mut out = Vec::with_capacity(total);
    for (i, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref().and_then(|g| convert(&g.value)) else {
            continue;
        };
        let id = match &feature.id {
            Some(Id::String(s)) => s.clone(),
            Some(Id::Number(n)) => n.to_string(),
            None => format!("feature-{i}"),
        };
        let mut polygon = PolygonFeature::new(id, geometry);
        polygon.properties = feature.properties.unwrap_or_default();
        out.push(polygon);
    }

    debug!(total, kept = out.len(), "converted geojson features");
    Ok(FeatureCollection::new(out))
}

fn convert(value: &Value) -> Option<Geometry> {
    match value {
        Value::Polygon(rings) => Some(Geometry::Polygon(rings.iter().map(|r| ring(r)).collect())),
        Value::MultiPolygon(parts) => Some(Geometry::MultiPolygon(
            parts
                .iter()
                .map(|rings| rings.iter().map(|r| ring(r)).collect())
                .collect(),
        )),
        _ => None,
    }
}

/// Positions without two coordinates become NaN and are skipped downstream.
fn ring(positions: &[Vec<f64>]) -> Ring {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => [*lon, *lat],
            _ => [f64::NAN, f64::NAN],
        })
        .collect()
}

/// Loads the airport list. Records that do not parse as a point are dropped
/// one by one instead of failing the file.
pub fn load_airports(path: &Path) -> Result<Vec<Point>, ToolError> {
    let text = read(path)?;
    let points = parse_airports(&text).map_err(|source| ToolError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if points.is_empty() {
        return Err(ToolError::NoAirports {
            path: path.to_path_buf(),
        });
    }
    info!(airports = points.len(), path = %path.display(), "loaded airports");
    Ok(points)
}

pub fn parse_airports(text: &str) -> Result<Vec<Point>, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let total = records.len();
    let points: Vec<Point> = records
        .into_iter()
        .filter_map(|r| serde_json::from_value(r).ok())
        .collect();
    if points.len() < total {
        debug!(dropped = total - points.len(), "skipped malformed airport records");
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::{parse_airports, parse_countries};
    use countries::{CountryIndex, Geometry};
    use pretty_assertions::assert_eq;
    use synth::Point;

    const COUNTRIES: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "id": 7,
          "properties": {"ISO_A3": "SQR", "NAME": "Square"},
          "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
        },
        {
          "type": "Feature",
          "properties": {"ISO_A3": "-99", "ADM0_A3": "ISL"},
          "geometry": {"type": "MultiPolygon", "coordinates": [
            [[[20,20],[21,20],[21,21],[20,21],[20,20]]],
            [[[30,-5],[32,-5],[32,-3],[30,-3],[30,-5]]]
          ]}
        },
        {
          "type": "Feature",
          "properties": {"NAME": "capital"},
          "geometry": {"type": "Point", "coordinates": [5,5]}
        }
      ]
    }"#;

    #[test]
    fn converts_polygon_features_and_skips_others() {
        let fc = parse_countries(COUNTRIES).expect("parse");
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].id, "7");
        assert_eq!(fc.features[1].id, "feature-1");
        assert!(matches!(fc.features[1].geometry, Geometry::MultiPolygon(ref p) if p.len() == 2));

        let index = CountryIndex::build(fc.shared());
        assert_eq!(index.country_code(5.0, 5.0), Some("SQR"));
        assert_eq!(index.country_code(-4.0, 31.0), Some("ISL"));
        assert_eq!(index.country_code(50.0, 50.0), None);
    }

    #[test]
    fn malformed_geojson_is_an_error() {
        assert!(parse_countries("{\"type\": \"Nope\"}").is_err());
    }

    #[test]
    fn airport_records_are_filtered_individually() {
        let json = r#"[
          {"name": "A", "latitude": 1.5, "longitude": 2.5, "iata": "AAA"},
          {"name": "broken", "latitude": "north"},
          {"latitude": -10, "longitude": 100}
        ]"#;
        let points = parse_airports(json).expect("parse");
        assert_eq!(points, vec![Point::named(1.5, 2.5, "A"), Point::new(-10.0, 100.0)]);
        assert!(parse_airports("{}").is_err());
    }
}
