use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[lon, lat]` in degrees.
pub type Coord = [f64; 2];
/// Closed ring of vertices. Closing duplicates are allowed and harmless.
pub type Ring = Vec<Coord>;
/// Ring 0 is the outer boundary; every following ring is a hole.
pub type Polygon = Vec<Ring>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Polygon parts; a plain polygon is a single part.
    pub fn parts(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(parts) => parts,
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Coord> {
        self.parts().iter().flatten().flatten()
    }
}

// Property keys carrying an ISO-3166 alpha-3 style code, most specific first.
const COUNTRY_CODE_KEYS: [&str; 4] = ["ISO_A3", "ADM0_A3", "BRK_A3", "SU_A3"];
// Natural Earth placeholder for "no code assigned".
const MISSING_CODE: &str = "-99";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonFeature {
    pub id: String,
    pub geometry: Geometry,
    /// Opaque property bag, passed through untouched.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl PolygonFeature {
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// First usable alpha-3 code from the property bag, if any.
    pub fn country_code(&self) -> Option<&str> {
        COUNTRY_CODE_KEYS.iter().find_map(|key| {
            let code = self.properties.get(*key)?.as_str()?;
            (!code.is_empty() && code != MISSING_CODE).then_some(code)
        })
    }
}

/// Ordered feature list. Order is significant: it is the tie-break order for
/// overlapping features in [`crate::CountryIndex::query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<PolygonFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<PolygonFeature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, PolygonFeature};
    use pretty_assertions::assert_eq;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ]])
    }

    #[test]
    fn country_code_prefers_iso_and_skips_placeholders() {
        let f = PolygonFeature::new("a", square())
            .with_property("ISO_A3", "-99")
            .with_property("ADM0_A3", "FRA")
            .with_property("SU_A3", "XYZ");
        assert_eq!(f.country_code(), Some("FRA"));

        let none = PolygonFeature::new("b", square()).with_property("ISO_A3", 12);
        assert_eq!(none.country_code(), None);
    }

    #[test]
    fn multipolygon_parts_and_vertices() {
        let g = Geometry::MultiPolygon(vec![
            vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
            vec![vec![[5.0, 5.0], [6.0, 5.0], [5.0, 6.0]]],
        ]);
        assert_eq!(g.parts().len(), 2);
        assert_eq!(g.vertices().count(), 6);
        assert_eq!(square().parts().len(), 1);
    }

    #[test]
    fn deserializes_geojson_shaped_geometry() {
        let json = r#"{
            "id": "sq",
            "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] },
            "properties": { "ISO_A3": "SQR" }
        }"#;
        let f: PolygonFeature = serde_json::from_str(json).expect("parse");
        assert_eq!(f.geometry, square());
        assert_eq!(f.country_code(), Some("SQR"));
    }
}
