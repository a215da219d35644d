use std::collections::HashMap;

use countries::CountryIndex;
use foundation::math::lon_delta_deg;

/// Lower bound on the longitude scale factor, so cells near the poles are
/// not treated as infinitely narrow.
pub const COS_LAT_FLOOR: f64 = 0.18;

/// Squared separation in degrees with the longitude delta scaled by
/// `cos(mean latitude)` (floored at [`COS_LAT_FLOOR`]). Symmetric in its
/// arguments and aware of the antimeridian.
pub fn separation_sq(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let cos_lat = ((lat_a + lat_b) * 0.5).to_radians().cos().max(COS_LAT_FLOOR);
    let d_lat = lat_a - lat_b;
    let d_lon = lon_delta_deg(lon_a, lon_b) * cos_lat;
    d_lat * d_lat + d_lon * d_lon
}

/// Bucketed accepted points for minimum-spacing rejection.
///
/// Cells are `min_spacing` tall and at least `min_spacing / COS_LAT_FLOOR`
/// wide, with a width that divides 360 exactly. Any point closer than
/// `min_spacing` in the corrected metric therefore sits in the same or an
/// adjacent cell, with longitude indices wrapping across the dateline.
#[derive(Debug, Clone)]
pub struct SpacingGrid {
    min_spacing: f64,
    lat_cell: f64,
    lon_cell: f64,
    lon_cells: i64,
    cells: HashMap<(i64, i64), Vec<(f64, f64)>>,
    len: usize,
}

impl SpacingGrid {
    pub fn new(min_spacing_deg: f64) -> Self {
        let min_spacing = min_spacing_deg.max(f64::MIN_POSITIVE);
        let needed_width = min_spacing / COS_LAT_FLOOR;
        let lon_cells = ((360.0 / needed_width).floor() as i64).max(1);
        Self {
            min_spacing,
            lat_cell: min_spacing,
            lon_cell: 360.0 / lon_cells as f64,
            lon_cells,
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn key(&self, lat: f64, lon: f64) -> (i64, i64) {
        let lat_idx = ((lat + 90.0) / self.lat_cell).floor() as i64;
        let lon_idx = (((lon + 180.0) / self.lon_cell).floor() as i64).rem_euclid(self.lon_cells);
        (lat_idx, lon_idx)
    }

    fn lon_neighbours(&self, lon_idx: i64) -> Vec<i64> {
        let mut out: Vec<i64> = [lon_idx - 1, lon_idx, lon_idx + 1]
            .iter()
            .map(|j| j.rem_euclid(self.lon_cells))
            .collect();
        // Fewer than three columns would otherwise scan a bucket twice.
        out.sort_unstable();
        out.dedup();
        out
    }

    /// True when no stored point lies closer than the minimum spacing.
    pub fn has_room(&self, lat: f64, lon: f64) -> bool {
        let (lat_idx, lon_idx) = self.key(lat, lon);
        let min_sq = self.min_spacing * self.min_spacing;
        let columns = self.lon_neighbours(lon_idx);

        for di in -1..=1 {
            for &j in &columns {
                let Some(bucket) = self.cells.get(&(lat_idx + di, j)) else {
                    continue;
                };
                if bucket
                    .iter()
                    .any(|&(p_lat, p_lon)| separation_sq(lat, lon, p_lat, p_lon) < min_sq)
                {
                    return false;
                }
            }
        }
        true
    }

    pub fn insert(&mut self, lat: f64, lon: f64) {
        let key = self.key(lat, lon);
        self.cells.entry(key).or_default().push((lat, lon));
        self.len += 1;
    }
}

/// Land cache cell size (degrees).
pub const LAND_CELL_DEG: f64 = 0.12;

/// Memoized land/water verdicts per fixed-size cell.
///
/// Every candidate in a cell shares the verdict of the first one tested
/// there. Without an index (or with an empty one) everything is land.
#[derive(Debug)]
pub struct LandCache<'a> {
    index: Option<&'a CountryIndex>,
    cell_deg: f64,
    verdicts: HashMap<(i64, i64), bool>,
    lookups: u64,
    polygon_tests: u64,
}

impl<'a> LandCache<'a> {
    pub fn new(index: Option<&'a CountryIndex>, cell_deg: f64) -> Self {
        Self {
            index: index.filter(|i| !i.is_empty()),
            cell_deg,
            verdicts: HashMap::new(),
            lookups: 0,
            polygon_tests: 0,
        }
    }

    pub fn is_land(&mut self, lat: f64, lon: f64) -> bool {
        self.lookups += 1;
        let Some(index) = self.index else {
            return true;
        };

        let key = (
            ((lat + 90.0) / self.cell_deg).floor() as i64,
            ((lon + 180.0) / self.cell_deg).floor() as i64,
        );
        if let Some(&verdict) = self.verdicts.get(&key) {
            return verdict;
        }

        self.polygon_tests += 1;
        let verdict = index.contains(lat, lon);
        self.verdicts.insert(key, verdict);
        verdict
    }

    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Lookups that needed an exact polygon test.
    pub fn polygon_tests(&self) -> u64 {
        self.polygon_tests
    }
}
