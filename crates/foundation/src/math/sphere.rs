use super::Vec3;

/// Mean Earth radius (kilometers) used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maps latitude/longitude (degrees) onto a sphere of the given radius.
///
/// Axis convention: +Y is the north pole, longitude 0 lies on +X mirrored
/// through the antimeridian (`theta = lon + 180`), which is the layout the
/// globe renderer uses for its textures.
pub fn lat_lon_to_vector(lat_deg: f64, lon_deg: f64, radius: f64) -> Vec3 {
    let phi = (90.0 - lat_deg).to_radians();
    let theta = (lon_deg + 180.0).to_radians();

    Vec3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// Unit direction for a latitude/longitude pair (degrees).
pub fn lat_lon_to_unit(lat_deg: f64, lon_deg: f64) -> Vec3 {
    lat_lon_to_vector(lat_deg, lon_deg, 1.0)
}

/// Inverse of [`lat_lon_to_vector`]; the magnitude of `v` is ignored.
///
/// Returns `(lat_deg, lon_deg)` with longitude in `[-180, 180]`.
pub fn vector_to_lat_lon(v: Vec3) -> (f64, f64) {
    let n = v.normalize();
    let lat = 90.0 - n.y.clamp(-1.0, 1.0).acos().to_degrees();
    let theta = n.z.atan2(-n.x).to_degrees();
    let mut lon = theta - 180.0;
    if lon < -180.0 {
        lon += 360.0;
    }
    (lat, lon)
}

pub fn clamp_lat(lat_deg: f64, limit_deg: f64) -> f64 {
    lat_deg.clamp(-limit_deg, limit_deg)
}

/// Wraps a longitude into `[-180, 180]`. Values already in range are kept as-is,
/// so `180.0` stays `180.0`.
pub fn wrap_lon(lon_deg: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon_deg) {
        return lon_deg;
    }
    (lon_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Absolute longitude difference across the shorter side of the antimeridian.
pub fn lon_delta_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 { 360.0 - d } else { d }
}

/// Cheap angular separation of two unit directions: `1 - dot`
/// (0 for identical, 2 for antipodal).
pub fn angular_separation(a: Vec3, b: Vec3) -> f64 {
    1.0 - a.dot(b)
}

/// Great-circle distance in kilometers.
pub fn haversine_km(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let d_lat = (lat2_deg - lat1_deg).to_radians();
    let d_lon = (lon2_deg - lon1_deg).to_radians();
    let a = (d_lat * 0.5).sin().powi(2)
        + lat1_deg.to_radians().cos() * lat2_deg.to_radians().cos() * (d_lon * 0.5).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::{
        angular_separation, haversine_km, lat_lon_to_unit, lat_lon_to_vector, lon_delta_deg,
        vector_to_lat_lon, wrap_lon,
    };

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn north_pole_is_plus_y() {
        let v = lat_lon_to_vector(90.0, 0.0, 2.0);
        assert_close(v.x, 0.0, 1e-12);
        assert_close(v.y, 2.0, 1e-12);
        assert_close(v.z, 0.0, 1e-12);
    }

    #[test]
    fn prime_meridian_equator_is_plus_x() {
        // theta = 180deg -> x = -cos(180) = 1.
        let v = lat_lon_to_unit(0.0, 0.0);
        assert_close(v.x, 1.0, 1e-12);
        assert_close(v.y, 0.0, 1e-12);
        assert_close(v.z, 0.0, 1e-12);
    }

    #[test]
    fn round_trip_lat_lon() {
        for &(lat, lon) in &[(10.0, 20.0), (-45.5, -170.25), (60.0, 179.5), (-89.0, 0.0)] {
            let (lat_rt, lon_rt) = vector_to_lat_lon(lat_lon_to_vector(lat, lon, 7.0));
            assert_close(lat_rt, lat, 1e-9);
            assert_close(lon_rt, lon, 1e-9);
        }
    }

    #[test]
    fn wrap_lon_handles_out_of_range() {
        assert_eq!(wrap_lon(180.0), 180.0);
        assert_close(wrap_lon(190.0), -170.0, 1e-12);
        assert_close(wrap_lon(-190.0), 170.0, 1e-12);
        assert_close(wrap_lon(540.0), -180.0, 1e-12);
    }

    #[test]
    fn lon_delta_crosses_antimeridian() {
        assert_close(lon_delta_deg(179.0, -179.0), 2.0, 1e-12);
        assert_close(lon_delta_deg(-10.0, 10.0), 20.0, 1e-12);
    }

    #[test]
    fn separation_range() {
        let a = lat_lon_to_unit(0.0, 0.0);
        let b = lat_lon_to_unit(0.0, 180.0);
        assert_close(angular_separation(a, a), 0.0, 1e-12);
        assert_close(angular_separation(a, b), 2.0, 1e-12);
    }

    #[test]
    fn haversine_quarter_meridian() {
        let d = haversine_km(0.0, 0.0, 90.0, 0.0);
        assert_close(d, std::f64::consts::FRAC_PI_2 * 6371.0, 1e-6);
    }
}
