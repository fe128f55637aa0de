//! Spherical-earth geometry: great-circle distances and path sampling.
//!
//! All travel paths are assumed to follow great circles between station
//! positions, so the forward problem stays linear in slowness. A mean
//! spherical earth is accurate enough at regional tomography scales compared
//! to the measurement uncertainty of the input velocities.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of arc on the mean sphere.
pub const KM_PER_DEG: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Great-circle distance between two (lon, lat) points, in km (haversine).
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn to_unit_vec(lon: f64, lat: f64) -> [f64; 3] {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn to_lon_lat(v: [f64; 3]) -> (f64, f64) {
    let lon = v[1].atan2(v[0]).to_degrees();
    let lat = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt()).to_degrees();
    (lon, lat)
}

/// Points along the great circle from `(lon1, lat1)` to `(lon2, lat2)` at
/// fractional positions `fracs` (0 = first station, 1 = second).
///
/// Spherical linear interpolation of the unit position vectors; degenerates
/// to linear interpolation when the stations (nearly) coincide.
pub fn great_circle_points(
    lon1: f64,
    lat1: f64,
    lon2: f64,
    lat2: f64,
    fracs: impl Iterator<Item = f64>,
) -> Vec<(f64, f64)> {
    let a = to_unit_vec(lon1, lat1);
    let b = to_unit_vec(lon2, lat2);
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();
    let sin_omega = omega.sin();

    fracs
        .map(|f| {
            if sin_omega < 1e-9 {
                // Stations coincide (or are antipodal within noise): fall back
                // to linear interpolation of coordinates.
                return (lon1 + f * (lon2 - lon1), lat1 + f * (lat2 - lat1));
            }
            let wa = ((1.0 - f) * omega).sin() / sin_omega;
            let wb = (f * omega).sin() / sin_omega;
            to_lon_lat([
                wa * a[0] + wb * b[0],
                wa * a[1] + wb * b[1],
                wa * a[2] + wb * b[2],
            ])
        })
        .collect()
}
