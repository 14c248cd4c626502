//! Geodesic math shared by every traffic component.
//!
//! Two distance families live here deliberately: exact-on-sphere great-circle
//! helpers (haversine, destination point, arc interpolation) and fast local
//! per-degree scale factors for flat-earth approximations over short ranges.
//! Callers choose per their cost/accuracy tradeoff; do not unify them.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Feet per meter.
pub const FT_PER_M: f64 = 3.280_839_895;

/// Meters per foot.
pub const M_PER_FT: f64 = 1.0 / FT_PER_M;

/// Meters per second per knot.
pub const MPS_PER_KT: f64 = 0.514_444;

/// Meters per nautical mile.
pub const M_PER_NM: f64 = 1852.0;

/// Calculate great-circle distance between two points in meters using the
/// Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial true bearing from point 1 to point 2, degrees in [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_deg(x.atan2(y).to_degrees())
}

/// Destination point given start, true bearing, and distance along the
/// great circle. Returns `(lat, lon, course)` where `course` is the outbound
/// true course at the destination (reciprocal of the back-bearing).
pub fn offset_by_bearing_deg(
    lat: f64,
    lon: f64,
    distance_m: f64,
    bearing: f64,
) -> (f64, f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon, normalize_deg(bearing));
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let bearing_rad = bearing.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    let lat2_deg = lat2.to_degrees();
    let lon2_deg = lon2.to_degrees();
    // Outbound course at the destination: reciprocal of the back-bearing.
    let course = reciprocal_deg(bearing_deg(lat2_deg, lon2_deg, lat, lon));
    (lat2_deg, lon2_deg, course)
}

/// Normalize a bearing to [0, 360).
pub fn normalize_deg(bearing: f64) -> f64 {
    bearing.rem_euclid(360.0)
}

/// Reciprocal (back) bearing, degrees in [0, 360).
pub fn reciprocal_deg(bearing: f64) -> f64 {
    normalize_deg(bearing + 180.0)
}

/// Signed relative bearing from a heading to a target bearing, normalized to
/// [-180, 180]. Negative = target left of the nose.
pub fn relative_bearing_deg(target_bearing: f64, heading: f64) -> f64 {
    let mut rel = normalize_deg(target_bearing) - normalize_deg(heading);
    if rel > 180.0 {
        rel -= 360.0;
    } else if rel < -180.0 {
        rel += 360.0;
    }
    rel
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Feet per degree of latitude. Local flat-earth scale factor; only valid
/// over short ranges.
pub fn ft_per_deg_lat(lat_deg: f64) -> f64 {
    meters_per_deg_lat(lat_deg) * FT_PER_M
}

/// Feet per degree of longitude. Local flat-earth scale factor; collapses
/// toward zero near the poles.
pub fn ft_per_deg_lon(lat_deg: f64) -> f64 {
    meters_per_deg_lon(lat_deg) * FT_PER_M
}

/// Unit vector on the sphere for a geodetic point.
fn to_unit_vec3(lat_deg: f64, lon_deg: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Geodetic point for a unit vector on the sphere.
fn vec3_to_geodetic(v: [f64; 3]) -> (f64, f64) {
    let hyp = (v[0] * v[0] + v[1] * v[1]).sqrt();
    let lat = v[2].atan2(hyp);
    let lon = v[1].atan2(v[0]);
    (lat.to_degrees(), lon.to_degrees())
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

/// Rodrigues rotation of `v` about the unit axis `k` by `angle_rad`.
fn rotate_about_axis(v: [f64; 3], k: [f64; 3], angle_rad: f64) -> [f64; 3] {
    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();
    let kxv = cross(k, v);
    let kdv = dot(k, v);
    [
        v[0] * cos_a + kxv[0] * sin_a + k[0] * kdv * (1.0 - cos_a),
        v[1] * cos_a + kxv[1] * sin_a + k[1] * kdv * (1.0 - cos_a),
        v[2] * cos_a + kxv[2] * sin_a + k[2] * kdv * (1.0 - cos_a),
    ]
}

/// Point a fraction of the way along the great-circle arc from point 1 to
/// point 2. The rotation axis is the cross product of the endpoint unit
/// vectors; the start vector is rotated by `fraction * total_angle` about it.
///
/// Coincident endpoints return the start point. Antipodal endpoints have no
/// unique arc; an arbitrary orthogonal axis is used (not exact at the poles).
pub fn intermediate_point(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
    fraction: f64,
) -> (f64, f64) {
    let a = to_unit_vec3(lat1, lon1);
    let b = to_unit_vec3(lat2, lon2);
    let cos_total = dot(a, b).clamp(-1.0, 1.0);
    let total_angle = cos_total.acos();

    let mut axis = cross(a, b);
    let mut axis_len = norm(axis);
    if axis_len < 1e-12 {
        if cos_total > 0.0 {
            return (lat1, lon1);
        }
        // Antipodal: deflect through any axis orthogonal to the start vector.
        axis = cross(a, [0.0, 0.0, 1.0]);
        axis_len = norm(axis);
        if axis_len < 1e-12 {
            axis = [0.0, 1.0, 0.0];
            axis_len = 1.0;
        }
    }
    let k = [axis[0] / axis_len, axis[1] / axis_len, axis[2] / axis_len];

    let rotated = rotate_about_axis(a, k, fraction.clamp(0.0, 1.0) * total_angle);
    vec3_to_geodetic(rotated)
}
