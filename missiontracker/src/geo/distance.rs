//! Ellipsoidal distance between two positions.
//!
//! Uses the Vincenty inverse formula on the WGS84 ellipsoid. The iteration
//! count is capped at 20, matching what handset location APIs do; for the
//! short distances hazards care about it converges in a handful of steps.

use super::GeoPoint;

/// WGS84 semi-major axis in metres.
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// WGS84 semi-minor axis in metres.
pub const WGS84_SEMI_MINOR_AXIS: f64 = 6_356_752.3142;

/// Maximum Vincenty iterations.
const MAX_ITERATIONS: usize = 20;

/// Convergence threshold for lambda between iterations (radians).
const CONVERGENCE_THRESHOLD: f64 = 1.0e-12;

/// Distance in metres along the ellipsoid between `from` and `to`.
///
/// Returns `0.0` for coincident points. Nearly antipodal points may not
/// converge; the last iterate is returned in that case.
pub fn distance_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    let a = WGS84_SEMI_MAJOR_AXIS;
    let b = WGS84_SEMI_MINOR_AXIS;
    let f = (a - b) / a;
    let a_sq_minus_b_sq_over_b_sq = (a * a - b * b) / (b * b);

    let lat1 = from.latitude_radians();
    let lat2 = to.latitude_radians();
    let l = to.longitude_radians() - from.longitude_radians();

    // Reduced latitudes
    let u1 = ((1.0 - f) * lat1.tan()).atan();
    let u2 = ((1.0 - f) * lat2.tan()).atan();

    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();
    let cos_u1_cos_u2 = cos_u1 * cos_u2;
    let sin_u1_sin_u2 = sin_u1 * sin_u2;

    let mut sigma = 0.0;
    let mut delta_sigma = 0.0;
    let mut big_a = 0.0;
    let mut lambda = l;

    for _ in 0..MAX_ITERATIONS {
        let lambda_orig = lambda;
        let (sin_lambda, cos_lambda) = lambda.sin_cos();

        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        let sin_sq_sigma = t1 * t1 + t2 * t2;
        let sin_sigma = sin_sq_sigma.sqrt();
        let cos_sigma = sin_u1_sin_u2 + cos_u1_cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        if sin_sigma == 0.0 {
            return 0.0;
        }

        let sin_alpha = cos_u1_cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial line: cos_sq_alpha is zero
        let cos_2sm = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1_sin_u2 / cos_sq_alpha
        };

        let u_squared = cos_sq_alpha * a_sq_minus_b_sq_over_b_sq;
        big_a = 1.0
            + (u_squared / 16384.0)
                * (4096.0 + u_squared * (-768.0 + u_squared * (320.0 - 175.0 * u_squared)));
        let big_b =
            (u_squared / 1024.0) * (256.0 + u_squared * (-128.0 + u_squared * (74.0 - 47.0 * u_squared)));
        let c = (f / 16.0) * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));

        let cos_2sm_sq = cos_2sm * cos_2sm;
        delta_sigma = big_b
            * sin_sigma
            * (cos_2sm
                + (big_b / 4.0)
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sm_sq)
                        - (big_b / 6.0)
                            * cos_2sm
                            * (-3.0 + 4.0 * sin_sq_sigma)
                            * (-3.0 + 4.0 * cos_2sm_sq)));

        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma + c * sin_sigma * (cos_2sm + c * cos_sigma * (-1.0 + 2.0 * cos_2sm_sq)));

        if (lambda - lambda_orig).abs() < CONVERGENCE_THRESHOLD {
            break;
        }
    }

    b * big_a * (sigma - delta_sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coincident_points_are_zero() {
        let p = GeoPoint::new(60.1699, 24.9384);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn test_meridian_arc_near_equator() {
        // One hundredth of a degree of latitude at the equator is ~1105.7 m
        let d = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.01, 0.0));
        assert!((d - 1105.74).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_equatorial_arc() {
        // One hundredth of a degree of longitude on the equator is ~1113.2 m
        let d = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01));
        assert!((d - 1113.19).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = GeoPoint::new(60.1699, 24.9384);
        let b = GeoPoint::new(60.1755, 24.9521);
        let ab = distance_meters(a, b);
        let ba = distance_meters(b, a);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_known_long_distance() {
        // Helsinki to Tallinn, roughly 80-90 km across the gulf
        let helsinki = GeoPoint::new(60.1699, 24.9384);
        let tallinn = GeoPoint::new(59.4370, 24.7536);
        let d = distance_meters(helsinki, tallinn);
        assert!(d > 80_000.0 && d < 90_000.0, "got {d}");
    }
}
