//! Transverse Mercator projection on the GRS80 ellipsoid.
//!
//! Uses the Krüger series to sixth order in the third flattening, which is
//! accurate to well below a millimetre within a UTM zone. ETRS89 and WGS84
//! share this ellipsoid to within 0.1 mm and their datums differ by less than
//! a metre, so no datum shift is applied.

/// GRS80 semi-major axis in metres.
const SEMI_MAJOR: f64 = 6_378_137.0;

/// GRS80 flattening.
const FLATTENING: f64 = 1.0 / 298.257_222_101;

/// UTM scale factor on the central meridian.
const SCALE: f64 = 0.9996;

/// UTM false easting in metres.
pub(super) const FALSE_EASTING: f64 = 500_000.0;

/// Newton iterations allowed when recovering latitude from conformal latitude.
const MAX_ITERATIONS: usize = 10;

/// Precomputed series coefficients for one ellipsoid.
struct Series {
    eccentricity: f64,
    /// Rectifying radius scaled by `SCALE`.
    radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

fn series() -> Series {
    let f = FLATTENING;
    let n = f / (2.0 - f);
    let n2 = n * n;
    let n3 = n2 * n;
    let n4 = n3 * n;
    let n5 = n4 * n;
    let n6 = n5 * n;

    let rectifying = SEMI_MAJOR / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

    Series {
        eccentricity: (f * (2.0 - f)).sqrt(),
        radius: SCALE * rectifying,
        alpha: [
            n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3 + 41.0 / 180.0 * n4 - 127.0 / 288.0 * n5
                + 7891.0 / 37800.0 * n6,
            13.0 / 48.0 * n2 - 3.0 / 5.0 * n3 + 557.0 / 1440.0 * n4 + 281.0 / 630.0 * n5
                - 1_983_433.0 / 1_935_360.0 * n6,
            61.0 / 240.0 * n3 - 103.0 / 140.0 * n4
                + 15061.0 / 26880.0 * n5
                + 167_603.0 / 181_440.0 * n6,
            49561.0 / 161_280.0 * n4 - 179.0 / 168.0 * n5 + 6_601_661.0 / 7_257_600.0 * n6,
            34729.0 / 80640.0 * n5 - 3_418_889.0 / 1_995_840.0 * n6,
            212_378_941.0 / 319_334_400.0 * n6,
        ],
        beta: [
            n / 2.0 - 2.0 / 3.0 * n2 + 37.0 / 96.0 * n3 - 1.0 / 360.0 * n4 - 81.0 / 512.0 * n5
                + 96199.0 / 604_800.0 * n6,
            1.0 / 48.0 * n2 + 1.0 / 15.0 * n3 - 437.0 / 1440.0 * n4 + 46.0 / 105.0 * n5
                - 1_118_711.0 / 3_870_720.0 * n6,
            17.0 / 480.0 * n3 - 37.0 / 840.0 * n4 - 209.0 / 4480.0 * n5 + 5569.0 / 90720.0 * n6,
            4397.0 / 161_280.0 * n4 - 11.0 / 504.0 * n5 - 830_251.0 / 7_257_600.0 * n6,
            4583.0 / 161_280.0 * n5 - 108_847.0 / 3_991_680.0 * n6,
            20_648_693.0 / 638_668_800.0 * n6,
        ],
    }
}

/// Central meridian of a UTM zone, in degrees.
pub(super) fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Project geographic degrees onto a northern UTM zone.
///
/// Returns `(easting, northing)` in metres.
pub(super) fn forward(zone: u8, lon: f64, lat: f64) -> (f64, f64) {
    let s = series();
    let e = s.eccentricity;

    let phi = lat.to_radians();
    let dlambda = (lon - central_meridian(zone)).to_radians();

    let sin_phi = phi.sin();
    let tau = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();

    let xi_p = tau.atan2(dlambda.cos());
    let eta_p = (dlambda.sin() / (1.0 + tau * tau).sqrt()).atanh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, a) in s.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    (FALSE_EASTING + s.radius * eta, s.radius * xi)
}

/// Unproject northern UTM metres back to geographic degrees.
///
/// Returns `(longitude, latitude)`.
pub(super) fn inverse(zone: u8, easting: f64, northing: f64) -> (f64, f64) {
    let s = series();
    let e = s.eccentricity;
    let e2 = e * e;

    let xi = northing / s.radius;
    let eta = (easting - FALSE_EASTING) / s.radius;

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, b) in s.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= b * (k * xi).sin() * (k * eta).cosh();
        eta_p -= b * (k * xi).cos() * (k * eta).sinh();
    }

    // Tangent of the conformal latitude.
    let tau_p = xi_p.sin() / (eta_p.sinh().powi(2) + xi_p.cos().powi(2)).sqrt();
    let dlambda = eta_p.sinh().atan2(xi_p.cos());

    let mut tau = tau_p;
    for _ in 0..MAX_ITERATIONS {
        let root = (1.0 + tau * tau).sqrt();
        let sigma = (e * (e * tau / root).atanh()).sinh();
        let tau_i = tau * (1.0 + sigma * sigma).sqrt() - sigma * root;
        let delta = (tau_p - tau_i) / (1.0 + tau_i * tau_i).sqrt() * (1.0 + (1.0 - e2) * tau * tau)
            / ((1.0 - e2) * root);
        tau += delta;
        if delta.abs() < 1e-14 {
            break;
        }
    }

    (
        central_meridian(zone) + dlambda.to_degrees(),
        tau.atan().to_degrees(),
    )
}
