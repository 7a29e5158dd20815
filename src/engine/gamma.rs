use statrs::distribution::{Continuous, Normal};

/// Black-Scholes gamma of a European option.
///
/// Expired or degenerate inputs (`time <= 0`, `vol <= 0`, `spot <= 0`) contribute
/// no exposure and return 0. Any non-finite intermediate (e.g. a non-positive
/// strike reaching the log) also yields 0, so the result is always finite and
/// non-negative.
pub fn gamma(spot: f64, strike: f64, time: f64, rate: f64, vol: f64) -> f64 {
    if !(time > 0.0 && vol > 0.0 && spot > 0.0) {
        return 0.0;
    }

    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return 0.0;
    };

    let vol_sqrt_t = vol * time.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / vol_sqrt_t;
    let g = normal.pdf(d1) / (spot * vol_sqrt_t);

    if g.is_finite() && g > 0.0 {
        g
    } else {
        0.0
    }
}
