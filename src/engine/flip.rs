use crate::types::ExposureMap;

/// Strike where per-strike exposure crosses from negative to positive,
/// nearest to spot. Falls back to `spot` when no crossing exists.
///
/// Each adjacent pair `(lo, hi)` with `exp(lo) < 0 < exp(hi)` nominates
/// whichever of its two strikes is closer to spot (`lo` on a tie). The
/// nomination with the smallest distance wins; earlier crossings win ties.
pub fn locate_flip(by_strike: &ExposureMap, spot: f64) -> f64 {
    let strikes: Vec<(f64, f64)> = by_strike.iter().map(|(k, v)| (k.value(), *v)).collect();

    let mut flip_price = spot;
    let mut min_distance = f64::INFINITY;

    for pair in strikes.windows(2) {
        let (lo, lo_exp) = pair[0];
        let (hi, hi_exp) = pair[1];
        if !(lo_exp < 0.0 && hi_exp > 0.0) {
            continue;
        }

        let candidate = if (hi - spot).abs() < (lo - spot).abs() { hi } else { lo };
        let distance = (candidate - spot).abs();
        if distance < min_distance {
            min_distance = distance;
            flip_price = candidate;
        }
    }

    flip_price
}
