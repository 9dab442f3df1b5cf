//! Log-space arithmetic helpers.

/// Numerically stable computation of `ln(exp(a) + exp(b))`.
///
/// Computed as `max + ln(1 + exp(min - max))` so the exponential never
/// overflows. Negative-infinity operands act as identity.
pub fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (max, min) = if a >= b { (a, b) } else { (b, a) };
    max + (min - max).exp().ln_1p()
}
