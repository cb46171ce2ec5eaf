use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Fraction `done / total` as Fixed64, clamped to `[0, 1]`.
/// A zero `total` counts as complete.
#[inline]
pub fn ratio(done: Ticks, total: Ticks) -> Fixed64 {
    if total == 0 || done >= total {
        return Fixed64::ONE;
    }
    let done = Fixed64::saturating_from_num(done);
    let total = Fixed64::saturating_from_num(total);
    done.checked_div(total).unwrap_or(Fixed64::ONE)
}

/// Convert Fixed64 to f64. Use only for display, never in the sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}
