use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for energy
/// so that every host computes identical budgets.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. `None` for NaN, infinities and values outside
/// the Q32.32 range. Use only for configuration, never in the tick loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Scale `value / total` onto `0..=max` with integer arithmetic.
///
/// `value` is clamped to `total`. Returns `max` when `total` is zero.
#[inline]
pub fn scale(value: u32, total: u32, max: i32) -> i32 {
    if total == 0 {
        return max;
    }
    let scaled = i64::from(value.min(total)) * i64::from(max) / i64::from(total);
    i32::try_from(scaled).unwrap_or(max)
}
