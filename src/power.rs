//! Power and output model.
//!
//! Pure functions computing a building instance's effective throughput and
//! power draw from its clock setting and module fill. All functions are
//! total over valid-range inputs; the optimizer only proposes settings that
//! satisfy the clock and slot invariants.

use crate::models::PowerConstants;

/// Highest clock fraction any building can reach (250%).
pub const MAX_CLOCK: f64 = 2.5;

/// Extra clock fraction unlocked per installed shard.
pub const CLOCK_PER_SHARD: f64 = 0.5;

/// Clock settings are quantized to 1/10000 (4 decimal digits).
const CLOCK_STEPS: f64 = 10_000.0;

/// Quantizes a clock fraction to 4 decimal digits, rounding half up.
///
/// # Example
///
/// ```
/// use fluxplan::power::quantize_clock;
///
/// assert_eq!(quantize_clock(1.23456), 1.2346);
/// assert_eq!(quantize_clock(0.123449), 0.1234);
/// ```
pub fn quantize_clock(clock: f64) -> f64 {
    (clock * CLOCK_STEPS).round() / CLOCK_STEPS
}

/// Quantizes a clock fraction upward to the next 1/10000 step.
///
/// Used when the quantized clock must not undershoot a required throughput.
pub fn quantize_clock_up(clock: f64) -> f64 {
    (clock * CLOCK_STEPS).ceil() / CLOCK_STEPS
}

/// Maximum clock fraction a building with `shards` installed may run at:
/// `min(2.5, 1 + 0.5 * shards)`.
pub fn max_clock_for_shards(shards: u32) -> f64 {
    (1.0 + CLOCK_PER_SHARD * shards as f64).min(MAX_CLOCK)
}

/// Fewest shards that allow running at `clock`.
///
/// Zero for any clock at or below 100%. The small tolerance absorbs
/// floating-point noise from quantized clocks sitting exactly on a shard
/// boundary.
pub fn shards_for_clock(clock: f64) -> u32 {
    if clock <= 1.0 {
        0
    } else {
        ((clock - 1.0) / CLOCK_PER_SHARD - 1e-9).ceil() as u32
    }
}

/// Module factor `(1 + filled/total)^exponent`; 1.0 for slotless buildings.
fn module_factor(filled: u32, total: u32, exponent: f64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (1.0 + filled as f64 / total as f64).powf(exponent)
}

/// Output multiplier from module fill alone (clock excluded).
///
/// Monotonically increasing in `filled`, 1.0 when empty, and bounded by the
/// fully slotted value of the catalog's curve.
pub fn output_multiplier(filled: u32, total: u32, constants: &PowerConstants) -> f64 {
    module_factor(filled, total, constants.module_output_exponent)
}

/// Effective production multiple of the base recipe rate: linear in clock,
/// scaled by the module output curve.
pub fn production_factor(
    clock: f64,
    filled: u32,
    total: u32,
    constants: &PowerConstants,
) -> f64 {
    clock * output_multiplier(filled, total, constants)
}

/// Power draw in MW of one building instance.
///
/// `base_power * clock^overclock_exponent * module_power_factor`. Boosted
/// output costs extra power: the module power factor is >= 1 and
/// monotonically increasing in the fill count.
pub fn power_usage(
    base_power_mw: f64,
    clock: f64,
    filled: u32,
    total: u32,
    constants: &PowerConstants,
) -> f64 {
    base_power_mw
        * clock.powf(constants.overclock_exponent)
        * module_factor(filled, total, constants.module_power_exponent)
}
