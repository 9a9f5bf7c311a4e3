//! Conversions between engineering units and the chip's register encoding.
//!
//! The step frequency produced for a velocity code `v` is
//!
//! ```text
//! f_step = f_clk * v / (2^pulse_div * VELOCITY_CONSTANT)
//! ```
//!
//! so a larger `pulse_div` gives finer velocity resolution at the cost of a
//! lower ceiling. Everything here is a pure function of its inputs; writing
//! a chosen divider back to the chip is left to [`Tmc429`](crate::Tmc429).

/// Divisor between the clock frequency and one velocity code at `pulse_div = 0`.
pub const VELOCITY_CONSTANT: u32 = 65_536;
/// Hertz per megahertz.
pub const HZ_PER_MHZ: u32 = 1_000_000;
/// Largest code accepted by `V_MIN`/`V_MAX`.
pub const VELOCITY_REGISTER_MAX: u32 = 2_047;
/// Largest supported `pulse_div` exponent.
pub const PULSE_DIV_MAX: u8 = 13;
/// Width of the signed `V_TARGET`/`V_ACTUAL` fields.
pub const VELOCITY_FIELD_WIDTH: u32 = 12;
/// Width of the signed `X_TARGET`/`X_ACTUAL` fields.
pub const POSITION_FIELD_WIDTH: u32 = 24;
/// Highest clock frequency the chip is specified for.
pub const CLOCK_FREQUENCY_MAX_MHZ: u8 = 32;

#[inline]
fn divider(pulse_div: u8) -> u32 {
    1 << pulse_div.min(PULSE_DIV_MAX)
}

#[inline]
fn code_frequency(clock_mhz: u8) -> f64 {
    (f64::from(clock_mhz) * f64::from(HZ_PER_MHZ)) / f64::from(VELOCITY_CONSTANT)
}

/// Converts a velocity code into a step frequency, truncating toward zero.
pub fn velocity_to_hz(clock_mhz: u8, pulse_div: u8, velocity: i32) -> i32 {
    let hz = (code_frequency(clock_mhz) * f64::from(velocity)) / f64::from(divider(pulse_div));
    hz as i32
}

/// Converts a step frequency into a velocity code, truncating toward zero.
///
/// The result is not clamped to any register range. A zero clock frequency
/// yields a saturated code rather than a panic.
pub fn hz_to_velocity(clock_mhz: u8, pulse_div: u8, hz: i32) -> i32 {
    let x = (f64::from(hz) * f64::from(divider(pulse_div)))
        / (f64::from(clock_mhz) * f64::from(HZ_PER_MHZ));
    (x * f64::from(VELOCITY_CONSTANT)) as i32
}

/// Highest step frequency reachable with `pulse_div`, rounded down.
pub fn max_velocity_hz(clock_mhz: u8, pulse_div: u8) -> u32 {
    let numerator =
        u64::from(clock_mhz) * u64::from(HZ_PER_MHZ) * u64::from(VELOCITY_REGISTER_MAX);
    let denominator = u64::from(VELOCITY_CONSTANT) * u64::from(divider(pulse_div));
    (numerator / denominator) as u32
}

/// Highest step frequency reachable at all for the given clock.
pub fn velocity_max_max_hz(clock_mhz: u8) -> u32 {
    max_velocity_hz(clock_mhz, 0)
}

/// Picks the largest `pulse_div` whose ceiling still covers `velocity_max`.
///
/// Falls back to `0` when even the coarsest scaling cannot reach the request.
pub fn optimal_pulse_div(clock_mhz: u8, velocity_max: u32) -> u8 {
    (0..=PULSE_DIV_MAX)
        .rev()
        .find(|&pulse_div| max_velocity_hz(clock_mhz, pulse_div) >= velocity_max)
        .unwrap_or(0)
}

#[inline]
fn field_mask(width: u32) -> u64 {
    (1u64 << width.clamp(1, 32)) - 1
}

/// Reinterprets the low `width` bits of `raw` as a two's complement value.
pub fn sign_extend(raw: u32, width: u32) -> i32 {
    let width = width.clamp(1, 32);
    let raw = u64::from(raw) & field_mask(width);
    let max_positive = (1u64 << (width - 1)) - 1;
    if raw > max_positive {
        (raw as i64 - (1i64 << width)) as i32
    } else {
        raw as i32
    }
}

/// Encodes `value` as a `width`-bit two's complement field.
pub fn sign_compress(value: i32, width: u32) -> u32 {
    let width = width.clamp(1, 32);
    let mut raw = i64::from(value);
    if raw < 0 {
        raw += 1i64 << width;
    }
    (raw as u64 & field_mask(width)) as u32
}

/// Step pulse length in microseconds for the `CLK2_DIV` global divider.
pub fn step_time_us(clock_mhz: u8, clk2_div: u8) -> f64 {
    (16.0 * (1.0 + f64::from(clk2_div))) / f64::from(clock_mhz)
}
