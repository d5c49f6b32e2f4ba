//! "Nice" tick steps for coordinate grids.

use crate::error::{Result, WcsError};
use crate::format::DisplayHint;

/// Chosen tick step and the number of grid points to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStep {
    pub step: f64,
    pub point_count: usize,
}

/// Extra points drawn beyond the requested count so the grid covers the
/// span edges.
const EXTRA_POINTS: usize = 3;

/// Round to one significant digit: returns (digit, exponent) with digit in
/// 1..=9.
fn leading_digit(raw: f64) -> (u32, i32) {
    let mut exponent = raw.log10().floor() as i32;
    let mut digit = (raw / 10f64.powi(exponent)).round() as u32;
    if digit >= 10 {
        digit = 1;
        exponent += 1;
    }
    (digit.max(1), exponent)
}

/// Pick a step for `desired_point_count` ticks over `world_span`.
///
/// Sexagesimal axes snap to steps that are whole degrees, arc minutes or
/// arc seconds (or hours, minutes, seconds); other axes snap to 2, 5 or 10
/// times a power of ten.
pub fn tick_step(hint: DisplayHint, world_span: f64, desired_point_count: usize) -> Result<TickStep> {
    if desired_point_count == 0 {
        return Err(WcsError::InvalidTick("point count must be positive".into()));
    }
    let mut raw = world_span.abs() / desired_point_count as f64;
    if !raw.is_finite() || raw <= 0.0 {
        return Err(WcsError::InvalidTick(format!(
            "span {} gives no usable step",
            world_span
        )));
    }

    let hours = hint == DisplayHint::HoursAsMinutesSeconds;
    if hours {
        raw /= 15.0;
    }

    let (d, e) = leading_digit(raw);
    let pow = 10f64.powi(e);

    let mut step = if hint.is_sexagesimal() {
        if raw >= 0.95 {
            match d {
                5.. => 10.0 * pow,
                3..=4 => 5.0 * pow,
                _ => 2.0 * pow,
            }
        } else if raw >= 0.095 {
            match d {
                7.. => 1.0,
                4..=6 => 0.5,
                2..=3 => 0.25,
                _ => 10.0 / 60.0,
            }
        } else if raw >= 0.0095 {
            match d {
                5.. => 5.0 / 60.0,
                2..=4 => 2.0 / 60.0,
                _ => 1.0 / 60.0,
            }
        } else if raw >= 0.00095 {
            match d {
                5.. => 30.0 / 3600.0,
                3..=4 => 15.0 / 3600.0,
                2 => 7.5 / 3600.0,
                _ => 5.0 / 3600.0,
            }
        } else {
            // Fractions of an arc second scaled by the magnitude.
            let mantissa = match d {
                7.. => 3.0,
                4..=6 => 2.0,
                _ => 1.0,
            } / 0.36;
            mantissa * pow
        }
    } else {
        match d {
            7.. => 10.0 * pow,
            3..=6 => 5.0 * pow,
            _ => 2.0 * pow,
        }
    };

    if hours {
        step *= 15.0;
    }

    Ok(TickStep {
        step,
        point_count: desired_point_count + EXTRA_POINTS,
    })
}

/// First tick at or before the start of the span `[world_a, world_b]`.
pub fn first_tick(world_a: f64, world_b: f64, step: f64) -> f64 {
    let start = world_a.min(world_b);
    start - start % step - step
}
