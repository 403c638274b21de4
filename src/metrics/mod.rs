//! Scalar figures of merit extracted from sampled simulation output.
//!
//! Frequency-domain functions take an ascending frequency axis `f` in Hz and
//! the complex transfer function `h` sampled on it. Time-domain functions
//! take an ascending time axis `t` in seconds and real samples `x`.
//!
//! Every crossing metric reports the *first* crossing only. The crossing is
//! located on the sampled data, then refined on the straight line through the
//! two samples around it, which keeps noise far from the crossing out of the
//! root find.

pub mod interpolate;

use std::f64::consts::SQRT_2;

use num_complex::Complex64;

use crate::error::CalculationError;
use interpolate::{LinearSegment, interpolate, interpolate_complex};

pub type MetricResult<T> = Result<T, CalculationError>;

/// Frequency at which the low-frequency gain is sampled.
pub const REFERENCE_FREQUENCY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Reached once a sample is at or below the level.
    Falling,
    /// Reached once a sample is at or above the level.
    Rising,
}

impl Direction {
    fn reached(self, value: f64, level: f64) -> bool {
        match self {
            Direction::Falling => value <= level,
            Direction::Rising => value >= level,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Direction::Falling => Direction::Rising,
            Direction::Rising => Direction::Falling,
        }
    }
}

fn check_samples(metric: &'static str, axis: &[f64], values: usize) -> MetricResult<()> {
    if axis.len() < 2 || axis.len() != values {
        return Err(CalculationError::TooFewSamples {
            metric,
            axis: axis.len(),
            values,
        });
    }
    Ok(())
}

/// Index of the first sample satisfying `predicate`.
pub fn first_index<T>(values: &[T], predicate: impl Fn(&T) -> bool) -> Option<usize> {
    values.iter().position(predicate)
}

/// Phase in degrees with every strictly positive sample shifted down by 360°,
/// so a curve that passes -180° keeps falling instead of wrapping to +180°.
pub fn adjusted_phase_degrees(h: &[Complex64]) -> Vec<f64> {
    h.iter()
        .map(|z| {
            let degrees = z.arg().to_degrees();
            if degrees > 0.0 { degrees - 360.0 } else { degrees }
        })
        .collect()
}

fn magnitudes(h: &[Complex64]) -> Vec<f64> {
    h.iter().map(|z| z.norm()).collect()
}

fn out_of_range(metric: &'static str, axis: &[f64], target: f64) -> CalculationError {
    CalculationError::OutOfRange {
        metric,
        target,
        lower: axis[0],
        upper: axis[axis.len() - 1],
    }
}

fn value_at(metric: &'static str, axis: &[f64], values: &[f64], x: f64) -> MetricResult<f64> {
    interpolate(axis, values, x).ok_or_else(|| out_of_range(metric, axis, x))
}

fn no_crossing(metric: &'static str, values: &[f64], level: f64) -> CalculationError {
    CalculationError::NoCrossing {
        metric,
        threshold: level,
        start: values[0],
        end: values[values.len() - 1],
    }
}

/// Abscissa where `values` first reaches `level`.
///
/// A crossing at the very first sample resolves to that sample.
fn first_crossing(
    metric: &'static str,
    axis: &[f64],
    values: &[f64],
    level: f64,
    direction: Direction,
    reference: f64,
) -> MetricResult<f64> {
    let Some(index) = first_index(values, |&v| direction.reached(v, level)) else {
        return Err(CalculationError::NoCrossing {
            metric,
            threshold: level,
            start: reference,
            end: values[values.len() - 1],
        });
    };

    if index == 0 {
        return Ok(axis[0]);
    }

    let segment = LinearSegment::between(axis, values, index - 1, index);
    Ok(segment.crossing(level))
}

/// Duration of the first edge that leaves `from` and reaches `to`.
///
/// The edge starts at the first sample still on the near side of `from`, so
/// a waveform that opens past both levels is measured on its first real
/// transition. Flat stretches at `from` before the edge are not counted.
fn edge_time(
    metric: &'static str,
    t: &[f64],
    x: &[f64],
    from: f64,
    to: f64,
    direction: Direction,
) -> MetricResult<f64> {
    let behind = |v: f64| direction.opposite().reached(v, from);

    let start = first_index(x, |&v| behind(v)).ok_or_else(|| no_crossing(metric, x, from))?;
    let end = first_index(&x[start + 1..], |&v| direction.reached(v, to))
        .map(|offset| start + 1 + offset)
        .ok_or_else(|| no_crossing(metric, x, to))?;

    // Last sample before the edge that has not yet left `from`
    let departure = (start..end).rev().find(|&i| behind(x[i])).unwrap_or(start);

    let leaves = LinearSegment::between(t, x, departure, departure + 1).crossing(from);
    let arrives = LinearSegment::between(t, x, end - 1, end).crossing(to);
    Ok(arrives - leaves)
}

/// Frequency where |H| first falls to |H(1 Hz)| / √2.
pub fn bandwidth(f: &[f64], h: &[Complex64]) -> MetricResult<f64> {
    const METRIC: &str = "bandwidth";
    check_samples(METRIC, f, h.len())?;

    let amplitude = magnitudes(h);
    let reference = value_at(METRIC, f, &amplitude, REFERENCE_FREQUENCY)?;
    let threshold = reference / SQRT_2;

    first_crossing(METRIC, f, &amplitude, threshold, Direction::Falling, reference)
}

/// Frequency where |H| first falls to 1.
pub fn unity_gain_frequency(f: &[f64], h: &[Complex64]) -> MetricResult<f64> {
    const METRIC: &str = "unity gain frequency";
    check_samples(METRIC, f, h.len())?;

    let amplitude = magnitudes(h);
    first_crossing(METRIC, f, &amplitude, 1.0, Direction::Falling, amplitude[0])
}

/// Frequency where the adjusted phase first reaches -180°.
pub fn positive_feedback_frequency(f: &[f64], h: &[Complex64]) -> MetricResult<f64> {
    const METRIC: &str = "positive feedback frequency";
    check_samples(METRIC, f, h.len())?;

    let phase = adjusted_phase_degrees(h);
    first_crossing(METRIC, f, &phase, -180.0, Direction::Falling, phase[0])
}

/// Phase margin in degrees: 180° minus the magnitude of the adjusted phase at
/// the unity gain frequency.
///
/// Undefined when the phase never reaches -180° over the sampled range.
pub fn phase_margin(f: &[f64], h: &[Complex64]) -> MetricResult<f64> {
    const METRIC: &str = "phase margin";
    let ugf = unity_gain_frequency(f, h)?;

    let phase = adjusted_phase_degrees(h);
    if first_index(&phase, |&p| p <= -180.0).is_none() {
        return Err(CalculationError::NoCrossing {
            metric: METRIC,
            threshold: -180.0,
            start: phase[0],
            end: phase[phase.len() - 1],
        });
    }

    let at_ugf = value_at(METRIC, f, &phase, ugf)?;
    Ok(180.0 - at_ugf.abs())
}

/// Gain margin as a plain ratio: 1 - |H| at the positive feedback frequency.
pub fn gain_margin(f: &[f64], h: &[Complex64]) -> MetricResult<f64> {
    const METRIC: &str = "gain margin";
    let crossover = positive_feedback_frequency(f, h)?;

    let amplitude = magnitudes(h);
    Ok(1.0 - value_at(METRIC, f, &amplitude, crossover)?)
}

/// Complex low-frequency gain, H interpolated at 1 Hz.
pub fn gain(f: &[f64], h: &[Complex64]) -> MetricResult<Complex64> {
    const METRIC: &str = "gain";
    check_samples(METRIC, f, h.len())?;

    interpolate_complex(f, h, REFERENCE_FREQUENCY)
        .ok_or_else(|| out_of_range(METRIC, f, REFERENCE_FREQUENCY))
}

/// Largest absolute slope between adjacent samples.
pub fn slew_rate(t: &[f64], x: &[f64]) -> MetricResult<f64> {
    check_samples("slew rate", t, x.len())?;

    Ok(t.windows(2)
        .zip(x.windows(2))
        .filter(|(dt, _)| dt[1] != dt[0])
        .map(|(dt, dx)| ((dx[1] - dx[0]) / (dt[1] - dt[0])).abs())
        .fold(0.0, f64::max))
}

fn extrema(x: &[f64]) -> (f64, f64) {
    x.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Time the first rising edge takes from `low` to `high`.
/// Thresholds default to the waveform's minimum and maximum.
pub fn rising_time(t: &[f64], x: &[f64], low: Option<f64>, high: Option<f64>) -> MetricResult<f64> {
    const METRIC: &str = "rising time";
    check_samples(METRIC, t, x.len())?;

    let (min, max) = extrema(x);
    let low = low.unwrap_or(min);
    let high = high.unwrap_or(max);

    edge_time(METRIC, t, x, low, high, Direction::Rising)
}

/// Time the first falling edge takes from `high` to `low`.
/// Thresholds default to the waveform's maximum and minimum.
pub fn falling_time(t: &[f64], x: &[f64], high: Option<f64>, low: Option<f64>) -> MetricResult<f64> {
    const METRIC: &str = "falling time";
    check_samples(METRIC, t, x.len())?;

    let (min, max) = extrema(x);
    let high = high.unwrap_or(max);
    let low = low.unwrap_or(min);

    edge_time(METRIC, t, x, high, low, Direction::Falling)
}
