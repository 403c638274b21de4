//! Linear interpolation over sampled curves and a bracketed root finder.
//!
//! Axes are assumed strictly ascending. That precondition is documented,
//! not checked: an unordered axis gives meaningless results.

use num_complex::Complex64;

const MAX_ROOT_ITERATIONS: usize = 64;
const ROOT_TOLERANCE: f64 = 1e-12;

/// Finds the pair of samples around `x` and the weight of the upper one.
///
/// Returns `None` when `x` lies outside `[xs[0], xs[n - 1]]` or is NaN.
fn locate(xs: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    let n = xs.len();
    if n == 0 || x.is_nan() || x < xs[0] || x > xs[n - 1] {
        return None;
    }
    if n == 1 {
        return Some((0, 0, 0.0));
    }

    let upper = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let lower = upper - 1;
    let span = xs[upper] - xs[lower];
    let weight = if span == 0.0 { 0.0 } else { (x - xs[lower]) / span };
    Some((lower, upper, weight))
}

/// Linear interpolation of `ys` over the whole axis `xs`, evaluated at `x`.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let (lower, upper, weight) = locate(xs, x)?;
    Some(ys[lower] + (ys[upper] - ys[lower]) * weight)
}

/// Complex counterpart of [`interpolate`]; real and imaginary parts are
/// interpolated independently.
pub fn interpolate_complex(xs: &[f64], zs: &[Complex64], x: f64) -> Option<Complex64> {
    let (lower, upper, weight) = locate(xs, x)?;
    Some(zs[lower] + (zs[upper] - zs[lower]) * weight)
}

/// Two-sample linear interpolant used to resolve a single threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl LinearSegment {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Segment through samples `i` and `j` of a curve.
    pub fn between(xs: &[f64], ys: &[f64], i: usize, j: usize) -> Self {
        Self::new(xs[i], ys[i], xs[j], ys[j])
    }

    pub fn slope(&self) -> f64 {
        (self.y1 - self.y0) / (self.x1 - self.x0)
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.y0 + (x - self.x0) * self.slope()
    }

    /// Whether `level` lies between the two sample values (inclusive).
    pub fn brackets(&self, level: f64) -> bool {
        (self.y0 - level) * (self.y1 - level) <= 0.0
    }

    /// Abscissa where the segment reaches `level`, seeded at `x0`.
    ///
    /// If the segment does not bracket `level` the upper sample is returned.
    pub fn crossing(&self, level: f64) -> f64 {
        if !self.brackets(level) || self.x0 == self.x1 {
            return self.x1;
        }
        let slope = self.slope();
        find_root(|x| self.eval(x) - level, |_| slope, self.x0, (self.x0, self.x1))
    }
}

/// Newton iteration safeguarded by bisection inside a bracket.
///
/// `f` must change sign over `bracket` (or vanish at one end). Newton steps
/// that leave the current bracket fall back to bisection.
pub fn find_root<F, D>(f: F, df: D, seed: f64, bracket: (f64, f64)) -> f64
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let (mut lo, mut hi) = if bracket.0 <= bracket.1 {
        bracket
    } else {
        (bracket.1, bracket.0)
    };

    let mut f_lo = f(lo);
    if f_lo == 0.0 {
        return lo;
    }
    if f(hi) == 0.0 {
        return hi;
    }

    let tol = (hi - lo) * ROOT_TOLERANCE;
    let mut x = seed.clamp(lo, hi);

    for _ in 0..MAX_ROOT_ITERATIONS {
        let fx = f(x);
        if fx == 0.0 {
            return x;
        }

        if (fx < 0.0) == (f_lo < 0.0) {
            lo = x;
            f_lo = fx;
        } else {
            hi = x;
        }

        let d = df(x);
        let step = if d != 0.0 { fx / d } else { f64::NAN };
        let next = x - step;

        if step.is_finite() && next >= lo && next <= hi {
            if step.abs() <= tol {
                return next;
            }
            x = next;
        } else {
            x = 0.5 * (lo + hi);
            if hi - lo <= tol {
                return x;
            }
        }
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interpolates_inside_and_rejects_outside() {
        let xs = [1.0, 2.0, 4.0];
        let ys = [10.0, 20.0, 0.0];
        assert_relative_eq!(interpolate(&xs, &ys, 1.5).unwrap(), 15.0);
        assert_relative_eq!(interpolate(&xs, &ys, 3.0).unwrap(), 10.0);
        assert_relative_eq!(interpolate(&xs, &ys, 4.0).unwrap(), 0.0);
        assert_relative_eq!(interpolate(&xs, &ys, 1.0).unwrap(), 10.0);
        assert!(interpolate(&xs, &ys, 0.5).is_none());
        assert!(interpolate(&xs, &ys, 4.5).is_none());
        assert!(interpolate(&xs, &ys, f64::NAN).is_none());
    }

    #[test]
    fn interpolates_complex_parts_independently() {
        let xs = [0.0, 1.0];
        let zs = [Complex64::new(0.0, 2.0), Complex64::new(4.0, 0.0)];
        let z = interpolate_complex(&xs, &zs, 0.25).unwrap();
        assert_relative_eq!(z.re, 1.0);
        assert_relative_eq!(z.im, 1.5);
    }

    #[test]
    fn segment_crossing_matches_analytic_root() {
        let segment = LinearSegment::new(100.0, 3.0, 200.0, 1.0);
        assert_relative_eq!(segment.crossing(2.5), 125.0, max_relative = 1e-12);
        assert_relative_eq!(segment.crossing(3.0), 100.0);
        // not bracketed: falls back to the upper sample
        assert_relative_eq!(segment.crossing(0.0), 200.0);
    }

    #[test]
    fn root_finder_handles_nonlinear_functions() {
        let root = find_root(|x| x * x - 2.0, |x| 2.0 * x, 0.0, (0.0, 2.0));
        assert_relative_eq!(root, 2.0_f64.sqrt(), max_relative = 1e-10);

        // zero derivative at the seed forces a bisection step first
        let root = find_root(|x| x.powi(3) - 1.0, |x| 3.0 * x * x, 0.0, (-1.0, 3.0));
        assert_relative_eq!(root, 1.0, max_relative = 1e-10);
    }
}
