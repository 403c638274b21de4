mod common;

use std::f64::consts::PI;

use approx::assert_relative_eq;
use num_complex::Complex64;
use sizer::config::AcSweep;
use sizer::metrics;
use sizer::{AnalysisDefaults, CalculationError, Error, Variation};

use common::{FakeAmplifier, amplifier, logspace, response};

const THREE_POLES: &str = "A1 gain=1e3 pole=1e3 pole2=1e6 pole3=1e7";

fn sampled(netlist: &str, f: &[f64]) -> Vec<Complex64> {
    f.iter().map(|&f| response(netlist, f)).collect()
}

/// Solve `g(x) = 0` for increasing `g` on a log-spaced bracket.
fn bisect(g: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
    for _ in 0..200 {
        let mid = (lo * hi).sqrt();
        if g(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo * hi).sqrt()
}

fn phase_lag(f: f64) -> f64 {
    [1e3, 1e6, 1e7].iter().map(|p| (f / p).atan()).sum()
}

#[test]
fn single_pole_bandwidth_and_unity_gain() {
    let f = logspace(9.0, 1000);
    let h = sampled("A1 gain=1e3 pole=1e3", &f);

    assert_relative_eq!(metrics::bandwidth(&f, &h).unwrap(), 1e3, max_relative = 0.01);
    assert_relative_eq!(metrics::unity_gain_frequency(&f, &h).unwrap(), 1e6, max_relative = 0.01);
}

#[test]
fn three_pole_margins_match_analytic_values() {
    let f = logspace(9.0, 1000);
    let h = sampled(THREE_POLES, &f);

    let ugf = bisect(|x| 1.0 - response(THREE_POLES, x).norm(), 1e3, 1e9);
    let expected_pm = 180.0 - phase_lag(ugf).to_degrees();
    assert_relative_eq!(metrics::phase_margin(&f, &h).unwrap(), expected_pm, epsilon = 0.5);

    let f180 = bisect(|x| phase_lag(x) - PI, 1e3, 1e9);
    let expected_gm = 1.0 - response(THREE_POLES, f180).norm();
    assert_relative_eq!(metrics::gain_margin(&f, &h).unwrap(), expected_gm, epsilon = 2e-3);

    assert_relative_eq!(metrics::gain(&f, &h).unwrap().norm(), 1e3, max_relative = 1e-3);
}

#[test]
fn flat_response_has_no_crossing() {
    let f = logspace(9.0, 100);
    let h = vec![Complex64::new(10.0, 0.0); f.len()];

    match metrics::bandwidth(&f, &h) {
        Err(CalculationError::NoCrossing { start, end, .. }) => {
            assert_relative_eq!(start, 10.0);
            assert_relative_eq!(end, 10.0);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert!(metrics::unity_gain_frequency(&f, &h).is_err());
    assert!(metrics::phase_margin(&f, &h).is_err());
}

#[test]
fn single_pole_never_reaches_minus_180_degrees() {
    let f = logspace(9.0, 1000);
    let h = sampled("A1 gain=1e3 pole=1e3", &f);
    assert!(matches!(
        metrics::phase_margin(&f, &h),
        Err(CalculationError::NoCrossing { threshold, .. }) if threshold == -180.0
    ));
}

#[test]
fn slew_rate_of_a_ramp() {
    let t: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
    let x = t.clone();
    assert_relative_eq!(metrics::slew_rate(&t, &x).unwrap(), 1.0, max_relative = 1e-12);
}

#[test]
fn rising_and_falling_time_of_logistic_edges() {
    let tau = 1e-9;
    let t: Vec<f64> = (0..=2000).map(|i| i as f64 * 1e-11).collect();
    let rise: Vec<f64> = t
        .iter()
        .map(|&t| 1.0 / (1.0 + (-(t - 1e-8) / tau).exp()))
        .collect();
    let fall: Vec<f64> = rise.iter().map(|v| 1.0 - v).collect();

    let expected = 2.0 * tau * 9f64.ln();
    let rising = metrics::rising_time(&t, &rise, Some(0.1), Some(0.9)).unwrap();
    assert_relative_eq!(rising, expected, max_relative = 1e-3);

    let falling = metrics::falling_time(&t, &fall, Some(0.9), Some(0.1)).unwrap();
    assert_relative_eq!(falling, expected, max_relative = 1e-3);
}

#[test]
fn instance_accessors_use_template_defaults() {
    let sim = FakeAmplifier::new();
    let defaults = AnalysisDefaults {
        ac: AcSweep {
            points: 100,
            variation: Variation::Dec,
            ..AcSweep::default()
        },
        ..AnalysisDefaults::default()
    };
    let template = amplifier("A1 gain={a0} pole={fp}", &sim).with_defaults(defaults);
    let circuit = template.instantiate(&[1e3, 1e3]).unwrap();

    assert_relative_eq!(circuit.bandwidth().unwrap(), 1e3, max_relative = 0.01);
    assert_relative_eq!(circuit.unity_gain_frequency().unwrap(), 1e6, max_relative = 0.01);
    assert_relative_eq!(circuit.gain().unwrap().re, 1e3, max_relative = 1e-3);

    // One pole: the phase never reaches -180°, and the error is not swallowed
    assert!(matches!(circuit.phase_margin(), Err(Error::Calculation(_))));
    assert_eq!(sim.calls(), 1);
}

#[test]
fn static_power_reads_the_supply_rail() {
    let sim = FakeAmplifier::new();
    let circuit = amplifier("A1 ibias={i}", &sim).instantiate(&[2e-3]).unwrap();
    assert_relative_eq!(circuit.static_power().unwrap(), 3.6e-3, max_relative = 1e-12);
}
