use approx::assert_relative_eq;
use platypus::{Dual, Dual64};

/// Central finite difference: (f(x+h) - f(x-h)) / 2h
fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-7;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Test a dual elemental against finite differences.
fn check_elemental(
    f_dual: impl Fn(Dual64) -> Dual64,
    f_f64: impl Fn(f64) -> f64,
    x: f64,
    tol: f64,
) {
    let d = f_dual(Dual::variable(x));
    let expected_deriv = finite_diff(&f_f64, x);
    assert_relative_eq!(d.re, f_f64(x), max_relative = 1e-12);
    assert_relative_eq!(d.eps, expected_deriv, max_relative = tol);
}

// ── Arithmetic ──

#[test]
fn product_rule() {
    // (3 + ε)(4 + ε) = 12 + 7ε
    let a = Dual::new(3.0, 1.0);
    let b = Dual::new(4.0, 1.0);
    let c = a * b;
    assert_relative_eq!(c.re, 12.0);
    assert_relative_eq!(c.eps, 7.0);
}

#[test]
fn quotient_rule() {
    // d/dx (x / (x+1)) at x=2: 1/(x+1)^2 = 1/9
    let x = Dual::variable(2.0);
    let one = Dual::constant(1.0);
    let y = x / (x + one);
    assert_relative_eq!(y.re, 2.0 / 3.0, max_relative = 1e-12);
    assert_relative_eq!(y.eps, 1.0 / 9.0, max_relative = 1e-12);
}

#[test]
fn mixed_scalar_ops() {
    let x = Dual::<f64>::variable(3.0);
    let y = x * 2.0;
    assert_relative_eq!(y.re, 6.0);
    assert_relative_eq!(y.eps, 2.0);

    let z = 2.0 * x;
    assert_relative_eq!(z.re, 6.0);
    assert_relative_eq!(z.eps, 2.0);

    let w = 1.0 / x;
    assert_relative_eq!(w.re, 1.0 / 3.0, max_relative = 1e-12);
    assert_relative_eq!(w.eps, -1.0 / 9.0, max_relative = 1e-12);
}

// ── Powers ──

#[test]
fn recip() { check_elemental(|x| x.recip(), |x| x.recip(), 2.5, 1e-5); }

#[test]
fn sqrt() { check_elemental(|x| x.sqrt(), |x| x.sqrt(), 4.0, 1e-5); }

#[test]
fn powi() { check_elemental(|x| x.powi(3), |x| x.powi(3), 2.0, 1e-5); }

#[test]
fn powf() {
    let x = Dual::variable(2.0);
    let n = Dual::constant(3.5);
    let y = x.powf(n);
    let expected = finite_diff(|v| v.powf(3.5), 2.0);
    assert_relative_eq!(y.re, 2.0_f64.powf(3.5), max_relative = 1e-12);
    assert_relative_eq!(y.eps, expected, max_relative = 1e-5);
}

#[test]
fn powf_dual_exponent() {
    // d/dx (x^x) = x^x (ln x + 1)
    let x = Dual::variable(2.0);
    let y = x.powf(x);
    let expected = 4.0 * (2.0_f64.ln() + 1.0);
    assert_relative_eq!(y.re, 4.0, max_relative = 1e-12);
    assert_relative_eq!(y.eps, expected, max_relative = 1e-12);
}

// ── Exp/Log ──

#[test]
fn exp() { check_elemental(|x| x.exp(), |x| x.exp(), 1.0, 1e-5); }

#[test]
fn ln() { check_elemental(|x| x.ln(), |x| x.ln(), 2.0, 1e-5); }

// ── Trig ──

#[test]
fn sin() { check_elemental(|x| x.sin(), |x| x.sin(), 1.0, 1e-5); }

#[test]
fn cos() { check_elemental(|x| x.cos(), |x| x.cos(), 1.0, 1e-5); }

#[test]
fn tan() { check_elemental(|x| x.tan(), |x| x.tan(), 0.5, 1e-5); }

// ── Hyperbolic ──

#[test]
fn sinh() { check_elemental(|x| x.sinh(), |x| x.sinh(), 1.0, 1e-5); }

#[test]
fn cosh() { check_elemental(|x| x.cosh(), |x| x.cosh(), 1.0, 1e-5); }

#[test]
fn tanh() { check_elemental(|x| x.tanh(), |x| x.tanh(), 1.0, 1e-5); }

// ── Misc ──

#[test]
fn abs_positive() {
    let x = Dual::<f64>::variable(3.0);
    let y = x.abs();
    assert_relative_eq!(y.re, 3.0);
    assert_relative_eq!(y.eps, 1.0);
}

#[test]
fn abs_negative() {
    let x = Dual::<f64>::variable(-3.0);
    let y = x.abs();
    assert_relative_eq!(y.re, 3.0);
    assert_relative_eq!(y.eps, -1.0);
}

#[test]
fn signum_zero_derivative() {
    let x = Dual::<f64>::variable(2.7);
    assert_relative_eq!(x.signum().re, 1.0);
    assert_relative_eq!(x.signum().eps, 0.0);
}

#[test]
fn max_min_track_argument() {
    let x = Dual::new(3.0, 1.0);
    let y = Dual::new(4.0, 5.0);
    assert_relative_eq!(x.max(y).eps, 5.0);
    assert_relative_eq!(x.min(y).eps, 1.0);
}

// ── Compositions ──

#[test]
fn sin_of_exp() {
    // d/dx sin(exp(x)) = cos(exp(x)) * exp(x)
    let x_val = 0.5;
    let x = Dual::<f64>::variable(x_val);
    let y = x.exp().sin();
    let expected = x_val.exp().cos() * x_val.exp();
    assert_relative_eq!(y.eps, expected, max_relative = 1e-12);
}

#[test]
fn complex_composition() {
    // f(x) = x * sin(x) + cos(x²)
    // f'(x) = sin(x) + x*cos(x) - 2x*sin(x²)
    let x_val = 1.5;
    let x = Dual::<f64>::variable(x_val);
    let y = x * x.sin() + (x * x).cos();
    let expected = x_val.sin() + x_val * x_val.cos() - 2.0 * x_val * (x_val * x_val).sin();
    assert_relative_eq!(y.eps, expected, max_relative = 1e-12);
}

// ── Scalar API ──

#[test]
fn jvp_scalar_directional_derivative() {
    // f(x, y) = (x² + y², x·y); direction (1, 0)
    let (values, tangents) = platypus::jvp_scalar(
        |x| vec![x[0] * x[0] + x[1] * x[1], x[0] * x[1]],
        &[3.0, 4.0],
        &[1.0, 0.0],
    );
    assert_relative_eq!(values[0], 25.0);
    assert_relative_eq!(values[1], 12.0);
    assert_relative_eq!(tangents[0], 6.0);
    assert_relative_eq!(tangents[1], 4.0);
}
