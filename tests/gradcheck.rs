use ndarray::{arr1, arr2, ArrayD};
use platypus::{AdError, DualTensor, GradCheck};

fn tensor(values: &[f64]) -> ArrayD<f64> {
    arr1(values).into_dyn()
}

#[test]
fn accepts_elementwise_composite() {
    // f(x, y) = x·y + sin(x)
    let f = |x: &[DualTensor<f64>]| {
        let prod = x[0].mul(&x[1])?;
        Ok(vec![prod.add(&x[0].sin())?])
    };
    GradCheck::default()
        .check_jvp(f, &[tensor(&[0.5, 1.5, -0.75]), tensor(&[2.0, -1.0, 0.25])])
        .unwrap();
}

#[test]
fn accepts_matmul() {
    let f = |x: &[DualTensor<f64>]| Ok(vec![x[0].matmul(&x[1])?]);
    let a = arr2(&[[1.0, 2.0], [3.0, -1.0]]).into_dyn();
    let b = arr2(&[[0.5, 1.0], [-2.0, 0.25]]).into_dyn();
    GradCheck::default().check_jvp(f, &[a, b]).unwrap();
}

#[test]
fn accepts_multi_output_function() {
    let f = |x: &[DualTensor<f64>]| Ok(vec![x[0].exp(), x[0].powi(2)]);
    GradCheck::default()
        .check_jvp(f, &[tensor(&[0.1, -0.4])])
        .unwrap();
}

#[test]
fn rejects_dropped_sensitivity() {
    // Recomputing from the primal alone discards the tangent: the analytic
    // JVP is zero while the true derivative is 2x.
    let f = |x: &[DualTensor<f64>]| {
        Ok(vec![DualTensor::from_primal(
            x[0].primal().mapv(|v| v * v),
        )])
    };
    let err = GradCheck::default()
        .check_jvp(f, &[tensor(&[3.0])])
        .unwrap_err();
    assert!(matches!(err, AdError::GradCheckFailed { input: 0, .. }));
}

#[test]
fn reports_the_faulty_input() {
    // Correct in x, sensitivity-dropping in y.
    let f = |x: &[DualTensor<f64>]| {
        let y_sq = DualTensor::from_primal(x[1].primal().mapv(|v| v * v));
        Ok(vec![x[0].exp().add(&y_sq)?])
    };
    let err = GradCheck::default()
        .check_jvp(f, &[tensor(&[0.5]), tensor(&[2.0])])
        .unwrap_err();
    assert!(matches!(err, AdError::GradCheckFailed { input: 1, .. }));
}

#[test]
fn reports_the_faulty_element() {
    let eps = 1e-6;
    let check = GradCheck {
        eps,
        ..GradCheck::default()
    };
    // Elementwise square, but element 1's tangent is scaled by 10.
    let f = |x: &[DualTensor<f64>]| {
        let good = x[0].powi(2);
        let tangent = good.tangent().map(|t| {
            let mut t = t.clone();
            if let Some(v) = t.iter_mut().nth(1) {
                *v *= 10.0;
            }
            t
        });
        match tangent {
            Some(t) => DualTensor::make_dual(good.primal().clone(), t).map(|d| vec![d]),
            None => Ok(vec![good]),
        }
    };
    let err = check.check_jvp(f, &[tensor(&[1.0, 2.0, 3.0])]).unwrap_err();
    assert!(matches!(err, AdError::GradCheckFailed { input: 0, offset: 1, .. }));
}

#[test]
fn passes_through_evaluation_errors() {
    let f = |_: &[DualTensor<f64>]| {
        Err(AdError::UnsupportedOp {
            op: "conv2d".to_string(),
        })
    };
    let err = GradCheck::default()
        .check_jvp(f, &[tensor(&[1.0])])
        .unwrap_err();
    assert!(matches!(err, AdError::UnsupportedOp { .. }));
}
