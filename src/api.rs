use ndarray::ArrayD;

use crate::dual::Dual;
use crate::dual_tensor::DualTensor;
use crate::error::AdError;
use crate::float::Float;
use crate::level;

/// Jacobian-vector product: `(f(x), J·v)` in one forward pass.
///
/// Enters a differentiation level, pairs each primal with its tangent, runs
/// `f`, and unpacks every output. The level is torn down on every path, so
/// the returned tangents are the only thing that survives it.
///
/// Outputs that did not receive any input sensitivity come back with a
/// `None` tangent.
///
/// ```
/// use ndarray::arr1;
///
/// let (values, tangents) = platypus::jvp(
///     |x| Ok(vec![x[0].mul(&x[0])?]),  // f(x) = x²
///     &[arr1(&[3.0_f64]).into_dyn()],
///     &[arr1(&[1.0_f64]).into_dyn()],
/// )
/// .unwrap();
/// assert!((values[0][[0]] - 9.0).abs() < 1e-12);
/// assert!((tangents[0].as_ref().unwrap()[[0]] - 6.0).abs() < 1e-12);
/// ```
pub fn jvp<F: Float>(
    f: impl FnOnce(&[DualTensor<F>]) -> Result<Vec<DualTensor<F>>, AdError>,
    primals: &[ArrayD<F>],
    tangents: &[ArrayD<F>],
) -> Result<(Vec<ArrayD<F>>, Vec<Option<ArrayD<F>>>), AdError> {
    assert_eq!(
        primals.len(),
        tangents.len(),
        "primals and tangents must have the same length"
    );
    let _guard = level::enter_level();
    let inputs: Vec<DualTensor<F>> = primals
        .iter()
        .zip(tangents.iter())
        .map(|(p, t)| DualTensor::make_dual(p.clone(), t.clone()))
        .collect::<Result<_, _>>()?;
    let outputs = f(&inputs)?;
    let mut values = Vec::with_capacity(outputs.len());
    let mut out_tangents = Vec::with_capacity(outputs.len());
    for out in outputs {
        let (primal, tangent) = out.into_parts();
        values.push(primal);
        out_tangents.push(tangent);
    }
    Ok((values, out_tangents))
}

/// Scalar-kernel Jacobian-vector product: `(f(x), J·v)` over plain slices.
///
/// Evaluates `f` at `x` and computes the directional derivative in direction
/// `v`, using the scalar [`Dual`] kernel directly — no tensors, no levels.
pub fn jvp_scalar<F: Float>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
    v: &[F],
) -> (Vec<F>, Vec<F>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let inputs: Vec<Dual<F>> = x
        .iter()
        .zip(v.iter())
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let outputs = f(&inputs);
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    (values, tangents)
}
