//! Finite-difference verification of tangent propagation.
//!
//! Probes a function one input element at a time: seeds a basis tangent on
//! that element, runs the dual forward pass, and compares every output
//! tangent element against a central finite difference of the plain primal
//! evaluation. This is the harness to run against any custom [`DualOp`]
//! before trusting its JVP rule.

use ndarray::ArrayD;
use num_traits::ToPrimitive;

use crate::dual_tensor::DualTensor;
use crate::error::AdError;
use crate::float::Float;
use crate::level;
use crate::op::DualOp;

/// Tolerances for a gradient check.
///
/// Defaults suit `f64`; for `f32` work widen `eps` and the tolerances.
pub struct GradCheck<F: Float> {
    /// Central-difference perturbation.
    pub eps: F,
    /// Relative tolerance.
    pub rtol: F,
    /// Absolute tolerance.
    pub atol: F,
}

impl<F: Float> Default for GradCheck<F> {
    fn default() -> Self {
        GradCheck {
            eps: F::from_f64(1e-6).unwrap(),
            rtol: F::from_f64(1e-4).unwrap(),
            atol: F::from_f64(1e-8).unwrap(),
        }
    }
}

impl<F: Float> GradCheck<F> {
    /// Verify `f`'s tangent propagation at `primals`.
    ///
    /// For each element of each input, the analytic JVP under a basis
    /// tangent is compared elementwise against `(f(x+h) - f(x-h)) / 2h`.
    /// The first violation is reported as [`AdError::GradCheckFailed`],
    /// identifying the probed input and element.
    pub fn check_jvp(
        &self,
        f: impl Fn(&[DualTensor<F>]) -> Result<Vec<DualTensor<F>>, AdError>,
        primals: &[ArrayD<F>],
    ) -> Result<(), AdError> {
        let two = F::one() + F::one();
        for (i, p) in primals.iter().enumerate() {
            for offset in 0..p.len() {
                let analytic = {
                    let _guard = level::enter_level();
                    let inputs: Vec<DualTensor<F>> = primals
                        .iter()
                        .enumerate()
                        .map(|(k, pk)| {
                            if k == i {
                                let mut seed = ArrayD::zeros(pk.raw_dim());
                                if let Some(s) = seed.iter_mut().nth(offset) {
                                    *s = F::one();
                                }
                                DualTensor::make_dual(pk.clone(), seed)
                            } else {
                                Ok(DualTensor::from_primal(pk.clone()))
                            }
                        })
                        .collect::<Result<_, _>>()?;
                    let outputs = f(&inputs)?;
                    let mut flat = Vec::new();
                    for out in &outputs {
                        match out.tangent() {
                            Some(t) => flat.extend(t.iter().copied()),
                            // No sensitivity reached this output: its
                            // derivative along the probe direction is zero.
                            None => flat
                                .extend(std::iter::repeat(F::zero()).take(out.primal().len())),
                        }
                    }
                    flat
                };
                let plus = eval_perturbed(&f, primals, i, offset, self.eps)?;
                let minus = eval_perturbed(&f, primals, i, offset, -self.eps)?;
                for ((&a, &hi), &lo) in analytic.iter().zip(plus.iter()).zip(minus.iter()) {
                    let n = (hi - lo) / (two * self.eps);
                    let diff = (a - n).abs();
                    let tol = self.atol + self.rtol * a.abs().max(n.abs());
                    if !(diff <= tol) {
                        return Err(AdError::GradCheckFailed {
                            input: i,
                            offset,
                            analytic: a.to_f64().unwrap_or(f64::NAN),
                            numeric: n.to_f64().unwrap_or(f64::NAN),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Verify a single custom operation's JVP rule at `primal`.
    pub fn check_op(&self, op: &dyn DualOp<F>, primal: &ArrayD<F>) -> Result<(), AdError> {
        self.check_jvp(
            |inputs| Ok(vec![crate::op::apply(op, &inputs[0])?]),
            std::slice::from_ref(primal),
        )
    }
}

/// Plain primal evaluation with input `i`, element `offset` shifted by `delta`.
fn eval_perturbed<F: Float>(
    f: &impl Fn(&[DualTensor<F>]) -> Result<Vec<DualTensor<F>>, AdError>,
    primals: &[ArrayD<F>],
    i: usize,
    offset: usize,
    delta: F,
) -> Result<Vec<F>, AdError> {
    let inputs: Vec<DualTensor<F>> = primals
        .iter()
        .enumerate()
        .map(|(k, pk)| {
            let mut pk = pk.clone();
            if k == i {
                if let Some(x) = pk.iter_mut().nth(offset) {
                    *x = *x + delta;
                }
            }
            DualTensor::from_primal(pk)
        })
        .collect();
    let outputs = f(&inputs)?;
    let mut flat = Vec::new();
    for out in &outputs {
        flat.extend(out.primal().iter().copied());
    }
    Ok(flat)
}
