//! Dual tensors: shaped primals paired with level-scoped tangents.
//!
//! A [`DualTensor`] carries a primal array and, optionally, a tangent array
//! of the same shape recorded under a differentiation level. The tangent is
//! the directional derivative of the primal with respect to the chosen input
//! direction; propagating both together through a computation yields the
//! Jacobian-vector product in a single forward pass, with no graph or tape.
//!
//! Tangent associations die with their level (see [`crate::level`]): once the
//! recording level exits, [`DualTensor::unpack_dual`] reports `None`. `None`
//! means "no sensitivity computed" — it is deliberately distinct from a zero
//! tangent, which is a computed sensitivity that happens to vanish.

use ndarray::{ArrayD, Ix2, Zip};

use crate::dual::Dual;
use crate::error::AdError;
use crate::float::Float;
use crate::level::{self, LevelId};

#[derive(Clone, Debug)]
struct TangentRecord<F: Float> {
    values: ArrayD<F>,
    level: LevelId,
}

/// A primal tensor with an optional level-scoped tangent.
#[derive(Clone, Debug)]
pub struct DualTensor<F: Float> {
    primal: ArrayD<F>,
    tangent: Option<TangentRecord<F>>,
}

impl<F: Float> DualTensor<F> {
    /// Wrap a plain tensor with no tangent.
    ///
    /// In arithmetic with dual operands it behaves as if it carried a zero
    /// tangent of matching shape.
    pub fn from_primal(primal: ArrayD<F>) -> Self {
        DualTensor {
            primal,
            tangent: None,
        }
    }

    /// Pair a primal with a tangent under the innermost active level.
    ///
    /// The tangent must have the primal's shape. If its memory layout
    /// differs from the primal's, the values are copied into a fresh array
    /// matching the primal (one copy); otherwise the tangent buffer is used
    /// as-is.
    ///
    /// # Errors
    ///
    /// [`AdError::NoActiveLevel`] outside any differentiation level;
    /// [`AdError::ShapeMismatch`] when the shapes disagree.
    pub fn make_dual(primal: ArrayD<F>, tangent: ArrayD<F>) -> Result<Self, AdError> {
        let Some(lvl) = level::current() else {
            return Err(AdError::NoActiveLevel);
        };
        if tangent.shape() != primal.shape() {
            return Err(AdError::shape_mismatch(primal.shape(), tangent.shape()));
        }
        let tangent = if tangent.strides() == primal.strides() {
            tangent
        } else {
            let mut copy = ArrayD::zeros(primal.raw_dim());
            copy.assign(&tangent);
            copy
        };
        Ok(DualTensor {
            primal,
            tangent: Some(TangentRecord {
                values: tangent,
                level: lvl,
            }),
        })
    }

    /// The primal value.
    pub fn primal(&self) -> &ArrayD<F> {
        &self.primal
    }

    /// The tangent, if its association is still live on this thread.
    pub fn tangent(&self) -> Option<&ArrayD<F>> {
        self.tangent
            .as_ref()
            .filter(|t| level::is_live(t.level))
            .map(|t| &t.values)
    }

    /// Split into primal and tangent.
    ///
    /// The primal is always returned. The tangent is returned only while its
    /// recording level is live; afterwards (or outside any level) this is
    /// `None` — "no sensitivity computed", never a zero array.
    pub fn unpack_dual(&self) -> (&ArrayD<F>, Option<&ArrayD<F>>) {
        (&self.primal, self.tangent())
    }

    /// Consuming variant of [`unpack_dual`](Self::unpack_dual), with the same
    /// liveness rule.
    pub fn into_parts(self) -> (ArrayD<F>, Option<ArrayD<F>>) {
        let live = self
            .tangent
            .as_ref()
            .is_some_and(|t| level::is_live(t.level));
        let tangent = if live {
            self.tangent.map(|t| t.values)
        } else {
            None
        };
        (self.primal, tangent)
    }

    /// Shape of the primal (and of any tangent).
    pub fn shape(&self) -> &[usize] {
        self.primal.shape()
    }

    /// Build a result tensor, attaching `tangent` under the innermost active
    /// level. With no active level the tangent is discarded.
    pub(crate) fn attach(primal: ArrayD<F>, tangent: Option<ArrayD<F>>) -> Result<Self, AdError> {
        let tangent = match (tangent, level::current()) {
            (Some(values), Some(lvl)) => {
                if values.shape() != primal.shape() {
                    return Err(AdError::shape_mismatch(primal.shape(), values.shape()));
                }
                Some(TangentRecord { values, level: lvl })
            }
            _ => None,
        };
        Ok(DualTensor { primal, tangent })
    }

    // ── Elementwise lifts of the scalar kernel ──

    fn map_unary(&self, f: impl Fn(Dual<F>) -> Dual<F>) -> Self {
        match (self.tangent(), level::current()) {
            (Some(t), Some(lvl)) => {
                let mut re = ArrayD::zeros(self.primal.raw_dim());
                let mut eps = ArrayD::zeros(self.primal.raw_dim());
                Zip::from(&mut re)
                    .and(&mut eps)
                    .and(&self.primal)
                    .and(t)
                    .for_each(|r, e, &p, &tp| {
                        let d = f(Dual::new(p, tp));
                        *r = d.re;
                        *e = d.eps;
                    });
                DualTensor {
                    primal: re,
                    tangent: Some(TangentRecord {
                        values: eps,
                        level: lvl,
                    }),
                }
            }
            _ => DualTensor::from_primal(self.primal.mapv(|p| f(Dual::constant(p)).re)),
        }
    }

    fn zip_binary(
        &self,
        rhs: &Self,
        f: impl Fn(Dual<F>, Dual<F>) -> Dual<F>,
    ) -> Result<Self, AdError> {
        if self.primal.shape() != rhs.primal.shape() {
            return Err(AdError::shape_mismatch(
                self.primal.shape(),
                rhs.primal.shape(),
            ));
        }
        let lvl = level::current();
        let (lt, rt) = (self.tangent(), rhs.tangent());
        let Some(lvl) = lvl else {
            return Ok(self.primal_binary(rhs, &f));
        };
        // An operand without a live tangent participates as a zero tangent
        // of matching shape.
        let zeros;
        let (ta, tb) = match (lt, rt) {
            (Some(a), Some(b)) => (a, b),
            (Some(a), None) => {
                zeros = ArrayD::zeros(self.primal.raw_dim());
                (a, &zeros)
            }
            (None, Some(b)) => {
                zeros = ArrayD::zeros(self.primal.raw_dim());
                (&zeros, b)
            }
            (None, None) => return Ok(self.primal_binary(rhs, &f)),
        };
        let mut re = ArrayD::zeros(self.primal.raw_dim());
        let mut eps = ArrayD::zeros(self.primal.raw_dim());
        Zip::from(&mut re)
            .and(&mut eps)
            .and(&self.primal)
            .and(ta)
            .and(&rhs.primal)
            .and(tb)
            .for_each(|r, e, &p1, &t1, &p2, &t2| {
                let d = f(Dual::new(p1, t1), Dual::new(p2, t2));
                *r = d.re;
                *e = d.eps;
            });
        Ok(DualTensor {
            primal: re,
            tangent: Some(TangentRecord {
                values: eps,
                level: lvl,
            }),
        })
    }

    fn primal_binary(&self, rhs: &Self, f: &impl Fn(Dual<F>, Dual<F>) -> Dual<F>) -> Self {
        let primal = Zip::from(&self.primal)
            .and(&rhs.primal)
            .map_collect(|&a, &b| f(Dual::constant(a), Dual::constant(b)).re);
        DualTensor::from_primal(primal)
    }

    // ── Binary elementwise operations ──

    /// Elementwise sum. Shapes must match.
    pub fn add(&self, rhs: &Self) -> Result<Self, AdError> {
        self.zip_binary(rhs, |a, b| a + b)
    }

    /// Elementwise difference. Shapes must match.
    pub fn sub(&self, rhs: &Self) -> Result<Self, AdError> {
        self.zip_binary(rhs, |a, b| a - b)
    }

    /// Elementwise product (product rule). Shapes must match.
    pub fn mul(&self, rhs: &Self) -> Result<Self, AdError> {
        self.zip_binary(rhs, |a, b| a * b)
    }

    /// Elementwise quotient (quotient rule). Shapes must match.
    pub fn div(&self, rhs: &Self) -> Result<Self, AdError> {
        self.zip_binary(rhs, |a, b| a / b)
    }

    /// Elementwise sum with `rhs` broadcast to this tensor's shape
    /// (e.g. a `[out]` bias row against a `[batch, out]` activation).
    pub fn add_broadcast(&self, rhs: &Self) -> Result<Self, AdError> {
        let dim = self.primal.raw_dim();
        let rp = rhs
            .primal
            .broadcast(dim.clone())
            .ok_or_else(|| AdError::shape_mismatch(self.primal.shape(), rhs.primal.shape()))?;
        let primal = &self.primal + &rp;
        let tangent = match (self.tangent(), rhs.tangent()) {
            (Some(a), Some(b)) => {
                // Shapes already validated: b broadcasts wherever rhs.primal does.
                let bb = b
                    .broadcast(dim)
                    .ok_or_else(|| AdError::shape_mismatch(self.primal.shape(), b.shape()))?;
                Some(a + &bb)
            }
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => {
                let bb = b
                    .broadcast(dim)
                    .ok_or_else(|| AdError::shape_mismatch(self.primal.shape(), b.shape()))?;
                Some(bb.to_owned())
            }
            (None, None) => None,
        };
        DualTensor::attach(primal, tangent)
    }

    // ── Unary elementwise operations ──

    /// Elementwise negation.
    pub fn neg(&self) -> Self {
        self.map_unary(|d| -d)
    }

    /// Multiply every element by a plain scalar.
    pub fn scale(&self, c: F) -> Self {
        self.map_unary(|d| Dual::new(d.re * c, d.eps * c))
    }

    /// Elementwise reciprocal.
    pub fn recip(&self) -> Self {
        self.map_unary(|d| d.recip())
    }

    /// Elementwise integer power.
    pub fn powi(&self, n: i32) -> Self {
        self.map_unary(move |d| d.powi(n))
    }

    /// Elementwise real power with a plain exponent.
    pub fn powf(&self, n: F) -> Self {
        self.map_unary(move |d| d.powf(Dual::constant(n)))
    }

    /// Elementwise exponential.
    pub fn exp(&self) -> Self {
        self.map_unary(|d| d.exp())
    }

    /// Elementwise natural logarithm.
    pub fn ln(&self) -> Self {
        self.map_unary(|d| d.ln())
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> Self {
        self.map_unary(|d| d.sqrt())
    }

    /// Elementwise sine.
    pub fn sin(&self) -> Self {
        self.map_unary(|d| d.sin())
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> Self {
        self.map_unary(|d| d.cos())
    }

    /// Elementwise hyperbolic tangent.
    pub fn tanh(&self) -> Self {
        self.map_unary(|d| d.tanh())
    }

    /// Elementwise absolute value.
    pub fn abs(&self) -> Self {
        self.map_unary(|d| d.abs())
    }

    // ── Linear algebra ──

    /// Matrix product of two 2-d dual tensors.
    ///
    /// Product rule: `d(A·B) = dA·B + A·dB`.
    ///
    /// # Errors
    ///
    /// [`AdError::UnsupportedOp`] unless both operands are 2-d;
    /// [`AdError::ShapeMismatch`] when the inner dimensions disagree.
    pub fn matmul(&self, rhs: &Self) -> Result<Self, AdError> {
        let a = self
            .primal
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| AdError::unsupported(format!("matmul on {}-d tensor", self.primal.ndim())))?;
        let b = rhs
            .primal
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| AdError::unsupported(format!("matmul on {}-d tensor", rhs.primal.ndim())))?;
        if a.ncols() != b.nrows() {
            return Err(AdError::shape_mismatch(self.primal.shape(), rhs.primal.shape()));
        }
        let primal = a.dot(&b);
        let tangent = match (self.tangent(), rhs.tangent()) {
            (Some(da), Some(db)) => {
                let da = da.view().into_dimensionality::<Ix2>().map_err(dim_err)?;
                let db = db.view().into_dimensionality::<Ix2>().map_err(dim_err)?;
                Some(da.dot(&b) + a.dot(&db))
            }
            (Some(da), None) => {
                let da = da.view().into_dimensionality::<Ix2>().map_err(dim_err)?;
                Some(da.dot(&b))
            }
            (None, Some(db)) => {
                let db = db.view().into_dimensionality::<Ix2>().map_err(dim_err)?;
                Some(a.dot(&db))
            }
            (None, None) => None,
        };
        DualTensor::attach(primal.into_dyn(), tangent.map(|t| t.into_dyn()))
    }

    /// Transpose of a 2-d dual tensor.
    pub fn transpose(&self) -> Result<Self, AdError> {
        if self.primal.ndim() != 2 {
            return Err(AdError::unsupported(format!(
                "transpose on {}-d tensor",
                self.primal.ndim()
            )));
        }
        let primal = self.primal.t().to_owned();
        let tangent = self.tangent().map(|t| t.t().to_owned());
        DualTensor::attach(primal, tangent)
    }
}

impl<F: Float> From<ArrayD<F>> for DualTensor<F> {
    fn from(primal: ArrayD<F>) -> Self {
        DualTensor::from_primal(primal)
    }
}

fn dim_err(err: ndarray::ShapeError) -> AdError {
    AdError::unsupported(format!("matmul tangent view: {err}"))
}
