// =============================================================================
// Coordinate Descent for the Inner Penalized Least-Squares Problem
// =============================================================================
//
// Each IRLS iteration builds a quadratic model of the smooth part of the
// objective around the current coefficients c:
//
//     q(z) = gᵀ(z − c) + ½ (z − c)ᵀ H (z − c) + Σⱼ P1ⱼ |zⱼ|
//
// (H already contains P2, g already contains P2·c) and minimizes it one
// coordinate at a time, subject to lower ≤ z ≤ upper.
//
// ONE COORDINATE
// --------------
// Holding every other coordinate fixed, q restricted to zⱼ = t is
//
//     ½ Hⱼⱼ t² + aⱼ t + P1ⱼ |t|        with aⱼ = gⱼ + (H(z − c))ⱼ − Hⱼⱼ zⱼ
//
// a convex piecewise quadratic. With linear inequalities each row k adds a
// one-sided quadratic term ρ/2 · max(0, Aₖⱼ t + rₖ)², another kink. The
// exact minimizer is found by walking the sorted kinks, then clipped to
// [lowerⱼ, upperⱼ], which is exact for a convex function of one variable.
//
// LINEAR INEQUALITIES
// -------------------
// A · z ≤ b is enforced with an augmented Lagrangian: minimize
//
//     q(z) + ρ/2 · Σₖ max(0, (Az − b)ₖ + λₖ/ρ)²
//
// by coordinate descent, then update λ ← max(0, λ + ρ(Az − b)). ρ grows
// tenfold whenever the violation fails to shrink by a factor of four.
//
// =============================================================================

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::constraints::Constraints;
use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;

use super::Selection;

/// The quadratic model handed over by the outer IRLS loop.
pub(crate) struct QuadraticModel<'a, F: GlmFloat> {
    pub hessian: &'a Array2<F>,
    pub gradient: &'a Array1<F>,
    pub center: &'a Array1<F>,
    /// L1 weights for the feature coordinates.
    pub p1: &'a Array1<F>,
    /// 1 when coordinate 0 is an (unpenalized, unbounded) intercept.
    pub offset: usize,
}

/// Stopping rules for the inner solve.
pub(crate) struct InnerSettings<F: GlmFloat> {
    pub tol: F,
    pub max_sweeps: usize,
    pub selection: Selection,
    pub feasibility_tol: F,
    pub max_constraint_iter: usize,
}

#[derive(Debug)]
pub(crate) struct InnerOutcome<F: GlmFloat> {
    pub z: Array1<F>,
    pub sweeps: usize,
}

/// Augmented-Lagrangian state for A·z ≤ b.
struct Penalized<'a, F: GlmFloat> {
    a: &'a Array2<F>,
    b: &'a Array1<F>,
    lambda: &'a Array1<F>,
    rho: F,
}

impl<'a, F: GlmFloat> Penalized<'a, F> {
    /// Shifted residual (Az − b)ₖ + λₖ/ρ.
    fn shifted(&self, az: &Array1<F>, k: usize) -> F {
        az[k] - self.b[k] + self.lambda[k] / self.rho
    }

    /// Gradient of the penalty term with respect to the features.
    fn gradient(&self, az: &Array1<F>) -> Array1<F> {
        let active: Array1<F> =
            (0..self.b.len()).map(|k| self.rho * self.shifted(az, k).max(F::zero())).collect();
        self.a.t().dot(&active)
    }
}

/// Minimize the quadratic model under the constraints.
///
/// `multipliers` carries the inequality multipliers between calls and is
/// updated in place.
pub(crate) fn coordinate_descent<F: GlmFloat>(
    model: &QuadraticModel<'_, F>,
    constraints: &Constraints<F>,
    multipliers: &mut Array1<F>,
    settings: &InnerSettings<F>,
    rng: &mut StdRng,
) -> Result<InnerOutcome<F>> {
    let offset = model.offset;
    let mut z = model.center.clone();
    for f in 0..constraints.lower.len() {
        let j = f + offset;
        z[j] = z[j].max(constraints.lower[f]).min(constraints.upper[f]);
    }

    let ineq = match &constraints.inequalities {
        Some(ineq) if !ineq.is_empty() => ineq,
        _ => {
            let sweeps = sweep_until_converged(model, constraints, None, &mut z, settings, rng);
            return Ok(InnerOutcome { z, sweeps });
        }
    };

    let diag_scale = (0..model.p1.len())
        .map(|f| model.hessian[[f + offset, f + offset]])
        .fold(F::zero(), |acc, h| acc.max(h));
    let mut rho = F::lit(10.0) * diag_scale.max(F::one());
    let rho_cap = F::max_value().sqrt();
    let tol = ineq.tolerance(settings.feasibility_tol);

    let mut total_sweeps = 0;
    let mut prev_violation = F::infinity();
    for round in 0..settings.max_constraint_iter {
        let penalized = Penalized {
            a: &ineq.a,
            b: &ineq.b,
            lambda: &*multipliers,
            rho,
        };
        total_sweeps +=
            sweep_until_converged(model, constraints, Some(&penalized), &mut z, settings, rng);

        let beta = z.slice(ndarray::s![offset..]).to_owned();
        let residual = ineq.residual(&beta);
        let violation = residual.iter().fold(F::zero(), |acc, &r| acc.max(r));
        for (lam, &r) in multipliers.iter_mut().zip(residual.iter()) {
            *lam = (*lam + rho * r).max(F::zero());
        }
        if violation <= tol {
            log::trace!("inequalities satisfied after {} augmented-Lagrangian rounds", round + 1);
            return Ok(InnerOutcome {
                z,
                sweeps: total_sweeps,
            });
        }
        if violation > F::lit(0.25) * prev_violation {
            rho = (rho * F::lit(10.0)).min(rho_cap);
        }
        prev_violation = violation;
    }

    Err(GlmPathError::ConstraintInfeasible(format!(
        "linear inequalities still violated by {} after {} rounds",
        prev_violation, settings.max_constraint_iter
    )))
}

/// Run sweeps until the model subgradient is small or the budget is spent.
fn sweep_until_converged<F: GlmFloat>(
    model: &QuadraticModel<'_, F>,
    constraints: &Constraints<F>,
    penalized: Option<&Penalized<'_, F>>,
    z: &mut Array1<F>,
    settings: &InnerSettings<F>,
    rng: &mut StdRng,
) -> usize {
    let offset = model.offset;
    let n_features = model.p1.len();
    let h = model.hessian;

    let direction = &*z - model.center;
    let mut hd = h.dot(&direction);
    let mut az = match penalized {
        Some(pen) => pen.a.dot(&z.slice(ndarray::s![offset..])),
        None => Array1::zeros(0),
    };
    let mut order: Vec<usize> = (0..n_features).collect();
    let mut pieces: Vec<(F, F)> = Vec::new();

    for sweep in 1..=settings.max_sweeps {
        if offset == 1 {
            let hjj = h[[0, 0]];
            if hjj > F::zero() {
                let a = model.gradient[0] + hd[0] - hjj * z[0];
                let t = -a / hjj;
                apply_update(h, penalized, 0, None, t, z, &mut hd, &mut az);
            }
        }

        if settings.selection == Selection::Random {
            order.shuffle(rng);
        }
        for &f in &order {
            let j = f + offset;
            let hjj = h[[j, j]];
            let zj = z[j];
            let a = model.gradient[j] + hd[j] - hjj * zj;

            pieces.clear();
            if let Some(pen) = penalized {
                for k in 0..pen.b.len() {
                    let akf = pen.a[[k, f]];
                    if akf != F::zero() {
                        pieces.push((akf, pen.shifted(&az, k) - akf * zj));
                    }
                }
            }
            let rho = penalized.map_or(F::zero(), |pen| pen.rho);
            let raw = minimize_piecewise(hjj, a, model.p1[f], &pieces, rho);
            let lower = constraints.lower[f];
            let upper = constraints.upper[f];
            let t = raw.max(lower).min(upper);
            let t = if t.is_finite() { t } else { zj };
            apply_update(h, penalized, j, Some(f), t, z, &mut hd, &mut az);
        }

        let mut grad = model.gradient + &hd;
        if let Some(pen) = penalized {
            let extra = pen.gradient(&az);
            for f in 0..n_features {
                grad[f + offset] += extra[f];
            }
        }
        if subgradient_norm(&grad, z, offset, model.p1, constraints) < settings.tol {
            return sweep;
        }
    }
    settings.max_sweeps
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn apply_update<F: GlmFloat>(
    h: &Array2<F>,
    penalized: Option<&Penalized<'_, F>>,
    j: usize,
    feature: Option<usize>,
    t: F,
    z: &mut Array1<F>,
    hd: &mut Array1<F>,
    az: &mut Array1<F>,
) {
    let delta = t - z[j];
    if delta == F::zero() {
        return;
    }
    z[j] = t;
    hd.scaled_add(delta, &h.column(j));
    if let (Some(pen), Some(f)) = (penalized, feature) {
        az.scaled_add(delta, &pen.a.column(f));
    }
}

/// Exact minimizer of
///
/// ```text
/// ½ h t² + a t + p1 |t| + Σₖ ρ/2 · max(0, cₖ t + rₖ)²
/// ```
///
/// Returns ±∞ when the function is unbounded in that direction.
pub(crate) fn minimize_piecewise<F: GlmFloat>(
    h: F,
    a: F,
    p1: F,
    pieces: &[(F, F)],
    rho: F,
) -> F {
    let mut kinks: Vec<F> = pieces.iter().map(|&(c, r)| -r / c).collect();
    if p1 > F::zero() {
        kinks.push(F::zero());
    }
    kinks.retain(|k| k.is_finite());
    kinks.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    kinks.dedup();

    // derivative is slope · t + intercept on the open interval containing `point`
    let affine = |point: F| -> (F, F) {
        let mut slope = h;
        let mut intercept = a;
        if point > F::zero() {
            intercept += p1;
        } else if point < F::zero() {
            intercept -= p1;
        }
        for &(c, r) in pieces {
            if c * point + r > F::zero() {
                slope += rho * c * c;
                intercept += rho * c * r;
            }
        }
        (slope, intercept)
    };

    let n = kinks.len();
    for i in 0..=n {
        let lower = if i == 0 { F::neg_infinity() } else { kinks[i - 1] };
        let upper = if i == n { F::infinity() } else { kinks[i] };
        let point = match (i == 0, i == n) {
            (true, true) => F::zero(),
            (true, false) => upper - upper.abs().max(F::one()),
            (false, true) => lower + lower.abs().max(F::one()),
            (false, false) => F::lit(0.5) * (lower + upper),
        };
        let (slope, intercept) = affine(point);

        if lower.is_finite() && slope * lower + intercept >= F::zero() {
            return lower;
        }
        if slope > F::zero() {
            let t = -intercept / slope;
            if t <= upper {
                return t.max(lower);
            }
        } else if intercept >= F::zero() {
            // flat or increasing from the left end
            return if lower.is_finite() {
                lower
            } else if intercept == F::zero() {
                upper.min(F::zero())
            } else {
                F::neg_infinity()
            };
        }
    }
    F::infinity()
}

/// Max-norm of the minimum-norm subgradient, projected onto the feasible
/// cone of the bounds. The intercept (when `offset == 1`) is unconstrained.
pub(crate) fn subgradient_norm<F: GlmFloat>(
    grad: &Array1<F>,
    coef: &Array1<F>,
    offset: usize,
    p1: &Array1<F>,
    constraints: &Constraints<F>,
) -> F {
    let mut norm = F::zero();
    for j in 0..offset {
        norm = norm.max(grad[j].abs());
    }
    for f in 0..p1.len() {
        let j = f + offset;
        let g = grad[j];
        let beta = coef[j];
        let pen = p1[f];
        let (lo, hi) = if pen > F::zero() {
            if beta > F::zero() {
                (g + pen, g + pen)
            } else if beta < F::zero() {
                (g - pen, g - pen)
            } else {
                (g - pen, g + pen)
            }
        } else {
            (g, g)
        };
        let at_lower = beta <= constraints.lower[f];
        let at_upper = beta >= constraints.upper[f];
        let violation = match (at_lower, at_upper) {
            (true, true) => F::zero(),
            (true, false) => (-hi).max(F::zero()),
            (false, true) => lo.max(F::zero()),
            (false, false) => lo.max(-hi).max(F::zero()),
        };
        norm = norm.max(violation);
    }
    norm
}
