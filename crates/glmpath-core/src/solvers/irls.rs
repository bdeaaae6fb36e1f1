// =============================================================================
// Penalized IRLS: Iteratively Reweighted Least Squares with Elastic Net
// =============================================================================
//
// One call fits ONE penalty point. The outer loop is a Newton-type method on
//
//     f(β) = ½ · deviance(β) + Σⱼ P1ⱼ |βⱼ| + ½ βᵀ P2 β
//
// with sample weights summing to one:
//
//     INIT         start from the supplied (warm-start) coefficients
//     REWEIGHT     working weights W and working response z at the current η
//     check        stop when the minimum-norm subgradient is small enough
//     INNER_SOLVE  minimize the quadratic model
//                      gᵀd + ½ dᵀ H d + Σ P1ⱼ |βⱼ + dⱼ|
//                  with  g = Xᵀ(−W(z − η)) + P2β,  H = XᵀWX + P2
//                  by coordinate descent, or directly when there is no L1
//                  term and no constraint
//     line search  halve the step until the objective decreases enough
//     check        stop when the accepted step is small enough
//
// Running out of iterations is NOT an error: the last iterate is returned
// with `SolveStatus::MaxIterReached`.
//
// THE HESSIAN APPROXIMATION
// -------------------------
// With `hessian_approx > 0`, rows whose working weight is below
// `hessian_approx · max(W)` are dropped from XᵀWX. The gradient still uses
// every row, so the fixed point is unchanged; only the step quality suffers.
//
// =============================================================================

use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;

use crate::constraints::Constraints;
use crate::diagnostics::{FitObserver, IterationEvent};
use crate::error::{GlmPathError, Result};
use crate::families::{working_set, Family};
use crate::float::GlmFloat;
use crate::links::Link;
use crate::matrix::DesignMatrix;
use crate::regularization::{L2Penalty, Penalty};
use crate::standardize::{split_coef, StandardizedMatrix};

use super::coordinate_descent::{coordinate_descent, subgradient_norm, InnerSettings, QuadraticModel};
use super::{SolverConfig, SolverKind};

/// Halvings tried by the line search before giving up.
const MAX_LINE_SEARCH_STEPS: usize = 30;

/// Sufficient-decrease factor of the line search.
const ARMIJO: f64 = 1e-4;

// =============================================================================
// Problem and result
// =============================================================================

/// Data for one penalized fit, already in standardized coordinates.
///
/// The coefficient vector carries the intercept at position 0 when
/// `fit_intercept` is set.
pub struct GlmProblem<'a, F: GlmFloat, M: DesignMatrix<F>> {
    pub x: &'a StandardizedMatrix<'a, F, M>,
    pub y: &'a Array1<F>,
    /// Sample weights, summing to one.
    pub weights: &'a Array1<F>,
    pub offset: Option<&'a Array1<F>>,
    pub family: &'a dyn Family<F>,
    pub link: &'a dyn Link<F>,
    pub fit_intercept: bool,
    /// Bounds and inequalities on the standardized feature coefficients.
    pub constraints: &'a Constraints<F>,
}

impl<'a, F: GlmFloat, M: DesignMatrix<F>> GlmProblem<'a, F, M> {
    /// Number of coefficients including the intercept.
    pub fn n_coef(&self) -> usize {
        self.x.ncols() + self.intercept_offset()
    }

    fn intercept_offset(&self) -> usize {
        usize::from(self.fit_intercept)
    }

    fn linear_predictor(&self, coef: &Array1<F>) -> Array1<F> {
        self.x.linear_predictor(coef, self.fit_intercept, self.offset)
    }

    /// ½ · deviance(μ) + penalty(β).
    fn objective(&self, eta: &Array1<F>, coef: &Array1<F>, penalty: &Penalty<F>) -> F {
        let mu = self.link.inverse(eta);
        let (_, beta) = split_coef(coef, self.fit_intercept);
        F::lit(0.5) * self.family.deviance(self.y, &mu, Some(self.weights)) + penalty.value(&beta)
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// A gradient or step-size criterion was met.
    Converged,
    /// The iteration budget ran out.
    MaxIterReached,
    /// The line search found no decrease before any criterion was met.
    Stalled,
}

/// Output of one penalized solve.
#[derive(Debug, Clone)]
pub struct SolveResult<F: GlmFloat> {
    /// Standardized coefficients (intercept first when fitted).
    pub coef: Array1<F>,
    /// Outer iterations performed.
    pub n_iter: usize,
    pub status: SolveStatus,
    /// Penalized objective at `coef`.
    pub objective: F,
}

impl<F: GlmFloat> SolveResult<F> {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

// =============================================================================
// Start values
// =============================================================================

/// Default start: all feature coefficients zero, intercept at the link of
/// the weighted mean response minus the weighted mean offset.
pub fn start_coefficients<F: GlmFloat, M: DesignMatrix<F>>(
    problem: &GlmProblem<'_, F, M>,
) -> Array1<F> {
    let mut coef = Array1::zeros(problem.n_coef());
    if problem.fit_intercept {
        let total = problem.weights.sum();
        let mean_y = problem.weights.dot(problem.y) / total;
        let mean_offset = problem
            .offset
            .map_or(F::zero(), |o| problem.weights.dot(o) / total);
        coef[0] = problem.link.link_scalar(mean_y) - mean_offset;
    }
    coef
}

// =============================================================================
// Main loop
// =============================================================================

/// Minimize the penalized objective for one penalty point.
///
/// # Arguments
/// * `problem` - standardized data, family, link and constraints
/// * `penalty` - P1 / P2 already scaled to this (alpha, l1_ratio)
/// * `start` - warm start (intercept first when fitted)
/// * `config` - iteration limits and tolerances
/// * `kind` - resolved inner solver (`IrlsCd` or `IrlsLs`)
/// * `observer` - receives one event per iteration
/// * `rng` - drives random coordinate selection
///
/// # Errors
/// * `DimensionMismatch` if `start` has the wrong length
/// * `ConstraintInfeasible` if the inequalities cannot be satisfied
/// * `LinearAlgebraError` if the direct solve hits a singular system
#[allow(clippy::too_many_arguments)]
pub fn solve_penalized<F: GlmFloat, M: DesignMatrix<F>>(
    problem: &GlmProblem<'_, F, M>,
    penalty: &Penalty<F>,
    start: &Array1<F>,
    config: &SolverConfig<F>,
    kind: SolverKind,
    observer: &dyn FitObserver,
    rng: &mut StdRng,
) -> Result<SolveResult<F>> {
    let n_coef = problem.n_coef();
    if start.len() != n_coef {
        return Err(GlmPathError::DimensionMismatch(format!(
            "start coefficients have {} elements, expected {}",
            start.len(),
            n_coef
        )));
    }
    let offset = problem.intercept_offset();
    let constraints = problem.constraints;

    let mut coef = start.clone();
    {
        let mut beta = coef.slice_mut(s![offset..]);
        for (f, b) in beta.iter_mut().enumerate() {
            *b = b.max(constraints.lower[f]).min(constraints.upper[f]);
        }
    }
    let n_ineq = constraints.inequalities.as_ref().map_or(0, |i| i.b.len());
    let mut multipliers = Array1::zeros(n_ineq);

    let floor = F::lit(100.0) * F::epsilon();
    let inner_floor = config
        .gradient_tol
        .map_or(floor, |t| (F::lit(0.1) * t).max(floor));

    let mut eta = problem.linear_predictor(&coef);
    let mut objective = problem.objective(&eta, &coef, penalty);
    let mut n_iter = 0;
    let mut status = SolveStatus::MaxIterReached;

    loop {
        // ---------------------------------------------------------------------
        // REWEIGHT
        // ---------------------------------------------------------------------
        let ws = working_set(problem.family, problem.link, problem.y, &eta, problem.weights);
        let row_grad = ws.eta_gradient(&eta);
        let (_, beta) = split_coef(&coef, problem.fit_intercept);

        let mut grad = Array1::zeros(n_coef);
        if problem.fit_intercept {
            grad[0] = row_grad.sum();
        }
        let feature_grad = problem.x.transpose_matvec(&row_grad) + penalty.p2.matvec(&beta);
        grad.slice_mut(s![offset..]).assign(&feature_grad);

        let mut check_grad = grad.clone();
        if let Some(ineq) = &constraints.inequalities {
            let shift = ineq.a.t().dot(&multipliers);
            let mut tail = check_grad.slice_mut(s![offset..]);
            tail += &shift;
        }
        let sub_norm = subgradient_norm(&check_grad, &coef, offset, &penalty.p1, constraints);

        if let Some(tol) = config.gradient_tol {
            let feasible = constraints
                .inequalities
                .as_ref()
                .map_or(true, |i| i.is_satisfied(&beta, config.feasibility_tol));
            if sub_norm < tol && feasible {
                status = SolveStatus::Converged;
                break;
            }
        }
        if n_iter >= config.max_iter {
            break;
        }
        n_iter += 1;

        // ---------------------------------------------------------------------
        // INNER_SOLVE
        // ---------------------------------------------------------------------
        let hessian = build_hessian(problem, &ws.working_weights, &penalty.p2, config.hessian_approx);
        let (target, sweeps) = match kind {
            SolverKind::IrlsLs => (least_squares_step(&hessian, &grad, &coef)?, 0),
            SolverKind::IrlsCd | SolverKind::Auto => {
                let model = QuadraticModel {
                    hessian: &hessian,
                    gradient: &grad,
                    center: &coef,
                    p1: &penalty.p1,
                    offset,
                };
                let settings = InnerSettings {
                    tol: (F::lit(0.1) * sub_norm).max(inner_floor),
                    max_sweeps: config.max_inner_iter,
                    selection: config.selection,
                    feasibility_tol: config.feasibility_tol,
                    max_constraint_iter: config.max_constraint_iter,
                };
                let out = coordinate_descent(&model, constraints, &mut multipliers, &settings, rng)?;
                (out.z, out.sweeps)
            }
        };

        // ---------------------------------------------------------------------
        // Line search
        // ---------------------------------------------------------------------
        let direction = &target - &coef;
        let (d_intercept, d_beta) = split_coef(&direction, problem.fit_intercept);
        let mut eta_direction = problem.x.matvec(&d_beta);
        if d_intercept != F::zero() {
            eta_direction.mapv_inplace(|e| e + d_intercept);
        }

        let (_, target_beta) = split_coef(&target, problem.fit_intercept);
        let l1 = |b: &Array1<F>| -> F {
            b.iter().zip(penalty.p1.iter()).map(|(&v, &p)| p * v.abs()).sum()
        };
        let predicted = (grad.dot(&direction) + l1(&target_beta) - l1(&beta)).min(F::zero());
        let start_feasible = constraints
            .inequalities
            .as_ref()
            .map_or(true, |i| i.is_satisfied(&beta, config.feasibility_tol));
        let slack = F::lit(10.0) * F::epsilon() * objective.abs().max(F::one());

        let mut step = F::one();
        let mut accepted = None;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let trial_coef = &coef + &(&direction * step);
            let trial_eta = &eta + &(&eta_direction * step);
            let trial_obj = problem.objective(&trial_eta, &trial_coef, penalty);
            // an infeasible start takes the full step to the feasible target
            let sufficient = trial_obj <= objective + F::lit(ARMIJO) * step * predicted + slack;
            if !start_feasible || (trial_obj.is_finite() && sufficient) {
                accepted = Some((trial_coef, trial_eta, trial_obj));
                break;
            }
            step = step * F::lit(0.5);
        }

        let (new_coef, new_eta, new_obj) = match accepted {
            Some(found) => found,
            None => {
                log::debug!(
                    "line search found no decrease at iteration {} (|subgrad| = {:.3e})",
                    n_iter,
                    sub_norm.as_f64()
                );
                status = SolveStatus::Stalled;
                break;
            }
        };

        let step_norm = (&new_coef - &coef).mapv(|v| v * v).sum().sqrt();
        coef = new_coef;
        eta = new_eta;
        objective = new_obj;

        observer.on_iteration(&IterationEvent {
            iteration: n_iter,
            objective: objective.as_f64(),
            subgradient_norm: sub_norm.as_f64(),
            step_norm: step_norm.as_f64(),
            inner_sweeps: sweeps,
        });
        log::trace!(
            "irls iteration {}: objective = {:.6e}, step = {:.3e}, sweeps = {}",
            n_iter,
            objective.as_f64(),
            step_norm.as_f64(),
            sweeps
        );

        if let Some(tol) = config.step_size_tol {
            if step_norm < tol {
                status = SolveStatus::Converged;
                break;
            }
        }
    }

    if status == SolveStatus::MaxIterReached {
        log::warn!(
            "penalized IRLS stopped after {} iterations without converging",
            n_iter
        );
    }

    Ok(SolveResult {
        coef,
        n_iter,
        status,
        objective,
    })
}

/// H = XsᵀDXs + P2 with the intercept row / column in front.
fn build_hessian<F: GlmFloat, M: DesignMatrix<F>>(
    problem: &GlmProblem<'_, F, M>,
    working_weights: &Array1<F>,
    p2: &L2Penalty<F>,
    hessian_approx: F,
) -> Array2<F> {
    let d = if hessian_approx > F::zero() {
        let max_w = working_weights.iter().fold(F::zero(), |acc, &w| acc.max(w));
        let threshold = hessian_approx * max_w;
        working_weights.mapv(|w| if w < threshold { F::zero() } else { w })
    } else {
        working_weights.clone()
    };

    let offset = problem.intercept_offset();
    let p = problem.x.ncols();
    let mut h = Array2::zeros((p + offset, p + offset));
    h.slice_mut(s![offset.., offset..])
        .assign(&problem.x.sandwich(&d));
    p2.add_to(&mut h, offset);
    if problem.fit_intercept {
        h[[0, 0]] = d.sum();
        let cross = problem.x.transpose_matvec(&d);
        for j in 0..p {
            h[[0, j + 1]] = cross[j];
            h[[j + 1, 0]] = cross[j];
        }
    }
    h
}

/// Newton target c − H⁻¹g, retrying once with a small ridge if H is singular.
fn least_squares_step<F: GlmFloat>(
    hessian: &Array2<F>,
    grad: &Array1<F>,
    coef: &Array1<F>,
) -> Result<Array1<F>> {
    let rhs = grad.mapv(|g| -g);
    if let Some(delta) = F::solve_spd(hessian, &rhs).filter(|d| d.iter().all(|v| v.is_finite())) {
        return Ok(coef + &delta);
    }
    let n = hessian.nrows();
    let scale = (0..n)
        .map(|i| hessian[[i, i]])
        .fold(F::zero(), |acc, v| acc.max(v.abs()))
        .max(F::one());
    let mut jittered = hessian.clone();
    for i in 0..n {
        jittered[[i, i]] += F::epsilon().sqrt() * scale;
    }
    F::solve_spd(&jittered, &rhs)
        .filter(|d| d.iter().all(|v| v.is_finite()))
        .map(|delta| coef + &delta)
        .ok_or_else(|| {
            GlmPathError::LinearAlgebraError(
                "penalized normal equations are singular".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopObserver;
    use crate::families::{BinomialFamily, GaussianFamily, PoissonFamily};
    use crate::links::{IdentityLink, LogLink, LogitLink};
    use crate::regularization::RegularizationConfig;
    use crate::standardize::ColumnScaling;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.5, 1.0],
            [1.5, -0.5],
            [-1.0, 0.3],
            [2.0, 1.2],
            [0.0, -1.1],
            [-0.7, 0.4],
            [1.1, 0.9],
            [-1.4, -0.6]
        ];
        let y = array![2.1, 3.9, -0.4, 5.2, 0.1, 0.3, 3.4, -1.3];
        (x, y)
    }

    fn unit_weights(n: usize) -> Array1<f64> {
        Array1::from_elem(n, 1.0 / n as f64)
    }

    fn ridge_penalty(alpha: f64) -> Penalty<f64> {
        RegularizationConfig::ridge(alpha).apply(&Array1::ones(2), &L2Penalty::Diagonal(Array1::ones(2)))
    }

    #[test]
    fn test_unpenalized_gaussian_matches_normal_equations() {
        let (x, y) = data();
        let w = unit_weights(8);
        let scaling = ColumnScaling::identity(2);
        let xs = StandardizedMatrix::new(&x, &scaling);
        let cons = Constraints::unconstrained(2);
        let problem = GlmProblem {
            x: &xs,
            y: &y,
            weights: &w,
            offset: None,
            family: &GaussianFamily,
            link: &IdentityLink,
            fit_intercept: true,
            constraints: &cons,
        };
        let cfg = SolverConfig::default().with_gradient_tol(Some(1e-10));
        let start = start_coefficients(&problem);
        let mut rng = StdRng::seed_from_u64(0);
        let res = solve_penalized(
            &problem,
            &ridge_penalty(0.0),
            &start,
            &cfg,
            SolverKind::IrlsLs,
            &NoopObserver,
            &mut rng,
        )
        .unwrap();
        assert!(res.converged());

        // explicit least squares with an intercept column
        let mut xa = Array2::ones((8, 3));
        xa.slice_mut(s![.., 1..]).assign(&x);
        let xtx = xa.t().dot(&xa);
        let xty = xa.t().dot(&y);
        let beta = f64::solve_spd(&xtx, &xty).unwrap();
        for j in 0..3 {
            assert_abs_diff_eq!(res.coef[j], beta[j], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_cd_and_ls_agree_for_ridge() {
        let (x, y) = data();
        let w = unit_weights(8);
        let y_count = y.mapv(|v: f64| v.abs().round());
        let scaling = ColumnScaling::identity(2);
        let xs = StandardizedMatrix::new(&x, &scaling);
        let cons = Constraints::unconstrained(2);
        let problem = GlmProblem {
            x: &xs,
            y: &y_count,
            weights: &w,
            offset: None,
            family: &PoissonFamily,
            link: &LogLink,
            fit_intercept: true,
            constraints: &cons,
        };
        let cfg = SolverConfig::default().with_gradient_tol(Some(1e-9));
        let start = start_coefficients(&problem);
        let penalty = ridge_penalty(0.05);
        let mut rng = StdRng::seed_from_u64(0);
        let ls = solve_penalized(&problem, &penalty, &start, &cfg, SolverKind::IrlsLs, &NoopObserver, &mut rng)
            .unwrap();
        let cd = solve_penalized(&problem, &penalty, &start, &cfg, SolverKind::IrlsCd, &NoopObserver, &mut rng)
            .unwrap();
        assert!(ls.converged() && cd.converged());
        for j in 0..3 {
            assert_abs_diff_eq!(ls.coef[j], cd.coef[j], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_strong_lasso_zeroes_every_feature() {
        let (x, y) = data();
        let w = unit_weights(8);
        let y_bin = y.mapv(|v: f64| if v > 1.0 { 1.0 } else { 0.0 });
        let scaling = ColumnScaling::identity(2);
        let xs = StandardizedMatrix::new(&x, &scaling);
        let cons = Constraints::unconstrained(2);
        let problem = GlmProblem {
            x: &xs,
            y: &y_bin,
            weights: &w,
            offset: None,
            family: &BinomialFamily,
            link: &LogitLink,
            fit_intercept: true,
            constraints: &cons,
        };
        let penalty = RegularizationConfig::lasso(100.0)
            .apply(&Array1::ones(2), &L2Penalty::Diagonal(Array1::ones(2)));
        let start = start_coefficients(&problem);
        let mut rng = StdRng::seed_from_u64(0);
        let res = solve_penalized(
            &problem,
            &penalty,
            &start,
            &SolverConfig::default(),
            SolverKind::IrlsCd,
            &NoopObserver,
            &mut rng,
        )
        .unwrap();
        assert_eq!(res.coef[1], 0.0);
        assert_eq!(res.coef[2], 0.0);
        // intercept is the logit of the mean
        assert_abs_diff_eq!(res.coef[0], (0.5f64 / 0.5).ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_max_iter_is_reported_not_raised() {
        let (x, y) = data();
        let w = unit_weights(8);
        let scaling = ColumnScaling::identity(2);
        let xs = StandardizedMatrix::new(&x, &scaling);
        let cons = Constraints::unconstrained(2);
        let y_count = y.mapv(|v: f64| v.abs().round());
        let problem = GlmProblem {
            x: &xs,
            y: &y_count,
            weights: &w,
            offset: None,
            family: &PoissonFamily,
            link: &LogLink,
            fit_intercept: true,
            constraints: &cons,
        };
        let cfg = SolverConfig::default()
            .with_max_iter(1)
            .with_gradient_tol(Some(1e-14));
        let start = start_coefficients(&problem);
        let mut rng = StdRng::seed_from_u64(0);
        let res = solve_penalized(&problem, &ridge_penalty(0.0), &start, &cfg, SolverKind::IrlsLs, &NoopObserver, &mut rng)
            .unwrap();
        assert_eq!(res.n_iter, 1);
        assert_eq!(res.status, SolveStatus::MaxIterReached);
    }

    #[test]
    fn test_wrong_start_length_is_rejected() {
        let (x, y) = data();
        let w = unit_weights(8);
        let scaling = ColumnScaling::identity(2);
        let xs = StandardizedMatrix::new(&x, &scaling);
        let cons = Constraints::unconstrained(2);
        let problem = GlmProblem {
            x: &xs,
            y: &y,
            weights: &w,
            offset: None,
            family: &GaussianFamily,
            link: &IdentityLink,
            fit_intercept: false,
            constraints: &cons,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let res = solve_penalized(
            &problem,
            &ridge_penalty(1.0),
            &Array1::zeros(3),
            &SolverConfig::default(),
            SolverKind::IrlsLs,
            &NoopObserver,
            &mut rng,
        );
        assert!(matches!(res, Err(GlmPathError::DimensionMismatch(_))));
    }
}
