// =============================================================================
// Fit Diagnostics
// =============================================================================
//
// The solvers never print. Progress and sanity checks are reported two ways:
//
//   - through the `log` facade (debug level per iteration / path point,
//     warn level for iteration-budget exits and fallbacks)
//   - through an opt-in `FitObserver` the caller attaches to the config
//
// An observer is shared by every parallel cross-validation job, so it must
// be `Send + Sync` and must not assume events arrive in any order. Events
// carry their (fold, l1 index, alpha index) coordinates so they can be
// reassembled.
//
// =============================================================================

/// One outer IRLS iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationEvent {
    /// 1-based iteration counter.
    pub iteration: usize,
    /// Penalized objective after the step.
    pub objective: f64,
    /// Max-norm of the minimum-norm subgradient before the step.
    pub subgradient_norm: f64,
    /// L2 norm of the accepted step.
    pub step_norm: f64,
    /// Coordinate-descent sweeps spent in the inner solve (0 for a direct solve).
    pub inner_sweeps: usize,
}

/// One solved point of a regularization path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPointEvent {
    /// Fold index, `None` for the final full-data refit.
    pub fold: Option<usize>,
    pub l1_index: usize,
    pub alpha_index: usize,
    pub alpha: f64,
    /// Held-out deviance (NaN for the final refit).
    pub deviance: f64,
    pub n_iter: usize,
    pub converged: bool,
}

/// When a penalty definiteness check was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyCheckStage {
    BeforeStandardization,
    AfterStandardization,
}

/// Result of checking P2 for positive semidefiniteness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyCheck {
    pub stage: PenaltyCheckStage,
    /// Fold index, `None` for checks on the full data.
    pub fold: Option<usize>,
    pub l1_index: Option<usize>,
    pub positive_semidefinite: bool,
}

/// Receives structured events while fitting. Every method defaults to a no-op.
pub trait FitObserver: Send + Sync {
    fn on_iteration(&self, _event: &IterationEvent) {}

    fn on_path_point(&self, _event: &PathPointEvent) {}

    fn on_penalty_check(&self, _check: &PenaltyCheck) {}
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {}

/// Forwards every event to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl FitObserver for LogObserver {
    fn on_iteration(&self, e: &IterationEvent) {
        log::debug!(
            "iteration {}: objective = {:.6e}, |subgrad| = {:.2e}, |step| = {:.2e}, sweeps = {}",
            e.iteration,
            e.objective,
            e.subgradient_norm,
            e.step_norm,
            e.inner_sweeps
        );
    }

    fn on_path_point(&self, e: &PathPointEvent) {
        log::debug!(
            "fold {:?}, l1 #{}, alpha #{} ({:.4e}): deviance = {:.6e}, n_iter = {}, converged = {}",
            e.fold,
            e.l1_index,
            e.alpha_index,
            e.alpha,
            e.deviance,
            e.n_iter,
            e.converged
        );
    }

    fn on_penalty_check(&self, c: &PenaltyCheck) {
        let stage = match c.stage {
            PenaltyCheckStage::BeforeStandardization => "before",
            PenaltyCheckStage::AfterStandardization => "after",
        };
        if c.positive_semidefinite {
            log::debug!("P2 is positive semidefinite {} standardization (fold {:?})", stage, c.fold);
        } else {
            log::warn!(
                "P2 is not positive semidefinite {} standardization (fold {:?})",
                stage,
                c.fold
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        iterations: AtomicUsize,
    }

    impl FitObserver for Counting {
        fn on_iteration(&self, _event: &IterationEvent) {
            self.iterations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let obs = Counting::default();
        let check = PenaltyCheck {
            stage: PenaltyCheckStage::AfterStandardization,
            fold: Some(0),
            l1_index: None,
            positive_semidefinite: true,
        };
        obs.on_penalty_check(&check);
        obs.on_iteration(&IterationEvent {
            iteration: 1,
            objective: 0.5,
            subgradient_norm: 1e-3,
            step_norm: 0.1,
            inner_sweeps: 2,
        });
        assert_eq!(obs.iterations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_observers_are_object_safe() {
        let observers: Vec<Box<dyn FitObserver>> = vec![Box::new(NoopObserver), Box::new(LogObserver)];
        let event = PathPointEvent {
            fold: None,
            l1_index: 0,
            alpha_index: 3,
            alpha: 0.1,
            deviance: f64::NAN,
            n_iter: 4,
            converged: true,
        };
        for obs in &observers {
            obs.on_path_point(&event);
        }
    }
}
