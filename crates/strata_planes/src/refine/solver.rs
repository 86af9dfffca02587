//! Constrained nonlinear minimization seam.
//!
//! The relaxation refiner hands an [`Objective`] with an analytic gradient,
//! an initial point, and a set of equality pins to a [`ConstrainedSolver`].
//! [`ProjectedGradient`] is the in-process implementation: steepest descent
//! with Armijo backtracking, projected onto the pinned coordinates after
//! every step.

use strata_config::RelaxationConfig;

/// A differentiable objective over a real vector.
pub trait Objective {
    /// Objective value at `x`.
    fn value(&self, x: &[f64]) -> f64;

    /// Writes the gradient at `x` into `grad` (same length, pre-zeroed by the caller).
    fn gradient(&self, x: &[f64], grad: &mut [f64]);
}

/// Pins variable `index` to `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualityConstraint {
    /// Variable index.
    pub index: usize,
    /// Required value.
    pub value: f64,
}

/// Why a solve failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverFailure {
    /// A constraint names a variable that does not exist.
    #[error("constraint on variable {index} but only {len} variables")]
    ConstraintOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of variables.
        len: usize,
    },

    /// The objective produced NaN or infinity.
    #[error("objective is not finite at iteration {iteration}")]
    NonFinite {
        /// Iteration at which it happened.
        iteration: u32,
    },
}

/// Minimizes an objective subject to equality pins.
pub trait ConstrainedSolver {
    /// Returns a minimizer of the same length as `initial` that satisfies
    /// every constraint.
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        constraints: &[EqualityConstraint],
    ) -> Result<Vec<f64>, SolverFailure>;
}

/// Projected steepest descent with a backtracking line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedGradient {
    /// Iteration cap.
    pub max_iterations: u32,
    /// Stop once the projected gradient norm falls to this value.
    pub tolerance: f64,
}

impl Default for ProjectedGradient {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

impl From<&RelaxationConfig> for ProjectedGradient {
    fn from(config: &RelaxationConfig) -> Self {
        Self {
            max_iterations: config.max_solver_iterations,
            tolerance: config.tolerance,
        }
    }
}

const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-12;

fn project(x: &mut [f64], constraints: &[EqualityConstraint]) {
    for c in constraints {
        x[c.index] = c.value;
    }
}

impl ConstrainedSolver for ProjectedGradient {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        constraints: &[EqualityConstraint],
    ) -> Result<Vec<f64>, SolverFailure> {
        let len = initial.len();
        if let Some(c) = constraints.iter().find(|c| c.index >= len) {
            return Err(SolverFailure::ConstraintOutOfRange {
                index: c.index,
                len,
            });
        }

        let mut x = initial.to_vec();
        project(&mut x, constraints);
        let mut grad = vec![0.0; len];
        let mut candidate = vec![0.0; len];

        for iteration in 0..self.max_iterations {
            let fx = objective.value(&x);
            if !fx.is_finite() {
                return Err(SolverFailure::NonFinite { iteration });
            }
            grad.fill(0.0);
            objective.gradient(&x, &mut grad);
            for c in constraints {
                grad[c.index] = 0.0;
            }
            let norm_sq: f64 = grad.iter().map(|g| g * g).sum();
            if norm_sq.sqrt() <= self.tolerance {
                break;
            }

            let mut step = 1.0;
            loop {
                for ((c, xi), gi) in candidate.iter_mut().zip(&x).zip(&grad) {
                    *c = xi - step * gi;
                }
                project(&mut candidate, constraints);
                if objective.value(&candidate) <= fx - ARMIJO * step * norm_sq {
                    std::mem::swap(&mut x, &mut candidate);
                    break;
                }
                step *= 0.5;
                if step < MIN_STEP {
                    return Ok(x);
                }
            }
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `Σ (x[i] - x[j])²` over index pairs.
    struct Pairs(Vec<(usize, usize)>);

    impl Objective for Pairs {
        fn value(&self, x: &[f64]) -> f64 {
            self.0.iter().map(|&(i, j)| (x[i] - x[j]).powi(2)).sum()
        }

        fn gradient(&self, x: &[f64], grad: &mut [f64]) {
            for &(i, j) in &self.0 {
                let d = 2.0 * (x[i] - x[j]);
                grad[i] += d;
                grad[j] -= d;
            }
        }
    }

    #[test]
    fn free_variable_moves_to_pinned_neighbours_mean() {
        let objective = Pairs(vec![(0, 1), (0, 2)]);
        let pins = [
            EqualityConstraint {
                index: 1,
                value: 2.0,
            },
            EqualityConstraint {
                index: 2,
                value: 6.0,
            },
        ];
        let x = ProjectedGradient::default()
            .minimize(&objective, &[0.0, 0.0, 0.0], &pins)
            .unwrap();
        assert!((x[0] - 4.0).abs() < 1e-4, "got {}", x[0]);
        assert_eq!(x[1], 2.0);
        assert_eq!(x[2], 6.0);
    }

    #[test]
    fn fully_pinned_problem_is_unchanged() {
        let objective = Pairs(vec![(0, 1)]);
        let pins = [
            EqualityConstraint {
                index: 0,
                value: 1.0,
            },
            EqualityConstraint {
                index: 1,
                value: 3.0,
            },
        ];
        let x = ProjectedGradient::default()
            .minimize(&objective, &[1.0, 3.0], &pins)
            .unwrap();
        assert_eq!(x, vec![1.0, 3.0]);
    }

    #[test]
    fn built_from_relaxation_settings() {
        let solver = ProjectedGradient::from(&RelaxationConfig::default());
        assert_eq!(solver, ProjectedGradient::default());
    }

    #[test]
    fn constraint_out_of_range() {
        let err = ProjectedGradient::default()
            .minimize(
                &Pairs(vec![]),
                &[0.0],
                &[EqualityConstraint {
                    index: 3,
                    value: 0.0,
                }],
            )
            .unwrap_err();
        assert_eq!(err, SolverFailure::ConstraintOutOfRange { index: 3, len: 1 });
    }
}
