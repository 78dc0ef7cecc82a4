use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::error::{Error, Result};

/// Timed-out solves allowed to keep running before new solves are refused.
const MAX_ABANDONED_SOLVES: usize = 1;

static ABANDONED_SOLVES: Mutex<Vec<JoinHandle<()>>> = Mutex::new(Vec::new());

/// A maximization LP over variables bounded by `[0, upper]` with `<=` constraints only.
#[derive(Debug, Clone, Default)]
pub struct PackingLp {
    objective: Vec<f64>,
    upper: Vec<f64>,
    constraints: Vec<(Vec<(usize, f64)>, f64)>,
}

impl PackingLp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable and returns its column.
    pub fn add_variable(&mut self, objective: f64, upper: f64) -> usize {
        self.objective.push(objective);
        self.upper.push(upper);
        self.objective.len() - 1
    }

    pub fn add_le_constraint(&mut self, terms: Vec<(usize, f64)>, rhs: f64) {
        if !terms.is_empty() {
            self.constraints.push((terms, rhs));
        }
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Solves the LP on the calling thread and returns one value per variable.
    pub fn solve(&self) -> Result<Vec<f64>> {
        if self.objective.is_empty() {
            return Ok(Vec::new());
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let vars: Vec<_> = self.objective.iter().zip(&self.upper).map(|(obj, upper)| problem.add_var(*obj, (0.0, *upper))).collect();

        for (terms, rhs) in &self.constraints {
            let mut expr = LinearExpr::empty();
            for (col, coeff) in terms {
                expr.add(vars[*col], *coeff);
            }
            problem.add_constraint(expr, ComparisonOp::Le, *rhs);
        }

        let solution = problem.solve().map_err(|e| Error::SolverError(e.to_string()))?;
        Ok(vars.iter().map(|var| solution[*var]).collect())
    }

    /// Solves the LP on a helper thread and gives up after `limit`. An abandoned
    /// solve runs to completion in the background and its result is dropped.
    /// While such a solve is still running, no new one is started and an error
    /// is returned instead, so callers take their fallback path.
    pub fn solve_within(self, limit: Duration) -> Result<Vec<f64>> {
        self.solve_tracked(limit, &ABANDONED_SOLVES, MAX_ABANDONED_SOLVES)
    }

    fn solve_tracked(self, limit: Duration, abandoned: &Mutex<Vec<JoinHandle<()>>>, max_abandoned: usize) -> Result<Vec<f64>> {
        {
            let mut running = abandoned.lock().unwrap_or_else(PoisonError::into_inner);
            running.retain(|handle| !handle.is_finished());
            if running.len() >= max_abandoned {
                log::warn!("PackingLp: {} timed-out solve(s) still running, skipping this solve.", running.len());
                return Err(Error::SolverError("previous solve still running".to_string()));
            }
        }

        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("lp-solver".to_string())
            .spawn(move || {
                let _ = tx.send(self.solve());
            })
            .map_err(|e| Error::SolverError(format!("could not spawn solver thread: {}", e)))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                abandoned.lock().unwrap_or_else(PoisonError::into_inner).push(handle);
                Err(Error::SolverError(format!("no solution within {} ms", limit.as_millis())))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::SolverError("solver thread terminated".to_string())),
        }
    }
}
