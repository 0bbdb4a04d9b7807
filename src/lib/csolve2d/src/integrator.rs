use ndarray::{Array2, Array3};
use tracing::warn;

use crate::error::{SolverError, SolverResult};
use crate::geometry::Geometry;
use crate::state::PrimitiveState;

/// Time-integration accuracy selector (§4.6). Anything else is a fatal
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStepAccuracy {
    ForwardEuler,
    Rk4,
}

impl TimeStepAccuracy {
    pub fn parse(code: &str) -> SolverResult<Self> {
        match code {
            "none" => Ok(TimeStepAccuracy::ForwardEuler),
            "RK4" => Ok(TimeStepAccuracy::Rk4),
            other => Err(SolverError::config(
                "integrator",
                format!("unknown time_step_accuracy '{other}', expected 'none' or 'RK4'"),
            )),
        }
    }
}

/// Forward-Euler positivity-guarded update (§4.6): Q' = Q - (dE/dx) dt/V,
/// accepted cell-by-cell only if Q'_rho > 0 and Q'_p > 0; otherwise the cell
/// retains its previous value. NumericalError on a rejected cell is logged,
/// not fatal (§7) — the guard itself is the robustness mechanism.
pub fn positivity_guarded_update(
    base: &PrimitiveState,
    dedx: &Array3<f64>,
    dt: &Array2<f64>,
    geometry: &Geometry,
) -> PrimitiveState {
    let mut next = base.clone();
    let (icols, jrows) = geometry.volume.dim();

    for i in 0..icols {
        for j in 0..jrows {
            let si = i + 1;
            let sj = j + 1;
            let coeff = dt[[i, j]] / geometry.volume[[i, j]];

            let new_rho = base.rho(si, sj) - dedx[[i, j, 0]] * coeff;
            let new_u = base.u(si, sj) - dedx[[i, j, 1]] * coeff;
            let new_v = base.v(si, sj) - dedx[[i, j, 2]] * coeff;
            let new_p = base.p(si, sj) - dedx[[i, j, 3]] * coeff;

            if new_rho > 0.0 && new_p > 0.0 {
                next.set_cell(si, sj, new_rho, new_u, new_v, new_p);
            } else {
                warn!(
                    i = si,
                    j = sj,
                    rho = new_rho,
                    p = new_p,
                    "positivity guard rejected candidate update, retaining previous state"
                );
            }
        }
    }

    next
}

/// Classic 4-stage RK4 final combination (§4.6 step 5):
///   Q = Q_n - dt/V * (dEdx_1/6 + dEdx_2/3 + dEdx_3/3 + dEdx_4/6)
/// applied through the same positivity guard as forward Euler.
pub fn rk4_final_update(
    q_n: &PrimitiveState,
    dedx_1: &Array3<f64>,
    dedx_2: &Array3<f64>,
    dedx_3: &Array3<f64>,
    dedx_4: &Array3<f64>,
    dt: &Array2<f64>,
    geometry: &Geometry,
) -> PrimitiveState {
    let shape = dedx_1.dim();
    let mut combined = Array3::zeros(shape);
    for ((((c, d1), d2), d3), d4) in combined
        .iter_mut()
        .zip(dedx_1.iter())
        .zip(dedx_2.iter())
        .zip(dedx_3.iter())
        .zip(dedx_4.iter())
    {
        *c = d1 / 6.0 + d2 / 3.0 + d3 / 3.0 + d4 / 6.0;
    }

    positivity_guarded_update(q_n, &combined, dt, geometry)
}

/// RK4 stage Δt levels relative to the base step Δt computed at Q_n (§4.6,
/// §9 design decision): stages 2 and 3 use Δt/2, stage 4 uses the full Δt —
/// each measured from Q_n, matching the classic Butcher tableau node set
/// {0, 1/2, 1/2, 1} rather than the compounding (non-obvious) scaling the
/// original routine's arithmetic produced.
pub fn rk4_stage_dt(base_dt: &Array2<f64>, stage: u8) -> Array2<f64> {
    match stage {
        2 | 3 => base_dt.mapv(|dt| 0.5 * dt),
        4 => base_dt.clone(),
        _ => unreachable!("rk4 stages are numbered 2..=4"),
    }
}

/// Tracks resnorm_0 and performs the tolerance comparison (§4.7): this
/// implementation performs the documented intent (a real comparison), not
/// the original routine's unconditional `false`.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    tolerance: f64,
    resnorm_0: Option<f64>,
}

impl ConvergenceTracker {
    pub fn new(tolerance: f64) -> Self {
        ConvergenceTracker { tolerance, resnorm_0: None }
    }

    /// Record this iteration's resnorm (setting resnorm_0 on iter 1) and
    /// report whether the run has converged. A zero initial residual (e.g.
    /// an exact free-stream field) means the flow started already at steady
    /// state, so it is reported as converged rather than dividing by zero.
    pub fn observe(&mut self, iter: usize, resnorm: f64) -> bool {
        if iter == 1 {
            self.resnorm_0 = Some(resnorm);
        }
        let resnorm_0 = self.resnorm_0.unwrap_or(resnorm);
        if resnorm_0 <= 0.0 {
            return true;
        }
        resnorm / resnorm_0 < self.tolerance
    }

    pub fn resnorm_0(&self) -> Option<f64> {
        self.resnorm_0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::state::{FreeStream, N_VARS};
    use approx::assert_relative_eq;

    #[test]
    fn positivity_guard_rejects_only_the_offending_cell() {
        let mesh = Mesh::uniform_cartesian(5, 4, 1.0, 1.0).unwrap();
        let geometry = Geometry::from_mesh(&mesh);
        let fs = FreeStream { rho: 1.2, u: 10.0, v: 0.0, p: 1.0e5, gamma: 1.4 };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);

        let (icols, jrows) = geometry.volume.dim();
        let mut dedx = Array3::<f64>::zeros((icols, jrows, N_VARS));
        // Drive cell (1,1) rho negative; leave everything else untouched.
        dedx[[1, 1, 0]] = 1.0e12;
        let dt = Array2::<f64>::from_elem((icols, jrows), 1.0e-6);

        let updated = positivity_guarded_update(&state, &dedx, &dt, &geometry);

        assert_relative_eq!(updated.rho(2, 2), fs.rho, epsilon = 1e-9);
        assert_relative_eq!(updated.rho(1, 1), fs.rho, epsilon = 1e-9);
    }

    #[test]
    fn convergence_tracker_honors_tolerance() {
        let mut tracker = ConvergenceTracker::new(10.0);
        assert!(tracker.observe(1, 1.0));
        assert!(tracker.observe(2, 0.5));
    }

    #[test]
    fn convergence_tracker_never_converges_when_resnorm_grows() {
        let mut tracker = ConvergenceTracker::new(0.1);
        assert!(!tracker.observe(1, 1.0));
        assert!(!tracker.observe(2, 2.0));
    }
}
