use ndarray::Array2;

use crate::error::{SolverError, SolverResult};
use crate::geometry::Geometry;
use crate::state::PrimitiveState;

/// Time-stepping mode selector (§4.5). Anything else is a fatal
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSteppingMethod {
    Local,
    Global,
}

impl TimeSteppingMethod {
    pub fn parse(code: &str) -> SolverResult<Self> {
        match code {
            "l" => Ok(TimeSteppingMethod::Local),
            "g" => Ok(TimeSteppingMethod::Global),
            other => Err(SolverError::config(
                "timestep",
                format!("unknown time_stepping_method '{other}', expected 'l' or 'g'"),
            )),
        }
    }
}

/// Per-cell local Δt (§4.5 "Local"): a = sqrt(gamma p/rho); for each of the
/// four surrounding faces compute lambda_k = |u nx + v ny| + a;
/// Δt(i,j) = CFL * V(i,j) / Sum(A_k lambda_k).
pub fn local_time_step(state: &PrimitiveState, geometry: &Geometry, cfl: f64, gamma: f64) -> Array2<f64> {
    let (icols, jrows) = geometry.volume.dim();
    let mut dt = Array2::zeros((icols, jrows));

    for i in 0..icols {
        for j in 0..jrows {
            let si = i + 1;
            let sj = j + 1;
            let rho = state.rho(si, sj);
            let u = state.u(si, sj);
            let v = state.v(si, sj);
            let p = state.p(si, sj);
            let a = (gamma * p / rho).sqrt();

            let west_lambda = (u * -geometry.xn[[i, j]] + v * -geometry.yn[[i, j]]).abs() + a;
            let east_lambda = (u * geometry.xn[[i + 1, j]] + v * geometry.yn[[i + 1, j]]).abs() + a;
            let south_lambda = (u * -geometry.xn_eta[[i, j]] + v * -geometry.yn_eta[[i, j]]).abs() + a;
            let north_lambda = (u * geometry.xn_eta[[i, j + 1]] + v * geometry.yn_eta[[i, j + 1]]).abs() + a;

            let sum_a_lambda = geometry.x_area[[i, j]] * west_lambda
                + geometry.x_area[[i + 1, j]] * east_lambda
                + geometry.y_area[[i, j]] * south_lambda
                + geometry.y_area[[i, j + 1]] * north_lambda;

            dt[[i, j]] = cfl * geometry.volume[[i, j]] / sum_a_lambda;
        }
    }

    dt
}

/// Broadcast the global Δt field (§4.5 "Global"): either the configured
/// positive override, or the minimum of the local field if the override is
/// absent or non-positive (the `global_time_step <= 0` boundary behavior of
/// §8 falls back to local).
pub fn global_time_step(
    state: &PrimitiveState,
    geometry: &Geometry,
    cfl: f64,
    gamma: f64,
    override_dt: Option<f64>,
) -> Array2<f64> {
    let local = local_time_step(state, geometry, cfl, gamma);
    let dt_value = match override_dt {
        Some(dt) if dt > 0.0 => dt,
        _ => local.iter().cloned().fold(f64::INFINITY, f64::min),
    };
    Array2::from_elem(local.dim(), dt_value)
}

/// Compute Δt per §4.5, dispatching on `method`.
pub fn compute_time_step(
    state: &PrimitiveState,
    geometry: &Geometry,
    cfl: f64,
    gamma: f64,
    method: TimeSteppingMethod,
    override_dt: Option<f64>,
) -> Array2<f64> {
    match method {
        TimeSteppingMethod::Local => local_time_step(state, geometry, cfl, gamma),
        TimeSteppingMethod::Global => global_time_step(state, geometry, cfl, gamma, override_dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::state::FreeStream;
    use approx::assert_relative_eq;

    fn setup() -> (PrimitiveState, Geometry) {
        let mesh = Mesh::uniform_cartesian(6, 5, 1.0, 1.0).unwrap();
        let geometry = Geometry::from_mesh(&mesh);
        let fs = FreeStream { rho: 1.2, u: 10.0, v: 0.0, p: 1.0e5, gamma: 1.4 };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);
        (state, geometry)
    }

    #[test]
    fn global_with_min_local_override_matches_local_min() {
        let (state, geometry) = setup();
        let local = local_time_step(&state, &geometry, 0.5, 1.4);
        let min_dt = local.iter().cloned().fold(f64::INFINITY, f64::min);
        let global = global_time_step(&state, &geometry, 0.5, 1.4, Some(min_dt));
        for v in global.iter() {
            assert_relative_eq!(*v, min_dt, epsilon = 1e-12);
        }
    }

    #[test]
    fn nonpositive_override_falls_back_to_local_minimum() {
        let (state, geometry) = setup();
        let local = local_time_step(&state, &geometry, 0.5, 1.4);
        let min_dt = local.iter().cloned().fold(f64::INFINITY, f64::min);
        let global = global_time_step(&state, &geometry, 0.5, 1.4, Some(-1.0));
        assert_relative_eq!(global[[0, 0]], min_dt, epsilon = 1e-12);
    }

    #[test]
    fn unknown_method_code_is_a_config_error() {
        let err = TimeSteppingMethod::parse("x").unwrap_err();
        assert!(matches!(err, SolverError::Config { .. }));
    }
}
