use ndarray::Array3;

use crate::error::{SolverError, SolverResult};

/// Component offsets into the trailing axis of [`PrimitiveState`]'s backing
/// array. Kept as plain constants rather than an enum so index arithmetic
/// (`RHO + k`) reads naturally in the flux/residue code.
pub const RHO: usize = 0;
pub const U: usize = 1;
pub const V: usize = 2;
pub const P: usize = 3;
pub const N_VARS: usize = 4;

/// Free-stream reference quadruple (ρ∞, u∞, v∞, p∞) plus the thermodynamic
/// constant needed to classify the flow as subsonic or supersonic.
#[derive(Debug, Clone, Copy)]
pub struct FreeStream {
    pub rho: f64,
    pub u: f64,
    pub v: f64,
    pub p: f64,
    pub gamma: f64,
}

impl FreeStream {
    pub fn sound_speed(&self) -> f64 {
        (self.gamma * self.p / self.rho).sqrt()
    }

    pub fn speed(&self) -> f64 {
        (self.u * self.u + self.v * self.v).sqrt()
    }

    /// supersonic ⇔ √(u∞² + v∞²) / √(γ p∞ / ρ∞) ≥ 1, computed once at setup.
    pub fn is_supersonic(&self) -> bool {
        self.speed() / self.sound_speed() >= 1.0
    }
}

/// Cell-centered primitive variables (ρ, u, v, p) over the ghost-padded
/// structured mesh, modeled as a single owned 3-D array (§9 Design Notes):
/// no independently-mutable aliased views over the same memory, only typed
/// accessor methods.
#[derive(Debug, Clone)]
pub struct PrimitiveState {
    /// Shape (imx+1, jmx+1, N_VARS); index (i, j) for i in 0..=imx, j in 0..=jmx.
    data: Array3<f64>,
    pub imx: usize,
    pub jmx: usize,
}

impl PrimitiveState {
    pub fn new(imx: usize, jmx: usize) -> Self {
        PrimitiveState { data: Array3::zeros((imx + 1, jmx + 1, N_VARS)), imx, jmx }
    }

    /// Fill every cell, including ghosts, with the free-stream state.
    pub fn fill_free_stream(&mut self, fs: &FreeStream) {
        for mut cell in self.data.outer_iter_mut() {
            for mut row in cell.outer_iter_mut() {
                row[RHO] = fs.rho;
                row[U] = fs.u;
                row[V] = fs.v;
                row[P] = fs.p;
            }
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[[i, j, k]]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        self.data[[i, j, k]] = value;
    }

    #[inline]
    pub fn rho(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j, RHO]]
    }

    #[inline]
    pub fn u(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j, U]]
    }

    #[inline]
    pub fn v(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j, V]]
    }

    #[inline]
    pub fn p(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j, P]]
    }

    pub fn set_cell(&mut self, i: usize, j: usize, rho: f64, u: f64, v: f64, p: f64) {
        self.data[[i, j, RHO]] = rho;
        self.data[[i, j, U]] = u;
        self.data[[i, j, V]] = v;
        self.data[[i, j, P]] = p;
    }

    /// Verify the positivity invariant (ρ > 0 ∧ p > 0) over interior cells.
    pub fn validate_positivity(&self, module: &'static str) -> SolverResult<()> {
        for i in 1..self.imx {
            for j in 1..self.jmx {
                let rho = self.rho(i, j);
                let p = self.p(i, j);
                if rho <= 0.0 {
                    return Err(SolverError::numerical(module, i, j, format!("negative density rho={rho}")));
                }
                if p <= 0.0 {
                    return Err(SolverError::numerical(module, i, j, format!("negative pressure p={p}")));
                }
            }
        }
        Ok(())
    }

    /// Repopulate every ghost cell from the current interior state and the
    /// free-stream reference (§4.1). Single entry point, as the IB
    /// collaborator needs a consistent pre-update state to act against.
    pub fn set_ghost_cell_data(&mut self, fs: &FreeStream, supersonic: bool, mu_ref: f64) {
        let imx = self.imx;
        let jmx = self.jmx;

        // Inlet (i = 0): Dirichlet on rho, u, v; pressure Dirichlet only if supersonic.
        for j in 1..jmx {
            self.set(0, j, RHO, fs.rho);
            self.set(0, j, U, fs.u);
            self.set(0, j, V, fs.v);
            let p = if supersonic { fs.p } else { self.p(1, j) };
            self.set(0, j, P, p);
        }

        // Exit (i = imx): zero-gradient on rho, u, v; pressure Dirichlet unless supersonic.
        for j in 1..jmx {
            let i_interior = imx - 1;
            self.set(imx, j, RHO, self.rho(i_interior, j));
            self.set(imx, j, U, self.u(i_interior, j));
            self.set(imx, j, V, self.v(i_interior, j));
            let p = if supersonic { self.p(i_interior, j) } else { fs.p };
            self.set(imx, j, P, p);
        }

        // Top/bottom walls (j = 0, j = jmx): rho, p extrapolated; velocity
        // policy depends on viscosity.
        let viscous = mu_ref != 0.0;
        for i in 0..=imx {
            self.apply_wall_ghost(i, 0, 1, viscous, fs);
            self.apply_wall_ghost(i, jmx, jmx - 1, viscous, fs);
        }
    }

    fn apply_wall_ghost(&mut self, i: usize, j_ghost: usize, j_interior: usize, viscous: bool, fs: &FreeStream) {
        let rho = self.rho(i, j_interior);
        let p = self.p(i, j_interior);
        let u_int = self.u(i, j_interior);
        let v_int = self.v(i, j_interior);

        let (u_ghost, v_ghost) = if viscous {
            // No-slip: ghost tangential velocity negated, yielding zero wall
            // velocity at the interface. (§9: the free-stream-override defect
            // of the original routine is not reproduced here.)
            (-u_int, -v_int)
        } else {
            // Flow tangency: reflect the interior velocity about the wall
            // normal (nx=0, ny=1 for a j-constant wall on this mesh family)
            // so the mean normal component vanishes. (§9: the plain-copy
            // defect of the original routine is not reproduced here.)
            (u_int, -v_int)
        };

        self.set(i, j_ghost, RHO, rho);
        self.set(i, j_ghost, P, p);
        self.set(i, j_ghost, U, u_ghost);
        self.set(i, j_ghost, V, v_ghost);
        let _ = fs; // free-stream is intentionally not consulted here; see §9.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fs() -> FreeStream {
        FreeStream { rho: 1.225, u: 100.0, v: 0.0, p: 101325.0, gamma: 1.4 }
    }

    #[test]
    fn subsonic_free_stream_is_classified_correctly() {
        assert!(!fs().is_supersonic());
    }

    #[test]
    fn inviscid_wall_reflects_normal_velocity() {
        let mut state = PrimitiveState::new(4, 4);
        state.fill_free_stream(&fs());
        state.set_cell(1, 1, 1.0, 5.0, 3.0, 101325.0);
        state.set_ghost_cell_data(&fs(), false, 0.0);
        assert_relative_eq!(state.u(1, 0), 5.0);
        assert_relative_eq!(state.v(1, 0), -3.0);
    }

    #[test]
    fn viscous_wall_is_no_slip() {
        let mut state = PrimitiveState::new(4, 4);
        state.fill_free_stream(&fs());
        state.set_cell(1, 1, 1.0, 5.0, 3.0, 101325.0);
        state.set_ghost_cell_data(&fs(), false, 1.8e-5);
        assert_relative_eq!(state.u(1, 0), -5.0);
        assert_relative_eq!(state.v(1, 0), -3.0);
    }

    #[test]
    fn positivity_validation_flags_negative_density() {
        let mut state = PrimitiveState::new(4, 4);
        state.fill_free_stream(&fs());
        state.set(2, 2, RHO, -1.0);
        let err = state.validate_positivity("test").unwrap_err();
        assert!(matches!(err, SolverError::Numerical { .. }));
    }
}
