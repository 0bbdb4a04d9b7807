use ndarray::{Array2, Array3};

use crate::state::{PrimitiveState, N_VARS};

/// Cell-wise flux divergence (§4.4): for each interior cell (i, j) and each
/// conservative component k,
///   Residue_k(i, j) = F_k(i+1, j) - F_k(i, j) + G_k(i, j+1) - G_k(i, j)
///
/// Indexed over interior cells only, shape (imx-1, jmx-1) matching the
/// mesh-cell indexing used by [`crate::geometry::Geometry`].
pub fn compute_residue(f: &Array3<f64>, g: &Array3<f64>) -> Array3<f64> {
    let (imx_faces, jrows, _) = f.dim();
    let (icols, jmx_faces, _) = g.dim();
    debug_assert_eq!(jrows + 1, jmx_faces);
    debug_assert_eq!(imx_faces - 1, icols);

    let mut residue = Array3::zeros((icols, jrows, N_VARS));
    for i in 0..icols {
        for j in 0..jrows {
            for k in 0..N_VARS {
                residue[[i, j, k]] =
                    f[[i + 1, j, k]] - f[[i, j, k]] + g[[i, j + 1, k]] - g[[i, j, k]];
            }
        }
    }
    residue
}

/// Transform a conservative residue to a primitive-variable residue dE/dx
/// via the chain-rule Jacobian (§4.4). `state` supplies (rho, u, v) at the
/// corresponding interior cells (state-cell index = mesh-cell index + 1).
pub fn residue_to_dedx(residue: &Array3<f64>, state: &PrimitiveState, gamma: f64) -> Array3<f64> {
    let (icols, jrows, _) = residue.dim();
    let mut dedx = Array3::zeros((icols, jrows, N_VARS));

    for i in 0..icols {
        for j in 0..jrows {
            let si = i + 1;
            let sj = j + 1;
            let rho = state.rho(si, sj);
            let u = state.u(si, sj);
            let v = state.v(si, sj);

            let r1 = residue[[i, j, 0]];
            let r2 = residue[[i, j, 1]];
            let r3 = residue[[i, j, 2]];
            let r4 = residue[[i, j, 3]];

            dedx[[i, j, 0]] = r1;
            dedx[[i, j, 1]] = (-u * r1 + r2) / rho;
            dedx[[i, j, 2]] = (-v * r1 + r3) / rho;
            dedx[[i, j, 3]] = 0.5 * (gamma - 1.0) * (u * u + v * v) * r1
                - (gamma - 1.0) * u * r2
                - (gamma - 1.0) * v * r3
                + (gamma - 1.0) * r4;
        }
    }

    dedx
}

/// Inverse of [`residue_to_dedx`]: recovers the conservative residue from a
/// primitive-variable residue, given the same (rho, u, v) state (§8
/// invariant 6, the Jacobian transform is self-inverse).
pub fn dedx_to_residue(dedx: &Array3<f64>, state: &PrimitiveState, gamma: f64) -> Array3<f64> {
    let (icols, jrows, _) = dedx.dim();
    let mut residue = Array3::zeros((icols, jrows, N_VARS));

    for i in 0..icols {
        for j in 0..jrows {
            let si = i + 1;
            let sj = j + 1;
            let rho = state.rho(si, sj);
            let u = state.u(si, sj);
            let v = state.v(si, sj);

            let e1 = dedx[[i, j, 0]];
            let e2 = dedx[[i, j, 1]];
            let e3 = dedx[[i, j, 2]];
            let e4 = dedx[[i, j, 3]];

            let r1 = e1;
            let r2 = rho * e2 + u * e1;
            let r3 = rho * e3 + v * e1;
            // Invert dE4 = 0.5(gamma-1)(u^2+v^2) r1 - (gamma-1) u r2 - (gamma-1) v r3 + (gamma-1) r4
            let r4 = e4 / (gamma - 1.0) - 0.5 * (u * u + v * v) * r1 + u * r2 + v * r3;

            residue[[i, j, 0]] = r1;
            residue[[i, j, 1]] = r2;
            residue[[i, j, 2]] = r3;
            residue[[i, j, 3]] = r4;
        }
    }

    residue
}

/// Normalizers and L2 residue norms (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct ResidueNorms {
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub n4: f64,
}

impl ResidueNorms {
    pub fn from_free_stream(fs: &crate::state::FreeStream) -> Self {
        let speed = fs.speed();
        let n1 = fs.rho * speed;
        let n2 = fs.rho * speed * speed;
        let n4 = fs.rho * speed * (0.5 * speed * speed + fs.gamma / (fs.gamma - 1.0) * fs.p / fs.rho);
        ResidueNorms { n1: n1.max(1e-300), n2: n2.max(1e-300), n3: n2.max(1e-300), n4: n4.max(1e-300) }
    }

    pub fn resnorm(&self, residue: &Array3<f64>) -> f64 {
        let mut sum = 0.0;
        for cell in residue.outer_iter() {
            for row in cell.outer_iter() {
                let r1 = row[0] / self.n1;
                let r2 = row[1] / self.n2;
                let r3 = row[2] / self.n3;
                let r4 = row[3] / self.n4;
                sum += r1 * r1 + r2 * r2 + r3 * r3 + r4 * r4;
            }
        }
        sum.sqrt()
    }
}

/// Sum of interior-cell residue component 1 — used to cross-check the net
/// mass-conservation diagnostic against §8 invariant 4.
pub fn sum_mass_residue(residue: &Array3<f64>) -> f64 {
    let mut sum = 0.0;
    for cell in residue.outer_iter() {
        for row in cell.outer_iter() {
            sum += row[0];
        }
    }
    sum
}

/// Net mass flux through the four physical boundaries, plus the four
/// individual boundary contributions (§4.6).
pub fn mass_conservation_diagnostic(f: &Array3<f64>, g: &Array3<f64>) -> [f64; 5] {
    let (imx_faces, jrows, _) = f.dim();
    let (icols, jmx_faces, _) = g.dim();

    let sum_axis = |arr: &Array3<f64>, fixed: usize, len: usize, along_axis0: bool| -> f64 {
        let mut s = 0.0;
        for idx in 0..len {
            s += if along_axis0 { arr[[fixed, idx, 0]] } else { arr[[idx, fixed, 0]] };
        }
        s
    };

    let inlet: f64 = sum_axis(f, 0, jrows, true);
    let exit: f64 = sum_axis(f, imx_faces - 1, jrows, true);
    let bottom: f64 = sum_axis(g, 0, icols, false);
    let top: f64 = sum_axis(g, jmx_faces - 1, icols, false);

    let net = -inlet + exit - bottom + top;
    [net, -inlet, exit, -bottom, top]
}

pub type ResidueArray = Array3<f64>;
pub type ScalarField = Array2<f64>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FreeStream;
    use approx::assert_relative_eq;

    #[test]
    fn jacobian_transform_is_self_inverse() {
        let mut state = PrimitiveState::new(4, 4);
        let fs = FreeStream { rho: 1.2, u: 50.0, v: 10.0, p: 9.0e4, gamma: 1.4 };
        state.fill_free_stream(&fs);

        let mut residue = Array3::zeros((3, 3, N_VARS));
        residue[[1, 1, 0]] = 0.3;
        residue[[1, 1, 1]] = 1.1;
        residue[[1, 1, 2]] = -0.4;
        residue[[1, 1, 3]] = 5.0;

        let dedx = residue_to_dedx(&residue, &state, fs.gamma);
        let back = dedx_to_residue(&dedx, &state, fs.gamma);

        for k in 0..N_VARS {
            assert_relative_eq!(back[[1, 1, k]], residue[[1, 1, k]], epsilon = 1e-9);
        }
    }

    #[test]
    fn telescoping_flux_sum_matches_mass_residue() {
        let f = Array3::<f64>::from_elem((4, 3, N_VARS), 0.0);
        let g = Array3::<f64>::from_elem((3, 4, N_VARS), 0.0);
        let residue = compute_residue(&f, &g);
        assert_relative_eq!(sum_mass_residue(&residue), 0.0, epsilon = 1e-12);
        let diag = mass_conservation_diagnostic(&f, &g);
        assert_relative_eq!(diag[0], 0.0, epsilon = 1e-12);
    }
}
