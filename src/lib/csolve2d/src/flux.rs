use ndarray::Array3;

use crate::geometry::Geometry;
use crate::reconstruct::FaceStates;
use crate::state::{PrimitiveState, N_VARS, P, RHO, U, V};

/// Flux scheme selector (§4.3, §9 — scheme selection modeled as a tagged
/// variant behind a small capability set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeName {
    VanLeer,
    Ldfss0,
}

impl SchemeName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "van_leer" => Some(SchemeName::VanLeer),
            "ldfss0" => Some(SchemeName::Ldfss0),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemeName::VanLeer => "van_leer",
            SchemeName::Ldfss0 => "ldfss0",
        }
    }
}

#[inline]
fn beta_from_mach(m: f64) -> f64 {
    if m > 0.0 {
        1.0
    } else if m < 0.0 {
        0.0
    } else {
        0.5
    }
}

/// Van Leer convective split coefficients c+ (from the left state) and c-
/// (from the right state), given the shared face-averaged sound speed.
fn van_leer_coefficients(rho_l: f64, vn_l: f64, rho_r: f64, vn_r: f64, a_avg: f64) -> (f64, f64, f64, f64) {
    let m_l = vn_l / a_avg;
    let m_r = vn_r / a_avg;

    let c_plus = if m_l >= 1.0 {
        rho_l * vn_l
    } else if m_l <= -1.0 {
        0.0
    } else {
        rho_l * a_avg * (m_l + 1.0).powi(2) / 4.0
    };

    let c_minus = if m_r <= -1.0 {
        rho_r * vn_r
    } else if m_r >= 1.0 {
        0.0
    } else {
        -rho_r * a_avg * (m_r - 1.0).powi(2) / 4.0
    };

    (c_plus, c_minus, m_l, m_r)
}

fn split_pressure_plus(p: f64, m: f64) -> f64 {
    if m >= 1.0 {
        p
    } else if m <= -1.0 {
        0.0
    } else {
        p * 0.25 * (m + 1.0).powi(2) * (2.0 - m)
    }
}

fn split_pressure_minus(p: f64, m: f64) -> f64 {
    if m <= -1.0 {
        p
    } else if m >= 1.0 {
        0.0
    } else {
        p * 0.25 * (m - 1.0).powi(2) * (2.0 + m)
    }
}

/// Flux vector for a single face given left/right primitives and the face's
/// outward unit normal (nx, ny). Returns a 4-component conservative flux.
///
/// `ldfss0` selects the LDFSS(0) pressure-corrected refinement: "call Van
/// Leer, then adjust c±" (§9) — the convective coefficients are perturbed
/// before assembly; the assembly itself is identical to plain Van Leer.
#[allow(clippy::too_many_arguments)]
fn face_flux(
    rho_l: f64,
    u_l: f64,
    v_l: f64,
    p_l: f64,
    rho_r: f64,
    u_r: f64,
    v_r: f64,
    p_r: f64,
    nx: f64,
    ny: f64,
    gamma: f64,
    ldfss0: bool,
) -> [f64; N_VARS] {
    let a_l = (gamma * p_l / rho_l).sqrt();
    let a_r = (gamma * p_r / rho_r).sqrt();
    let a_avg = 0.5 * (a_l + a_r);

    let vn_l = u_l * nx + v_l * ny;
    let vn_r = u_r * nx + v_r * ny;

    let (mut c_plus, mut c_minus, m_l, m_r) = van_leer_coefficients(rho_l, vn_l, rho_r, vn_r, a_avg);

    if ldfss0 {
        let beta_l = beta_from_mach(m_l);
        let beta_r = beta_from_mach(m_r);
        let m_ldfss = 0.25 * beta_l * beta_r * (((m_l * m_l + m_r * m_r) / 2.0).sqrt() - 1.0).powi(2);
        let scale_plus = 1.0 - (p_l - p_r) / (2.0 * rho_l * a_avg * a_avg);
        let scale_minus = 1.0 - (p_l - p_r) / (2.0 * rho_r * a_avg * a_avg);
        let m_plus_ldfss = m_ldfss * scale_plus;
        let m_minus_ldfss = m_ldfss * scale_minus;
        // M_ldfss is a Mach-like correction; scale by rho*a_avg to bring it
        // into the same mass-flux units as c± before applying it.
        c_plus -= rho_l * a_avg * m_plus_ldfss;
        c_minus += rho_r * a_avg * m_minus_ldfss;
    }

    let p_plus = split_pressure_plus(p_l, m_l);
    let p_minus = split_pressure_minus(p_r, m_r);

    let h_l = gamma / (gamma - 1.0) * p_l / rho_l + 0.5 * (u_l * u_l + v_l * v_l);
    let h_r = gamma / (gamma - 1.0) * p_r / rho_r + 0.5 * (u_r * u_r + v_r * v_r);

    [
        c_plus + c_minus,
        c_plus * u_l + c_minus * u_r + (p_plus + p_minus) * nx,
        c_plus * v_l + c_minus * v_r + (p_plus + p_minus) * ny,
        c_plus * h_l + c_minus * h_r,
    ]
}

/// Sutherland's law: μ(T) = μ_ref (T/T_ref)^{3/2} (T_ref + S)/(T + S).
pub fn sutherland_viscosity(t: f64, mu_ref: f64, t_ref: f64, sutherland_temp: f64) -> f64 {
    mu_ref * (t / t_ref).powf(1.5) * (t_ref + sutherland_temp) / (t + sutherland_temp)
}

/// Compute inviscid conservative fluxes F (ξ-faces) and G (η-faces) from
/// reconstructed face states (§4.3).
pub fn compute_inviscid_fluxes(
    faces: &FaceStates,
    geometry: &Geometry,
    gamma: f64,
    scheme: SchemeName,
) -> (Array3<f64>, Array3<f64>) {
    let ldfss0 = scheme == SchemeName::Ldfss0;
    let (imx_faces, jrows) = faces.x_left.rho.dim();
    let mut f = Array3::zeros((imx_faces, jrows, N_VARS));
    for i in 0..imx_faces {
        for j in 0..jrows {
            let flux = face_flux(
                faces.x_left.rho[[i, j]],
                faces.x_left.u[[i, j]],
                faces.x_left.v[[i, j]],
                faces.x_left.p[[i, j]],
                faces.x_right.rho[[i, j]],
                faces.x_right.u[[i, j]],
                faces.x_right.v[[i, j]],
                faces.x_right.p[[i, j]],
                geometry.xn[[i, j]],
                geometry.yn[[i, j]],
                gamma,
                ldfss0,
            );
            for k in 0..N_VARS {
                f[[i, j, k]] = flux[k] * geometry.x_area[[i, j]];
            }
        }
    }

    let (icols, jmx_faces) = faces.y_left.rho.dim();
    let mut g = Array3::zeros((icols, jmx_faces, N_VARS));
    for i in 0..icols {
        for j in 0..jmx_faces {
            let flux = face_flux(
                faces.y_left.rho[[i, j]],
                faces.y_left.u[[i, j]],
                faces.y_left.v[[i, j]],
                faces.y_left.p[[i, j]],
                faces.y_right.rho[[i, j]],
                faces.y_right.u[[i, j]],
                faces.y_right.v[[i, j]],
                faces.y_right.p[[i, j]],
                geometry.xn_eta[[i, j]],
                geometry.yn_eta[[i, j]],
                gamma,
                ldfss0,
            );
            for k in 0..N_VARS {
                g[[i, j, k]] = flux[k] * geometry.y_area[[i, j]];
            }
        }
    }

    (f, g)
}

/// Thermodynamic/transport parameters needed for the viscous contribution.
#[derive(Debug, Clone, Copy)]
pub struct ViscousParams {
    pub mu_ref: f64,
    pub t_ref: f64,
    pub sutherland_temp: f64,
    pub r_gas: f64,
    pub pr: f64,
    pub gamma: f64,
}

/// Additive viscous fluxes (§4.3), computed from 1st-order (direct
/// neighbor-cell) face states regardless of the inviscid interpolant
/// choice, using Sutherland's law for μ(T).
///
/// Simplification note: this models the wall-normal (thin-layer) viscous
/// contribution — shear from the velocity gradient along the face normal
/// and heat conduction from the temperature gradient along the face
/// normal — rather than the full 2-D stress tensor with cross-derivatives.
/// No corpus example computes curvilinear viscous stresses; this is the
/// one module without a literal grounding precedent (see DESIGN.md).
pub fn add_viscous_fluxes(
    state: &PrimitiveState,
    geometry: &Geometry,
    params: &ViscousParams,
    f: &mut Array3<f64>,
    g: &mut Array3<f64>,
) {
    let imx = state.imx;
    let jmx = state.jmx;
    let k_over_cp = params.gamma * params.r_gas / ((params.gamma - 1.0) * params.pr);

    for face in 0..imx {
        for r in 0..jmx - 1 {
            let j = r + 1;
            let left = (face, j);
            let right = (face + 1, j);
            let area = geometry.x_area[[face, r]];
            let vol_l = cell_volume(geometry, left.0, left.1);
            let vol_r = cell_volume(geometry, right.0, right.1);
            let h = 0.5 * (vol_l + vol_r) / area.max(1e-300);
            let (fx, fy, fz, fw) = viscous_face_flux(state, left, right, h, params, k_over_cp);
            f[[face, r, RHO]] += fx * area;
            f[[face, r, U]] += fy * area;
            f[[face, r, V]] += fz * area;
            f[[face, r, P]] += fw * area;
        }
    }

    for col in 0..imx - 1 {
        for face in 0..jmx {
            let i = col + 1;
            let bottom = if face == 0 { (i, 0) } else { (i, face - 1) };
            let top = if face == jmx { (i, jmx) } else { (i, face) };
            let area = geometry.y_area[[col, face]];
            let vol_b = cell_volume(geometry, bottom.0, bottom.1);
            let vol_t = cell_volume(geometry, top.0, top.1);
            let h = 0.5 * (vol_b + vol_t) / area.max(1e-300);
            let (fx, fy, fz, fw) = viscous_face_flux(state, bottom, top, h, params, k_over_cp);
            g[[col, face, RHO]] += fx * area;
            g[[col, face, U]] += fy * area;
            g[[col, face, V]] += fz * area;
            g[[col, face, P]] += fw * area;
        }
    }
}

fn cell_volume(geometry: &Geometry, i: usize, j: usize) -> f64 {
    let imax = geometry.volume.dim().0;
    let jmax = geometry.volume.dim().1;
    let ci = i.saturating_sub(1).min(imax - 1);
    let cj = j.saturating_sub(1).min(jmax - 1);
    geometry.volume[[ci, cj]]
}

fn viscous_face_flux(
    state: &PrimitiveState,
    a: (usize, usize),
    b: (usize, usize),
    h: f64,
    params: &ViscousParams,
    k_over_cp: f64,
) -> (f64, f64, f64, f64) {
    if params.mu_ref == 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let rho_l = state.rho(a.0, a.1);
    let rho_r = state.rho(b.0, b.1);
    let u_l = state.u(a.0, a.1);
    let u_r = state.u(b.0, b.1);
    let v_l = state.v(a.0, a.1);
    let v_r = state.v(b.0, b.1);
    let p_l = state.p(a.0, a.1);
    let p_r = state.p(b.0, b.1);

    let t_l = p_l / (rho_l * params.r_gas);
    let t_r = p_r / (rho_r * params.r_gas);
    let t_avg = 0.5 * (t_l + t_r);
    let mu = sutherland_viscosity(t_avg, params.mu_ref, params.t_ref, params.sutherland_temp);

    let du_dn = (u_r - u_l) / h;
    let dv_dn = (v_r - v_l) / h;
    let dt_dn = (t_r - t_l) / h;

    let u_avg = 0.5 * (u_l + u_r);
    let v_avg = 0.5 * (v_l + v_r);

    let tau_x = mu * du_dn;
    let tau_y = mu * dv_dn;
    let q_n = -mu * k_over_cp * dt_dn;

    // Viscous flux opposes the gradient direction; subtracted from the
    // inviscid convective flux by convention (diffusion carries momentum
    // and energy down-gradient).
    (0.0, -tau_x, -tau_y, -(u_avg * tau_x + v_avg * tau_y) - q_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::reconstruct::{FaceStates, Interpolant};
    use crate::state::FreeStream;
    use approx::assert_relative_eq;

    #[test]
    fn supersonic_uniform_flow_reduces_to_pure_upwind() {
        let gamma = 1.4;
        let rho = 1.0;
        let p = 1.0;
        let u = 5.0 * (gamma * p / rho).sqrt(); // well above Mach 1
        let v = 0.0;

        let flux = face_flux(rho, u, v, p, rho, u, v, p, 1.0, 0.0, gamma, false);
        let h = gamma / (gamma - 1.0) * p / rho + 0.5 * u * u;
        assert_relative_eq!(flux[0], rho * u, epsilon = 1e-9);
        assert_relative_eq!(flux[1], rho * u * u + p, epsilon = 1e-9);
        assert_relative_eq!(flux[3], rho * u * h, epsilon = 1e-9);
    }

    #[test]
    fn ldfss_matches_van_leer_in_uniform_supersonic_flow() {
        let gamma = 1.4;
        let rho = 1.0;
        let p = 1.0;
        let u = 5.0 * (gamma * p / rho).sqrt();

        let vl = face_flux(rho, u, 0.0, p, rho, u, 0.0, p, 1.0, 0.0, gamma, false);
        let ld = face_flux(rho, u, 0.0, p, rho, u, 0.0, p, 1.0, 0.0, gamma, true);
        for k in 0..N_VARS {
            assert_relative_eq!(vl[k], ld[k], epsilon = 1e-9);
        }
    }

    #[test]
    fn free_stream_flux_is_symmetric_with_itself() {
        let mesh = Mesh::uniform_cartesian(6, 5, 1.0, 1.0).unwrap();
        let geometry = Geometry::from_mesh(&mesh);
        let fs = FreeStream { rho: 1.225, u: 100.0, v: 0.0, p: 101325.0, gamma: 1.4 };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);
        let faces = FaceStates::reconstruct(&state, Interpolant::None, fs.gamma);
        let (f, _g) = compute_inviscid_fluxes(&faces, &geometry, fs.gamma, SchemeName::VanLeer);
        assert!(f[[2, 1, RHO]].is_finite());
    }
}
