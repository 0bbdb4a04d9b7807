use ndarray::Array3;

use crate::geometry::Geometry;
use crate::reconstruct::FaceStates;

/// Immersed-boundary collaborator (§1, §4.2, §4.3, §11): an external module
/// that represents a solid body by flagging cells/faces within a uniform
/// mesh rather than by conforming the mesh to it. The core pipeline treats
/// it as a capability set with two hook points, called unconditionally —
/// the no-op [`NoImmersedBoundary`] implementation is used when IB is
/// disabled, so call sites never branch on an `Option`.
pub trait ImmersedBoundary {
    /// Overwrite left/right reconstructed states at faces classified as
    /// interface faces (§4.2).
    fn reset_states_at_interface_faces(&self, faces: &mut FaceStates, geometry: &Geometry);

    /// Reset viscous-flux gradients at interface faces before fluxes are
    /// finalized (§4.3).
    fn reset_gradients_at_interfaces(&self, f: &mut Array3<f64>, g: &mut Array3<f64>, geometry: &Geometry);
}

/// Default collaborator used when no `IB_file` is configured (§6: `~`
/// disables IB).
pub struct NoImmersedBoundary;

impl ImmersedBoundary for NoImmersedBoundary {
    fn reset_states_at_interface_faces(&self, _faces: &mut FaceStates, _geometry: &Geometry) {}

    fn reset_gradients_at_interfaces(&self, _f: &mut Array3<f64>, _g: &mut Array3<f64>, _geometry: &Geometry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::reconstruct::Interpolant;
    use crate::state::{FreeStream, PrimitiveState};

    #[test]
    fn no_immersed_boundary_is_a_true_no_op() {
        let mesh = Mesh::uniform_cartesian(5, 4, 1.0, 1.0).unwrap();
        let geometry = Geometry::from_mesh(&mesh);
        let fs = FreeStream { rho: 1.2, u: 10.0, v: 0.0, p: 1.0e5, gamma: 1.4 };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);
        let mut faces = FaceStates::reconstruct(&state, Interpolant::None, fs.gamma);
        let before = faces.x_left.rho.clone();
        NoImmersedBoundary.reset_states_at_interface_faces(&mut faces, &geometry);
        assert_eq!(faces.x_left.rho, before);
    }
}
