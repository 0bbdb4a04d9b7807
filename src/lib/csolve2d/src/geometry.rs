use ndarray::Array2;

use crate::mesh::Mesh;

/// Face normals, face areas, and cell volumes derived once from a [`Mesh`].
///
/// Immutable after construction (§3: "Derived once from Mesh; immutable
/// thereafter"). ξ-faces are indexed by `i` in `0..imx` (face `i` separates
/// cell `i-1` from cell `i`, with `i=0` and `i=imx-1` the domain boundary
/// faces); η-faces are indexed symmetrically by `j` in `0..jmx`.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Outward unit normal x-component at ξ-faces, shape (imx, jmx-1).
    pub xn: Array2<f64>,
    /// Outward unit normal y-component at ξ-faces, shape (imx, jmx-1).
    pub yn: Array2<f64>,
    /// ξ-face areas (lengths in 2-D), shape (imx, jmx-1).
    pub x_area: Array2<f64>,
    /// Outward unit normal x-component at η-faces, shape (imx-1, jmx).
    pub xn_eta: Array2<f64>,
    /// Outward unit normal y-component at η-faces, shape (imx-1, jmx).
    pub yn_eta: Array2<f64>,
    /// η-face areas (lengths in 2-D), shape (imx-1, jmx).
    pub y_area: Array2<f64>,
    /// Interior cell volumes (2-D: cell areas), shape (imx-1, jmx-1).
    pub volume: Array2<f64>,
}

impl Geometry {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let imx = mesh.imx;
        let jmx = mesh.jmx;

        let mut xn = Array2::zeros((imx, jmx - 1));
        let mut yn = Array2::zeros((imx, jmx - 1));
        let mut x_area = Array2::zeros((imx, jmx - 1));
        for i in 0..imx {
            for j in 0..jmx - 1 {
                let dx = mesh.grid_x[[i, j + 1]] - mesh.grid_x[[i, j]];
                let dy = mesh.grid_y[[i, j + 1]] - mesh.grid_y[[i, j]];
                let len = (dx * dx + dy * dy).sqrt();
                x_area[[i, j]] = len;
                xn[[i, j]] = dy / len;
                yn[[i, j]] = -dx / len;
            }
        }

        let mut xn_eta = Array2::zeros((imx - 1, jmx));
        let mut yn_eta = Array2::zeros((imx - 1, jmx));
        let mut y_area = Array2::zeros((imx - 1, jmx));
        for i in 0..imx - 1 {
            for j in 0..jmx {
                let dx = mesh.grid_x[[i + 1, j]] - mesh.grid_x[[i, j]];
                let dy = mesh.grid_y[[i + 1, j]] - mesh.grid_y[[i, j]];
                let len = (dx * dx + dy * dy).sqrt();
                y_area[[i, j]] = len;
                xn_eta[[i, j]] = -dy / len;
                yn_eta[[i, j]] = dx / len;
            }
        }

        let mut volume = Array2::zeros((imx - 1, jmx - 1));
        for i in 0..imx - 1 {
            for j in 0..jmx - 1 {
                volume[[i, j]] = Self::cell_area(mesh, i, j);
            }
        }

        Geometry { xn, yn, x_area, xn_eta, yn_eta, y_area, volume }
    }

    fn cell_area(mesh: &Mesh, i: usize, j: usize) -> f64 {
        let (x00, y00) = (mesh.grid_x[[i, j]], mesh.grid_y[[i, j]]);
        let (x10, y10) = (mesh.grid_x[[i + 1, j]], mesh.grid_y[[i + 1, j]]);
        let (x11, y11) = (mesh.grid_x[[i + 1, j + 1]], mesh.grid_y[[i + 1, j + 1]]);
        let (x01, y01) = (mesh.grid_x[[i, j + 1]], mesh.grid_y[[i, j + 1]]);

        0.5 * ((x00 * y10 - x10 * y00)
            + (x10 * y11 - x11 * y10)
            + (x11 * y01 - x01 * y11)
            + (x01 * y00 - x00 * y01))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_cartesian_normals_are_axis_aligned() {
        let mesh = Mesh::uniform_cartesian(5, 4, 2.0, 1.0).unwrap();
        let geom = Geometry::from_mesh(&mesh);

        assert_relative_eq!(geom.xn[[2, 1]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(geom.yn[[2, 1]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(geom.xn_eta[[1, 2]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(geom.yn_eta[[1, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn uniform_cartesian_volume_is_cell_area() {
        let mesh = Mesh::uniform_cartesian(5, 4, 2.0, 1.0).unwrap();
        let geom = Geometry::from_mesh(&mesh);
        let dx = 2.0 / 4.0;
        let dy = 1.0 / 3.0;
        assert_relative_eq!(geom.volume[[1, 1]], dx * dy, epsilon = 1e-12);
    }
}
