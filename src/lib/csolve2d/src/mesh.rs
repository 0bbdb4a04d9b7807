use ndarray::Array2;

use crate::error::{SolverError, SolverResult};

/// Structured (imx x jmx) vertex grid.
///
/// Vertex (i, j) is shared by up to four neighboring cells; cell (i, j) for
/// i in [0, imx-2], j in [0, jmx-2] is bounded by vertices (i, j), (i+1, j),
/// (i+1, j+1), (i, j+1).
#[derive(Debug, Clone)]
pub struct Mesh {
    pub imx: usize,
    pub jmx: usize,
    pub grid_x: Array2<f64>,
    pub grid_y: Array2<f64>,
}

impl Mesh {
    /// Build a mesh from vertex coordinate arrays, validating shape and
    /// checking that every cell has a strictly positive signed area.
    pub fn new(imx: usize, jmx: usize, grid_x: Array2<f64>, grid_y: Array2<f64>) -> SolverResult<Self> {
        if imx < 2 || jmx < 2 {
            return Err(SolverError::config(
                "mesh",
                format!("imx and jmx must each be >= 2, got imx={imx}, jmx={jmx}"),
            ));
        }
        if grid_x.dim() != (imx, jmx) || grid_y.dim() != (imx, jmx) {
            return Err(SolverError::config(
                "mesh",
                format!(
                    "grid coordinate arrays must have shape ({imx}, {jmx}), got {:?} / {:?}",
                    grid_x.dim(),
                    grid_y.dim()
                ),
            ));
        }

        let mesh = Mesh { imx, jmx, grid_x, grid_y };
        mesh.validate_cell_areas()?;
        Ok(mesh)
    }

    /// Uniform Cartesian mesh spanning [0, lx] x [0, ly], (imx-1) x (jmx-1) cells.
    pub fn uniform_cartesian(imx: usize, jmx: usize, lx: f64, ly: f64) -> SolverResult<Self> {
        let dx = lx / (imx - 1) as f64;
        let dy = ly / (jmx - 1) as f64;
        let mut grid_x = Array2::zeros((imx, jmx));
        let mut grid_y = Array2::zeros((imx, jmx));
        for i in 0..imx {
            for j in 0..jmx {
                grid_x[[i, j]] = i as f64 * dx;
                grid_y[[i, j]] = j as f64 * dy;
            }
        }
        Mesh::new(imx, jmx, grid_x, grid_y)
    }

    fn validate_cell_areas(&self) -> SolverResult<()> {
        for i in 0..self.imx - 1 {
            for j in 0..self.jmx - 1 {
                let area = self.signed_cell_area(i, j);
                if area <= 0.0 {
                    return Err(SolverError::config(
                        "mesh",
                        format!("non-positive cell area {area} at cell ({i}, {j}); mesh is self-intersecting or inverted"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Shoelace-formula signed area of cell (i, j), vertices taken
    /// counter-clockwise: (i,j) (i+1,j) (i+1,j+1) (i,j+1).
    fn signed_cell_area(&self, i: usize, j: usize) -> f64 {
        let (x00, y00) = (self.grid_x[[i, j]], self.grid_y[[i, j]]);
        let (x10, y10) = (self.grid_x[[i + 1, j]], self.grid_y[[i + 1, j]]);
        let (x11, y11) = (self.grid_x[[i + 1, j + 1]], self.grid_y[[i + 1, j + 1]]);
        let (x01, y01) = (self.grid_x[[i, j + 1]], self.grid_y[[i, j + 1]]);

        0.5 * ((x00 * y10 - x10 * y00)
            + (x10 * y11 - x11 * y10)
            + (x11 * y01 - x01 * y11)
            + (x01 * y00 - x00 * y01))
    }
}
