use std::io::BufRead;
use std::path::Path;

use ndarray::Array2;

use crate::error::{SolverError, SolverResult};
use crate::mesh::Mesh;

/// Reads the grid file external collaborator (§6): "the core consumes only
/// `imx, jmx, grid_x, grid_y`". Format: a header line `imx jmx`, then
/// `imx * jmx` lines of `x y`, varying i fastest within each j row.
pub fn read_grid<R: BufRead>(reader: R) -> SolverResult<Mesh> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| SolverError::io("grid", "grid file is empty, expected an 'imx jmx' header line"))?
        .map_err(|e| SolverError::io("grid", format!("failed to read header line: {e}")))?;

    let mut header_tokens = header.split_whitespace();
    let imx = parse_dim(&mut header_tokens, "imx")?;
    let jmx = parse_dim(&mut header_tokens, "jmx")?;

    let mut grid_x = Array2::zeros((imx, jmx));
    let mut grid_y = Array2::zeros((imx, jmx));

    for j in 0..jmx {
        for i in 0..imx {
            let line = lines
                .next()
                .ok_or_else(|| SolverError::io("grid", format!("unexpected end of file reading vertex ({i}, {j})")))?
                .map_err(|e| SolverError::io("grid", format!("failed to read vertex ({i}, {j}): {e}")))?;
            let mut tokens = line.split_whitespace();
            let x: f64 = tokens
                .next()
                .ok_or_else(|| SolverError::io("grid", format!("missing x coordinate at vertex ({i}, {j})")))?
                .parse()
                .map_err(|e| SolverError::io("grid", format!("invalid x coordinate at vertex ({i}, {j}): {e}")))?;
            let y: f64 = tokens
                .next()
                .ok_or_else(|| SolverError::io("grid", format!("missing y coordinate at vertex ({i}, {j})")))?
                .parse()
                .map_err(|e| SolverError::io("grid", format!("invalid y coordinate at vertex ({i}, {j}): {e}")))?;
            grid_x[[i, j]] = x;
            grid_y[[i, j]] = y;
        }
    }

    Mesh::new(imx, jmx, grid_x, grid_y)
}

pub fn read_grid_file(path: impl AsRef<Path>) -> SolverResult<Mesh> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| SolverError::io("grid", format!("failed to open grid file {}: {e}", path.display())))?;
    read_grid(std::io::BufReader::new(file))
}

fn parse_dim<'a>(tokens: &mut impl Iterator<Item = &'a str>, name: &str) -> SolverResult<usize> {
    tokens
        .next()
        .ok_or_else(|| SolverError::io("grid", format!("missing {name} in grid header")))?
        .parse()
        .map_err(|e| SolverError::io("grid", format!("invalid {name}: {e}")))
}
