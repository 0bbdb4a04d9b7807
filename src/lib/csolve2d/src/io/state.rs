use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{SolverError, SolverResult};
use crate::mesh::Mesh;
use crate::state::PrimitiveState;

/// Writes a VTK legacy ASCII structured-grid checkpoint (§6). Used both as
/// the on-disk format for `state_load_file` and as the periodic checkpoint
/// output. The file is written atomically: `path.part` is written first,
/// then renamed onto `path`, so a reader never observes a partial file.
pub fn write_checkpoint(path: impl AsRef<Path>, mesh: &Mesh, state: &PrimitiveState) -> SolverResult<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });

    {
        let file = std::fs::File::create(&tmp_path)
            .map_err(|e| SolverError::io("state", format!("failed to create {}: {e}", tmp_path.display())))?;
        let mut writer = std::io::BufWriter::new(file);
        write_vtk(&mut writer, mesh, state)
            .map_err(|e| SolverError::io("state", format!("failed to write {}: {e}", tmp_path.display())))?;
        writer
            .flush()
            .map_err(|e| SolverError::io("state", format!("failed to flush {}: {e}", tmp_path.display())))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        SolverError::io("state", format!("failed to rename {} to {}: {e}", tmp_path.display(), path.display()))
    })
}

fn write_vtk<W: Write>(w: &mut W, mesh: &Mesh, state: &PrimitiveState) -> std::io::Result<()> {
    let imx = mesh.imx;
    let jmx = mesh.jmx;

    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "csolve2d checkpoint")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET STRUCTURED_GRID")?;
    writeln!(w, "DIMENSIONS {imx} {jmx} 1")?;
    writeln!(w, "POINTS {} FLOAT", imx * jmx)?;
    for j in 0..jmx {
        for i in 0..imx {
            writeln!(w, "{} {} 0.0", mesh.grid_x[[i, j]], mesh.grid_y[[i, j]])?;
        }
    }

    writeln!(w, "CELL_DATA {}", (imx - 1) * (jmx - 1))?;
    writeln!(w, "VECTORS Velocity FLOAT")?;
    for j in 0..jmx - 1 {
        for i in 0..imx - 1 {
            let (si, sj) = (i + 1, j + 1);
            writeln!(w, "{} {} 0.0", state.u(si, sj), state.v(si, sj))?;
        }
    }

    writeln!(w, "SCALARS Density FLOAT")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for j in 0..jmx - 1 {
        for i in 0..imx - 1 {
            writeln!(w, "{}", state.rho(i + 1, j + 1))?;
        }
    }

    writeln!(w, "SCALARS Pressure FLOAT")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for j in 0..jmx - 1 {
        for i in 0..imx - 1 {
            writeln!(w, "{}", state.p(i + 1, j + 1))?;
        }
    }

    Ok(())
}

/// Reads a VTK legacy ASCII structured-grid checkpoint written by
/// [`write_checkpoint`], recovering the mesh and interior primitive state
/// (§6, §8 invariant 7: checkpoint round-trip).
pub fn read_checkpoint<R: BufRead>(reader: R) -> SolverResult<(Mesh, PrimitiveState)> {
    let mut lines = reader.lines();
    let mut next_line = || -> SolverResult<String> {
        lines
            .next()
            .ok_or_else(|| SolverError::io("state", "unexpected end of VTK file"))?
            .map_err(|e| SolverError::io("state", format!("failed to read line: {e}")))
    };

    let _header = next_line()?;
    let _comment = next_line()?;
    let ascii = next_line()?;
    if ascii.trim() != "ASCII" {
        return Err(SolverError::io("state", format!("expected ASCII, got '{ascii}'")));
    }
    let _dataset = next_line()?;

    let dims_line = next_line()?;
    let mut dims_tokens = dims_line.split_whitespace();
    dims_tokens.next(); // "DIMENSIONS"
    let imx: usize = dims_tokens
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SolverError::io("state", "invalid imx in DIMENSIONS line"))?;
    let jmx: usize = dims_tokens
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SolverError::io("state", "invalid jmx in DIMENSIONS line"))?;

    let _points_header = next_line()?;
    let mut grid_x = ndarray::Array2::zeros((imx, jmx));
    let mut grid_y = ndarray::Array2::zeros((imx, jmx));
    for j in 0..jmx {
        for i in 0..imx {
            let line = next_line()?;
            let mut tokens = line.split_whitespace();
            let x: f64 = tokens
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| SolverError::io("state", format!("invalid x at vertex ({i}, {j})")))?;
            let y: f64 = tokens
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| SolverError::io("state", format!("invalid y at vertex ({i}, {j})")))?;
            grid_x[[i, j]] = x;
            grid_y[[i, j]] = y;
        }
    }
    let mesh = Mesh::new(imx, jmx, grid_x, grid_y)?;

    let _cell_data_header = next_line()?;
    let _velocity_header = next_line()?;
    let mut state = PrimitiveState::new(imx, jmx);
    let mut velocities = vec![(0.0, 0.0); (imx - 1) * (jmx - 1)];
    for slot in velocities.iter_mut() {
        let line = next_line()?;
        let mut tokens = line.split_whitespace();
        let u: f64 = tokens
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SolverError::io("state", "invalid velocity component"))?;
        let v: f64 = tokens
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SolverError::io("state", "invalid velocity component"))?;
        *slot = (u, v);
    }

    let _density_header = next_line()?;
    let _density_lut = next_line()?;
    let mut densities = vec![0.0; (imx - 1) * (jmx - 1)];
    for slot in densities.iter_mut() {
        let line = next_line()?;
        *slot = line
            .trim()
            .parse()
            .map_err(|e| SolverError::io("state", format!("invalid density value: {e}")))?;
    }

    let _pressure_header = next_line()?;
    let _pressure_lut = next_line()?;
    let mut pressures = vec![0.0; (imx - 1) * (jmx - 1)];
    for slot in pressures.iter_mut() {
        let line = next_line()?;
        *slot = line
            .trim()
            .parse()
            .map_err(|e| SolverError::io("state", format!("invalid pressure value: {e}")))?;
    }

    let mut idx = 0;
    for j in 0..jmx - 1 {
        for i in 0..imx - 1 {
            let (u, v) = velocities[idx];
            let rho = densities[idx];
            let p = pressures[idx];
            state.set_cell(i + 1, j + 1, rho, u, v, p);
            idx += 1;
        }
    }

    Ok((mesh, state))
}

pub fn read_checkpoint_file(path: impl AsRef<Path>) -> SolverResult<(Mesh, PrimitiveState)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| SolverError::io("state", format!("failed to open {}: {e}", path.display())))?;
    read_checkpoint(std::io::BufReader::new(file))
}
