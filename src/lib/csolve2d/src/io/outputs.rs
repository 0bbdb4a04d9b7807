use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{SolverError, SolverResult};
use crate::reconstruct::Interpolant;
use crate::state::PrimitiveState;

/// Periodic output sinks opened by `setup_solver` and released by
/// `destroy_solver` (§5, §6): `resnorms` (one line per iter after the
/// first: 5 numbers), `mass_residue` (one line per update: 5 numbers), and
/// a `pressure-<interpolant>` snapshot at the bottom wall written at every
/// checkpoint and at the final iteration.
pub struct OutputSinks {
    resnorms: BufWriter<File>,
    mass_residue: BufWriter<File>,
    pressure_path: PathBuf,
}

impl OutputSinks {
    pub fn open(out_dir: impl AsRef<Path>, interpolant: Interpolant) -> SolverResult<Self> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)
            .map_err(|e| SolverError::io("outputs", format!("failed to create {}: {e}", out_dir.display())))?;

        let resnorms = open_append(&out_dir.join("resnorms"))?;
        let mass_residue = open_append(&out_dir.join("mass_residue"))?;
        let pressure_path = out_dir.join(format!("pressure-{}", interpolant.name()));

        Ok(OutputSinks { resnorms: BufWriter::new(resnorms), mass_residue: BufWriter::new(mass_residue), pressure_path })
    }

    pub fn write_resnorm_line(&mut self, resnorm: f64, n1: f64, n2: f64, n3: f64, n4: f64) -> SolverResult<()> {
        writeln!(self.resnorms, "{resnorm} {n1} {n2} {n3} {n4}")
            .map_err(|e| SolverError::io("outputs", format!("failed to write resnorms line: {e}")))
    }

    pub fn write_mass_residue_line(&mut self, values: [f64; 5]) -> SolverResult<()> {
        writeln!(
            self.mass_residue,
            "{} {} {} {} {}",
            values[0], values[1], values[2], values[3], values[4]
        )
        .map_err(|e| SolverError::io("outputs", format!("failed to write mass_residue line: {e}")))
    }

    /// Writes surface pressure along the bottom wall (j = 1 interior row).
    pub fn write_bottom_wall_pressure(&self, state: &PrimitiveState) -> SolverResult<()> {
        let file = File::create(&self.pressure_path).map_err(|e| {
            SolverError::io("outputs", format!("failed to create {}: {e}", self.pressure_path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        for i in 1..state.imx {
            writeln!(writer, "{}", state.p(i, 1))
                .map_err(|e| SolverError::io("outputs", format!("failed to write pressure line: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| SolverError::io("outputs", format!("failed to flush {}: {e}", self.pressure_path.display())))
    }

    pub fn flush(&mut self) -> SolverResult<()> {
        self.resnorms.flush().map_err(|e| SolverError::io("outputs", format!("failed to flush resnorms: {e}")))?;
        self.mass_residue
            .flush()
            .map_err(|e| SolverError::io("outputs", format!("failed to flush mass_residue: {e}")))
    }
}

fn open_append(path: &Path) -> SolverResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SolverError::io("outputs", format!("failed to open {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FreeStream;

    #[test]
    fn writes_expected_files() {
        let dir = std::env::temp_dir().join(format!("csolve2d-outputs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).ok();

        let mut sinks = OutputSinks::open(&dir, Interpolant::None).unwrap();
        sinks.write_resnorm_line(1.0, 2.0, 3.0, 4.0, 5.0).unwrap();
        sinks.write_mass_residue_line([0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();

        let fs = FreeStream { rho: 1.0, u: 1.0, v: 0.0, p: 1.0, gamma: 1.4 };
        let mut state = PrimitiveState::new(4, 4);
        state.fill_free_stream(&fs);
        sinks.write_bottom_wall_pressure(&state).unwrap();
        sinks.flush().unwrap();

        assert!(dir.join("resnorms").exists());
        assert!(dir.join("mass_residue").exists());
        assert!(dir.join("pressure-none").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
