use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::{SolverError, SolverResult};
use crate::flux::{add_viscous_fluxes, compute_inviscid_fluxes, ViscousParams};
use crate::geometry::Geometry;
use crate::ib::{ImmersedBoundary, NoImmersedBoundary};
use crate::integrator::{positivity_guarded_update, rk4_final_update, rk4_stage_dt, ConvergenceTracker, TimeStepAccuracy};
use crate::io::grid::read_grid_file;
use crate::io::outputs::OutputSinks;
use crate::io::state::{read_checkpoint_file, write_checkpoint};
use crate::mesh::Mesh;
use crate::reconstruct::{FaceStates, Interpolant};
use crate::residue::{compute_residue, mass_conservation_diagnostic, residue_to_dedx, ResidueNorms};
use crate::state::{FreeStream, PrimitiveState, N_VARS};
use crate::timestep::compute_time_step;

struct SubStepOutputs {
    f: ndarray::Array3<f64>,
    g: ndarray::Array3<f64>,
    residue: ndarray::Array3<f64>,
    dedx: ndarray::Array3<f64>,
    dt: Option<Array2<f64>>,
}

/// The explicit *Solver* value §9 asks for: owns mesh, geometry, state,
/// scheme/integrator scratch, and iteration bookkeeping for one run, from
/// `setup` to drop.
pub struct Solver {
    pub mesh: Mesh,
    pub geometry: Geometry,
    pub state: PrimitiveState,
    pub free_stream: FreeStream,
    supersonic: bool,
    pub config: Config,
    ib: Box<dyn ImmersedBoundary>,
    pub iter: usize,
    pub sim_clock: f64,
    pub resnorm: f64,
    tracker: ConvergenceTracker,
    norms: ResidueNorms,
    outputs: Option<OutputSinks>,
    last_f: ndarray::Array3<f64>,
    last_g: ndarray::Array3<f64>,
    last_dt: Array2<f64>,
}

impl Solver {
    pub fn new(
        config: Config,
        mesh: Mesh,
        state: PrimitiveState,
        ib: Box<dyn ImmersedBoundary>,
        outputs: Option<OutputSinks>,
    ) -> Self {
        let free_stream = FreeStream {
            rho: config.rho_inf,
            u: config.u_inf,
            v: config.v_inf,
            p: config.p_inf,
            gamma: config.gamma,
        };
        let supersonic = free_stream.is_supersonic();
        let geometry = Geometry::from_mesh(&mesh);
        let norms = ResidueNorms::from_free_stream(&free_stream);
        let tracker = ConvergenceTracker::new(config.tolerance);
        let (icols, jrows) = geometry.volume.dim();

        Solver {
            mesh,
            geometry,
            state,
            free_stream,
            supersonic,
            config,
            ib,
            iter: 0,
            sim_clock: 0.0,
            resnorm: f64::INFINITY,
            tracker,
            norms,
            outputs,
            last_f: ndarray::Array3::zeros((icols + 1, jrows, N_VARS)),
            last_g: ndarray::Array3::zeros((icols, jrows + 1, N_VARS)),
            last_dt: Array2::zeros((icols, jrows)),
        }
    }

    /// `setup_solver`: assembles mesh, state, and output sinks from a parsed
    /// [`Config`] (§5). Reads the grid file, optionally loads a checkpoint
    /// (`state_load_file`) or initializes the free-stream state, and opens
    /// the periodic output sinks under `out_dir`.
    pub fn bootstrap(config: Config, out_dir: impl AsRef<std::path::Path>) -> SolverResult<Self> {
        let free_stream = FreeStream {
            rho: config.rho_inf,
            u: config.u_inf,
            v: config.v_inf,
            p: config.p_inf,
            gamma: config.gamma,
        };

        let (mesh, state) = match &config.state_load_file {
            Some(path) => {
                let (mesh, state) = read_checkpoint_file(path)?;
                (mesh, state)
            }
            None => {
                let mesh = read_grid_file(&config.grid_file)?;
                let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
                state.fill_free_stream(&free_stream);
                (mesh, state)
            }
        };

        let outputs = OutputSinks::open(out_dir, config.interpolant).ok();
        let ib: Box<dyn ImmersedBoundary> = Box::new(NoImmersedBoundary);

        Ok(Solver::new(config, mesh, state, ib, outputs))
    }

    fn viscous_params(&self) -> ViscousParams {
        ViscousParams {
            mu_ref: self.config.mu_ref,
            t_ref: self.config.t_ref,
            sutherland_temp: self.config.sutherland_temp,
            r_gas: self.config.r_gas,
            pr: self.config.pr,
            gamma: self.config.gamma,
        }
    }

    /// Executes one sub-step (§4.8), mutating `self.state`'s ghost cells
    /// and returning the fluxes/residue/dE-dx it produced. `compute_dt`
    /// gates step (ix): Δt is computed for the single-stage Euler substep
    /// and RK4's stage 1, but not recomputed for RK4 stages 2-4 (§4.6).
    #[instrument(skip(self))]
    fn run_substep(&mut self, compute_dt: bool) -> SubStepOutputs {
        self.state.set_ghost_cell_data(&self.free_stream, self.supersonic, self.config.mu_ref);

        let mut faces = FaceStates::reconstruct(&self.state, Interpolant::None, self.config.gamma);
        self.ib.reset_states_at_interface_faces(&mut faces, &self.geometry);

        let (icols_faces, jrows_faces) = (faces.x_left.rho.dim().0, faces.x_left.rho.dim().1);
        let (icols_eta, jmx_faces) = (faces.y_left.rho.dim().0, faces.y_left.rho.dim().1);
        let mut f = ndarray::Array3::<f64>::zeros((icols_faces, jrows_faces, N_VARS));
        let mut g = ndarray::Array3::<f64>::zeros((icols_eta, jmx_faces, N_VARS));

        if self.config.mu_ref != 0.0 {
            add_viscous_fluxes(&self.state, &self.geometry, &self.viscous_params(), &mut f, &mut g);
            self.ib.reset_gradients_at_interfaces(&mut f, &mut g, &self.geometry);
        }

        if self.config.interpolant != Interpolant::None {
            faces = FaceStates::reconstruct(&self.state, self.config.interpolant, self.config.gamma);
            self.ib.reset_states_at_interface_faces(&mut faces, &self.geometry);
        }

        let (inv_f, inv_g) = compute_inviscid_fluxes(&faces, &self.geometry, self.config.gamma, self.config.scheme_name);
        for (dst, src) in f.iter_mut().zip(inv_f.iter()) {
            *dst += src;
        }
        for (dst, src) in g.iter_mut().zip(inv_g.iter()) {
            *dst += src;
        }

        let residue = compute_residue(&f, &g);

        let dt = if compute_dt {
            Some(compute_time_step(
                &self.state,
                &self.geometry,
                self.config.cfl,
                self.config.gamma,
                self.config.time_stepping_method,
                self.config.global_time_step,
            ))
        } else {
            None
        };

        let dedx = residue_to_dedx(&residue, &self.state, self.config.gamma);

        SubStepOutputs { f, g, residue, dedx, dt }
    }

    fn euler_step(&mut self) {
        let outputs = self.run_substep(true);
        let dt = outputs.dt.expect("dt is always computed on the single-stage euler substep");
        self.state = positivity_guarded_update(&self.state, &outputs.dedx, &dt, &self.geometry);
        self.last_f = outputs.f;
        self.last_g = outputs.g;
        self.last_dt = dt;
        self.store_residue_norm(&outputs.residue);
    }

    fn rk4_step(&mut self) {
        let q_n = self.state.clone();

        let stage1 = self.run_substep(true);
        let dt = stage1.dt.clone().expect("dt is always computed on rk4 stage 1");

        let dt2 = rk4_stage_dt(&dt, 2);
        self.state = positivity_guarded_update(&q_n, &stage1.dedx, &dt2, &self.geometry);
        let stage2 = self.run_substep(false);

        let dt3 = rk4_stage_dt(&dt, 3);
        self.state = positivity_guarded_update(&q_n, &stage2.dedx, &dt3, &self.geometry);
        let stage3 = self.run_substep(false);

        let dt4 = rk4_stage_dt(&dt, 4);
        self.state = positivity_guarded_update(&q_n, &stage3.dedx, &dt4, &self.geometry);
        let stage4 = self.run_substep(false);

        self.state = rk4_final_update(&q_n, &stage1.dedx, &stage2.dedx, &stage3.dedx, &stage4.dedx, &dt, &self.geometry);

        self.last_f = stage1.f;
        self.last_g = stage1.g;
        self.last_dt = dt;
        self.store_residue_norm(&stage1.residue);
    }

    fn store_residue_norm(&mut self, residue: &ndarray::Array3<f64>) {
        self.resnorm = self.norms.resnorm(residue);
    }

    /// Executes one full outer step (§4.8): a sub-step pipeline (possibly
    /// several, for RK4), sim_clock/iter bookkeeping, residue norms, mass
    /// diagnostic, and an optional checkpoint write.
    #[instrument(skip(self))]
    pub fn step(&mut self) -> SolverResult<()> {
        match self.config.time_step_accuracy {
            TimeStepAccuracy::ForwardEuler => self.euler_step(),
            TimeStepAccuracy::Rk4 => self.rk4_step(),
        }

        let dt_repr = self.last_dt.iter().cloned().fold(f64::INFINITY, f64::min);
        self.sim_clock += dt_repr;
        self.iter += 1;

        let diagnostic = mass_conservation_diagnostic(&self.last_f, &self.last_g);
        if let Some(outputs) = self.outputs.as_mut() {
            outputs.write_mass_residue_line(diagnostic)?;
            if self.iter > 1 {
                outputs.write_resnorm_line(self.resnorm, self.norms.n1, self.norms.n2, self.norms.n3, self.norms.n4)?;
            }
        }

        debug!(iter = self.iter, resnorm = self.resnorm, sim_clock = self.sim_clock, "completed outer step");

        if self.config.checkpoint_iter > 0 && self.iter % self.config.checkpoint_iter == 0 {
            self.write_checkpoint_and_pressure()?;
        }

        Ok(())
    }

    fn write_checkpoint_and_pressure(&mut self) -> SolverResult<()> {
        if let Some(outputs) = self.outputs.as_ref() {
            outputs.write_bottom_wall_pressure(&self.state)?;
        }
        let path = format!("checkpoint-{:08}.vtk", self.iter);
        write_checkpoint(path, &self.mesh, &self.state)
    }

    /// `converged`: true iff resnorm / resnorm_0 < tolerance (§4.7). This
    /// performs the documented intent; see §9 design decisions. A zero
    /// resnorm_0 (flow started already at steady state) reports converged
    /// immediately rather than dividing by zero.
    pub fn converged(&self) -> bool {
        match self.tracker.resnorm_0() {
            Some(resnorm_0) if resnorm_0 > 0.0 => self.resnorm / resnorm_0 < self.config.tolerance,
            Some(_) => true,
            None => false,
        }
    }

    /// Runs to `max_iters` or until `converged()`, returning the iteration
    /// count reached. Mirrors the tracker's bookkeeping into `converged()`.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> SolverResult<usize> {
        while self.iter < self.config.max_iters {
            self.step()?;
            let converged = self.tracker.observe(self.iter, self.resnorm);
            if converged {
                info!(iter = self.iter, resnorm = self.resnorm, "convergence reached");
                if self.config.checkpoint_iter > 0 {
                    self.write_checkpoint_and_pressure()?;
                }
                return Err(SolverError::ConvergenceReached { iter: self.iter });
            }
        }
        if self.config.checkpoint_iter > 0 {
            self.write_checkpoint_and_pressure()?;
        }
        Ok(self.iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::flux::SchemeName;
    use crate::integrator::TimeStepAccuracy;
    use crate::timestep::TimeSteppingMethod;
    use approx::assert_relative_eq;

    fn base_config() -> Config {
        Config {
            scheme_name: SchemeName::VanLeer,
            interpolant: Interpolant::None,
            cfl: 0.5,
            time_stepping_method: TimeSteppingMethod::Local,
            global_time_step: None,
            time_step_accuracy: TimeStepAccuracy::ForwardEuler,
            tolerance: 1e-10,
            grid_file: String::new(),
            ib_file: None,
            state_load_file: None,
            max_iters: 5,
            checkpoint_iter: 0,
            debug_level: 0,
            gamma: 1.4,
            r_gas: 287.0,
            rho_inf: 1.225,
            u_inf: 100.0,
            v_inf: 0.0,
            p_inf: 101325.0,
            mu_ref: 0.0,
            t_ref: 288.15,
            sutherland_temp: 110.4,
            pr: 0.72,
        }
    }

    fn free_stream_solver(config: Config) -> Solver {
        let mesh = Mesh::uniform_cartesian(10, 10, 1.0, 1.0).unwrap();
        let fs = FreeStream { rho: config.rho_inf, u: config.u_inf, v: config.v_inf, p: config.p_inf, gamma: config.gamma };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);
        Solver::new(config, mesh, state, Box::new(NoImmersedBoundary), None)
    }

    /// S1: free-stream preservation on a uniform mesh with Dirichlet inlet.
    #[test]
    fn free_stream_preservation() {
        let mut solver = free_stream_solver(base_config());
        let before = solver.state.clone();

        for _ in 0..5 {
            solver.step().unwrap();
            assert!(solver.resnorm <= 1e-8, "resnorm {} exceeded tolerance", solver.resnorm);
        }

        for i in 1..solver.state.imx {
            for j in 1..solver.state.jmx {
                assert_relative_eq!(solver.state.rho(i, j), before.rho(i, j), epsilon = 1e-6);
                assert_relative_eq!(solver.state.p(i, j), before.p(i, j), epsilon = 1.0);
            }
        }
    }

    /// S2: local vs global Δt equivalence when global_time_step = min(local Δt).
    #[test]
    fn local_and_global_time_stepping_agree_on_uniform_mesh() {
        let mut local_solver = free_stream_solver(base_config());
        let local_dt = crate::timestep::local_time_step(&local_solver.state, &local_solver.geometry, local_solver.config.cfl, local_solver.config.gamma);
        let min_dt = local_dt.iter().cloned().fold(f64::INFINITY, f64::min);

        let mut global_config = base_config();
        global_config.time_stepping_method = TimeSteppingMethod::Global;
        global_config.global_time_step = Some(min_dt);
        let mut global_solver = free_stream_solver(global_config);

        local_solver.step().unwrap();
        global_solver.step().unwrap();

        for i in 1..local_solver.state.imx {
            for j in 1..local_solver.state.jmx {
                assert_relative_eq!(local_solver.state.rho(i, j), global_solver.state.rho(i, j), epsilon = 1e-9);
                assert_relative_eq!(local_solver.state.u(i, j), global_solver.state.u(i, j), epsilon = 1e-9);
            }
        }
    }

    /// S5: convergence test honored — tolerance loose enough that iter 1 converges immediately.
    #[test]
    fn convergence_test_terminates_the_run() {
        let mut config = base_config();
        config.tolerance = 10.0;
        config.max_iters = 10;
        let mut solver = free_stream_solver(config);

        let err = solver.run().unwrap_err();
        assert!(matches!(err, SolverError::ConvergenceReached { iter: 1 }));
    }

    #[test]
    fn rk4_preserves_free_stream_too() {
        let mut config = base_config();
        config.time_step_accuracy = TimeStepAccuracy::Rk4;
        let mut solver = free_stream_solver(config);
        solver.step().unwrap();
        assert!(solver.resnorm <= 1e-6);
    }

    /// S4 (qualitative): a density perturbation advected by a uniform flow
    /// moves downstream under RK4 without destabilizing the rest of the
    /// field or drifting total mass. A strict order-of-accuracy check needs
    /// a mesh-refinement study outside what a single test run can confirm
    /// without execution, so this checks direction and stability instead.
    #[test]
    fn rk4_advects_a_density_perturbation_downstream() {
        let mut config = base_config();
        config.time_step_accuracy = TimeStepAccuracy::Rk4;
        config.cfl = 0.3;
        config.max_iters = 20;
        let mut solver = free_stream_solver(config);

        let mid_j = solver.state.jmx / 2;
        let spike_rho = solver.free_stream.rho * 1.5;
        solver.state.set_cell(2, mid_j, spike_rho, solver.free_stream.u, 0.0, solver.free_stream.p);
        let excess_at_origin_before = spike_rho - solver.free_stream.rho;
        let total_mass_before: f64 = (1..solver.state.imx)
            .flat_map(|i| (1..solver.state.jmx).map(move |j| (i, j)))
            .map(|(i, j)| solver.state.rho(i, j))
            .sum();

        for _ in 0..10 {
            solver.step().unwrap();
        }

        let total_mass_after: f64 = (1..solver.state.imx)
            .flat_map(|i| (1..solver.state.jmx).map(move |j| (i, j)))
            .map(|(i, j)| solver.state.rho(i, j))
            .sum();
        assert_relative_eq!(total_mass_after, total_mass_before, epsilon = 1e-6 * total_mass_before);

        // The initial spike should have relaxed towards free-stream (advected
        // and/or numerically diffused away), rather than sitting unmoved.
        let excess_at_origin_after = solver.state.rho(2, mid_j) - solver.free_stream.rho;
        assert!(
            excess_at_origin_after < excess_at_origin_before,
            "density spike at its origin cell did not relax: before={excess_at_origin_before}, after={excess_at_origin_after}"
        );

        // Some of that excess mass must have appeared elsewhere in the row —
        // it neither vanished (mass is conserved) nor stayed pinned in place.
        let excess_elsewhere: f64 = (1..solver.state.imx)
            .filter(|&i| i != 2)
            .map(|i| (solver.state.rho(i, mid_j) - solver.free_stream.rho).max(0.0))
            .sum();
        assert!(excess_elsewhere > 0.0, "perturbation did not propagate to neighboring cells");
    }

    /// S6: a checkpoint written mid-run can be used as `state_load_file` to
    /// bootstrap a solver whose state matches the one that was written.
    #[test]
    fn bootstrap_from_checkpoint_recovers_state() {
        let dir = std::env::temp_dir().join(format!("csolve2d-solver-checkpoint-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let checkpoint_path = dir.join("restart.vtk");

        let mesh = Mesh::uniform_cartesian(6, 6, 1.0, 1.0).unwrap();
        let fs = FreeStream { rho: 1.225, u: 100.0, v: 0.0, p: 101325.0, gamma: 1.4 };
        let mut state = PrimitiveState::new(mesh.imx, mesh.jmx);
        state.fill_free_stream(&fs);
        state.set_cell(2, 2, 1.3, 95.0, 1.0, 100000.0);
        crate::io::state::write_checkpoint(&checkpoint_path, &mesh, &state).unwrap();

        let mut config = base_config();
        config.state_load_file = Some(checkpoint_path.to_string_lossy().to_string());
        let solver = Solver::bootstrap(config, &dir).unwrap();

        assert_relative_eq!(solver.state.rho(2, 2), 1.3, epsilon = 1e-6);
        assert_relative_eq!(solver.state.u(2, 2), 95.0, epsilon = 1e-6);
        assert_relative_eq!(solver.state.rho(3, 3), fs.rho, epsilon = 1e-6);

        std::fs::remove_dir_all(&dir).ok();
    }
}
