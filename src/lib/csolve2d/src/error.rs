use thiserror::Error;

/// Error taxonomy for the solver core.
///
/// Every variant carries enough context (module, and a descriptive message)
/// to produce the single fatal diagnostic line the engine is allowed to emit
/// before terminating. `ConvergenceReached` is not a failure; the outer
/// driver treats it as a clean-termination signal rather than an abort.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("config error in {module}: {message}")]
    Config { module: &'static str, message: String },

    #[error("io error in {module}: {message}")]
    Io { module: &'static str, message: String },

    #[error("allocation error in {module}: {message}")]
    Allocation { module: &'static str, message: String },

    #[error("numerical error in {module} at cell ({i}, {j}): {message}")]
    Numerical {
        module: &'static str,
        i: usize,
        j: usize,
        message: String,
    },

    #[error("convergence reached at iter {iter}")]
    ConvergenceReached { iter: usize },
}

impl SolverError {
    pub fn config(module: &'static str, message: impl Into<String>) -> Self {
        SolverError::Config { module, message: message.into() }
    }

    pub fn io(module: &'static str, message: impl Into<String>) -> Self {
        SolverError::Io { module, message: message.into() }
    }

    pub fn allocation(module: &'static str, message: impl Into<String>) -> Self {
        SolverError::Allocation { module, message: message.into() }
    }

    pub fn numerical(module: &'static str, i: usize, j: usize, message: impl Into<String>) -> Self {
        SolverError::Numerical { module, i, j, message: message.into() }
    }

    /// True for the sentinel that signals clean termination rather than failure.
    pub fn is_convergence(&self) -> bool {
        matches!(self, SolverError::ConvergenceReached { .. })
    }
}

pub type SolverResult<T> = Result<T, SolverError>;
