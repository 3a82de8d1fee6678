use mes_core::SolverSettings;
use serde::{Deserialize, Serialize};

use super::error::{BendersError, Result};

/// Benders decomposition configuration parameters.
///
/// Keys use the PascalCase names of the run-configuration file:
///
/// ```toml
/// MaxIter = 100
/// ConvTol = 1e-4
/// StabParam = 0.5
/// Distributed = true
///
/// [Solver]
/// presolve = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BendersConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,

    /// Time budget in seconds, checked between iterations only.
    pub max_cpu_time: f64,

    /// Relative optimality gap `(UB − LB)/|UB|` at which the run stops.
    pub conv_tol: f64,

    /// Stabilization parameter γ ∈ [0, 1]; 0 disables the level-set step.
    pub stab_param: f64,

    /// Adapt γ to bound progress.
    ///
    /// γ is halved after an iteration that does not improve the best upper
    /// bound (and dropped to 0 below 1e-3) and doubled, up to `StabParam`,
    /// after one that does.
    pub stab_dynamic: bool,

    /// Keep integrality of planning variables. When off, the planning
    /// problem is solved as its continuous relaxation.
    pub integer_investment: bool,

    /// Evaluate subproblems in parallel.
    pub distributed: bool,

    /// Give every subproblem without a slack penalty an automatic one and
    /// relax all penalized subproblems before the first iteration.
    pub include_automatic_slack_penalty: bool,

    /// Worker threads for distributed evaluation (0 = one per core).
    pub threads: usize,

    /// Settings passed to the solver backend for every solve.
    pub solver: SolverSettings,
}

impl Default for BendersConfig {
    fn default() -> Self {
        Self {
            max_iter: 50,
            max_cpu_time: 7200.0,
            conv_tol: 1e-3,
            stab_param: 0.0,
            stab_dynamic: false,
            integer_investment: false,
            distributed: false,
            include_automatic_slack_penalty: false,
            threads: 0,
            solver: SolverSettings::default(),
        }
    }
}

impl BendersConfig {
    /// Parse a run configuration; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: BendersConfig = toml::from_str(input)
            .map_err(|e| BendersError::InvalidConfig(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BendersError::InvalidConfig(format!("failed to serialize TOML: {}", e)))
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(BendersError::InvalidConfig(
                "MaxIter must be a positive integer".to_string(),
            ));
        }
        if self.max_cpu_time.is_nan() || self.max_cpu_time <= 0.0 {
            return Err(BendersError::InvalidConfig(format!(
                "MaxCpuTime must be positive, got {}",
                self.max_cpu_time
            )));
        }
        if !(self.conv_tol.is_finite() && self.conv_tol > 0.0) {
            return Err(BendersError::InvalidConfig(format!(
                "ConvTol must be a positive number, got {}",
                self.conv_tol
            )));
        }
        if !(0.0..=1.0).contains(&self.stab_param) {
            return Err(BendersError::InvalidConfig(format!(
                "StabParam must lie in [0, 1], got {}",
                self.stab_param
            )));
        }
        if self.solver.max_iter == 0 || self.solver.max_nodes == 0 {
            return Err(BendersError::InvalidConfig(
                "Solver iteration and node limits must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_cpu_time(mut self, seconds: f64) -> Self {
        self.max_cpu_time = seconds;
        self
    }

    pub fn with_conv_tol(mut self, conv_tol: f64) -> Self {
        self.conv_tol = conv_tol;
        self
    }

    pub fn with_stab_param(mut self, gamma: f64) -> Self {
        self.stab_param = gamma;
        self
    }

    pub fn with_stab_dynamic(mut self, enabled: bool) -> Self {
        self.stab_dynamic = enabled;
        self
    }

    pub fn with_integer_investment(mut self, enabled: bool) -> Self {
        self.integer_investment = enabled;
        self
    }

    pub fn with_distributed(mut self, enabled: bool) -> Self {
        self.distributed = enabled;
        self
    }

    pub fn with_automatic_slack_penalty(mut self, enabled: bool) -> Self {
        self.include_automatic_slack_penalty = enabled;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_solver(mut self, solver: SolverSettings) -> Self {
        self.solver = solver;
        self
    }
}
