use std::collections::BTreeMap;

use mes_core::{ClarabelBackend, SolverBackend};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};
use web_time::Instant;

use super::config::BendersConfig;
use super::cuts::{add_cuts, generate_cuts};
use super::error::{BendersError, Result};
use super::history::RunHistory;
use super::level_set::{dynamic_gamma, solve_int_level_set_problem};
use super::planning::solve_planning_problem;
use super::problem::{DecomposedProblem, PlanningProblem, Subproblem};
use super::solution::{BendersResult, PlanningSolution, SubproblemResult, TerminationReason};
use super::subproblem::{solve_subproblems, SubproblemEvaluator};

/// Regularized Benders decomposition solver.
pub struct BendersSolver<B: SolverBackend = ClarabelBackend> {
    config: BendersConfig,
    backend: B,
}

impl BendersSolver<ClarabelBackend> {
    /// Create a new solver on the Clarabel backend.
    pub fn new(config: BendersConfig) -> Self {
        Self::with_backend(config, ClarabelBackend::new())
    }

    /// Create a new solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(BendersConfig::default())
    }
}

impl<B: SolverBackend> BendersSolver<B> {
    pub fn with_backend(config: BendersConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &BendersConfig {
        &self.config
    }

    /// Set the level-set parameter γ.
    pub fn with_stab_param(mut self, gamma: f64) -> Self {
        self.config.stab_param = gamma;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Evaluate subproblems on a rayon pool of `threads` workers (0 = all cores).
    pub fn with_distributed(mut self, threads: usize) -> Self {
        self.config.distributed = true;
        self.config.threads = threads;
        self
    }

    /// Run the decomposition until the gap closes or a limit is hit.
    ///
    /// Hitting `MaxIter` or `MaxCpuTime` is not an error; the result carries
    /// the best solution found and the final gap.
    pub fn solve(&self, problem: DecomposedProblem) -> Result<BendersResult> {
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;
        problem.validate()?;

        let DecomposedProblem {
            mut planning,
            linking_variables,
            subproblems,
        } = problem;

        // Step 1: Prepare the planning problem and the subproblem evaluators
        if !config.integer_investment {
            let relaxed = planning.model.relax_integrality();
            if relaxed > 0 {
                info!(count = relaxed, "investment integrality relaxed");
            }
        }
        let mut evaluators = subproblems
            .into_iter()
            .map(|s| SubproblemEvaluator::new(s, config.include_automatic_slack_penalty))
            .collect::<Result<Vec<_>>>()?;
        evaluators.sort_by_key(|e| e.index());

        let pool = self.build_pool()?;
        let settings = &config.solver;

        info!(
            backend = self.backend.name(),
            subproblems = evaluators.len(),
            linking_variables = linking_variables.len(),
            multi_cut = planning.is_multi_cut(),
            distributed = pool.is_some(),
            "starting Benders decomposition"
        );

        // Step 2: Iterate
        let mut history = RunHistory::new();
        let mut gamma = config.stab_param;

        let termination = loop {
            let iteration = history.iterations() + 1;

            let master =
                solve_planning_problem(&self.backend, &planning, &linking_variables, settings)?;
            let lower_bound = history.lower_bound().max(master.lower_bound);
            let best_upper_bound = history.best_upper_bound();

            let candidate = if gamma > 0.0 && best_upper_bound.is_finite() {
                let centre = history.incumbent().unwrap_or(&master);
                match solve_int_level_set_problem(
                    &self.backend,
                    &planning,
                    &linking_variables,
                    centre,
                    lower_bound,
                    best_upper_bound,
                    gamma,
                    settings,
                ) {
                    Ok(stabilized) => stabilized,
                    Err(err) => {
                        warn!(iteration, error = %err, "level-set projection failed; using master solution");
                        master.clone()
                    }
                }
            } else {
                master.clone()
            };

            let results = solve_subproblems(
                &self.backend,
                &mut evaluators,
                &candidate.values,
                settings,
                pool.as_ref(),
            )?;
            let upper_bound = upper_bound(&candidate, &results);

            let cuts = generate_cuts(&planning, &results, &candidate.values, iteration)?;
            add_cuts(&mut planning, &cuts)?;

            let elapsed = start.elapsed().as_secs_f64();
            let improved =
                history.record_iteration(master.lower_bound, upper_bound, elapsed, gamma, candidate);
            let gap = history.gap();

            info!(
                iteration,
                lb = history.lower_bound(),
                ub = history.best_upper_bound(),
                gap,
                gamma,
                cuts = cuts.len(),
                time = elapsed,
                "Benders iteration"
            );

            if config.stab_dynamic {
                gamma = dynamic_gamma(gamma, config.stab_param, improved);
            }

            if gap <= config.conv_tol {
                break TerminationReason::Converged;
            }
            if history.iterations() >= config.max_iter {
                break TerminationReason::MaxIterations;
            }
            if elapsed >= config.max_cpu_time {
                break TerminationReason::MaxCpuTime;
            }
        };

        // Step 3: Assemble the result
        let planning_sol = history
            .incumbent()
            .or_else(|| history.solutions.last())
            .cloned()
            .ok_or_else(|| BendersError::PlanningFailed("no iteration completed".to_string()))?;
        let gap = history.gap();
        let iterations = history.iterations();

        info!(
            %termination,
            iterations,
            lb = history.lower_bound(),
            ub = history.best_upper_bound(),
            gap,
            time = start.elapsed().as_secs_f64(),
            "Benders decomposition finished"
        );

        Ok(BendersResult {
            planning_problem: planning,
            planning_sol,
            lb_hist: history.lb,
            ub_hist: history.ub,
            cpu_time: history.cpu_time,
            sol_hist: history.solutions,
            gamma_hist: history.gamma,
            iterations,
            termination,
            converged: termination == TerminationReason::Converged,
            gap,
        })
    }

    fn build_pool(&self) -> Result<Option<ThreadPool>> {
        if !self.config.distributed {
            return Ok(None);
        }
        ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("benders-sub-{}", i))
            .build()
            .map(Some)
            .map_err(|e| BendersError::ThreadPool(e.to_string()))
    }
}

/// `FixedCost` at the candidate plus every subproblem cost; `+∞` while any
/// subproblem is infeasible.
fn upper_bound(candidate: &PlanningSolution, results: &BTreeMap<usize, SubproblemResult>) -> f64 {
    if results.values().any(|r| !r.is_feasible()) {
        return f64::INFINITY;
    }
    candidate.fixed_cost + results.values().map(|r| r.objective).sum::<f64>()
}

/// Run the decomposition on the Clarabel backend.
///
/// `linking_variables_sub` gives, per subproblem index, the linking
/// variables that subproblem contains; indices it does not mention keep the
/// subset stored on the [`Subproblem`].
pub fn benders(
    planning: PlanningProblem,
    linking_variables: Vec<String>,
    subproblems: Vec<Subproblem>,
    linking_variables_sub: &BTreeMap<usize, Vec<String>>,
    config: BendersConfig,
) -> Result<BendersResult> {
    let problem = DecomposedProblem::new(planning, linking_variables, subproblems)
        .with_linking_subsets(linking_variables_sub);
    BendersSolver::new(config).solve(problem)
}
