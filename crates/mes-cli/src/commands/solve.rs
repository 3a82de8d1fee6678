//! `mes solve`

use std::fs;

use anyhow::{Context, Result};
use mes_algo::{BendersConfig, BendersSolver};
use mes_cli::{RunRecord, RunSummary, SolveArgs};
use tracing::info;

use super::load_problem;

pub fn handle(args: &SolveArgs) -> Result<()> {
    let config = build_config(args)?;
    let problem = load_problem(&args.problem)?;
    info!(
        problem = %args.problem.display(),
        subproblems = problem.subproblems.len(),
        "problem loaded"
    );

    let result = BendersSolver::new(config.clone())
        .solve(problem)
        .context("running Benders decomposition")?;

    let summary = RunSummary::from_result(&result);
    println!("Termination: {}", summary.termination);
    println!("Iterations:  {}", summary.iterations);
    println!("Lower bound: {:.6}", summary.lower_bound);
    println!("Upper bound: {:.6}", summary.upper_bound);
    println!("Gap:         {:.3e}", summary.gap);
    println!("Cuts:        {}", summary.cuts);
    println!("Time:        {:.3} s", summary.cpu_time);
    for (name, value) in &result.planning_sol.values {
        println!("  {} = {:.6}", name, value);
    }

    if let Some(out) = &args.out {
        RunRecord::new(&args.problem, &config, &result).write(out)?;
        println!("Run record written to {}", out.display());
    }
    Ok(())
}

/// Defaults, then the TOML file, then command-line overrides.
fn build_config(args: &SolveArgs) -> Result<BendersConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            BendersConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => BendersConfig::default(),
    };

    if let Some(max_iter) = args.max_iter {
        config = config.with_max_iter(max_iter);
    }
    if let Some(seconds) = args.max_cpu_time {
        config = config.with_max_cpu_time(seconds);
    }
    if let Some(conv_tol) = args.conv_tol {
        config = config.with_conv_tol(conv_tol);
    }
    if let Some(gamma) = args.stab_param {
        config = config.with_stab_param(gamma);
    }
    if args.stab_dynamic {
        config = config.with_stab_dynamic(true);
    }
    if args.integer_investment {
        config = config.with_integer_investment(true);
    }
    if args.automatic_slack_penalty {
        config = config.with_automatic_slack_penalty(true);
    }
    if args.distributed {
        config = config.with_distributed(true);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }

    config.validate()?;
    Ok(config)
}
