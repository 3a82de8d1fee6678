//! End-to-end Benders runs on small instances with known optima

mod common;

use std::collections::BTreeMap;

use common::*;
use mes_algo::benders::{
    generate_cuts, BendersConfig, BendersSolver, DecomposedProblem, SubproblemEvaluator,
    TerminationReason,
};
use mes_algo::{benders, BendersError};
use mes_core::{ClarabelBackend, SolverSettings};

fn assert_bound_properties(lb: &[f64], ub: &[f64]) {
    for window in lb.windows(2) {
        assert!(window[1] >= window[0], "lower bound decreased: {:?}", lb);
    }
    let mut best = f64::INFINITY;
    for (k, &u) in ub.iter().enumerate() {
        best = best.min(u);
        assert!(best >= lb[k] - 1e-6, "LB {} above best UB {}", lb[k], best);
    }
}

#[test]
fn test_two_period_multi_cut_converges() {
    let result = BendersSolver::with_defaults()
        .solve(two_period(2))
        .unwrap();

    assert_eq!(result.termination, TerminationReason::Converged);
    assert!(result.converged);
    assert!(result.iterations <= 3);
    assert!((result.upper_bound() - TWO_PERIOD_OPTIMUM).abs() < 1e-3);
    assert!((result.lower_bound() - TWO_PERIOD_OPTIMUM).abs() < 1e-3);
    assert!((result.planning_sol.values[CAPACITY] - TWO_PERIOD_CAPACITY).abs() < 1e-3);
    assert!(result.gap <= 1e-3);
    assert_bound_properties(&result.lb_hist, &result.ub_hist);

    assert_eq!(result.lb_hist.len(), result.iterations);
    assert_eq!(result.ub_hist.len(), result.iterations);
    assert_eq!(result.cpu_time.len(), result.iterations);
    assert_eq!(result.sol_hist.len(), result.iterations);
}

#[test]
fn test_optimality_cuts_valid_at_true_optimum() {
    let result = BendersSolver::with_defaults()
        .solve(two_period(2))
        .unwrap();
    let model = &result.planning_problem.model;
    // x = 4, θ₀ = 0, θ₁ = 0.5·(6 − 4)
    let optimum = [4.0, 0.0, 1.0];

    let cuts: Vec<_> = model
        .constraints()
        .iter()
        .filter(|c| c.name.starts_with("opt_cut["))
        .collect();
    assert!(!cuts.is_empty());
    for cut in cuts {
        assert!(cut.violation(&optimum) < 1e-5, "{} cuts off the optimum", cut.name);
    }
    assert_eq!(result.planning_problem.num_cuts(), model.num_constraints());
}

#[test]
fn test_single_theta_aggregates_cuts() {
    let result = BendersSolver::with_defaults()
        .solve(two_period(1))
        .unwrap();

    assert!(result.converged);
    assert!((result.upper_bound() - TWO_PERIOD_OPTIMUM).abs() < 1e-3);
    let names: Vec<&str> = result
        .planning_problem
        .model
        .constraints()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert!(names.contains(&"opt_cut[1,all]"));
    assert!(names.iter().all(|name| name.ends_with(",all]")));
}

#[test]
fn test_level_set_stabilization_converges() {
    let config = BendersConfig::default()
        .with_stab_param(0.5)
        .with_max_iter(50);
    let result = BendersSolver::new(config).solve(two_period(2)).unwrap();

    assert!(result.converged);
    assert!((result.upper_bound() - TWO_PERIOD_OPTIMUM).abs() < 0.01);
    assert!((result.planning_sol.values[CAPACITY] - TWO_PERIOD_CAPACITY).abs() < 0.01);
    assert_bound_properties(&result.lb_hist, &result.ub_hist);
    assert!(result.gamma_hist.iter().all(|&g| g == 0.5));
}

#[test]
fn test_dynamic_gamma_stays_within_configured_value() {
    let config = BendersConfig::default()
        .with_stab_param(0.5)
        .with_stab_dynamic(true)
        .with_max_iter(50);
    let result = BendersSolver::new(config).solve(two_period(2)).unwrap();

    assert!(result.converged);
    assert!(result.gamma_hist.iter().all(|&g| (0.0..=0.5).contains(&g)));
    assert_bound_properties(&result.lb_hist, &result.ub_hist);
}

#[test]
fn test_zero_gamma_matches_plain_benders() {
    let plain = BendersSolver::with_defaults()
        .solve(two_period(2))
        .unwrap();
    let zero = BendersSolver::new(
        BendersConfig::default()
            .with_stab_param(0.0)
            .with_stab_dynamic(true),
    )
    .solve(two_period(2))
    .unwrap();

    assert_eq!(plain.iterations, zero.iterations);
    for (a, b) in plain.sol_hist.iter().zip(&zero.sol_hist) {
        assert_eq!(a.values, b.values);
    }
}

#[test]
fn test_feasibility_cut_excludes_point() {
    let problem = capped_problem(None);
    let planning = problem.planning.clone();
    let mut evaluator = SubproblemEvaluator::new(problem.subproblems[0].clone(), false).unwrap();
    let backend = ClarabelBackend::new();
    let settings = SolverSettings::default();

    let at = |x: f64| BTreeMap::from([(CAPACITY.to_string(), x)]);
    let results = BTreeMap::from([(0, evaluator.evaluate(&backend, &at(5.0), &settings).unwrap())]);
    let cuts = generate_cuts(&planning, &results, &at(5.0), 1).unwrap();

    assert_eq!(cuts.len(), 1);
    assert_eq!(cuts[0].name, "feas_cut[1,0]");
    assert!(cuts[0].violation(&at(5.0), 0.0).unwrap() > 1e-3);
    assert!(cuts[0].violation(&at(3.0), 0.0).unwrap() < 1e-5);
}

#[test]
fn test_infeasible_subproblem_becomes_cut() {
    let result = BendersSolver::with_defaults()
        .solve(capped_problem(None))
        .unwrap();

    assert!(result.converged);
    assert!(result.ub_hist[0].is_infinite());
    assert!((result.planning_sol.values[CAPACITY] - 3.0).abs() < 1e-4);
    assert!((result.upper_bound() + 3.0).abs() < 1e-4);

    let model = &result.planning_problem.model;
    let feasibility: Vec<_> = model
        .constraints()
        .iter()
        .filter(|c| c.name.starts_with("feas_cut["))
        .collect();
    assert_eq!(feasibility.len(), 1);
    assert!(feasibility[0].violation(&[5.0, 0.0]) > 1e-3);
    assert!(feasibility[0].violation(&[3.0, 0.0]) < 1e-5);
}

#[test]
fn test_slack_penalty_never_cuts_feasibility() {
    let mut evaluator = SubproblemEvaluator::new(capped(0, Some(100.0)), false).unwrap();
    let at_five = BTreeMap::from([(CAPACITY.to_string(), 5.0)]);
    let result = evaluator
        .evaluate(&ClarabelBackend::new(), &at_five, &SolverSettings::default())
        .unwrap();
    // the unpenalized optimum at capacity 3 would cost 3
    assert!(result.is_feasible());
    assert!(result.objective > 3.0);
    assert!((result.objective - 100.0 * result.used_slack - 3.0).abs() < 1e-3);

    let run = BendersSolver::with_defaults()
        .solve(capped_problem(Some(100.0)))
        .unwrap();
    assert!(run.converged);
    assert!(run.ub_hist.iter().all(|ub| ub.is_finite()));
    assert!((run.ub_hist[0] - 193.0).abs() < 1e-2);
    assert_eq!(
        run.planning_problem
            .model
            .constraints()
            .iter()
            .filter(|c| c.name.starts_with("feas_cut["))
            .count(),
        0
    );
    assert!((run.planning_sol.values[CAPACITY] - 3.0).abs() < 1e-3);
}

#[test]
fn test_cheap_slack_penalty_keeps_cuts_valid() {
    let result = BendersSolver::with_defaults()
        .solve(cheap_slack_problem())
        .unwrap();

    assert!(result.converged);
    assert!((result.upper_bound() - CHEAP_SLACK_OPTIMUM).abs() < 1e-3);
    assert!(result.lower_bound() <= CHEAP_SLACK_OPTIMUM + 1e-4);
    assert!((result.planning_sol.values[CAPACITY] - 3.0).abs() < 1e-3);
    assert_bound_properties(&result.lb_hist, &result.ub_hist);

    // x = 3, θ = 1 unit of demand covered by slack
    let optimum = [3.0, 1.0];
    for cut in result.planning_problem.model.constraints() {
        assert!(cut.violation(&optimum) < 1e-5, "{} cuts off the optimum", cut.name);
    }
}

#[test]
fn test_automatic_slack_penalty() {
    let config = BendersConfig::default().with_automatic_slack_penalty(true);
    let result = BendersSolver::new(config)
        .solve(capped_problem(None))
        .unwrap();
    assert!(result.ub_hist.iter().all(|ub| ub.is_finite()));
    assert!((result.planning_sol.values[CAPACITY] - 3.0).abs() < 1e-3);
}

#[test]
fn test_iteration_limit_is_not_an_error() {
    let config = BendersConfig::default().with_max_iter(1);
    let result = BendersSolver::new(config).solve(two_period(2)).unwrap();

    assert_eq!(result.termination, TerminationReason::MaxIterations);
    assert!(!result.converged);
    assert_eq!(result.iterations, 1);
    // nothing built yet: all demand unserved
    assert!((result.upper_bound() - 15.0).abs() < 1e-4);
    assert!(result.planning_sol.values[CAPACITY].abs() < 1e-4);
}

#[test]
fn test_time_limit_checked_between_iterations() {
    let config = BendersConfig::default()
        .with_stab_param(0.5)
        .with_max_cpu_time(1e-9);
    let result = BendersSolver::new(config).solve(two_period(2)).unwrap();
    assert_eq!(result.termination, TerminationReason::MaxCpuTime);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_distributed_matches_sequential() {
    let sequential = BendersSolver::with_defaults()
        .solve(two_period(2))
        .unwrap();
    let distributed = BendersSolver::with_defaults()
        .with_distributed(2)
        .solve(two_period(2))
        .unwrap();

    assert_eq!(sequential.iterations, distributed.iterations);
    for (a, b) in sequential.ub_hist.iter().zip(&distributed.ub_hist) {
        assert!((a - b).abs() < 1e-8);
    }
}

#[test]
fn test_integer_investment_keeps_integrality() {
    let problem = |integer: bool| {
        DecomposedProblem::new(
            planning(2, integer),
            linking(),
            vec![dispatch(0, 4.5, 3.0), dispatch(1, 6.0, 0.5)],
        )
    };

    let integer = BendersSolver::new(BendersConfig::default().with_integer_investment(true))
        .solve(problem(true))
        .unwrap();
    assert!(integer.converged);
    assert_eq!(integer.planning_sol.values[CAPACITY], 5.0);
    assert!((integer.upper_bound() - 5.5).abs() < 1e-3);

    let relaxed = BendersSolver::with_defaults().solve(problem(true)).unwrap();
    assert!(relaxed.converged);
    assert!((relaxed.planning_sol.values[CAPACITY] - 4.5).abs() < 1e-3);
    assert!((relaxed.upper_bound() - 5.25).abs() < 1e-3);
}

#[test]
fn test_integer_investment_with_stabilization() {
    let problem = DecomposedProblem::new(
        planning(2, true),
        linking(),
        vec![dispatch(0, 4.5, 3.0), dispatch(1, 6.0, 0.5)],
    );
    let config = BendersConfig::default()
        .with_integer_investment(true)
        .with_stab_param(0.5)
        .with_stab_dynamic(true);
    let result = BendersSolver::new(config).solve(problem).unwrap();

    assert!(result.converged);
    assert!(result.gamma_hist.iter().any(|&g| g > 0.0));
    for solution in &result.sol_hist {
        let capacity = solution.values[CAPACITY];
        assert!(
            (capacity - capacity.round()).abs() < 1e-6,
            "fractional capacity {}",
            capacity
        );
    }
    assert_eq!(result.planning_sol.values[CAPACITY], 5.0);
    assert!((result.upper_bound() - 5.5).abs() < 1e-3);
}

#[test]
fn test_free_function_applies_linking_subsets() {
    let DecomposedProblem {
        planning,
        linking_variables,
        subproblems,
    } = two_period(2);
    let subsets = BTreeMap::from([(0, vec!["unknown".to_string()])]);
    let err = benders(
        planning,
        linking_variables,
        subproblems,
        &subsets,
        BendersConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BendersError::InvalidProblem(_)));

    let DecomposedProblem {
        planning,
        linking_variables,
        subproblems,
    } = two_period(2);
    let result = benders(
        planning,
        linking_variables,
        subproblems,
        &BTreeMap::new(),
        BendersConfig::default(),
    )
    .unwrap();
    assert!(result.converged);
}

#[test]
fn test_problem_round_trips_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_period.json");
    std::fs::write(&path, serde_json::to_string_pretty(&two_period(2)).unwrap()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let problem: DecomposedProblem = serde_json::from_str(&text).unwrap();
    let result = BendersSolver::with_defaults().solve(problem).unwrap();
    assert!((result.upper_bound() - TWO_PERIOD_OPTIMUM).abs() < 1e-3);

    let saved = serde_json::to_string(&result).unwrap();
    assert!(saved.contains("opt_cut[1,0]"));
}
