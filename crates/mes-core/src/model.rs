//! Linear optimization models with an optional diagonal quadratic term
//!
//! A [`LinearModel`] stores named variables, named linear constraints and an
//! objective of the form
//!
//! ```text
//! minimize    Σ_j c_j·x_j + Σ_j w_j·x_j² + c₀
//! subject to  Σ_j a_ij·x_j  {≤, ≥, =}  b_i      for every constraint i
//!             l_j ≤ x_j ≤ u_j                     for every variable j
//!             x_j ∈ ℤ                             for integer variables
//! ```
//!
//! The quadratic term is restricted to non-negative diagonal weights, which is
//! all the level-set projection needs and keeps every model convex.
//!
//! Models also carry *named expressions*: linear expressions that are not part
//! of the objective but that callers evaluate on a solution (e.g. the fixed
//! investment cost of a planning problem).

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Index of a variable inside a [`LinearModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(usize);

impl VarId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Index of a constraint inside a [`LinearModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(usize);

impl ConstraintId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A decision variable. Missing bounds mean the variable is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub integer: bool,
}

impl Variable {
    /// Create a free continuous variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: None,
            upper: None,
            integer: false,
        }
    }

    /// Create a binary (0/1 integer) variable.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name).with_bounds(0.0, 1.0).as_integer()
    }

    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn with_bounds(self, lower: f64, upper: f64) -> Self {
        self.with_lower(lower).with_upper(upper)
    }

    pub fn as_integer(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Lower bound, `-∞` when unbounded below.
    pub fn lower_bound(&self) -> f64 {
        self.lower.unwrap_or(f64::NEG_INFINITY)
    }

    /// Upper bound, `+∞` when unbounded above.
    pub fn upper_bound(&self) -> f64 {
        self.upper.unwrap_or(f64::INFINITY)
    }
}

/// Affine expression `Σ coeff·x + constant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    #[serde(default)]
    pub terms: Vec<(VarId, f64)>,
    #[serde(default)]
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constant(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    pub fn with_term(mut self, var: VarId, coeff: f64) -> Self {
        self.add_term(var, coeff);
        self
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn add_term(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    pub fn add_constant(&mut self, constant: f64) {
        self.constant += constant;
    }

    /// Append `scale · other` to this expression.
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(var, coeff)| (var, scale * coeff)));
        self.constant += scale * other.constant;
    }

    /// Coefficients with repeated variables merged.
    pub fn coefficients(&self) -> BTreeMap<VarId, f64> {
        let mut merged = BTreeMap::new();
        for &(var, coeff) in &self.terms {
            *merged.entry(var).or_insert(0.0) += coeff;
        }
        merged
    }

    /// Evaluate at a primal point indexed by [`VarId`].
    ///
    /// Variables outside `values` evaluate to NaN so that a mismatched
    /// solution vector cannot silently produce a plausible number.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().fold(self.constant, |acc, &(var, coeff)| {
            acc + coeff * values.get(var.index()).copied().unwrap_or(f64::NAN)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::new().with_term(var, 1.0)
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

/// Direction of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    /// `expr ≤ rhs`
    Le,
    /// `expr ≥ rhs`
    Ge,
    /// `expr = rhs`
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Ge => write!(f, ">="),
            Sense::Eq => write!(f, "=="),
        }
    }
}

/// Named linear constraint `expr {≤, ≥, =} rhs`.
///
/// A constant inside `expr` is moved to the right-hand side when the model is
/// handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn new(name: impl Into<String>, expr: LinearExpr, sense: Sense, rhs: f64) -> Self {
        Self {
            name: name.into(),
            expr,
            sense,
            rhs,
        }
    }

    pub fn le(name: impl Into<String>, expr: LinearExpr, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Le, rhs)
    }

    pub fn ge(name: impl Into<String>, expr: LinearExpr, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Ge, rhs)
    }

    pub fn eq(name: impl Into<String>, expr: LinearExpr, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Eq, rhs)
    }

    /// Amount by which `values` violates this constraint (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let activity = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => (activity - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - activity).max(0.0),
            Sense::Eq => (activity - self.rhs).abs(),
        }
    }
}

/// Plain serialized form of a [`LinearModel`].
///
/// Deserializing a [`LinearModel`] goes through this type and re-validates
/// every variable and constraint, so a model loaded from disk satisfies the
/// same invariants as one built in code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelData {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constraints: Vec<LinearConstraint>,
    #[serde(default)]
    pub objective: LinearExpr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quadratic: Vec<(VarId, f64)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expressions: BTreeMap<String, LinearExpr>,
}

/// Minimization model over named variables and constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "ModelData", into = "ModelData")]
pub struct LinearModel {
    data: ModelData,
    variable_index: HashMap<String, VarId>,
    constraint_index: HashMap<String, ConstraintId>,
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable; names must be unique and bounds consistent.
    pub fn add_variable(&mut self, variable: Variable) -> ModelResult<VarId> {
        if variable.name.is_empty() {
            return Err(ModelError::InvalidModel("variable name is empty".into()));
        }
        if self.variable_index.contains_key(&variable.name) {
            return Err(ModelError::InvalidModel(format!(
                "duplicate variable name '{}'",
                variable.name
            )));
        }
        let (lower, upper) = (variable.lower_bound(), variable.upper_bound());
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(ModelError::InvalidModel(format!(
                "variable '{}' has inconsistent bounds [{}, {}]",
                variable.name, lower, upper
            )));
        }

        let id = VarId::new(self.data.variables.len());
        self.variable_index.insert(variable.name.clone(), id);
        self.data.variables.push(variable);
        Ok(id)
    }

    /// Add a constraint; names must be unique and every term must reference
    /// an existing variable.
    pub fn add_constraint(&mut self, constraint: LinearConstraint) -> ModelResult<ConstraintId> {
        if constraint.name.is_empty() {
            return Err(ModelError::InvalidModel("constraint name is empty".into()));
        }
        if self.constraint_index.contains_key(&constraint.name) {
            return Err(ModelError::InvalidModel(format!(
                "duplicate constraint name '{}'",
                constraint.name
            )));
        }
        if !constraint.rhs.is_finite() {
            return Err(ModelError::InvalidModel(format!(
                "constraint '{}' has non-finite right-hand side",
                constraint.name
            )));
        }
        self.check_expr(&constraint.expr, &constraint.name)?;

        let id = ConstraintId::new(self.data.constraints.len());
        self.constraint_index.insert(constraint.name.clone(), id);
        self.data.constraints.push(constraint);
        Ok(id)
    }

    fn check_expr(&self, expr: &LinearExpr, context: &str) -> ModelResult<()> {
        for &(var, coeff) in &expr.terms {
            if var.index() >= self.data.variables.len() {
                return Err(ModelError::InvalidModel(format!(
                    "'{}' references {} but the model has {} variables",
                    context,
                    var,
                    self.data.variables.len()
                )));
            }
            if !coeff.is_finite() {
                return Err(ModelError::InvalidModel(format!(
                    "'{}' has a non-finite coefficient on {}",
                    context, var
                )));
            }
        }
        if !expr.constant.is_finite() {
            return Err(ModelError::InvalidModel(format!(
                "'{}' has a non-finite constant",
                context
            )));
        }
        Ok(())
    }

    pub fn num_variables(&self) -> usize {
        self.data.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.data.constraints.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.data.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.data.constraints
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.data.variables.get(id.index())
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&LinearConstraint> {
        self.data.constraints.get(id.index())
    }

    pub fn variable_by_name(&self, name: &str) -> Option<VarId> {
        self.variable_index.get(name).copied()
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintId> {
        self.constraint_index.get(name).copied()
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.data.objective
    }

    pub fn set_objective(&mut self, objective: LinearExpr) -> ModelResult<()> {
        self.check_expr(&objective, "objective")?;
        self.data.objective = objective;
        Ok(())
    }

    /// Diagonal quadratic weights `w_j` of the objective term `Σ w_j·x_j²`.
    pub fn quadratic(&self) -> &[(VarId, f64)] {
        &self.data.quadratic
    }

    /// Replace the quadratic objective term. Weights must be non-negative.
    pub fn set_quadratic_objective(&mut self, weights: Vec<(VarId, f64)>) -> ModelResult<()> {
        for &(var, weight) in &weights {
            if var.index() >= self.data.variables.len() {
                return Err(ModelError::UnknownVariable(var.to_string()));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ModelError::InvalidModel(format!(
                    "quadratic weight {} on {} would make the objective non-convex",
                    weight, var
                )));
            }
        }
        self.data.quadratic = weights;
        Ok(())
    }

    /// Register (or replace) a named expression.
    pub fn add_expression(&mut self, name: impl Into<String>, expr: LinearExpr) -> ModelResult<()> {
        let name = name.into();
        self.check_expr(&expr, &name)?;
        self.data.expressions.insert(name, expr);
        Ok(())
    }

    pub fn expression(&self, name: &str) -> Option<&LinearExpr> {
        self.data.expressions.get(name)
    }

    pub fn set_rhs(&mut self, id: ConstraintId, rhs: f64) -> ModelResult<()> {
        if !rhs.is_finite() {
            return Err(ModelError::InvalidModel(format!(
                "non-finite right-hand side {} for {}",
                rhs, id
            )));
        }
        let constraint = self
            .data
            .constraints
            .get_mut(id.index())
            .ok_or_else(|| ModelError::UnknownConstraint(id.to_string()))?;
        constraint.rhs = rhs;
        Ok(())
    }

    /// Drop integrality from every variable; returns how many were integer.
    pub fn relax_integrality(&mut self) -> usize {
        let mut relaxed = 0;
        for variable in self.data.variables.iter_mut().filter(|v| v.integer) {
            variable.integer = false;
            relaxed += 1;
        }
        relaxed
    }

    pub fn has_integer_variables(&self) -> bool {
        self.data.variables.iter().any(|v| v.integer)
    }

    /// Make every constraint elastic with non-negative slack columns charged
    /// `penalty` per unit in the objective.
    ///
    /// `≤` rows get one slack subtracted, `≥` rows one slack added, and `=`
    /// rows a pair of slacks. Constraint indices are unchanged, so callers
    /// holding [`ConstraintId`]s can keep using them. Returns the new slacks.
    pub fn relax_with_penalty(&mut self, penalty: f64) -> ModelResult<Vec<VarId>> {
        if !(penalty.is_finite() && penalty > 0.0) {
            return Err(ModelError::InvalidModel(format!(
                "slack penalty must be positive and finite, got {}",
                penalty
            )));
        }

        let mut slacks = Vec::with_capacity(self.data.constraints.len());
        for idx in 0..self.data.constraints.len() {
            let (name, sense) = {
                let constraint = &self.data.constraints[idx];
                (constraint.name.clone(), constraint.sense)
            };
            let columns: &[(&str, f64)] = match sense {
                Sense::Le => &[("slack", -1.0)],
                Sense::Ge => &[("slack", 1.0)],
                Sense::Eq => &[("slack_pos", 1.0), ("slack_neg", -1.0)],
            };
            for &(prefix, sign) in columns {
                let slack =
                    self.add_variable(Variable::new(format!("{prefix}[{name}]")).with_lower(0.0))?;
                self.data.constraints[idx].expr.add_term(slack, sign);
                self.data.objective.add_term(slack, penalty);
                slacks.push(slack);
            }
        }
        Ok(slacks)
    }

    /// Objective value (linear, quadratic and constant parts) at `values`.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        let quadratic: f64 = self
            .data
            .quadratic
            .iter()
            .map(|&(var, weight)| {
                let x = values.get(var.index()).copied().unwrap_or(f64::NAN);
                weight * x * x
            })
            .sum();
        self.data.objective.evaluate(values) + quadratic
    }

    /// Largest constraint or bound violation at `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let rows = self
            .data
            .constraints
            .iter()
            .map(|c| c.violation(values))
            .fold(0.0_f64, f64::max);
        let bounds = self
            .data
            .variables
            .iter()
            .zip(values)
            .map(|(v, &x)| (v.lower_bound() - x).max(x - v.upper_bound()).max(0.0))
            .fold(0.0_f64, f64::max);
        rows.max(bounds)
    }
}

impl TryFrom<ModelData> for LinearModel {
    type Error = ModelError;

    fn try_from(data: ModelData) -> ModelResult<Self> {
        let mut model = LinearModel::new();
        for variable in data.variables {
            model.add_variable(variable)?;
        }
        for constraint in data.constraints {
            model.add_constraint(constraint)?;
        }
        model.set_objective(data.objective)?;
        model.set_quadratic_objective(data.quadratic)?;
        for (name, expr) in data.expressions {
            model.add_expression(name, expr)?;
        }
        Ok(model)
    }
}

impl From<LinearModel> for ModelData {
    fn from(model: LinearModel) -> Self {
        model.data
    }
}
