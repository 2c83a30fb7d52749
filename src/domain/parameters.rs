//! Parameter space model: tunable parameter definitions, their discretized
//! domains, and assignment validation.
//!
//! The space owns the deterministic grid enumeration used by grid search and
//! the clamping rules every strategy applies before handing an assignment to
//! the evaluator.

use crate::domain::errors::OptimizeError;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Relative tolerance for "is this value on the step lattice" checks.
const STEP_TOLERANCE: f64 = 1e-9;

/// A concrete value for one tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
    Categorical(String),
}

impl ParameterValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Integer(v) => Some(*v as f64),
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Categorical(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
            ParameterValue::Categorical(v) => write!(f, "{}", v),
        }
    }
}

/// The domain of one tunable parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterDomain {
    Integer { min: i64, max: i64, step: i64, default: i64 },
    Float { min: f64, max: f64, step: f64, default: f64 },
    Categorical { allowed: Vec<String>, default: String },
}

/// One tunable parameter: a unique name plus its domain.
///
/// Immutable once a search starts; malformed definitions are rejected up
/// front by [`ParameterSpace::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(flatten)]
    pub domain: ParameterDomain,
}

impl ParameterDefinition {
    pub fn integer(name: &str, min: i64, max: i64, step: i64, default: i64) -> Self {
        Self {
            name: name.to_string(),
            domain: ParameterDomain::Integer { min, max, step, default },
        }
    }

    pub fn float(name: &str, min: f64, max: f64, step: f64, default: f64) -> Self {
        Self {
            name: name.to_string(),
            domain: ParameterDomain::Float { min, max, step, default },
        }
    }

    pub fn categorical(name: &str, allowed: &[&str], default: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: ParameterDomain::Categorical {
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                default: default.to_string(),
            },
        }
    }

    /// Checks the definition itself for structural problems.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let fail = |reason: String| OptimizeError::InvalidDefinition {
            parameter: self.name.clone(),
            reason,
        };

        match &self.domain {
            ParameterDomain::Integer { min, max, step, default } => {
                if min > max {
                    return Err(fail(format!("min {} > max {}", min, max)));
                }
                if *step <= 0 {
                    return Err(fail(format!("non-positive step {}", step)));
                }
                if default < min || default > max {
                    return Err(fail(format!(
                        "default {} outside [{}, {}]",
                        default, min, max
                    )));
                }
                if (default - min) % step != 0 {
                    return Err(fail(format!(
                        "default {} not reachable from min {} with step {}",
                        default, min, step
                    )));
                }
            }
            ParameterDomain::Float { min, max, step, default } => {
                if !min.is_finite() || !max.is_finite() || !step.is_finite() {
                    return Err(fail("non-finite bound or step".to_string()));
                }
                if min > max {
                    return Err(fail(format!("min {} > max {}", min, max)));
                }
                if *step <= 0.0 {
                    return Err(fail(format!("non-positive step {}", step)));
                }
                if default < min || default > max {
                    return Err(fail(format!(
                        "default {} outside [{}, {}]",
                        default, min, max
                    )));
                }
                if !on_lattice(*default, *min, *step) {
                    return Err(fail(format!(
                        "default {} not a multiple of step {} from min {}",
                        default, step, min
                    )));
                }
            }
            ParameterDomain::Categorical { allowed, default } => {
                if allowed.is_empty() {
                    return Err(fail("empty categorical domain".to_string()));
                }
                if !allowed.contains(default) {
                    return Err(fail(format!("default '{}' not in allowed values", default)));
                }
            }
        }
        Ok(())
    }

    /// The default value for this parameter.
    pub fn default_value(&self) -> ParameterValue {
        match &self.domain {
            ParameterDomain::Integer { default, .. } => ParameterValue::Integer(*default),
            ParameterDomain::Float { default, .. } => ParameterValue::Float(*default),
            ParameterDomain::Categorical { default, .. } => {
                ParameterValue::Categorical(default.clone())
            }
        }
    }

    /// All values of the discretized domain, in ascending (or declared) order.
    pub fn values(&self) -> Vec<ParameterValue> {
        match &self.domain {
            ParameterDomain::Integer { min, max, step, .. } => (0..)
                .map(|i| min + i * step)
                .take_while(|v| v <= max)
                .map(ParameterValue::Integer)
                .collect(),
            ParameterDomain::Float { min, max, step, .. } => {
                let count = lattice_count(*min, *max, *step);
                (0..count)
                    .map(|i| ParameterValue::Float((min + i as f64 * step).min(*max)))
                    .collect()
            }
            ParameterDomain::Categorical { allowed, .. } => allowed
                .iter()
                .map(|v| ParameterValue::Categorical(v.clone()))
                .collect(),
        }
    }

    /// Number of values in the discretized domain.
    pub fn value_count(&self) -> usize {
        match &self.domain {
            ParameterDomain::Integer { min, max, step, .. } => {
                ((max - min) / step + 1) as usize
            }
            ParameterDomain::Float { min, max, step, .. } => lattice_count(*min, *max, *step),
            ParameterDomain::Categorical { allowed, .. } => allowed.len(),
        }
    }

    /// Is the given value inside this parameter's domain (and on the step
    /// lattice for numeric kinds)?
    pub fn accepts(&self, value: &ParameterValue) -> Result<(), String> {
        match (&self.domain, value) {
            (ParameterDomain::Integer { min, max, step, .. }, ParameterValue::Integer(v)) => {
                if v < min || v > max {
                    Err(format!("{} outside [{}, {}]", v, min, max))
                } else if (v - min) % step != 0 {
                    Err(format!("{} not a multiple of step {} from min {}", v, step, min))
                } else {
                    Ok(())
                }
            }
            (ParameterDomain::Float { min, max, step, .. }, ParameterValue::Float(v)) => {
                if !v.is_finite() {
                    Err("non-finite value".to_string())
                } else if v < min || *v > max + step * STEP_TOLERANCE {
                    Err(format!("{} outside [{}, {}]", v, min, max))
                } else if !on_lattice(*v, *min, *step) {
                    Err(format!("{} not a multiple of step {} from min {}", v, step, min))
                } else {
                    Ok(())
                }
            }
            (ParameterDomain::Categorical { allowed, .. }, ParameterValue::Categorical(v)) => {
                if allowed.contains(v) {
                    Ok(())
                } else {
                    Err(format!("'{}' not in allowed values {:?}", v, allowed))
                }
            }
            _ => Err("value kind does not match parameter kind".to_string()),
        }
    }

    /// Snaps an arbitrary value into the domain: numeric values are clamped
    /// to range and rounded onto the step lattice, unknown categoricals fall
    /// back to the default.
    pub fn clamp(&self, value: &ParameterValue) -> ParameterValue {
        match &self.domain {
            ParameterDomain::Integer { min, max, step, .. } => {
                let raw = match value {
                    ParameterValue::Integer(v) => *v as f64,
                    ParameterValue::Float(v) => *v,
                    ParameterValue::Categorical(_) => return self.default_value(),
                };
                let steps = ((raw - *min as f64) / *step as f64).round().max(0.0) as i64;
                let snapped = (min + steps * step).clamp(*min, *max);
                // Keep the snapped value on the lattice after the clamp.
                let snapped = min + ((snapped - min) / step) * step;
                ParameterValue::Integer(snapped)
            }
            ParameterDomain::Float { min, max, step, .. } => {
                let raw = match value {
                    ParameterValue::Integer(v) => *v as f64,
                    ParameterValue::Float(v) => *v,
                    ParameterValue::Categorical(_) => return self.default_value(),
                };
                let raw = raw.clamp(*min, *max);
                let steps = ((raw - min) / step).round().max(0.0);
                ParameterValue::Float((min + steps * step).min(*max))
            }
            ParameterDomain::Categorical { allowed, default, .. } => match value {
                ParameterValue::Categorical(v) if allowed.contains(v) => value.clone(),
                _ => ParameterValue::Categorical(default.clone()),
            },
        }
    }

    /// Draws one value uniformly from the discretized domain.
    pub fn sample(&self, rng: &mut StdRng) -> ParameterValue {
        let values = self.values();
        let idx = rng.random_range(0..values.len());
        values[idx].clone()
    }
}

fn on_lattice(value: f64, min: f64, step: f64) -> bool {
    let offset = (value - min) / step;
    if offset < -STEP_TOLERANCE {
        return false;
    }
    let tol = STEP_TOLERANCE * (1.0 + offset.abs());
    (offset - offset.round()).abs() <= tol
}

fn lattice_count(min: f64, max: f64, step: f64) -> usize {
    (((max - min) / step) + STEP_TOLERANCE).floor() as usize + 1
}

/// A fully-defined mapping from parameter name to concrete value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterAssignment(pub BTreeMap<String, ParameterValue>);

impl ParameterAssignment {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, name: &str, value: ParameterValue) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    /// Compact stable key, useful for duplicate detection and log lines.
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ParameterAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

/// The ordered set of tunable parameters for one optimization run.
///
/// Definition order is the deterministic enumeration order: repeated grid
/// runs over an unchanged space produce an identical candidate sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterDefinition>,
}

impl ParameterSpace {
    pub fn new(parameters: Vec<ParameterDefinition>) -> Self {
        Self { parameters }
    }

    /// Validates every definition and name uniqueness.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        if self.parameters.is_empty() {
            return Err(OptimizeError::InvalidDefinition {
                parameter: "<space>".to_string(),
                reason: "parameter space is empty".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for def in &self.parameters {
            def.validate()?;
            if !seen.insert(def.name.clone()) {
                return Err(OptimizeError::InvalidDefinition {
                    parameter: def.name.clone(),
                    reason: "duplicate parameter name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates that an assignment is fully defined over this space and
    /// every value lies inside its parameter's domain.
    pub fn validate_assignment(&self, assignment: &ParameterAssignment) -> Result<(), OptimizeError> {
        for def in &self.parameters {
            let value = assignment.get(&def.name).ok_or_else(|| OptimizeError::OutOfDomain {
                parameter: def.name.clone(),
                reason: "missing from assignment".to_string(),
            })?;
            def.accepts(value).map_err(|reason| OptimizeError::OutOfDomain {
                parameter: def.name.clone(),
                reason,
            })?;
        }
        if assignment.len() != self.parameters.len() {
            let known: std::collections::HashSet<_> =
                self.parameters.iter().map(|d| d.name.as_str()).collect();
            let extra = assignment
                .iter()
                .map(|(k, _)| k.as_str())
                .find(|k| !known.contains(k))
                .unwrap_or("<unknown>");
            return Err(OptimizeError::OutOfDomain {
                parameter: extra.to_string(),
                reason: "not defined in parameter space".to_string(),
            });
        }
        Ok(())
    }

    /// The assignment made of every parameter's default.
    pub fn defaults(&self) -> ParameterAssignment {
        let mut assignment = ParameterAssignment::new();
        for def in &self.parameters {
            assignment.set(&def.name, def.default_value());
        }
        assignment
    }

    /// Total number of points in the full cartesian grid.
    pub fn grid_size(&self) -> usize {
        self.parameters.iter().map(|d| d.value_count()).product()
    }

    /// Enumerates the full cartesian grid in deterministic order: parameter
    /// order as declared, values ascending, last parameter varying fastest.
    pub fn grid(&self) -> Vec<ParameterAssignment> {
        let per_param: Vec<Vec<ParameterValue>> =
            self.parameters.iter().map(|d| d.values()).collect();
        let total = per_param.iter().map(|v| v.len()).product();

        let mut grid = Vec::with_capacity(total);
        let mut indices = vec![0usize; per_param.len()];
        for _ in 0..total {
            let mut assignment = ParameterAssignment::new();
            for (def, (values, &idx)) in
                self.parameters.iter().zip(per_param.iter().zip(indices.iter()))
            {
                assignment.set(&def.name, values[idx].clone());
            }
            grid.push(assignment);

            for pos in (0..indices.len()).rev() {
                indices[pos] += 1;
                if indices[pos] < per_param[pos].len() {
                    break;
                }
                indices[pos] = 0;
            }
        }
        grid
    }

    /// Draws one uniform assignment from the discretized space.
    pub fn random_assignment(&self, rng: &mut StdRng) -> ParameterAssignment {
        let mut assignment = ParameterAssignment::new();
        for def in &self.parameters {
            assignment.set(&def.name, def.sample(rng));
        }
        assignment
    }

    /// Snaps every value of an assignment into its parameter's domain.
    pub fn clamp(&self, assignment: &ParameterAssignment) -> ParameterAssignment {
        let mut clamped = ParameterAssignment::new();
        for def in &self.parameters {
            let value = assignment
                .get(&def.name)
                .map(|v| def.clamp(v))
                .unwrap_or_else(|| def.default_value());
            clamped.set(&def.name, value);
        }
        clamped
    }

    pub fn definition(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|d| d.name == name)
    }
}
