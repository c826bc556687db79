//! Declarative data plans that pre-populate a scope.

use super::Scope;
use crate::core::StateId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;
use tracing::warn;

/// Where a plan is being applied.
#[derive(Clone, Copy, Debug)]
pub struct PopulateContext<'a> {
    /// State that owns the plan
    pub owner: StateId,
    pub owner_name: &'a str,
    /// State that relative references in the plan resolve against
    pub prefetch_root: StateId,
}

/// Descriptor that fills a scope with named slots.
pub trait DataPlan {
    fn is_empty(&self) -> bool;

    /// Write the plan's slots into `scope`.
    ///
    /// With `overwrite == false`, slots already present locally in `scope`
    /// keep their value.
    fn populate(&self, scope: &Scope, overwrite: bool, ctx: &PopulateContext<'_>);
}

/// Value type a plan slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    Any,
    Bool,
    Int,
    Float,
    String,
    Array,
    IntArray,
    FloatArray,
    StringArray,
    Object,
}

impl VarType {
    /// True if `value` is acceptable for this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::IntArray => Self::array_of(value, |v| v.is_i64() || v.is_u64()),
            Self::FloatArray => Self::array_of(value, Value::is_number),
            Self::StringArray => Self::array_of(value, Value::is_string),
            Self::Object => value.is_object(),
        }
    }

    /// Default value for a slot of this type.
    pub fn zero_value(self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::String => Value::String(String::new()),
            Self::Array | Self::IntArray | Self::FloatArray | Self::StringArray => {
                Value::Array(Vec::new())
            }
            Self::Object => Value::Object(serde_json::Map::new()),
        }
    }

    fn array_of(value: &Value, element: impl Fn(&Value) -> bool) -> bool {
        value
            .as_array()
            .is_some_and(|items| items.iter().all(element))
    }
}

/// One named slot of a [`ScopePlan`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarSpec {
    pub var_type: VarType,
    pub default: Value,
    /// Free-form authoring hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl VarSpec {
    pub fn new(var_type: VarType, default: impl Into<Value>) -> Self {
        Self {
            var_type,
            default: default.into(),
            hint: None,
        }
    }

    /// Slot initialized with the type's zero value.
    pub fn typed(var_type: VarType) -> Self {
        Self::new(var_type, var_type.zero_value())
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Problems found when validating a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanViolation {
    #[error("Plan slot at position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("Plan slot '{name}' expects {expected:?} but its default is {found}")]
    TypeMismatch {
        name: String,
        expected: VarType,
        found: Value,
    },
}

/// Outcome of checking plan slots.
pub type PlanCheck = Validation<(), NonEmptyVec<PlanViolation>>;

/// Ordered list of named, typed slots.
///
/// # Example
///
/// ```rust
/// use mindset_hsm::scope::{Scope, ScopePlan, VarSpec, VarType};
///
/// let plan = ScopePlan::new()
///     .with_var("hp", VarSpec::new(VarType::Int, 100))
///     .with_var("target", VarSpec::typed(VarType::String));
///
/// assert!(plan.validate().is_success());
///
/// let scope = Scope::new();
/// scope.set("hp", 30);
/// plan.populate_scope(&scope, false);
///
/// assert_eq!(scope.get("hp"), Some(30.into()));
/// assert_eq!(scope.get("target"), Some("".into()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopePlan {
    vars: Vec<(String, VarSpec)>,
}

impl ScopePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot, replacing any slot with the same name in place.
    pub fn add_var(&mut self, name: impl Into<String>, spec: VarSpec) {
        let name = name.into();
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.vars.push((name, spec)),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, spec: VarSpec) -> Self {
        self.add_var(name, spec);
        self
    }

    pub fn remove_var(&mut self, name: &str) -> Option<VarSpec> {
        let index = self.vars.iter().position(|(n, _)| n == name)?;
        Some(self.vars.remove(index).1)
    }

    pub fn get_var(&self, name: &str) -> Option<&VarSpec> {
        self.vars.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Check every slot, accumulating all problems.
    pub fn validate(&self) -> PlanCheck {
        let checks: Vec<PlanCheck> = self
            .vars
            .iter()
            .enumerate()
            .flat_map(|(index, (name, spec))| {
                let name_check: PlanCheck = if name.is_empty() {
                    Validation::fail(PlanViolation::EmptyName { index })
                } else {
                    Validation::success(())
                };
                let type_check: PlanCheck = if spec.var_type.accepts(&spec.default) {
                    Validation::success(())
                } else {
                    Validation::fail(PlanViolation::TypeMismatch {
                        name: name.clone(),
                        expected: spec.var_type,
                        found: spec.default.clone(),
                    })
                };
                [name_check, type_check]
            })
            .collect();

        Validation::all_vec(checks).map(|_| ())
    }

    /// Populate without owner information.
    pub fn populate_scope(&self, scope: &Scope, overwrite: bool) {
        for (name, spec) in &self.vars {
            if name.is_empty() || (!overwrite && scope.has_local(name)) {
                continue;
            }
            let value = if spec.var_type.accepts(&spec.default) {
                spec.default.clone()
            } else {
                warn!(
                    "Plan slot '{}' default does not match {:?}, using zero value",
                    name, spec.var_type
                );
                spec.var_type.zero_value()
            };
            scope.set(name.clone(), value);
        }
    }
}

impl DataPlan for ScopePlan {
    fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn populate(&self, scope: &Scope, overwrite: bool, _ctx: &PopulateContext<'_>) {
        self.populate_scope(scope, overwrite);
    }
}
