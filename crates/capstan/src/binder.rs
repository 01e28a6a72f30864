//! Argument binding and validation against declared parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::TemplateParams;
use crate::types::{json_type_name, ParamDescriptor, ParamType};

/// An arguments object as received over the wire.
pub type Arguments = Map<String, Value>;

/// Why a single parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    TypeMismatch { expected: ParamType, found: String },
    NonFinite,
}

/// A validation failure for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub param: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "missing required parameter '{}'", self.param),
            ViolationKind::TypeMismatch { expected, found } => write!(
                f,
                "parameter '{}' expected {expected}, got {found}",
                self.param
            ),
            ViolationKind::NonFinite => {
                write!(f, "parameter '{}' must be a finite number", self.param)
            }
        }
    }
}

/// Every violation found in one arguments object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn by_position(params: &[ParamDescriptor]) -> Vec<&ParamDescriptor> {
    let mut ordered: Vec<&ParamDescriptor> = params.iter().collect();
    ordered.sort_by_key(|p| p.position);
    ordered
}

/// Map arguments to the positional vector a handler expects.
///
/// Absent arguments bind as `None`.
pub fn bind(params: &[ParamDescriptor], args: &Arguments) -> Vec<Option<Value>> {
    by_position(params)
        .into_iter()
        .map(|p| args.get(&p.name).cloned())
        .collect()
}

/// Check required parameters and declared types.
pub fn validate(params: &[ParamDescriptor], args: &Arguments) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for param in by_position(params) {
        let value = match args.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    errors.violations.push(Violation {
                        param: param.name.clone(),
                        kind: ViolationKind::Missing,
                    });
                }
                continue;
            }
            Some(value) => value,
        };

        if let Some(kind) = check_type(param.param_type, value) {
            errors.violations.push(Violation {
                param: param.name.clone(),
                kind,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_type(expected: ParamType, value: &Value) -> Option<ViolationKind> {
    let ok = match expected {
        ParamType::Any => true,
        ParamType::String => value.is_string(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
        ParamType::Number => {
            return match value.as_f64() {
                Some(n) if n.is_finite() => None,
                Some(_) => Some(ViolationKind::NonFinite),
                None => Some(ViolationKind::TypeMismatch {
                    expected,
                    found: json_type_name(value).to_string(),
                }),
            };
        }
    };
    if ok {
        None
    } else {
        Some(ViolationKind::TypeMismatch {
            expected,
            found: json_type_name(value).to_string(),
        })
    }
}

/// Convert template-extracted strings into JSON values.
///
/// Values bound to `number` or `boolean` parameters are parsed when possible;
/// anything unparseable stays a string so validation reports it.
pub fn coerce_template_params(params: &[ParamDescriptor], extracted: &TemplateParams) -> Arguments {
    extracted
        .iter()
        .map(|(name, raw)| {
            let declared = params
                .iter()
                .find(|p| &p.name == name)
                .map(|p| p.param_type);
            let value = match declared {
                Some(ParamType::Number) => raw
                    .parse::<i64>()
                    .map(Value::from)
                    .ok()
                    .or_else(|| {
                        raw.parse::<f64>()
                            .ok()
                            .filter(|n| n.is_finite())
                            .map(Value::from)
                    })
                    .unwrap_or_else(|| Value::String(raw.clone())),
                Some(ParamType::Boolean) => match raw.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::String(raw.clone()),
                },
                _ => Value::String(raw.clone()),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Merge template parameters with explicit arguments; template values win.
pub fn merge_arguments(template: &Arguments, explicit: &Arguments) -> Arguments {
    let mut merged = template.clone();
    for (key, value) in explicit {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Explicit arguments not already consumed by the template.
pub fn remaining_arguments(template: &Arguments, explicit: &Arguments) -> Arguments {
    explicit
        .iter()
        .filter(|(key, _)| !template.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
