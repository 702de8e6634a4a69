//! Response validation
//!
//! [`SchemaValidator`] enforces the per-stage output contracts in [`schema`].
//! The policy is chosen once per deployment:
//! - **strict:** any violation rejects the result (stage-fatal)
//! - **coerce:** correctable values are fixed in place and logged; only
//!   absent or wrongly-typed fields are still rejected
//!
//! The envelopes produced by the recovery parser (parse diagnostics and the
//! missing-response envelope) are data, not violations, and pass through
//! either policy unchanged. Any other mapping is checked against the schema,
//! including model output that happens to carry an `error` field.

pub mod schema;

pub use schema::{schema_for, FieldKind, FieldRule, StageSchema};

use crate::parser::is_recovery_envelope;
use crate::state::json_type_name;
use crate::types::{Mapping, ResponseValidator, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How schema violations are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Reject on any violation
    #[default]
    Strict,
    /// Correct what can be corrected, reject the rest
    Coerce,
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Strict => write!(f, "strict"),
            ValidationPolicy::Coerce => write!(f, "coerce"),
        }
    }
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ValidationPolicy::Strict),
            "coerce" => Ok(ValidationPolicy::Coerce),
            other => Err(format!("unknown validation policy '{}'", other)),
        }
    }
}

/// Schema-enforcing validator
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    policy: ValidationPolicy,
}

impl SchemaValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }
}

impl ResponseValidator for SchemaValidator {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn validate(&self, value: Mapping, stage_name: &str) -> Result<Mapping, ValidationError> {
        if is_recovery_envelope(&value) {
            debug!(stage = stage_name, "Recovery envelope passes validation unchanged");
            return Ok(value);
        }

        let schema = schema_for(stage_name)
            .ok_or_else(|| ValidationError::UnknownStage(stage_name.to_string()))?;

        let mut value = value;
        let mut violations = Vec::new();
        for rule in schema.fields {
            let outcome = match self.policy {
                ValidationPolicy::Strict => check_field(&value, rule),
                ValidationPolicy::Coerce => coerce_field(&mut value, rule, stage_name),
            };
            if let Err(violation) = outcome {
                violations.push(violation);
            }
        }

        if violations.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError::SchemaViolation {
                stage: stage_name.to_string(),
                violations,
            })
        }
    }
}

fn check_field(value: &Mapping, rule: &FieldRule) -> Result<(), String> {
    let name = rule.name;
    let field = value
        .get(name)
        .ok_or_else(|| format!("missing field '{}'", name))?;

    match rule.kind {
        FieldKind::Score { min, max } => match field.as_i64() {
            Some(n) if (min..=max).contains(&n) => Ok(()),
            Some(n) => Err(format!("'{}' = {} outside {}-{}", name, n, min, max)),
            None => Err(format!("'{}' must be an integer, found {}", name, describe(field))),
        },
        FieldKind::Choice { options, .. } => match field.as_str() {
            Some(s) if options.contains(&s) => Ok(()),
            Some(s) => Err(format!(
                "'{}' = '{}' not one of {}",
                name,
                s,
                options.join(", ")
            )),
            None => Err(format!("'{}' must be a string, found {}", name, describe(field))),
        },
        FieldKind::StringList { min, max } => {
            let items = field.as_array().ok_or_else(|| {
                format!("'{}' must be a list, found {}", name, describe(field))
            })?;
            if items.iter().any(|item| !item.is_string()) {
                return Err(format!("'{}' must contain only strings", name));
            }
            check_list_len(name, items.len(), min, max)
        }
        FieldKind::Text { min_len } => check_text(name, field, min_len),
    }
}

fn coerce_field(value: &mut Mapping, rule: &FieldRule, stage: &str) -> Result<(), String> {
    let name = rule.name;
    let field = value
        .get_mut(name)
        .ok_or_else(|| format!("missing field '{}'", name))?;
    let found = describe(field);

    match rule.kind {
        FieldKind::Score { min, max } => {
            let number = match field {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("'{}' must be a number, found {}", name, found))?;
            if !number.is_finite() {
                return Err(format!("'{}' must be a finite number, found {}", name, field));
            }

            let fixed = (number.round() as i64).clamp(min, max);
            if field.as_i64() != Some(fixed) {
                warn!(stage, field = name, from = %field, to = fixed, "Coerced score");
                *field = Value::from(fixed);
            }
            Ok(())
        }
        FieldKind::Choice { options, fallback } => {
            let label = field
                .as_str()
                .ok_or_else(|| format!("'{}' must be a string, found {}", name, found))?;
            if options.contains(&label) {
                return Ok(());
            }
            let fixed = options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(label.trim()))
                .copied()
                .unwrap_or(fallback);
            warn!(stage, field = name, from = label, to = fixed, "Coerced label");
            *field = Value::from(fixed);
            Ok(())
        }
        FieldKind::StringList { min, max } => {
            let items = field
                .as_array_mut()
                .ok_or_else(|| format!("'{}' must be a list, found {}", name, found))?;
            for item in items.iter_mut() {
                if !item.is_string() {
                    let text = item.to_string();
                    warn!(stage, field = name, item = %text, "Coerced list item to text");
                    *item = Value::String(text);
                }
            }
            if let Some(max) = max {
                if items.len() > max {
                    warn!(stage, field = name, from = items.len(), to = max, "Truncated list");
                    items.truncate(max);
                }
            }
            check_list_len(name, items.len(), min, None)
        }
        FieldKind::Text { min_len } => check_text(name, field, min_len),
    }
}

fn check_list_len(name: &str, len: usize, min: usize, max: Option<usize>) -> Result<(), String> {
    if len < min {
        return Err(format!("'{}' needs at least {} item(s), found {}", name, min, len));
    }
    match max {
        Some(max) if len > max => Err(format!(
            "'{}' allows at most {} items, found {}",
            name, max, len
        )),
        _ => Ok(()),
    }
}

fn check_text(name: &str, field: &Value, min_len: usize) -> Result<(), String> {
    match field.as_str() {
        Some(s) if s.chars().count() >= min_len => Ok(()),
        Some(_) => Err(format!("'{}' must be at least {} characters", name, min_len)),
        None => Err(format!("'{}' must be a string, found {}", name, describe(field))),
    }
}

fn describe(value: &Value) -> &'static str {
    json_type_name(value)
}
