//! Field validation rules.
//!
//! Rulesets are written in pipe syntax (`"required|string|max:255"`) or as a
//! list of rule strings. Validation is boolean at the contract level; the
//! per-field [`Violation`] list is available for callers that want detail.

use crate::error::{ModelError, ModelResult};
use crate::record::Fields;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A single validation constraint.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Field must be present and non-empty.
    Required,
    /// Null is an acceptable value; remaining rules are skipped for null.
    Nullable,
    String,
    Integer,
    Numeric,
    Boolean,
    /// Lower bound on the value's size (number, string length, array length).
    Min(f64),
    /// Upper bound on the value's size.
    Max(f64),
    /// Value must be one of the listed options.
    In(Vec<String>),
    /// String value must match the pattern.
    Regex(Regex),
}

impl Rule {
    /// Parses one rule such as `max:255` or `in:draft,published`.
    pub fn parse(spec: &str) -> ModelResult<Self> {
        let spec = spec.trim();
        let (name, arg) = match spec.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (spec, None),
        };
        let invalid = |reason: &str| ModelError::InvalidRule {
            rule: spec.to_string(),
            reason: reason.to_string(),
        };
        let bound = |arg: Option<&str>| -> ModelResult<f64> {
            arg.ok_or_else(|| invalid("missing bound"))?
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("bound is not a number"))
        };

        match name {
            "required" => Ok(Rule::Required),
            "nullable" => Ok(Rule::Nullable),
            "string" => Ok(Rule::String),
            "integer" => Ok(Rule::Integer),
            "numeric" => Ok(Rule::Numeric),
            "boolean" => Ok(Rule::Boolean),
            "min" => Ok(Rule::Min(bound(arg)?)),
            "max" => Ok(Rule::Max(bound(arg)?)),
            "in" => {
                let options: Vec<String> = arg
                    .ok_or_else(|| invalid("missing options"))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if options.is_empty() {
                    return Err(invalid("missing options"));
                }
                Ok(Rule::In(options))
            }
            "regex" => {
                let pattern = arg.ok_or_else(|| invalid("missing pattern"))?;
                Regex::new(pattern)
                    .map(Rule::Regex)
                    .map_err(|e| invalid(&e.to_string()))
            }
            _ => Err(invalid("unknown rule")),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::Nullable => f.write_str("nullable"),
            Rule::String => f.write_str("string"),
            Rule::Integer => f.write_str("integer"),
            Rule::Numeric => f.write_str("numeric"),
            Rule::Boolean => f.write_str("boolean"),
            Rule::Min(n) => write!(f, "min:{n}"),
            Rule::Max(n) => write!(f, "max:{n}"),
            Rule::In(options) => write!(f, "in:{}", options.join(",")),
            Rule::Regex(re) => write!(f, "regex:{}", re.as_str()),
        }
    }
}

/// A rule a field failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub rule: String,
}

/// Field name → constraints, owned by the model that declares it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, RuleSpec>", into = "BTreeMap<String, String>")]
pub struct Ruleset {
    fields: BTreeMap<String, Vec<Rule>>,
}

/// Config form of a field's rules: `"required|max:5"` or `["required", "max:5"]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleSpec {
    Pipe(String),
    List(Vec<String>),
}

impl TryFrom<BTreeMap<String, RuleSpec>> for Ruleset {
    type Error = ModelError;

    fn try_from(specs: BTreeMap<String, RuleSpec>) -> ModelResult<Self> {
        let mut ruleset = Ruleset::new();
        for (field, spec) in specs {
            ruleset = match spec {
                RuleSpec::Pipe(s) => ruleset.field(&field, &s)?,
                RuleSpec::List(list) => {
                    let rules = list.iter().map(|s| Rule::parse(s)).collect::<ModelResult<_>>()?;
                    ruleset.with_rules(&field, rules)
                }
            };
        }
        Ok(ruleset)
    }
}

impl From<Ruleset> for BTreeMap<String, String> {
    fn from(ruleset: Ruleset) -> Self {
        ruleset
            .fields
            .into_iter()
            .map(|(field, rules)| {
                let pipe = rules.iter().map(ToString::to_string).collect::<Vec<_>>().join("|");
                (field, pipe)
            })
            .collect()
    }
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rules for `field` from pipe syntax.
    pub fn field(self, field: &str, pipe: &str) -> ModelResult<Self> {
        let rules = pipe
            .split('|')
            .filter(|s| !s.trim().is_empty())
            .map(Rule::parse)
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(self.with_rules(field, rules))
    }

    pub fn with_rules(mut self, field: &str, rules: Vec<Rule>) -> Self {
        self.fields.entry(field.to_string()).or_default().extend(rules);
        self
    }

    pub fn rules_for(&self, field: &str) -> Option<&[Rule]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `data` satisfies every rule.
    pub fn passes(&self, data: &Fields) -> bool {
        self.fields
            .iter()
            .all(|(field, rules)| field_violations(field, rules, data.get(field)).is_empty())
    }

    /// Every failed rule, in field order.
    pub fn violations(&self, data: &Fields) -> Vec<Violation> {
        self.fields
            .iter()
            .flat_map(|(field, rules)| field_violations(field, rules, data.get(field)))
            .collect()
    }
}

fn field_violations(field: &str, rules: &[Rule], value: Option<&Value>) -> Vec<Violation> {
    let fail = |rule: &Rule| Violation {
        field: field.to_string(),
        rule: rule.to_string(),
    };
    let nullable = rules.iter().any(|r| matches!(r, Rule::Nullable));
    let numeric = rules.iter().any(|r| matches!(r, Rule::Numeric | Rule::Integer));

    let mut out = Vec::new();
    if let Some(rule) = rules.iter().find(|r| matches!(r, Rule::Required)) {
        if value.is_none_or(is_empty_value) {
            out.push(fail(rule));
            return out;
        }
    }

    let value = match value {
        None => return out,
        Some(Value::Null) if nullable => return out,
        Some(v) => v,
    };

    for rule in rules {
        let ok = match rule {
            Rule::Required | Rule::Nullable => true,
            Rule::String => value.is_string(),
            Rule::Integer => as_integer(value).is_some(),
            Rule::Numeric => as_number(value).is_some(),
            Rule::Boolean => is_boolean(value),
            Rule::Min(n) => size_of(value, numeric).is_some_and(|s| s >= *n),
            Rule::Max(n) => size_of(value, numeric).is_some_and(|s| s <= *n),
            Rule::In(options) => scalar_text(value).is_some_and(|t| options.iter().any(|o| *o == t)),
            Rule::Regex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
        };
        if !ok {
            out.push(fail(rule));
        }
    }
    out
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0 | 1)),
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

/// Size used by `min`/`max`: numeric value when the field is declared numeric,
/// otherwise string length in characters, array/object length, or the number.
fn size_of(value: &Value, numeric: bool) -> Option<f64> {
    if numeric {
        return as_number(value);
    }
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        Value::Bool(_) | Value::Null => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
