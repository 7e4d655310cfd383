//! Boolean condition tree evaluator (spec §3 `Condition`, §4.3).
//!
//! Regex dialect: the `regex` crate's default syntax (documented here per
//! spec §9 open question (c); the original source left the dialect
//! implementation-defined).

use crate::errors::CompileError;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

/// `matches: { pattern, value }` — `pattern` is compiled once at decode
/// time; a compile failure is fatal to the whole decode (spec §4.3).
#[derive(Debug, Clone)]
pub struct Matches {
    pub pattern: String,
    pub value: String,
    compiled: Regex,
}

impl PartialEq for Matches {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.value == other.value
    }
}

impl Matches {
    pub fn new(pattern: &str, value: &str) -> Result<Self, CompileError> {
        let trimmed = pattern
            .strip_prefix('/')
            .and_then(|p| p.strip_suffix('/'))
            .unwrap_or(pattern);
        let compiled = Regex::new(trimmed).map_err(|source| CompileError::RegexCompile {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Matches {
            pattern: pattern.to_string(),
            value: value.to_string(),
            compiled,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct RawSubCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    and: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    or: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    equal: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not: Option<Box<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    matches: Option<RawMatches>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawMatches {
    pattern: String,
    value: String,
}

impl RawSubCondition {
    fn field_count(&self) -> usize {
        [
            !self.and.is_empty(),
            !self.or.is_empty(),
            !self.equal.is_empty(),
            self.not.is_some(),
            self.matches.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }

    fn is_zero(&self) -> bool {
        self.field_count() == 0
    }
}

/// A condition: either a `SubCondition` with exactly one non-empty field,
/// or an arbitrary scalar `Literal` (spec §3 invariants).
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Literal(serde_yaml::Value),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Equal(Vec<Condition>),
    Not(Box<Condition>),
    Matches(Matches),
}

impl Condition {
    /// Evaluate the condition tree (spec §4.3). `None` is treated as `true`
    /// the way a missing `when`/`unless` clause is.
    pub fn evaluate(this: Option<&Condition>) -> Result<bool, CompileError> {
        match this {
            None => Ok(true),
            Some(cond) => cond.evaluate_some(),
        }
    }

    fn evaluate_some(&self) -> Result<bool, CompileError> {
        match self {
            Condition::And(children) => {
                for child in children {
                    if !child.evaluate_some()? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(children) => {
                for child in children {
                    if child.evaluate_some()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => Ok(!inner.evaluate_some()?),
            Condition::Equal(children) => {
                if children.len() <= 1 {
                    return Ok(true);
                }
                Ok(children.windows(2).all(|w| w[0] == w[1]))
            }
            Condition::Matches(m) => Ok(m.compiled.is_match(&m.value)),
            Condition::Literal(v) => Ok(is_truthy(v)),
        }
    }

    /// Negate a condition — used to normalize a source-level `unless: C`
    /// into `when: not(C)` (spec §3 `Workflow`).
    pub fn negate(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

fn is_truthy(value: &serde_yaml::Value) -> bool {
    match value {
        serde_yaml::Value::Null => false,
        serde_yaml::Value::Bool(b) => *b,
        serde_yaml::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_yaml::Value::String(s) => !s.is_empty(),
        serde_yaml::Value::Sequence(s) => !s.is_empty(),
        serde_yaml::Value::Mapping(m) => !m.is_empty(),
        serde_yaml::Value::Tagged(t) => is_truthy(&t.value),
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Condition::from_yaml(&value).map_err(D::Error::custom)
    }
}

impl Condition {
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, CompileError> {
        if let Some(mapping) = value.as_mapping() {
            let known = ["and", "or", "equal", "not", "matches"];
            if mapping.keys().any(|k| {
                k.as_str()
                    .map(|s| known.contains(&s))
                    .unwrap_or(false)
            }) {
                let raw: RawSubCondition = serde_yaml::from_value(value.clone())
                    .map_err(|_| CompileError::ConditionShape)?;
                if raw.field_count() > 1 {
                    return Err(CompileError::ConditionShape);
                }
                if !raw.and.is_empty() {
                    return Ok(Condition::And(raw.and));
                }
                if !raw.or.is_empty() {
                    return Ok(Condition::Or(raw.or));
                }
                if !raw.equal.is_empty() {
                    return Ok(Condition::Equal(raw.equal));
                }
                if let Some(not) = raw.not {
                    return Ok(Condition::Not(not));
                }
                if let Some(m) = raw.matches {
                    return Ok(Condition::Matches(Matches::new(&m.pattern, &m.value)?));
                }
                debug_assert!(raw.is_zero());
            }
        }
        Ok(Condition::Literal(value.clone()))
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Condition::Literal(v) => v.clone(),
            Condition::And(c) => raw(RawSubCondition {
                and: c.clone(),
                ..Default::default()
            }),
            Condition::Or(c) => raw(RawSubCondition {
                or: c.clone(),
                ..Default::default()
            }),
            Condition::Equal(c) => raw(RawSubCondition {
                equal: c.clone(),
                ..Default::default()
            }),
            Condition::Not(c) => raw(RawSubCondition {
                not: Some(c.clone()),
                ..Default::default()
            }),
            Condition::Matches(m) => raw(RawSubCondition {
                matches: Some(RawMatches {
                    pattern: m.pattern.clone(),
                    value: m.value.clone(),
                }),
                ..Default::default()
            }),
        }
    }
}

fn raw(sub: RawSubCondition) -> serde_yaml::Value {
    serde_yaml::to_value(sub).unwrap_or(serde_yaml::Value::Null)
}

impl Serialize for Condition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_yaml().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(b: bool) -> Condition {
        Condition::Literal(serde_yaml::Value::Bool(b))
    }

    #[test]
    fn none_is_true() {
        assert!(Condition::evaluate(None).unwrap());
    }

    #[test]
    fn and_empty_is_true() {
        assert!(Condition::And(vec![]).evaluate_some().unwrap());
    }

    #[test]
    fn or_empty_is_false() {
        assert!(!Condition::Or(vec![]).evaluate_some().unwrap());
    }

    #[test]
    fn equal_single_is_true() {
        assert!(Condition::Equal(vec![lit(true)]).evaluate_some().unwrap());
    }

    #[test]
    fn not_not_is_identity() {
        let c = lit(true);
        let double_negated = c.clone().negate().negate();
        assert_eq!(
            double_negated.evaluate_some().unwrap(),
            c.evaluate_some().unwrap()
        );
    }

    #[test]
    fn and_short_circuits_on_false() {
        let cond = Condition::And(vec![lit(true), lit(false)]);
        assert!(!cond.evaluate_some().unwrap());
    }

    #[test]
    fn matches_compiles_and_evaluates() {
        let cond = Condition::Matches(Matches::new("^feature/.*", "feature/foo").unwrap());
        assert!(cond.evaluate_some().unwrap());
    }

    #[test]
    fn matches_accepts_slash_wrapped_pattern() {
        let cond = Condition::Matches(Matches::new("/^main$/", "main").unwrap());
        assert!(cond.evaluate_some().unwrap());
    }

    #[test]
    fn invalid_pattern_is_fatal() {
        assert!(Matches::new("(unclosed", "x").is_err());
    }

    #[test]
    fn multiple_subcondition_fields_is_shape_error() {
        let yaml = serde_yaml::from_str::<serde_yaml::Value>("and: [true]\nor: [false]").unwrap();
        let err = Condition::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, CompileError::ConditionShape));
    }
}
