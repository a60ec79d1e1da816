use super::Filter;
use super::ast::{Expression, Operator, Restriction, Target};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Evaluates a [`Filter`] directly against JSON records.
///
/// Follows the semantics of the generated Lua: `null` counts as a missing
/// field, values are compared through their string form, ordering operators
/// compare numerically when the literal is a number.
pub struct RecordMatcher<'a> {
    filter: &'a Filter,
    regexes: HashMap<&'a str, Option<Regex>>,
}

impl<'a> RecordMatcher<'a> {
    pub fn new(filter: &'a Filter) -> Self {
        let mut regexes = HashMap::new();
        collect_regexes(filter.expression(), &mut regexes);
        RecordMatcher { filter, regexes }
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.eval(self.filter.expression(), record)
    }

    fn eval(&self, expr: &Expression, record: &Value) -> bool {
        match expr {
            Expression::Restriction(r) => self.eval_restriction(r, record),
            Expression::Negation(child) => !self.eval(child, record),
            Expression::Conjunction(children) => children.iter().all(|c| self.eval(c, record)),
            Expression::Disjunction(children) => children.iter().any(|c| self.eval(c, record)),
        }
    }

    fn eval_restriction(&self, r: &Restriction, record: &Value) -> bool {
        let value = lookup(record, &r.lhs);
        match r.operator {
            Operator::Eq => value.is_some_and(|v| lua_string(v) == r.rhs),
            Operator::Ne => !value.is_some_and(|v| lua_string(v) == r.rhs),
            Operator::Has if r.rhs == "*" => value.is_some(),
            Operator::Has => {
                let needle = r.rhs.to_lowercase();
                value.is_some_and(|v| lua_string(v).to_lowercase().contains(&needle))
            }
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                let ordering = match r.numeric_rhs() {
                    Some(n) => value.and_then(to_number).and_then(|v| v.partial_cmp(&n)),
                    None => value.map(|v| lua_string(v).as_str().cmp(r.rhs.as_str())),
                };
                ordering.is_some_and(|o| ordering_holds(r.operator, o))
            }
            Operator::Matches => self.regex_matches(r, value),
            Operator::NotMatches => !self.regex_matches(r, value),
        }
    }

    fn regex_matches(&self, r: &Restriction, value: Option<&Value>) -> bool {
        let Some(Some(regex)) = self.regexes.get(r.rhs.as_str()) else {
            return false;
        };
        value.is_some_and(|v| regex.is_match(&lua_string(v)))
    }
}

impl Filter {
    /// Check a single record; use [`RecordMatcher`] when checking many
    pub fn matches(&self, record: &Value) -> bool {
        RecordMatcher::new(self).matches(record)
    }
}

fn collect_regexes<'a>(expr: &'a Expression, out: &mut HashMap<&'a str, Option<Regex>>) {
    match expr {
        Expression::Restriction(r) if r.operator.is_regex() => {
            out.entry(r.rhs.as_str()).or_insert_with(|| match Regex::new(&r.rhs) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    log::warn!("invalid regex '{}' for field {}: {}", r.rhs, r.lhs, e);
                    None
                }
            });
        }
        Expression::Restriction(_) => {}
        Expression::Negation(child) => collect_regexes(child, out),
        Expression::Conjunction(children) | Expression::Disjunction(children) => {
            for child in children {
                collect_regexes(child, out);
            }
        }
    }
}

fn lookup<'v>(record: &'v Value, target: &Target) -> Option<&'v Value> {
    target
        .segments()
        .iter()
        .try_fold(record, |value, key| value.as_object()?.get(key))
        .filter(|value| !value.is_null())
}

fn lua_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ordering_holds(op: Operator, ordering: Ordering) -> bool {
    match op {
        Operator::Lt => ordering == Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Ge => ordering != Ordering::Less,
        _ => false,
    }
}
