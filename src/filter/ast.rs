//! Expression tree produced by the filter front end, and its compilation
//! into pipeline stages plus a Lua boolean expression.

use super::error::FilterParseError;
use super::lua::{self, lua_quote};
use crate::fluentbit::{NEST_UNDER, Stage};
use std::fmt;
use std::str::FromStr;

/// Dotted path to a (possibly nested) record field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(Vec<String>);

impl Target {
    pub fn new(segments: Vec<String>) -> Result<Self, FilterParseError> {
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(FilterParseError::EmptySegment(segments.join(".")));
        }
        Ok(Target(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Lua expression reading this field from `record`
    pub fn lua_accessor(&self) -> String {
        lua::field_accessor(&self.0)
    }

    /// Record accessor for this field while the record is nested under the envelope
    pub fn record_accessor(&self) -> String {
        let mut out = format!("${NEST_UNDER}");
        for segment in &self.0 {
            out.push_str("['");
            out.push_str(segment);
            out.push_str("']");
        }
        out
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if needs_quoting(segment) {
                f.write_str(&quote(segment))?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

/// Comparison operator of a [`Restriction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    /// `:`, case-insensitive substring; `:*` tests presence
    Has,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=~`
    Matches,
    /// `!~`
    NotMatches,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Has => ":",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Matches => "=~",
            Operator::NotMatches => "!~",
        }
    }

    /// Whether this operator needs a regex-capable stage instead of plain Lua
    pub fn is_regex(&self) -> bool {
        matches!(self, Operator::Matches | Operator::NotMatches)
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ":" => Ok(Operator::Has),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "=~" => Ok(Operator::Matches),
            "!~" => Ok(Operator::NotMatches),
            _ => Err(format!("unknown operator '{s}'")),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field comparison, e.g. `severity = "ERROR"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Restriction {
    pub lhs: Target,
    pub operator: Operator,
    pub rhs: String,
}

impl Restriction {
    pub fn new(lhs: Target, operator: Operator, rhs: impl Into<String>) -> Self {
        Restriction {
            lhs,
            operator,
            rhs: rhs.into(),
        }
    }

    /// Literal as a number, when it reads as one
    pub fn numeric_rhs(&self) -> Option<f64> {
        self.rhs.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    fn fluent_config(&self, tag: &str, key: &str) -> (Vec<Stage>, String) {
        let stages = if self.operator.is_regex() {
            vec![marker(tag, self.value_matches(&self.rhs), key)]
        } else {
            Vec::new()
        };
        (stages, self.lua_expression(key))
    }

    /// Stages setting `key` when this comparison holds.
    ///
    /// Negative operators first mark the positive comparison under
    /// `<scope>_0`, then set `key` when that marker is absent.
    fn components(&self, tag: &str, key: &str, scope: &str) -> Vec<Stage> {
        let condition = match self.operator {
            Operator::Eq | Operator::Ne => {
                self.value_matches(&format!("^{}$", regex::escape(&self.rhs)))
            }
            Operator::Has if self.rhs == "*" => {
                format!("Key_exists {}", self.lhs.record_accessor())
            }
            Operator::Has => self.value_matches(&format!("(?i){}", regex::escape(&self.rhs))),
            Operator::Matches | Operator::NotMatches => self.value_matches(&self.rhs),
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                return vec![self.script_stage(tag, key)];
            }
        };

        if matches!(self.operator, Operator::Ne | Operator::NotMatches) {
            let positive = format!("{scope}_0");
            vec![
                marker(tag, condition, &positive),
                marker(tag, format!("Key_does_not_exist {positive}"), key),
            ]
        } else {
            vec![marker(tag, condition, key)]
        }
    }

    fn value_matches(&self, regex: &str) -> String {
        format!(
            "Key_value_matches {} {}",
            self.lhs.record_accessor(),
            escape_config_regex(regex)
        )
    }

    /// Inline `lua` stage for ordering comparisons, which no regex can express
    fn script_stage(&self, tag: &str, key: &str) -> Stage {
        let code = format!(
            "function {key}(tag, timestamp, record) \
             if (function(record) return {} end)(record[{}] or {{}}) then \
             record[{}] = \"1\" return 2, timestamp, record end \
             return 0, timestamp, record end",
            self.lua_expression(key),
            lua_quote(NEST_UNDER),
            lua_quote(key)
        );
        Stage::filter("lua", tag)
            .with("call", key)
            .with("code", code)
    }

    fn lua_expression(&self, key: &str) -> String {
        let value = self.lhs.lua_accessor();
        match self.operator {
            Operator::Matches => lua::marker_is_set(key),
            Operator::NotMatches => lua::marker_is_unset(key),
            Operator::Eq => string_equals(&value, &self.rhs),
            Operator::Ne => format!("(not {})", string_equals(&value, &self.rhs)),
            Operator::Has if self.rhs == "*" => format!("({value} ~= nil)"),
            Operator::Has => format!(
                "(function(v) return v ~= nil and string.find(string.lower(tostring(v)), {}, 1, true) ~= nil end)({value})",
                lua_quote(&self.rhs.to_lowercase())
            ),
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                let op = self.operator.as_str();
                match self.numeric_rhs() {
                    Some(n) => format!(
                        "(function(v) v = tonumber(v) return v ~= nil and v {op} {n} end)({value})"
                    ),
                    None => format!(
                        "(function(v) return v ~= nil and tostring(v) {op} {} end)({value})",
                        lua_quote(&self.rhs)
                    ),
                }
            }
        }
    }
}

/// `modify` stage setting the marker `key` when `condition` holds
fn marker(tag: &str, condition: String, key: &str) -> Stage {
    Stage::filter("modify", tag)
        .with("Condition", condition)
        .with("Set", format!("{key} 1"))
}

fn string_equals(value: &str, rhs: &str) -> String {
    format!(
        "(function(v) return v ~= nil and tostring(v) == {} end)({value})",
        lua_quote(rhs)
    )
}

/// Whitespace separates option values in the pipeline configuration
fn escape_config_regex(regex: &str) -> String {
    let mut out = String::with_capacity(regex.len());
    for c in regex.chars() {
        match c {
            ' ' => out.push_str("\\x20"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.operator, quote(&self.rhs))
    }
}

/// Boolean filter expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Restriction(Restriction),
    Negation(Box<Expression>),
    Conjunction(Vec<Expression>),
    Disjunction(Vec<Expression>),
}

impl Expression {
    /// Compile into stages that must run inside the nest/lift envelope and a
    /// Lua expression yielding the boolean result.
    ///
    /// `key` names the marker field reserved for this node; children of
    /// conjunctions and disjunctions get `<key>_<index>`.
    pub fn fluent_config(&self, tag: &str, key: &str) -> (Vec<Stage>, String) {
        match self {
            Expression::Restriction(r) => r.fluent_config(tag, key),
            Expression::Negation(child) => {
                let (stages, expr) = child.fluent_config(tag, key);
                (stages, format!("(not {expr})"))
            }
            Expression::Conjunction(children) => compile_children(children, tag, key, "and", "true"),
            Expression::Disjunction(children) => compile_children(children, tag, key, "or", "false"),
        }
    }

    /// Compile into `modify` (and, for ordering comparisons, `lua`) stages
    /// that set the marker field `key` on records where the expression holds.
    ///
    /// Intermediate markers are named under `scope`, which must not be shared
    /// with any other expression compiled into the same envelope. Disjunction
    /// children set `key` directly; negations and conjunctions combine child
    /// markers with `Key_does_not_exist` conditions.
    pub fn components(&self, tag: &str, key: &str, scope: &str) -> Vec<Stage> {
        match self {
            Expression::Restriction(r) => r.components(tag, key, scope),
            Expression::Negation(child) => {
                let inner = format!("{scope}_0");
                let mut stages = child.components(tag, &inner, &inner);
                stages.push(marker(tag, format!("Key_does_not_exist {inner}"), key));
                stages
            }
            Expression::Disjunction(children) => children
                .iter()
                .enumerate()
                .flat_map(|(i, child)| child.components(tag, key, &format!("{scope}_{i}")))
                .collect(),
            Expression::Conjunction(children) => {
                let failed = format!("{scope}_n");
                let mut stages = Vec::new();
                for (i, child) in children.iter().enumerate() {
                    let child_key = format!("{scope}_{i}");
                    stages.extend(child.components(tag, &child_key, &child_key));
                    stages.push(marker(
                        tag,
                        format!("Key_does_not_exist {child_key}"),
                        &failed,
                    ));
                }
                stages.push(marker(tag, format!("Key_does_not_exist {failed}"), key));
                stages
            }
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expression::Conjunction(_) | Expression::Disjunction(_))
    }
}

fn compile_children(
    children: &[Expression],
    tag: &str,
    key: &str,
    op: &str,
    identity: &str,
) -> (Vec<Stage>, String) {
    let mut stages = Vec::new();
    let mut exprs = Vec::with_capacity(children.len());

    for (i, child) in children.iter().enumerate() {
        let (child_stages, child_expr) = child.fluent_config(tag, &format!("{key}_{i}"));
        stages.extend(child_stages);
        exprs.push(child_expr);
    }

    if exprs.is_empty() {
        return (stages, identity.to_string());
    }
    (stages, format!("({})", exprs.join(&format!(" {op} "))))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Restriction(r) => write!(f, "{r}"),
            Expression::Negation(child) if !matches!(**child, Expression::Restriction(_)) => {
                write!(f, "NOT ({child})")
            }
            Expression::Negation(child) => write!(f, "NOT {child}"),
            Expression::Conjunction(children) => write_joined(f, children, " AND "),
            Expression::Disjunction(children) => write_joined(f, children, " OR "),
        }
    }
}

/// An empty compound renders as `()`, which the front end rejects: the
/// grammar has no literal for `true` or `false`, so such expressions (for
/// example `matches_any(&[])`) cannot be written as filter text.
fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Expression], sep: &str) -> fmt::Result {
    if children.is_empty() {
        return f.write_str("()");
    }
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        if child.is_compound() {
            write!(f, "({child})")?;
        } else {
            write!(f, "{child}")?;
        }
    }
    Ok(())
}

const KEYWORDS: [&str; 3] = ["AND", "OR", "NOT"];

fn needs_quoting(segment: &str) -> bool {
    segment.is_empty()
        || segment.starts_with('-')
        || KEYWORDS.contains(&segment)
        || segment
            .chars()
            .any(|c| c.is_whitespace() || c == '.' || c == '\\' || super::parser::is_reserved(c))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
