//! Filter expression compilation
//!
//! Filters select log records by comparing fields, combined with boolean
//! operators. They compile into pipeline stages plus Lua script text that the
//! pipeline engine runs.
//!
//! # Syntax
//!
//! ```text
//! severity = "ERROR"                   Field equals a value
//! jsonPayload.code != 200              Nested field differs from a value
//! message:timeout                      Case-insensitive substring
//! message:*                            Field is present
//! latency >= 2.5                       Numeric comparison (also <, <=, >)
//! message =~ "^fail"                   Regex match (!~ for non-match)
//! a = 1 AND (b = 2 OR NOT c:*)         Boolean composition
//! a = 1 -b = 2                         Juxtaposition is AND, `-` is NOT
//! labels."compute.googleapis.com/x":*  Quoted path segments
//! ```
//!
//! `OR` binds tighter than juxtaposition, which binds tighter than `AND`.
//!
//! # Compilation
//!
//! [`all_components`] compiles filters entirely into stages: `modify` stages
//! set marker fields for each comparison and combine them, inside one
//! nest/grep/lift envelope. [`all_fluent_config`] produces one boolean Lua
//! local per named filter; there only regex comparisons need a `modify`
//! stage, everything else is plain Lua.

pub mod ast;
pub mod emit;
pub mod error;
pub mod lua;
pub mod matcher;
pub mod parser;

use crate::fluentbit::Stage;
use ast::{Expression, Target};
use parser::Parsed;
use std::fmt;
use std::str::FromStr;

pub use emit::{MATCH_PREFIX, all_components, all_fluent_config, tag_match_key};
pub use error::{FilterError, FilterParseError};
pub use lua::lua_quote;
pub use matcher::RecordMatcher;

/// A field reference, such as `jsonPayload.message`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    target: Target,
}

impl Member {
    /// Parse a bare field reference
    pub fn new(text: &str) -> Result<Self, FilterError> {
        Self::from_parsed(parser::parse(text)?)
    }

    pub fn from_parsed(parsed: Parsed) -> Result<Self, FilterError> {
        match parsed {
            Parsed::Field(target) => Ok(Member { target }),
            other => Err(FilterError::NotAField(other.to_string())),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Lua expression reading this field from `record`
    pub fn lua_accessor(&self) -> String {
        self.target.lua_accessor()
    }

    /// Record accessor for this field while nested inside the envelope
    pub fn record_accessor(&self) -> String {
        self.target.record_accessor()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

/// A compiled-on-demand boolean filter over log records
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    expr: Expression,
}

impl Filter {
    /// Parse a full filter expression
    pub fn new(text: &str) -> Result<Self, FilterError> {
        Self::from_parsed(parser::parse(text)?)
    }

    pub fn from_parsed(parsed: Parsed) -> Result<Self, FilterError> {
        match parsed {
            Parsed::Expression(expr) => Ok(Filter { expr }),
            other => Err(FilterError::NotAnExpression(other.to_string())),
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    /// Stages keeping (or, with `exclude`, dropping) records matching this filter
    pub fn components(&self, tag: &str, exclude: bool) -> Vec<Stage> {
        all_components(tag, std::slice::from_ref(self), exclude)
    }

    /// Stages to place inside the envelope and the Lua expression for this filter
    pub(crate) fn inner_fluent_config(&self, tag: &str, key: &str) -> (Vec<Stage>, String) {
        self.expr.fluent_config(tag, key)
    }

    /// Stages to place inside the envelope that set `key` on matching records
    pub(crate) fn inner_components(&self, tag: &str, key: &str, scope: &str) -> Vec<Stage> {
        self.expr.components(tag, key, scope)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::new(s)
    }
}

/// Renders filter text that parses back to the same filter, except for the
/// empty filter built by `matches_any(&[])`, which renders as `()`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// A single filter matching when any of `filters` matches
pub fn matches_any(filters: &[Filter]) -> Filter {
    Filter {
        expr: Expression::Disjunction(filters.iter().map(|f| f.expr.clone()).collect()),
    }
}
