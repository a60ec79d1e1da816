use fluent_filter::filter::ast::{Expression, Operator};
use fluent_filter::filter::parser::{Parsed, parse};
use fluent_filter::filter::{Filter, FilterError, FilterParseError, Member, matches_any};
use serde_json::json;

#[test]
fn test_member_accepts_bare_field() {
    let member = Member::new("jsonPayload.message").expect("bare field");

    assert_eq!(member.target().segments(), ["jsonPayload", "message"]);
    assert_eq!(member.to_string(), "jsonPayload.message");
    assert_eq!(member.record_accessor(), "$record['jsonPayload']['message']");
}

#[test]
fn test_member_accepts_quoted_segments() {
    let member = Member::new(r#"labels."compute.googleapis.com/resource_name""#).unwrap();
    assert_eq!(
        member.target().segments(),
        ["labels", "compute.googleapis.com/resource_name"]
    );
    assert_eq!(member.lua_accessor().matches("ipairs").count(), 1);
}

#[test]
fn test_member_rejects_comparisons_and_logic() {
    for text in [
        "severity = ERROR",
        "a:*",
        "a =~ x",
        "NOT a = 1",
        "a = 1 OR b = 2",
    ] {
        assert!(
            matches!(Member::new(text), Err(FilterError::NotAField(_))),
            "{text} is not a field"
        );
    }
    assert!(matches!(
        Member::new("a AND b"),
        Err(FilterError::Parse(FilterParseError::BareField(_)))
    ));
}

#[test]
fn test_filter_rejects_bare_field() {
    let err = Filter::new("jsonPayload.message").unwrap_err();
    assert!(matches!(err, FilterError::NotAnExpression(_)));
    assert!(err.to_string().contains("jsonPayload.message"));
}

#[test]
fn test_parse_errors_are_wrapped_verbatim() {
    let inner = parse("a = ").unwrap_err();
    assert_eq!(Filter::new("a = ").unwrap_err(), FilterError::Parse(inner.clone()));
    assert_eq!(Member::new("a = ").unwrap_err(), FilterError::Parse(inner));
}

#[test]
fn test_classification_over_parsed_values() {
    let field = parse("a.b").unwrap();
    let expr = parse("a.b = 1").unwrap();

    assert!(Member::from_parsed(field.clone()).is_ok());
    assert!(Filter::from_parsed(field).is_err());
    assert!(Filter::from_parsed(expr.clone()).is_ok());
    assert!(Member::from_parsed(expr).is_err());
}

#[test]
fn test_filter_from_str_and_display() {
    let f: Filter = r#"severity=ERROR message:"disk full""#.parse().unwrap();
    assert_eq!(f.to_string(), r#"severity = "ERROR" AND message : "disk full""#);
    assert_eq!(Filter::new(&f.to_string()).unwrap(), f);
}

#[test]
fn test_matches_any_builds_disjunction_in_order() {
    let filters = vec![
        Filter::new("a = 1").unwrap(),
        Filter::new("b = 2 AND c = 3").unwrap(),
        Filter::new("NOT d:*").unwrap(),
    ];
    let any = matches_any(&filters);

    match any.expression() {
        Expression::Disjunction(children) => {
            assert_eq!(children.len(), 3);
            for (child, original) in children.iter().zip(&filters) {
                assert_eq!(child, original.expression());
            }
        }
        other => panic!("expected disjunction, got {other:?}"),
    }
    assert_eq!(
        Filter::new("(a = 1) OR (b = 2 AND c = 3) OR (NOT d:*)").unwrap(),
        any
    );
}

#[test]
fn test_matches_any_semantics() {
    let filters = vec![
        Filter::new("a = 1").unwrap(),
        Filter::new("b = 2").unwrap(),
        Filter::new(r#"c =~ "^x""#).unwrap(),
    ];
    let any = matches_any(&filters);

    let records = [
        json!({"a": 1, "d": 1}),
        json!({"b": 2, "d": 1}),
        json!({"c": "xyz", "d": 1}),
        json!({"a": 1, "b": 2, "c": "x"}),
        json!({"a": 2, "b": 3, "c": "yx"}),
        json!({}),
    ];
    for record in &records {
        let expected = filters.iter().any(|f| f.matches(record));
        assert_eq!(any.matches(record), expected, "record {record}");
    }
    assert!(!any.matches(&json!({})));
}

#[test]
fn test_matches_any_of_nothing_never_matches() {
    let none = matches_any(&[]);
    assert_eq!(none.expression(), &Expression::Disjunction(vec![]));
    assert!(!none.matches(&json!({"a": 1})));
    assert_eq!(none.expression().fluent_config("t", "k").1, "false");

    // No filter text denotes an always-false filter.
    assert_eq!(none.to_string(), "()");
    assert!(none.to_string().parse::<Filter>().is_err());
}

#[test]
fn test_parsed_display_names_category() {
    assert_eq!(parse("a").unwrap().to_string(), "field a");
    let Parsed::Expression(Expression::Restriction(r)) = parse("a >= 3").unwrap() else {
        panic!("expected restriction");
    };
    assert_eq!(r.operator, Operator::Ge);
}
