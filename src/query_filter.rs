//! The alert filter-query grammar (spec §6 SUPPLEMENT): prefix operators on
//! column values (`>`, `<`, `~`, `~!`, `!`), `tag` value negation via a `!`
//! prefix, and `attributes.<k>` indexing into the attributes map.
//!
//! The `q=` free-text parameter is explicitly out of scope (spec §6: "its
//! grammar is not part of this core").

use crate::model::alert::Alert;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone)]
pub struct FieldMatch {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

/// A parsed set of field predicates, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub matches: Vec<FieldMatch>,
    /// `tag` values, each optionally prefixed with `!` for negation.
    pub tags: Vec<(bool, String)>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `field=value` pairs per spec §6's prefix-operator grammar.
    /// `tag` is handled separately since it is set-valued with per-item
    /// negation rather than a single scalar operator.
    pub fn parse(params: &[(String, String)]) -> Self {
        let mut filter = QueryFilter::new();
        for (field, raw) in params {
            if field == "tag" {
                if let Some(stripped) = raw.strip_prefix('!') {
                    filter.tags.push((true, stripped.to_string()));
                } else {
                    filter.tags.push((false, raw.clone()));
                }
                continue;
            }
            let (operator, value) = parse_operator(raw);
            filter.matches.push(FieldMatch {
                field: field.clone(),
                operator,
                value,
            });
        }
        filter
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        self.matches.iter().all(|m| field_matches(alert, m)) && self.tags.iter().all(|(negate, tag)| {
            let present = alert.tags.contains(tag);
            if *negate { !present } else { present }
        })
    }
}

fn parse_operator(raw: &str) -> (Operator, String) {
    if let Some(rest) = raw.strip_prefix("~!") {
        (Operator::NotContains, rest.to_string())
    } else if let Some(rest) = raw.strip_prefix('~') {
        (Operator::Contains, rest.to_string())
    } else if let Some(rest) = raw.strip_prefix('!') {
        (Operator::NotEquals, rest.to_string())
    } else if let Some(rest) = raw.strip_prefix('>') {
        (Operator::GreaterThan, rest.to_string())
    } else if let Some(rest) = raw.strip_prefix('<') {
        (Operator::LessThan, rest.to_string())
    } else {
        (Operator::Equals, raw.to_string())
    }
}

fn field_value(alert: &Alert, field: &str) -> Option<String> {
    if let Some(key) = field.strip_prefix("attributes.") {
        return alert.attributes.get(key).map(value_to_string);
    }
    Some(match field {
        "environment" => alert.environment.clone(),
        "resource" => alert.resource.clone(),
        "event" => alert.event.clone(),
        "severity" => alert.severity.capitalized(),
        "status" => serde_json::to_value(alert.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default(),
        "origin" => alert.origin.clone(),
        "customer" => alert.customer.clone().unwrap_or_default(),
        "group" => alert.group.clone().unwrap_or_default(),
        "value" => alert.value.clone(),
        "text" => alert.text.clone(),
        _ => return None,
    })
}

fn value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_matches(alert: &Alert, m: &FieldMatch) -> bool {
    let Some(actual) = field_value(alert, &m.field) else {
        return true;
    };
    match m.operator {
        Operator::Equals => actual == m.value,
        Operator::NotEquals => actual != m.value,
        Operator::Contains => actual.to_lowercase().contains(&m.value.to_lowercase()),
        Operator::NotContains => !actual.to_lowercase().contains(&m.value.to_lowercase()),
        Operator::GreaterThan => compare_numeric_or_lexical(&actual, &m.value).is_gt(),
        Operator::LessThan => compare_numeric_or_lexical(&actual, &m.value).is_lt(),
    }
}

fn compare_numeric_or_lexical(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Convenience constructor from an already-parsed attributes map, used by
/// callers that built a filter programmatically rather than from raw
/// query-string pairs.
pub fn from_map(params: HashMap<String, String>) -> QueryFilter {
    QueryFilter::parse(&params.into_iter().collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::alert::tests::sample_alert;

    #[test]
    fn equals_and_not_equals() {
        let alert = sample_alert();
        let eq = QueryFilter::parse(&[("environment".into(), "Prod".into())]);
        assert!(eq.matches(&alert));
        let ne = QueryFilter::parse(&[("environment".into(), "!Prod".into())]);
        assert!(!ne.matches(&alert));
    }

    #[test]
    fn contains_and_not_contains() {
        let mut alert = sample_alert();
        alert.text = "disk usage high".into();
        let contains = QueryFilter::parse(&[("text".into(), "~usage".into())]);
        assert!(contains.matches(&alert));
        let not_contains = QueryFilter::parse(&[("text".into(), "~!missing".into())]);
        assert!(not_contains.matches(&alert));
    }

    #[test]
    fn tag_negation() {
        let mut alert = sample_alert();
        alert.tags.insert("prod".into());
        let positive = QueryFilter::parse(&[("tag".into(), "prod".into())]);
        assert!(positive.matches(&alert));
        let negative = QueryFilter::parse(&[("tag".into(), "!staging".into())]);
        assert!(negative.matches(&alert));
    }

    #[test]
    fn attributes_indexing() {
        let mut alert = sample_alert();
        alert.attributes.insert("region".into(), serde_json::json!("eu-west-1"));
        let filter = QueryFilter::parse(&[("attributes.region".into(), "eu-west-1".into())]);
        assert!(filter.matches(&alert));
    }
}
