//! Message rendering (spec §4.7): template selection and named-token
//! substitution.

use crate::model::alert::Alert;
use crate::model::rule::{NotificationRule, NotificationTrigger};

const DEFAULT_TEMPLATE: &str = "%(environment)s: %(severity)s alert for %(service)s - %(resource)s is %(event)s";

/// Picks the effective template: the matched trigger's text (with
/// `%(default)s` substituted by the rule's text), else the rule's text,
/// else the system default.
pub fn effective_template(rule: &NotificationRule, trigger: Option<&NotificationTrigger>) -> String {
    let rule_text = rule.text.clone().unwrap_or_default();
    if let Some(trigger) = trigger {
        if !trigger.text.is_empty() {
            return trigger.text.replace("%(default)s", &rule_text);
        }
    }
    if !rule_text.is_empty() {
        return rule_text;
    }
    DEFAULT_TEMPLATE.to_string()
}

/// Substitutes `%(token)s` placeholders against `alert`'s fields.
/// List-valued fields flatten to comma-separated strings; `attributes`
/// exposes dotted sub-keys (`%(attributes.region)s`); list attributes
/// additionally expose indexed tokens (`%(tags[0])s`).
pub fn render(template: &str, alert: &Alert) -> String {
    let mut out = template.to_string();
    for (token, value) in tokens(alert) {
        out = out.replace(&format!("%({token})s"), &value);
    }
    out
}

fn tokens(alert: &Alert) -> Vec<(String, String)> {
    let mut t = vec![
        ("environment".into(), alert.environment.clone()),
        ("resource".into(), alert.resource.clone()),
        ("event".into(), alert.event.clone()),
        ("severity".into(), alert.severity.capitalized()),
        ("status".into(), format!("{:?}", alert.status)),
        ("value".into(), alert.value.clone()),
        ("text".into(), alert.text.clone()),
        ("origin".into(), alert.origin.clone()),
        ("customer".into(), alert.customer.clone().unwrap_or_default()),
        ("group".into(), alert.group.clone().unwrap_or_default()),
        ("service".into(), alert.service.join(", ")),
        ("tags".into(), alert.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
    ];

    for (i, s) in alert.service.iter().enumerate() {
        t.push((format!("service[{i}]"), s.clone()));
    }
    for (i, tag) in alert.tags.iter().enumerate() {
        t.push((format!("tags[{i}]"), tag.clone()));
    }
    for (key, value) in &alert.attributes {
        t.push((format!("attributes.{key}"), attribute_to_string(value)));
    }

    t
}

fn attribute_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(attribute_to_string).collect::<Vec<_>>().join(", "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::alert::tests::sample_alert;

    #[test]
    fn falls_back_to_system_default_template() {
        let rule = bare_rule();
        assert_eq!(effective_template(&rule, None), DEFAULT_TEMPLATE);
    }

    #[test]
    fn trigger_text_substitutes_rule_default_token() {
        let mut rule = bare_rule();
        rule.text = Some("custom rule text".into());
        let trigger = NotificationTrigger {
            text: "escalated: %(default)s".into(),
            ..Default::default()
        };
        assert_eq!(effective_template(&rule, Some(&trigger)), "escalated: custom rule text");
    }

    #[test]
    fn renders_named_and_list_tokens() {
        let mut alert = sample_alert();
        alert.service = vec!["web".into(), "db".into()];
        let rendered = render("%(environment)s: %(severity)s for %(service)s", &alert);
        assert_eq!(rendered, "Prod: Minor for web, db");
    }

    #[test]
    fn renders_dotted_attribute_token() {
        let mut alert = sample_alert();
        alert.attributes.insert("region".into(), serde_json::json!("eu-west-1"));
        let rendered = render("region=%(attributes.region)s", &alert);
        assert_eq!(rendered, "region=eu-west-1");
    }

    fn bare_rule() -> NotificationRule {
        NotificationRule {
            id: "r1".into(),
            name: None,
            active: true,
            environment: "Prod".into(),
            channel_id: "c1".into(),
            receivers: vec![],
            user_ids: vec![],
            group_ids: vec![],
            use_oncall: false,
            resource: None,
            event: None,
            group: None,
            service: vec![],
            tags: vec![],
            excluded_tags: vec![],
            triggers: vec![],
            days: Default::default(),
            start_time: None,
            end_time: None,
            delay_time: None,
            reactivate: None,
            customer: None,
            user: None,
            text: None,
            create_time: chrono::Utc::now(),
        }
    }
}
