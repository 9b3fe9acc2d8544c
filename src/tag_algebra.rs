//! `{all, any}` tag-matching predicate (spec §4.3).
//!
//! Grounded on the original's Postgres tag-matching CTE
//! (`is_in_all_tags` / `is_in_any_tags` in
//! `alerta/database/backends/postgres/base.py`): a rule's `all` set must be
//! a subset of the alert's tags, and if the rule's `any` set is non-empty at
//! least one of its members must also be present. Both predicates default
//! to true when their respective set is empty.

use crate::model::rule::AdvancedTag;
use std::collections::HashSet;

impl AdvancedTag {
    /// True if `alert_tags` satisfies both the `all` and `any` predicates.
    pub fn matches(&self, alert_tags: &HashSet<String>) -> bool {
        let all_match = self.all.is_subset(alert_tags);
        let any_match = self.any.is_empty() || self.any.iter().any(|t| alert_tags.contains(t));
        all_match && any_match
    }
}

/// A rule passes its tag filter when it has no tag predicates at all, or
/// when at least one configured predicate matches (spec §4.3: a rule's
/// `tags` list is itself an OR of `AdvancedTag`s).
pub fn matches_any(predicates: &[AdvancedTag], alert_tags: &HashSet<String>) -> bool {
    predicates.is_empty() || predicates.iter().any(|p| p.matches(alert_tags))
}

/// Excluded-tags semantics (spec §4.3): a rule is excluded if ANY of its
/// `excluded_tags` predicates match and that predicate is not itself empty
/// (an empty `AdvancedTag` trivially "includes" everything but must never
/// exclude anything).
pub fn matches_excluded(predicates: &[AdvancedTag], alert_tags: &HashSet<String>) -> bool {
    predicates.iter().any(|p| !p.is_empty() && p.matches(alert_tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let p = AdvancedTag::default();
        assert!(p.matches(&tags(&["prod"])));
        assert!(p.matches(&tags(&[])));
    }

    #[test]
    fn all_requires_subset() {
        let p = AdvancedTag::new(vec!["prod".into(), "db".into()], vec![]);
        assert!(p.matches(&tags(&["prod", "db", "extra"])));
        assert!(!p.matches(&tags(&["prod"])));
    }

    #[test]
    fn any_requires_intersection() {
        let p = AdvancedTag::new(vec![], vec!["db".into(), "web".into()]);
        assert!(p.matches(&tags(&["web"])));
        assert!(!p.matches(&tags(&["cache"])));
    }

    #[test]
    fn all_and_any_combine_conjunctively() {
        let p = AdvancedTag::new(vec!["prod".into()], vec!["db".into(), "web".into()]);
        assert!(p.matches(&tags(&["prod", "web"])));
        assert!(!p.matches(&tags(&["prod"])));
        assert!(!p.matches(&tags(&["web"])));
    }

    #[test]
    fn matches_any_is_or_over_predicates() {
        let predicates = vec![
            AdvancedTag::new(vec!["prod".into()], vec![]),
            AdvancedTag::new(vec!["staging".into()], vec![]),
        ];
        assert!(matches_any(&predicates, &tags(&["staging"])));
        assert!(!matches_any(&predicates, &tags(&["dev"])));
        assert!(matches_any(&[], &tags(&["anything"])));
    }
}
