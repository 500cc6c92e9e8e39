//! Page-view suppression for noisy controller actions

use std::collections::{HashMap, HashSet};

/// What an exclusion rule suppresses within a controller namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Every action of the controller
    All,
    /// Only the listed actions
    Actions(HashSet<String>),
}

/// Static controller -> exclusion lookup table.
///
/// Built once and read-only afterwards. Lookups are exact; there are no
/// wildcards or patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    rules: HashMap<String, Exclusion>,
}

impl ExclusionTable {
    /// An empty table that allows everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a table.
    pub fn builder() -> ExclusionTableBuilder {
        ExclusionTableBuilder::default()
    }

    /// Look up the rule for a controller.
    pub fn rule(&self, controller: &str) -> Option<&Exclusion> {
        self.rules.get(controller)
    }

    /// Number of controllers with a rule.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate controllers and their rules.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Exclusion)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for [`ExclusionTable`].
#[derive(Debug, Clone, Default)]
pub struct ExclusionTableBuilder {
    rules: HashMap<String, Exclusion>,
}

impl ExclusionTableBuilder {
    /// Suppress every action of a controller.
    pub fn exclude_all(mut self, controller: impl Into<String>) -> Self {
        self.rules.insert(controller.into(), Exclusion::All);
        self
    }

    /// Suppress specific actions of a controller.
    ///
    /// Has no effect on a controller already excluded entirely.
    pub fn exclude_actions<I, S>(mut self, controller: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .rules
            .entry(controller.into())
            .or_insert_with(|| Exclusion::Actions(HashSet::new()));
        if let Exclusion::Actions(set) = entry {
            set.extend(actions.into_iter().map(Into::into));
        }
        self
    }

    /// Finish the table.
    pub fn build(self) -> ExclusionTable {
        ExclusionTable { rules: self.rules }
    }
}

/// Decides whether a page view should be tracked.
#[derive(Debug, Clone)]
pub struct ActionFilter {
    table: ExclusionTable,
}

impl ActionFilter {
    /// Create a filter over a table.
    pub fn new(table: ExclusionTable) -> Self {
        Self { table }
    }

    /// Filter with the forum's stock exclusions.
    ///
    /// Stylesheets and avatars are never tracked; the about page's live post
    /// counter and topic read timings are polled too often to be page views.
    pub fn forum_defaults() -> Self {
        Self::new(
            ExclusionTable::builder()
                .exclude_all("stylesheets")
                .exclude_all("user_avatars")
                .exclude_actions("about", ["live_post_counts"])
                .exclude_actions("topics", ["timings"])
                .build(),
        )
    }

    /// Filter that never suppresses.
    pub fn allow_all() -> Self {
        Self::new(ExclusionTable::empty())
    }

    /// Check if a controller action is excluded from tracking.
    pub fn should_suppress(&self, controller: &str, action: &str) -> bool {
        match self.table.rule(controller) {
            Some(Exclusion::All) => true,
            Some(Exclusion::Actions(actions)) => actions.contains(action),
            None => false,
        }
    }

    /// Inverse of [`should_suppress`](Self::should_suppress).
    pub fn allows(&self, controller: &str, action: &str) -> bool {
        !self.should_suppress(controller, action)
    }

    /// The underlying table.
    pub fn table(&self) -> &ExclusionTable {
        &self.table
    }
}

impl Default for ActionFilter {
    fn default() -> Self {
        Self::forum_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stock_rules() {
        let filter = ActionFilter::forum_defaults();
        assert!(filter.should_suppress("stylesheets", "show"));
        assert!(filter.should_suppress("user_avatars", "show_letter"));
        assert!(filter.should_suppress("about", "live_post_counts"));
        assert!(filter.allows("about", "index"));
        assert!(filter.should_suppress("topics", "timings"));
        assert!(filter.allows("topics", "show"));
        assert!(filter.allows("list", "latest"));
    }

    #[test]
    fn exclude_all_wins_over_action_list() {
        let table = ExclusionTable::builder()
            .exclude_all("uploads")
            .exclude_actions("uploads", ["create"])
            .build();
        assert_eq!(table.rule("uploads"), Some(&Exclusion::All));
    }

    #[test]
    fn action_lists_merge() {
        let filter = ActionFilter::new(
            ExclusionTable::builder()
                .exclude_actions("posts", ["raw"])
                .exclude_actions("posts", ["cooked"])
                .build(),
        );
        assert!(filter.should_suppress("posts", "raw"));
        assert!(filter.should_suppress("posts", "cooked"));
        assert!(filter.allows("posts", "show"));
    }

    #[test]
    fn lookups_are_exact() {
        let filter = ActionFilter::forum_defaults();
        assert!(filter.allows("Stylesheets", "show"));
        assert!(filter.allows("stylesheets_extra", "show"));
        assert!(filter.allows("about", "live_post_counts_v2"));
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z_]{1,16}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Controllers excluded entirely suppress whatever the action is.
        #[test]
        fn prop_all_excluded_suppresses_any_action(action in name()) {
            let filter = ActionFilter::forum_defaults();
            prop_assert!(filter.should_suppress("stylesheets", &action));
            prop_assert!(filter.should_suppress("user_avatars", &action));
        }

        /// Controllers without a rule always allow.
        #[test]
        fn prop_unlisted_controllers_allow(controller in name(), action in name()) {
            let filter = ActionFilter::forum_defaults();
            prop_assume!(filter.table().rule(&controller).is_none());
            prop_assert!(filter.allows(&controller, &action));
        }

        /// Listed actions suppress exactly the listed names.
        #[test]
        fn prop_action_list_is_exact(listed in name(), other in name()) {
            let filter = ActionFilter::new(
                ExclusionTable::builder().exclude_actions("c", [listed.clone()]).build(),
            );
            prop_assert!(filter.should_suppress("c", &listed));
            if other != listed {
                prop_assert!(filter.allows("c", &other));
            }
        }
    }
}
