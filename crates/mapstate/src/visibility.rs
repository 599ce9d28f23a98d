//! Composable visibility filters.
//!
//! The visible subset is the logical AND of all filters. Each category holds
//! at most one filter; modifying a category never touches the others.

use std::collections::BTreeSet;

use foundation::PointId;
use protocol::ItemFields;
use serde_json::Value;

use crate::selection::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    Text,
    Lasso,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicate {
    /// Some text field of the item contains the needle, ignoring case.
    TextContains { needle: String },
    /// The item is one of the given points.
    PointSet { ids: BTreeSet<PointId> },
}

impl FilterPredicate {
    pub fn matches(&self, id: &PointId, fields: Option<&ItemFields>) -> bool {
        match self {
            FilterPredicate::TextContains { needle } => {
                fields.is_some_and(|fields| fields.values().any(|value| value_contains(value, needle)))
            }
            FilterPredicate::PointSet { ids } => ids.contains(id),
        }
    }
}

fn value_contains(value: &Value, needle_lowercase: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle_lowercase),
        Value::Array(values) => values.iter().any(|v| value_contains(v, needle_lowercase)),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityFilter {
    pub display_name: String,
    pub category: FilterCategory,
    pub predicate: FilterPredicate,
}

/// How a new lasso selection combines with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    Replace,
    Add,
    Remove,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFilters {
    filters: Vec<VisibilityFilter>,
}

impl VisibilityFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[VisibilityFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, category: FilterCategory) -> Option<&VisibilityFilter> {
        self.filters.iter().find(|f| f.category == category)
    }

    pub fn remove_category(&mut self, category: FilterCategory) {
        self.filters.retain(|f| f.category != category);
    }

    /// Puts `filter` in its category's slot, keeping the slot's position.
    fn replace(&mut self, filter: VisibilityFilter) {
        match self.filters.iter_mut().find(|f| f.category == filter.category) {
            Some(slot) => *slot = filter,
            None => self.filters.push(filter),
        }
    }

    /// Sets or clears the text filter. Blank text clears it.
    pub fn modify_text_filter(&mut self, text: Option<&str>) {
        let needle = text.map(str::trim).filter(|t| !t.is_empty());
        match needle {
            None => self.remove_category(FilterCategory::Text),
            Some(needle) => self.replace(VisibilityFilter {
                display_name: format!("Contains '{needle}'"),
                category: FilterCategory::Text,
                predicate: FilterPredicate::TextContains {
                    needle: needle.to_lowercase(),
                },
            }),
        }
    }

    /// Point ids of the current lasso filter.
    pub fn lasso_ids(&self) -> Option<&BTreeSet<PointId>> {
        match self.get(FilterCategory::Lasso).map(|f| &f.predicate) {
            Some(FilterPredicate::PointSet { ids }) => Some(ids),
            _ => None,
        }
    }

    /// Combines `ids` with the previous lasso selection.
    ///
    /// Replacing with an empty selection clears the lasso filter; `Add` and
    /// `Remove` keep it even when the result is empty.
    pub fn modify_lasso_selection(&mut self, ids: impl IntoIterator<Item = PointId>, mode: MergeMode) {
        let incoming: BTreeSet<PointId> = ids.into_iter().collect();
        let previous = self.lasso_ids().cloned().unwrap_or_default();
        let merged = match mode {
            MergeMode::Replace => {
                if incoming.is_empty() {
                    self.remove_category(FilterCategory::Lasso);
                    return;
                }
                incoming
            }
            MergeMode::Add => previous.union(&incoming).cloned().collect(),
            MergeMode::Remove => previous.difference(&incoming).cloned().collect(),
        };
        self.replace(VisibilityFilter {
            display_name: format!("Lasso selection ({} items)", merged.len()),
            category: FilterCategory::Lasso,
            predicate: FilterPredicate::PointSet { ids: merged },
        });
    }

    /// Indices in `0..ids.len()` that pass every filter.
    pub fn evaluate<'a>(
        &self,
        ids: &[PointId],
        details: impl Fn(&PointId) -> Option<&'a ItemFields>,
    ) -> SelectionSet {
        if self.filters.is_empty() {
            return SelectionSet::full(ids.len());
        }
        ids.iter()
            .enumerate()
            .filter(|(_, id)| {
                let fields = details(id);
                self.filters.iter().all(|f| f.predicate.matches(id, fields))
            })
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn p(item: &str) -> PointId {
        PointId::new("ds", item)
    }

    #[test]
    fn text_and_lasso_slots_are_independent() {
        let mut filters = VisibilityFilters::new();
        filters.modify_text_filter(Some("cat"));
        filters.modify_lasso_selection([p("1"), p("2")], MergeMode::Replace);
        filters.modify_text_filter(Some("dog"));
        assert_eq!(filters.filters().len(), 2);
        assert_eq!(filters.filters()[0].category, FilterCategory::Text);
        assert_eq!(filters.lasso_ids().map(BTreeSet::len), Some(2));

        filters.modify_text_filter(Some("   "));
        assert_eq!(filters.filters().len(), 1);
        assert!(filters.get(FilterCategory::Text).is_none());
    }

    #[test]
    fn lasso_merge_modes() {
        let mut filters = VisibilityFilters::new();
        filters.modify_lasso_selection([p("1"), p("2")], MergeMode::Replace);
        filters.modify_lasso_selection([p("3")], MergeMode::Add);
        let ids: Vec<_> = filters.lasso_ids().unwrap().iter().cloned().collect();
        assert_eq!(ids, vec![p("1"), p("2"), p("3")]);

        filters.modify_lasso_selection([p("2"), p("9")], MergeMode::Remove);
        let ids: Vec<_> = filters.lasso_ids().unwrap().iter().cloned().collect();
        assert_eq!(ids, vec![p("1"), p("3")]);

        filters.modify_lasso_selection([p("7")], MergeMode::Replace);
        let ids: Vec<_> = filters.lasso_ids().unwrap().iter().cloned().collect();
        assert_eq!(ids, vec![p("7")]);

        filters.modify_lasso_selection([p("7")], MergeMode::Remove);
        assert!(filters.lasso_ids().unwrap().is_empty());

        filters.modify_lasso_selection([], MergeMode::Replace);
        assert!(filters.lasso_ids().is_none());
    }

    #[test]
    fn evaluation_is_the_and_of_all_filters() {
        let ids = vec![p("1"), p("2"), p("3")];
        let mut details: BTreeMap<PointId, ItemFields> = BTreeMap::new();
        details.insert(p("1"), json!({"title": "Black Cat"}).as_object().cloned().unwrap());
        details.insert(p("2"), json!({"tags": ["dog", "CATS"]}).as_object().cloned().unwrap());

        let mut filters = VisibilityFilters::new();
        let all: Vec<_> = filters.evaluate(&ids, |id| details.get(id)).iter().collect();
        assert_eq!(all, vec![0, 1, 2]);

        filters.modify_text_filter(Some("cat"));
        let text: Vec<_> = filters.evaluate(&ids, |id| details.get(id)).iter().collect();
        assert_eq!(text, vec![0, 1]);

        filters.modify_lasso_selection([p("2"), p("3")], MergeMode::Replace);
        let both: Vec<_> = filters.evaluate(&ids, |id| details.get(id)).iter().collect();
        assert_eq!(both, vec![1]);
    }
}
