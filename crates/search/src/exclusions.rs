use std::collections::BTreeSet;

use protocol::fields;

/// Field groups fully received for the current map id.
///
/// Grows monotonically during one job and is cleared with the results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedFields {
    fields: BTreeSet<String>,
}

impl ReceivedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str) {
        self.fields.insert(field.to_string());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Everything the next poll should leave out.
    pub fn exclusion_list(&self, debug_autocut: bool) -> BTreeSet<String> {
        let mut exclude = fields::base_exclusions(debug_autocut);
        exclude.extend(self.fields.iter().cloned());
        exclude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusions_combine_base_and_received() {
        let mut received = ReceivedFields::new();
        let before = received.exclusion_list(false);
        received.insert(fields::CLUSTERS);
        received.insert("hue");
        let after = received.exclusion_list(false);
        assert!(after.is_superset(&before));
        assert!(after.contains("hue"));
        assert!(after.contains(fields::SEARCH_RESULT_SCORE_INFO));
        assert!(!received.exclusion_list(true).contains(fields::SEARCH_RESULT_SCORE_INFO));
        received.clear();
        assert_eq!(received.exclusion_list(false), before);
    }
}
