use std::collections::BTreeMap;

use protocol::{DatasetInfo, FieldType};

/// Dataset metadata fetched so far, keyed by dataset id.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, DatasetInfo>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: DatasetInfo) {
        self.datasets.insert(info.id.clone(), info);
    }

    pub fn get(&self, dataset_id: &str) -> Option<&DatasetInfo> {
        self.datasets.get(dataset_id)
    }

    pub fn contains(&self, dataset_id: &str) -> bool {
        self.datasets.contains_key(dataset_id)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// True if `field` has type `field_type` in at least one of `dataset_ids`.
    pub fn field_has_type<'a>(
        &self,
        dataset_ids: impl IntoIterator<Item = &'a String>,
        field: &str,
        field_type: FieldType,
    ) -> bool {
        dataset_ids
            .into_iter()
            .filter_map(|id| self.datasets.get(id))
            .any(|info| info.field_type(field) == Some(field_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(id: &str, fields: serde_json::Value) -> DatasetInfo {
        serde_json::from_value(json!({"id": id, "object_fields": fields})).unwrap()
    }

    #[test]
    fn field_type_lookup_spans_selected_datasets() {
        let mut registry = DatasetRegistry::new();
        registry.insert(dataset(
            "papers",
            json!({"year": {"identifier": "year", "field_type": "INTEGER"}}),
        ));
        registry.insert(dataset(
            "images",
            json!({"year": {"identifier": "year", "field_type": "FLOAT"}}),
        ));
        let both = vec!["images".to_string(), "papers".to_string()];
        let images = vec!["images".to_string()];

        assert!(registry.field_has_type(&both, "year", FieldType::Integer));
        assert!(!registry.field_has_type(&images, "year", FieldType::Integer));
        assert!(!registry.field_has_type(&both, "missing", FieldType::Integer));
        assert_eq!(registry.len(), 2);
    }
}
