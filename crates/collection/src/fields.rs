//! Field choices offered for sorting a collection and for feeding its columns.

use std::collections::BTreeMap;

use protocol::DatasetInfo;
use protocol::collection::{Collection, CollectionItem};

/// Pseudo-field covering all short descriptive text fields of an item.
pub const DESCRIPTIVE_TEXT_FIELDS: &str = "_descriptive_text_fields";
/// Pseudo-field with excerpts of the item's full text.
pub const FULL_TEXT_SNIPPETS: &str = "_full_text_snippets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
    pub identifier: String,
    pub name: String,
}

impl FieldOption {
    fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }
}

/// Sort keys for class item pages: every column's value, then the dates.
pub fn available_order_by_fields(collection: &Collection) -> Vec<FieldOption> {
    let mut fields: Vec<FieldOption> = Vec::new();
    for column in &collection.columns {
        let identifier = format!("column_data__{}__value", column.identifier);
        if !fields.iter().any(|f| f.identifier == identifier) {
            fields.push(FieldOption::new(identifier, column.name.clone()));
        }
    }
    fields.push(FieldOption::new("date_added", "Date Added"));
    fields.push(FieldOption::new("changed_at", "Last Changed"));
    fields
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Inputs a column can be computed from, sorted by identifier.
///
/// Covers the searchable fields of every dataset that contributes items,
/// other columns, and the two text pseudo-fields.
pub fn available_source_fields(
    collection: &Collection,
    items: &[CollectionItem],
    datasets: &BTreeMap<String, DatasetInfo>,
) -> Vec<FieldOption> {
    let mut fields: BTreeMap<String, FieldOption> = BTreeMap::new();

    let included = items
        .iter()
        .filter_map(|item| item.dataset_id.as_deref())
        .filter_map(|id| datasets.get(id));
    for dataset in included {
        for field in dataset.object_fields.values() {
            if field.field_type.is_unsupported_column_source() {
                continue;
            }
            let label = field.name.as_deref().unwrap_or(&field.identifier);
            let option = FieldOption::new(
                field.identifier.clone(),
                format!("{}: {label}", capitalize(&dataset.name)),
            );
            fields.insert(field.identifier.clone(), option);
        }
    }
    for column in &collection.columns {
        let identifier = format!("_column__{}", column.identifier);
        let option = FieldOption::new(identifier.clone(), format!("Column: {}", column.name));
        fields.insert(identifier, option);
    }
    fields.insert(
        DESCRIPTIVE_TEXT_FIELDS.to_string(),
        FieldOption::new(DESCRIPTIVE_TEXT_FIELDS, "All short descriptive text fields"),
    );
    fields.insert(
        FULL_TEXT_SNIPPETS.to_string(),
        FieldOption::new(FULL_TEXT_SNIPPETS, "Full text excerpts"),
    );
    fields.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn collection() -> Collection {
        serde_json::from_value(json!({
            "id": "c1",
            "name": "Reading list",
            "columns": [{"id": "7", "identifier": "summary", "name": "Summary"}]
        }))
        .unwrap()
    }

    #[test]
    fn order_by_lists_columns_then_dates() {
        let identifiers: Vec<_> = available_order_by_fields(&collection())
            .into_iter()
            .map(|f| f.identifier)
            .collect();
        assert_eq!(
            identifiers,
            vec!["column_data__summary__value", "date_added", "changed_at"]
        );
    }

    #[test]
    fn source_fields_skip_vectors_and_include_columns() {
        let dataset: DatasetInfo = serde_json::from_value(json!({
            "id": "papers",
            "name": "paper",
            "object_fields": {
                "title": {"identifier": "title", "field_type": "TEXT", "name": "Title"},
                "embedding": {"identifier": "embedding", "field_type": "VECTOR"}
            }
        }))
        .unwrap();
        let datasets = BTreeMap::from([("papers".to_string(), dataset)]);
        let items = vec![CollectionItem {
            dataset_id: Some("papers".into()),
            ..CollectionItem::default()
        }];

        let fields = available_source_fields(&collection(), &items, &datasets);
        let identifiers: Vec<_> = fields.iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(
            identifiers,
            vec![
                "_column__summary",
                "_descriptive_text_fields",
                "_full_text_snippets",
                "title"
            ]
        );
        assert_eq!(fields[3].name, "Paper: Title");
    }
}
