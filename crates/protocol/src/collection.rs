//! Collection payloads for the `/org/data_map/*collection*` endpoints.

use std::collections::BTreeMap;

use foundation::PointId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::FieldType;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub actual_classes: Vec<CollectionClass>,
    pub columns: Vec<CollectionColumn>,
    /// An agent is still adding or rating items.
    pub agent_is_running: bool,
    /// Column identifiers with cells still being computed.
    pub columns_with_running_processes: Vec<String>,
}

impl Collection {
    /// True while the server is still changing this collection on its own.
    pub fn has_background_work(&self) -> bool {
        self.agent_is_running || !self.columns_with_running_processes.is_empty()
    }

    pub fn class_mut(&mut self, class_name: &str) -> Option<&mut CollectionClass> {
        self.actual_classes.iter_mut().find(|c| c.name == class_name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionClass {
    pub name: String,
    pub positive_count: u64,
    pub negative_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionColumn {
    pub id: String,
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionItem {
    pub id: String,
    pub class_name: String,
    pub is_positive: bool,
    pub dataset_id: Option<String>,
    pub item_id: Option<String>,
    pub date_added: Option<String>,
    /// Computed cell values keyed by column identifier.
    pub column_data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetCollectionsRequest {
    pub related_organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub collection_id: String,
}

/// One page of a collection class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassItemsRequest {
    pub collection_id: String,
    pub class_name: String,
    pub is_positive: Option<bool>,
    pub offset: usize,
    pub limit: usize,
    pub order_by: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassItemsPage {
    pub items: Vec<CollectionItem>,
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub collection_id: String,
    pub class_name: String,
    pub is_positive: bool,
    pub field_type: FieldType,
    pub value: PointId,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveItemRequest {
    pub collection_item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessColumnRequest {
    pub column_id: String,
    pub class_name: String,
    pub offset: usize,
    pub limit: usize,
    pub order_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelColumnRequest {
    pub column_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn background_work_flags() {
        let mut collection: Collection = serde_json::from_value(json!({
            "id": "c1",
            "name": "Favourites",
            "actual_classes": [{"name": "_default", "positive_count": 3}]
        }))
        .unwrap();
        assert!(!collection.has_background_work());
        collection.columns_with_running_processes.push("summary".into());
        assert!(collection.has_background_work());
        collection.columns_with_running_processes.clear();
        collection.agent_is_running = true;
        assert!(collection.has_background_work());
        assert_eq!(collection.class_mut("_default").unwrap().positive_count, 3);
        assert!(collection.class_mut("missing").is_none());
    }

    #[test]
    fn add_request_sends_identifier_type() {
        let request = AddItemRequest {
            collection_id: "c1".into(),
            class_name: "_default".into(),
            is_positive: true,
            field_type: FieldType::Identifier,
            value: PointId::new("ds", "7"),
            weight: 1.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["field_type"], json!("IDENTIFIER"));
        assert_eq!(value["value"], json!(["ds", "7"]));
    }
}
