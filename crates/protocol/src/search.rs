//! Search list, stored map and search history payloads.

use foundation::{MapId, PointId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::map::ItemDetails;
use crate::settings::SearchSettings;

/// Response of `POST /data_backend/search_list_result`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchListResponse {
    /// Result ids in ranking order.
    pub sorted_ids: Vec<PointId>,
    pub total_matches: u64,
    pub items_by_dataset: ItemDetails,
    pub timings: Value,
}

/// Body of `POST /data_backend/stored_map/parameters_and_search_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMapRequest {
    pub map_id: MapId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMapResponse {
    pub parameters: SearchSettings,
    #[serde(default)]
    pub search_result: Option<SearchListResponse>,
}

/// Body of `POST /data_backend/map/store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMapRequest {
    pub name: String,
    pub map_id: MapId,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMap {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub map_id: Option<MapId>,
}

/// Body of `POST /org/data_map/add_search_history_item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryRequest {
    pub name: String,
    pub parameters: SearchSettings,
    #[serde(default)]
    pub total_matches: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_map_response_restores_settings() {
        let response: StoredMapResponse = serde_json::from_value(json!({
            "parameters": {"dataset_ids": ["ds"], "search": {"all_field_query": "dogs"}}
        }))
        .unwrap();
        assert_eq!(response.parameters.search.all_field_query, "dogs");
        assert!(response.search_result.is_none());
    }

    #[test]
    fn search_list_tolerates_missing_fields() {
        let response: SearchListResponse =
            serde_json::from_value(json!({"sorted_ids": [["ds", "1"]]})).unwrap();
        assert_eq!(response.sorted_ids.len(), 1);
        assert_eq!(response.total_matches, 0);
        assert!(response.items_by_dataset.is_empty());
    }
}
