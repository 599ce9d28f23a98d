//! Map job payloads: creation, the poll request and the incremental poll response.

use std::collections::{BTreeMap, BTreeSet};

use foundation::{MapId, PointId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::Channel;

/// Fields of one item as delivered by the backend.
pub type ItemFields = serde_json::Map<String, Value>;

/// Item details keyed by dataset id, then item id.
pub type ItemDetails = BTreeMap<String, BTreeMap<String, ItemFields>>;

/// Response of the map creation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCreated {
    pub map_id: MapId,
}

/// Body of `POST /data_backend/map/result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRequest {
    pub map_id: MapId,
    /// Fields the server should leave out of the response.
    #[serde(default)]
    pub exclude_fields: BTreeSet<String>,
    /// Timestamp of the newest positions the client already holds.
    #[serde(default)]
    pub last_position_update_received: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollResponse {
    pub finished: bool,
    pub errors: Vec<String>,
    pub progress: Option<Progress>,
    pub parameters: Option<Value>,
    pub results: Option<MapResults>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub current_step: u32,
    pub total_steps: u32,
    pub step_title: String,
    pub embeddings_available: bool,
}

impl Progress {
    /// Completed fraction; the last step counts as done.
    pub fn fraction(&self) -> f64 {
        let denominator = self.total_steps.saturating_sub(1).max(1);
        (self.current_step as f64 / denominator as f64).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapResults {
    pub hover_label_data: Option<ItemDetails>,
    pub per_point_data: Option<PerPointData>,
    /// Filename of the rendered thumbnail atlas, or `"loading"`.
    pub thumbnail_atlas_filename: Option<String>,
    pub thumbnail_sprite_size: Option<u32>,
    pub clusters: Option<BTreeMap<String, ClusterDescriptor>>,
    /// Server timestamp of the positions contained in this response.
    pub last_position_update: Option<f64>,
    pub search_result_score_info: Option<Value>,
    pub answer: Option<String>,
    pub timings: Option<Value>,
}

/// Columnar per-point fields. Absent fields were excluded or are not ready yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerPointData {
    pub item_ids: Option<Vec<PointId>>,
    pub cluster_ids: Option<Vec<i64>>,
    pub positions_x: Option<Vec<f32>>,
    pub positions_y: Option<Vec<f32>>,
    pub thumbnail_aspect_ratios: Option<Vec<f32>>,
    pub size: Option<Vec<f64>>,
    pub hue: Option<Vec<f64>>,
    pub sat: Option<Vec<f64>>,
    pub val: Option<Vec<f64>>,
    pub opacity: Option<Vec<f64>>,
    pub secondary_hue: Option<Vec<f64>>,
    pub secondary_sat: Option<Vec<f64>>,
    pub secondary_val: Option<Vec<f64>>,
    pub secondary_opacity: Option<Vec<f64>>,
    pub flatness: Option<Vec<f64>>,
}

impl PerPointData {
    fn channel_slot(&mut self, channel: Channel) -> &mut Option<Vec<f64>> {
        match channel {
            Channel::Size => &mut self.size,
            Channel::Hue => &mut self.hue,
            Channel::Sat => &mut self.sat,
            Channel::Val => &mut self.val,
            Channel::Opacity => &mut self.opacity,
            Channel::SecondaryHue => &mut self.secondary_hue,
            Channel::SecondarySat => &mut self.secondary_sat,
            Channel::SecondaryVal => &mut self.secondary_val,
            Channel::SecondaryOpacity => &mut self.secondary_opacity,
            Channel::Flatness => &mut self.flatness,
        }
    }

    pub fn take_channel(&mut self, channel: Channel) -> Option<Vec<f64>> {
        self.channel_slot(channel).take()
    }

    pub fn set_channel(&mut self, channel: Channel, values: Vec<f64>) {
        *self.channel_slot(channel) = Some(values);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "centerX")]
    pub center_x: Option<f64>,
    #[serde(default, alias = "centerY")]
    pub center_y: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn progress_fraction_uses_last_step_as_complete() {
        let progress = Progress {
            current_step: 2,
            total_steps: 3,
            ..Progress::default()
        };
        assert_eq!(progress.fraction(), 1.0);
        let single = Progress {
            current_step: 0,
            total_steps: 1,
            ..Progress::default()
        };
        assert_eq!(single.fraction(), 0.0);
    }

    #[test]
    fn sparse_response_parses() {
        let response: PollResponse = serde_json::from_value(json!({
            "finished": false,
            "progress": {"current_step": 1, "total_steps": 4, "step_title": "Clustering"},
            "results": {
                "per_point_data": {
                    "item_ids": [["ds", "a"], ["ds", "b"]],
                    "positions_x": [0.0, 1.0],
                    "positions_y": [0.0, 1.0],
                    "size": [1, 2]
                },
                "clusters": {"0": {"id": 0, "title": "felines", "centerX": 0.5, "centerY": 0.5}},
                "last_position_update": 17.5
            }
        }))
        .unwrap();
        let results = response.results.unwrap();
        let per_point = results.per_point_data.unwrap();
        assert_eq!(per_point.item_ids.unwrap()[1], PointId::new("ds", "b"));
        assert_eq!(per_point.size, Some(vec![1.0, 2.0]));
        assert_eq!(per_point.cluster_ids, None);
        assert_eq!(results.clusters.unwrap()["0"].center_x, Some(0.5));
        assert_eq!(results.last_position_update, Some(17.5));
        assert!(response.errors.is_empty());
    }

    #[test]
    fn channel_slots_are_addressable() {
        let mut data = PerPointData::default();
        data.set_channel(Channel::SecondaryHue, vec![0.25]);
        assert_eq!(data.secondary_hue, Some(vec![0.25]));
        assert_eq!(data.take_channel(Channel::SecondaryHue), Some(vec![0.25]));
        assert_eq!(data.take_channel(Channel::SecondaryHue), None);
    }
}
