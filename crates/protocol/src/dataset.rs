//! Dataset metadata as returned by `POST /org/data_map/dataset`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::templates::DisplayTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub dataset_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub object_fields: BTreeMap<String, ObjectField>,
    #[serde(default)]
    pub default_search_fields: Vec<String>,
    #[serde(default)]
    pub hover_label_rendering: LabelTemplates,
    #[serde(default)]
    pub result_list_rendering: LabelTemplates,
}

impl DatasetInfo {
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.object_fields.get(field).map(|f| f.field_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub identifier: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_available_for_search: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Identifier,
    Float,
    Integer,
    Date,
    Datetime,
    Time,
    Vector,
    ClassProbability,
    Face,
    Url,
    GeoCoordinates,
    Tag,
    Image,
    Audio,
    Video,
    ForeignKey,
    Bool,
    Attributes,
    ArbitraryObject,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Types that cannot feed a collection column.
    pub fn is_unsupported_column_source(self) -> bool {
        matches!(
            self,
            FieldType::Vector | FieldType::ClassProbability | FieldType::ArbitraryObject
        )
    }
}

/// Templates used to render an item's title, subtitle and body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelTemplates {
    pub title: Option<DisplayTemplate>,
    pub subtitle: Option<DisplayTemplate>,
    pub body: Option<DisplayTemplate>,
    pub image: Option<DisplayTemplate>,
}
