//! Search settings: the nested configuration sent wholesale with every search
//! and map request.
//!
//! Defaults mirror what a fresh client starts with. A snapshot of the defaults
//! is kept by the orchestration store so that a reset is a plain `clone()`.

use std::collections::BTreeMap;

use foundation::{MapId, PointId};
use serde::{Deserialize, Serialize};

use crate::channels::Channel;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Ordered, duplicate-free list of selected datasets.
    pub dataset_ids: Vec<String>,
    pub search: SearchParameters,
    pub vectorize: VectorizeParameters,
    pub projection: ProjectionParameters,
    pub rendering: RenderingParameters,
    pub frontend: FrontendSettings,
}

impl SearchSettings {
    /// Adds a dataset to the selection. Returns false if it was already selected.
    pub fn select_dataset(&mut self, dataset_id: &str) -> bool {
        if self.dataset_ids.iter().any(|id| id == dataset_id) {
            return false;
        }
        self.dataset_ids.push(dataset_id.to_string());
        true
    }

    pub fn deselect_dataset(&mut self, dataset_id: &str) -> bool {
        let before = self.dataset_ids.len();
        self.dataset_ids.retain(|id| id != dataset_id);
        before != self.dataset_ids.len()
    }

    /// True when a free-text search would have nothing to search for.
    pub fn has_empty_query(&self) -> bool {
        let search = &self.search;
        if search.search_type != SearchType::ExternalInput || !search.filters.is_empty() {
            return false;
        }
        if search.use_separate_queries {
            search.separate_queries.values().all(|q| q.query.trim().is_empty())
        } else {
            search.all_field_query.trim().is_empty()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    ExternalInput,
    Cluster,
    Collection,
    SimilarToItem,
    GlobalMap,
    Subset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

impl RetrievalMode {
    /// Quoted phrases become filters only when the query is embedded.
    pub fn uses_vectors(self) -> bool {
        matches!(self, RetrievalMode::Vector | RetrievalMode::Hybrid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    pub search_type: SearchType,
    pub retrieval_mode: RetrievalMode,
    pub use_separate_queries: bool,
    pub all_field_query: String,
    pub all_field_query_negative: String,
    pub internal_input_weight: f64,
    /// Per-field queries keyed by field identifier.
    pub separate_queries: BTreeMap<String, SeparateQuery>,
    pub filters: Vec<Filter>,
    pub use_similarity_thresholds: bool,
    pub use_autocut: bool,
    pub autocut_strategy: String,
    pub autocut_min_results: u32,
    pub autocut_min_score: f64,
    pub autocut_max_relative_decline: f64,

    /// Cluster, collection or item name the map refers to. Display only.
    pub origin_display_name: String,
    pub cluster_origin_map_id: Option<MapId>,
    pub cluster_id: Option<i64>,
    pub collection_id: Option<String>,
    pub collection_class: Option<String>,
    pub similar_to_item_id: Option<PointId>,

    pub result_list_items_per_page: u32,
    pub result_list_current_page: u32,
    pub max_items_used_for_mapping: u32,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            search_type: SearchType::ExternalInput,
            retrieval_mode: RetrievalMode::Hybrid,
            use_separate_queries: false,
            all_field_query: String::new(),
            all_field_query_negative: String::new(),
            internal_input_weight: 0.7,
            separate_queries: BTreeMap::new(),
            filters: Vec::new(),
            use_similarity_thresholds: true,
            use_autocut: true,
            autocut_strategy: "knee_point".to_string(),
            autocut_min_results: 10,
            autocut_min_score: 0.1,
            autocut_max_relative_decline: 1.0,
            origin_display_name: String::new(),
            cluster_origin_map_id: None,
            cluster_id: None,
            collection_id: None,
            collection_class: None,
            similar_to_item_id: None,
            result_list_items_per_page: 10,
            result_list_current_page: 0,
            max_items_used_for_mapping: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparateQuery {
    pub query: String,
    pub query_negative: String,
    pub must: bool,
    pub threshold_offset: f64,
    pub use_for_combined_search: bool,
}

impl Default for SeparateQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            query_negative: String::new(),
            must: false,
            threshold_offset: 0.0,
            use_for_combined_search: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            dataset_id: None,
            operator,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    DoesNotContain,
    Equals,
    NotEquals,
    Lt,
    Lte,
    Gt,
    Gte,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeParameters {
    pub map_vector_field: String,
    pub secondary_map_vector_field: Option<String>,
    pub tokenizer: String,
}

impl Default for VectorizeParameters {
    fn default() -> Self {
        Self {
            map_vector_field: "w2v_vector".to_string(),
            secondary_map_vector_field: None,
            tokenizer: "default".to_string(),
        }
    }
}

/// Where the numbers for an axis or a rendering channel come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub parameter: String,
}

impl ChannelSource {
    pub fn new(kind: SourceKind, parameter: impl Into<String>) -> Self {
        Self {
            kind,
            parameter: parameter.into(),
        }
    }

    pub fn fixed() -> Self {
        Self::new(SourceKind::Fixed, "")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Umap,
    NumberField,
    Classifier,
    Count,
    Rank,
    Score,
    FulltextScore,
    OriginQueryIdx,
    ClusterIdx,
    Contains,
    IsEmpty,
    Fixed,
    #[serde(other)]
    Unknown,
}

impl SourceKind {
    /// Sources whose values are category indices rather than measurements.
    pub fn is_categorical(self) -> bool {
        matches!(self, SourceKind::ClusterIdx | SourceKind::OriginQueryIdx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionParameters {
    pub x_axis: ChannelSource,
    pub y_axis: ChannelSource,
    pub n_neighbors: u32,
    pub min_dist: f64,
    pub n_epochs: u32,
    pub metric: String,
    pub dim_reducer: String,
    pub use_polar_projection: bool,
    pub invert_x_axis: bool,
}

impl Default for ProjectionParameters {
    fn default() -> Self {
        Self {
            x_axis: ChannelSource::new(SourceKind::Umap, "primary"),
            y_axis: ChannelSource::new(SourceKind::Umap, "primary"),
            n_neighbors: 15,
            min_dist: 0.17,
            n_epochs: 500,
            metric: "euclidean".to_string(),
            dim_reducer: "umap".to_string(),
            use_polar_projection: false,
            invert_x_axis: false,
        }
    }
}

/// Backend-side channel assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingParameters {
    pub size: ChannelSource,
    pub hue: ChannelSource,
    pub sat: ChannelSource,
    pub val: ChannelSource,
    pub opacity: ChannelSource,
    pub secondary_hue: ChannelSource,
    pub secondary_sat: ChannelSource,
    pub secondary_val: ChannelSource,
    pub secondary_opacity: ChannelSource,
    pub flatness: ChannelSource,
    pub enable_clustering: bool,
    pub clusterizer_parameters: ClusterizerParameters,
    pub cluster_title_strategy: String,
}

impl RenderingParameters {
    pub fn source(&self, channel: Channel) -> &ChannelSource {
        match channel {
            Channel::Size => &self.size,
            Channel::Hue => &self.hue,
            Channel::Sat => &self.sat,
            Channel::Val => &self.val,
            Channel::Opacity => &self.opacity,
            Channel::SecondaryHue => &self.secondary_hue,
            Channel::SecondarySat => &self.secondary_sat,
            Channel::SecondaryVal => &self.secondary_val,
            Channel::SecondaryOpacity => &self.secondary_opacity,
            Channel::Flatness => &self.flatness,
        }
    }
}

impl Default for RenderingParameters {
    fn default() -> Self {
        Self {
            size: ChannelSource::new(SourceKind::Score, ""),
            hue: ChannelSource::new(SourceKind::ClusterIdx, ""),
            sat: ChannelSource::new(SourceKind::Score, ""),
            val: ChannelSource::fixed(),
            opacity: ChannelSource::fixed(),
            secondary_hue: ChannelSource::fixed(),
            secondary_sat: ChannelSource::fixed(),
            secondary_val: ChannelSource::fixed(),
            secondary_opacity: ChannelSource::fixed(),
            flatness: ChannelSource::fixed(),
            enable_clustering: true,
            clusterizer_parameters: ClusterizerParameters::default(),
            cluster_title_strategy: "tf_idf_top_3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterizerParameters {
    /// -1 lets the backend pick a size from the result count.
    pub min_cluster_size: i32,
    pub min_samples: u32,
    pub leaf_mode: bool,
    pub clusterizer: String,
}

impl Default for ClusterizerParameters {
    fn default() -> Self {
        Self {
            min_cluster_size: -1,
            min_samples: 5,
            leaf_mode: false,
            clusterizer: "hdbscan".to_string(),
        }
    }
}

/// Client-side preferences, stored with the map so they can be restored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendSettings {
    pub rendering: FrontendRendering,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendRendering {
    pub show_thumbnails: bool,
    pub show_cluster_titles: bool,
    pub size: ChannelStyle,
    pub hue: ChannelStyle,
    pub sat: ChannelStyle,
    pub val: ChannelStyle,
    pub opacity: ChannelStyle,
    pub secondary_hue: ChannelStyle,
    pub secondary_sat: ChannelStyle,
    pub secondary_val: ChannelStyle,
    pub secondary_opacity: ChannelStyle,
    pub flatness: ChannelStyle,
    pub max_opacity: f64,
    pub shadow_opacity: f64,
    pub point_size_factor: f64,
    pub style: String,
}

impl FrontendRendering {
    pub fn style(&self, channel: Channel) -> &ChannelStyle {
        match channel {
            Channel::Size => &self.size,
            Channel::Hue => &self.hue,
            Channel::Sat => &self.sat,
            Channel::Val => &self.val,
            Channel::Opacity => &self.opacity,
            Channel::SecondaryHue => &self.secondary_hue,
            Channel::SecondarySat => &self.secondary_sat,
            Channel::SecondaryVal => &self.secondary_val,
            Channel::SecondaryOpacity => &self.secondary_opacity,
            Channel::Flatness => &self.flatness,
        }
    }
}

impl Default for FrontendRendering {
    fn default() -> Self {
        Self {
            show_thumbnails: true,
            show_cluster_titles: true,
            size: ChannelStyle::with_fallback(0.5),
            hue: ChannelStyle::with_fallback(0.0),
            sat: ChannelStyle::with_fallback(0.7),
            val: ChannelStyle::with_fallback(0.7),
            opacity: ChannelStyle::with_fallback(1.0),
            secondary_hue: ChannelStyle::with_fallback(0.0),
            secondary_sat: ChannelStyle::with_fallback(1.0),
            secondary_val: ChannelStyle::with_fallback(1.0),
            secondary_opacity: ChannelStyle::with_fallback(0.0),
            flatness: ChannelStyle::with_fallback(0.0),
            max_opacity: 0.7,
            shadow_opacity: 1.0,
            point_size_factor: 1.0,
            style: "3d".to_string(),
        }
    }
}

/// Display range and fallback for one rendering channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStyle {
    pub min: f64,
    pub max: f64,
    /// Value used while the channel has not been received.
    pub fallback: f64,
    pub gamma: GammaSetting,
    pub threshold: Option<f64>,
}

impl ChannelStyle {
    pub fn with_fallback(fallback: f64) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }
}

impl Default for ChannelStyle {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            fallback: 0.0,
            gamma: GammaSetting::Auto,
            threshold: None,
        }
    }
}

/// `"auto"` on the wire, or a fixed exponent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "GammaRepr", into = "GammaRepr")]
pub enum GammaSetting {
    #[default]
    Auto,
    Fixed(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GammaRepr {
    Fixed(f64),
    Keyword(String),
}

impl TryFrom<GammaRepr> for GammaSetting {
    type Error = String;

    fn try_from(value: GammaRepr) -> Result<Self, Self::Error> {
        match value {
            GammaRepr::Fixed(gamma) => Ok(GammaSetting::Fixed(gamma)),
            GammaRepr::Keyword(word) if word == "auto" => Ok(GammaSetting::Auto),
            GammaRepr::Keyword(word) => Err(format!("unknown gamma setting '{word}'")),
        }
    }
}

impl From<GammaSetting> for GammaRepr {
    fn from(value: GammaSetting) -> Self {
        match value {
            GammaSetting::Auto => GammaRepr::Keyword("auto".to_string()),
            GammaSetting::Fixed(gamma) => GammaRepr::Fixed(gamma),
        }
    }
}
