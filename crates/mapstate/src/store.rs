use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::{Aabb2, PointId};
use parking_lot::RwLock;
use protocol::{Channel, ClusterDescriptor, DisplayTemplate, ItemDetails, ItemFields};
use tracing::debug;

use crate::columns::{ColumnError, PerPointColumns};
use crate::lasso::point_in_polygon;
use crate::selection::{PointSelection, SelectionSet};
use crate::viewport::{FitMode, Viewport};
use crate::visibility::VisibilityFilters;

/// Single writer (the poll loop), many readers (renderer, UI).
pub type SharedMapState = Arc<RwLock<MapState>>;

/// A complete, non-incremental set of columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionData {
    pub item_ids: Vec<PointId>,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub cluster_ids: Option<Vec<i64>>,
    pub channels: BTreeMap<Channel, Vec<f32>>,
    pub thumbnail_aspect_ratios: Option<Vec<f32>>,
}

/// Decoded thumbnail sprite sheet, RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailAtlas {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub sprite_size: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MapState {
    columns: PerPointColumns,
    item_details: ItemDetails,
    clusters: BTreeMap<String, ClusterDescriptor>,
    atlas: Option<ThumbnailAtlas>,
    pub viewport: Viewport,
    pub selection: PointSelection,
    pub visibility: VisibilityFilters,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedMapState {
        Arc::new(RwLock::new(self))
    }

    pub fn columns(&self) -> &PerPointColumns {
        &self.columns
    }

    /// Column merges go through [`PerPointColumns`], which enforces equal lengths.
    pub fn columns_mut(&mut self) -> &mut PerPointColumns {
        &mut self.columns
    }

    pub fn point_count(&self) -> usize {
        self.columns.len()
    }

    /// Replaces every column from a complete payload; `None` empties the map.
    ///
    /// Selection indices refer to the old ordering and are cleared as well.
    pub fn set_projection_data(&mut self, data: Option<ProjectionData>) -> Result<(), ColumnError> {
        let columns = match data {
            None => PerPointColumns::new(),
            Some(data) => PerPointColumns::from_parts(
                data.item_ids,
                data.x,
                data.y,
                data.cluster_ids,
                data.channels,
                data.thumbnail_aspect_ratios,
            )?,
        };
        debug!(points = columns.len(), "projection data replaced");
        self.columns = columns;
        self.selection.clear();
        Ok(())
    }

    /// Clears everything that belongs to a result set.
    ///
    /// The text filter is user input and survives; the lasso refers to
    /// points of this result set and does not.
    pub fn reset(&mut self) {
        self.columns.clear();
        self.item_details.clear();
        self.clusters.clear();
        self.atlas = None;
        self.selection.clear();
        self.visibility.remove_category(crate::visibility::FilterCategory::Lasso);
    }

    /// A new job starts: current points stay visible until its data arrives,
    /// without the previous job's per-point values.
    pub fn begin_job(&mut self) {
        self.columns.mark_stale();
        self.selection.clear();
    }

    pub fn item_details(&self) -> &ItemDetails {
        &self.item_details
    }

    pub fn set_item_details(&mut self, details: ItemDetails) {
        self.item_details = details;
    }

    pub fn item_fields(&self, id: &PointId) -> Option<&ItemFields> {
        self.item_details.get(&id.dataset_id)?.get(&id.item_id)
    }

    /// Identifier of point `index`.
    ///
    /// Panics if `index` is out of range or item ids have not arrived.
    pub fn point_id(&self, index: usize) -> &PointId {
        let ids = self.columns.item_ids().unwrap_or_default();
        match ids.get(index) {
            Some(id) => id,
            None => panic!("point index {index} out of range for {} item ids", ids.len()),
        }
    }

    /// Details of point `index`, if they have been received.
    ///
    /// Panics if `index` is out of range.
    pub fn item_by_index(&self, index: usize) -> Option<&ItemFields> {
        let id = self.point_id(index);
        self.item_fields(id)
    }

    pub fn hover_label(&self, index: usize, template: &DisplayTemplate) -> String {
        self.item_by_index(index).map(|fields| template.render(fields)).unwrap_or_default()
    }

    pub fn clusters(&self) -> &BTreeMap<String, ClusterDescriptor> {
        &self.clusters
    }

    pub fn set_clusters(&mut self, clusters: BTreeMap<String, ClusterDescriptor>) {
        self.clusters = clusters;
    }

    pub fn atlas(&self) -> Option<&ThumbnailAtlas> {
        self.atlas.as_ref()
    }

    pub fn set_atlas(&mut self, atlas: Option<ThumbnailAtlas>) {
        self.atlas = atlas;
    }

    /// Opens point `index`: it becomes marked, visited and flat.
    pub fn mark_visited(&mut self, index: usize, flatness_fallback: f32) {
        self.columns.set_channel_value(Channel::Flatness, index, 1.0, flatness_fallback);
        self.selection.visited.insert(index);
        self.selection.marked = Some(index);
    }

    pub fn clear_marked(&mut self) {
        self.selection.marked = None;
    }

    pub fn data_bounds(&self) -> Option<Aabb2> {
        self.columns.bounds()
    }

    /// Fits the viewport to the current positions. Returns false without positions.
    pub fn fit_viewport(&mut self, mode: FitMode) -> bool {
        match self.data_bounds() {
            Some(bounds) => {
                self.viewport.fit_to_bounds(bounds, mode);
                true
            }
            None => false,
        }
    }

    /// Indices passing all visibility filters.
    pub fn visible_indices(&self) -> SelectionSet {
        let ids = self.columns.item_ids().unwrap_or_default();
        self.visibility.evaluate(ids, |id| self.item_fields(id))
    }

    /// Points whose screen position lies inside `polygon` (screen pixels).
    pub fn points_in_lasso(&self, polygon: &[[f64; 2]]) -> Vec<PointId> {
        let Some(ids) = self.columns.item_ids() else {
            return Vec::new();
        };
        ids.iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let [x, y] = self.columns.position(index)?;
                let screen = self.viewport.embedding_to_screen(x as f64, y as f64);
                point_in_polygon(screen, polygon).then(|| id.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::{FilterCategory, MergeMode};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn projection(n: usize) -> ProjectionData {
        ProjectionData {
            item_ids: (0..n).map(|i| PointId::new("ds", i.to_string())).collect(),
            x: (0..n).map(|i| i as f32).collect(),
            y: (0..n).map(|i| i as f32).collect(),
            ..ProjectionData::default()
        }
    }

    fn details() -> ItemDetails {
        let mut items = BTreeMap::new();
        items.insert("0".to_string(), json!({"title": "zero"}).as_object().cloned().unwrap());
        items.insert("1".to_string(), json!({"title": "one"}).as_object().cloned().unwrap());
        let mut details = ItemDetails::new();
        details.insert("ds".to_string(), items);
        details
    }

    #[test]
    fn projection_data_replaces_columns_and_clears_selection() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(4))).unwrap();
        state.selection.selected.insert(2);
        state.selection.hovered = Some(1);

        state.set_projection_data(Some(projection(2))).unwrap();
        assert_eq!(state.point_count(), 2);
        assert_eq!(state.columns().cluster_ids(), Some(&[-1i64, -1][..]));
        assert_eq!(state.selection, PointSelection::default());

        state.set_projection_data(None).unwrap();
        assert_eq!(state.point_count(), 0);
    }

    #[test]
    fn inconsistent_projection_is_rejected() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(2))).unwrap();
        let mut broken = projection(3);
        broken.y.pop();
        assert!(state.set_projection_data(Some(broken)).is_err());
        assert_eq!(state.point_count(), 2);
    }

    #[test]
    fn item_access_and_hover_labels() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(3))).unwrap();
        state.set_item_details(details());
        assert_eq!(state.item_by_index(1).unwrap()["title"], json!("one"));
        assert!(state.item_by_index(2).is_none());
        assert_eq!(state.hover_label(0, &DisplayTemplate::field("title")), "zero");
        assert_eq!(state.hover_label(2, &DisplayTemplate::field("title")), "");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn item_by_index_past_the_end_panics() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(1))).unwrap();
        state.item_by_index(5);
    }

    #[test]
    fn mark_visited_flattens_point() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(3))).unwrap();
        state.mark_visited(2, 0.0);
        assert_eq!(state.columns().channel(Channel::Flatness), Some(&[0.0, 0.0, 1.0][..]));
        assert!(state.selection.visited.contains(2));
        assert_eq!(state.selection.marked, Some(2));
        state.clear_marked();
        assert_eq!(state.selection.marked, None);
    }

    #[test]
    fn reset_keeps_text_filter_only() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(3))).unwrap();
        state.set_item_details(details());
        state.visibility.modify_text_filter(Some("one"));
        state.visibility.modify_lasso_selection([PointId::new("ds", "1")], MergeMode::Replace);
        state.reset();
        assert_eq!(state.point_count(), 0);
        assert!(state.item_details().is_empty());
        assert!(state.visibility.get(FilterCategory::Text).is_some());
        assert!(state.visibility.get(FilterCategory::Lasso).is_none());
    }

    #[test]
    fn visible_indices_use_item_details() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(3))).unwrap();
        state.set_item_details(details());
        assert_eq!(state.visible_indices().len(), 3);
        state.visibility.modify_text_filter(Some("ONE"));
        assert_eq!(state.visible_indices().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn lasso_hit_testing_in_screen_space() {
        let mut state = MapState::new();
        state.viewport = Viewport::new(100.0, 100.0);
        state.set_projection_data(Some(projection(3))).unwrap();
        assert!(state.fit_viewport(FitMode::Instant));
        // Points sit on the diagonal; the first one lands near the bottom-left corner.
        let corner = [[0.0, 80.0], [20.0, 80.0], [20.0, 100.0], [0.0, 100.0]];
        assert_eq!(state.points_in_lasso(&corner), vec![PointId::new("ds", "0")]);
        let everything = [[-1.0, -1.0], [101.0, -1.0], [101.0, 101.0], [-1.0, 101.0]];
        assert_eq!(state.points_in_lasso(&everything).len(), 3);
    }

    #[test]
    fn begin_job_keeps_points_until_new_data() {
        let mut state = MapState::new();
        state.set_projection_data(Some(projection(3))).unwrap();
        state.selection.selected.insert(0);
        state.begin_job();
        assert_eq!(state.point_count(), 3);
        assert!(state.selection.selected.is_empty());
        state
            .columns_mut()
            .merge_item_ids(vec![PointId::new("ds", "x")])
            .unwrap();
        assert_eq!(state.point_count(), 1);
    }

    #[test]
    fn new_job_with_the_same_point_count_starts_without_old_values() {
        let mut state = MapState::new();
        let mut old = projection(3);
        old.channels.insert(Channel::Size, vec![0.0, 0.8, 1.0]);
        old.thumbnail_aspect_ratios = Some(vec![1.5; 3]);
        old.cluster_ids = Some(vec![0, 0, 1]);
        state.set_projection_data(Some(old)).unwrap();

        state.begin_job();
        let columns = state.columns_mut();
        let next: Vec<PointId> = ["a", "b", "c"].iter().map(|id| PointId::new("ds", *id)).collect();
        columns.merge_item_ids(next).unwrap();
        columns.merge_positions(vec![3.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]).unwrap();

        assert_eq!(state.point_count(), 3);
        assert_eq!(state.columns().channel(Channel::Size), None);
        assert_eq!(state.columns().thumbnail_aspect_ratios(), None);
        assert!(state.columns().cluster_ids_are_placeholder());
    }
}
