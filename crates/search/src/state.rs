use foundation::MapId;
use protocol::{SearchListResponse, SearchSettings, StoredMap};
use serde_json::Value;

use crate::exclusions::ReceivedFields;
use crate::history::SearchHistory;

/// Where the current search is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    SearchSubmitted,
    MapRequested,
    MapInProgress,
    Finished,
    Errored,
    /// An empty query reset everything instead of searching.
    Cleared,
}

/// How a poll loop ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobEnd {
    Finished,
    Errored,
    /// A newer job or a reset took over.
    Superseded,
}

/// Everything the orchestration store tracks besides the map itself.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub settings: SearchSettings,
    pub phase: Phase,
    pub map_id: Option<MapId>,
    /// Map id of a job the poll endpoint no longer knows; still valid for
    /// storing the map or narrowing down on one of its clusters.
    pub completed_map_id: Option<MapId>,
    pub received: ReceivedFields,
    pub last_position_update_received: Option<f64>,
    pub viewport_adjusted: bool,

    pub progress: f64,
    pub progress_step_title: String,
    pub show_loading_bar: bool,
    pub map_parameters: Option<Value>,

    pub search_results: SearchListResponse,
    pub results_loading: bool,
    pub map_total_matches: Option<u64>,

    pub score_info: Option<Value>,
    pub answer: Option<String>,
    pub map_timings: Option<Value>,
    pub atlas_filename: Option<String>,
    pub selected_document: Option<usize>,

    pub history: SearchHistory,
    pub stored_maps: Vec<StoredMap>,
}

impl SearchState {
    pub fn new(settings: SearchSettings, store_history: bool) -> Self {
        Self {
            settings,
            history: SearchHistory::new(store_history),
            ..Self::default()
        }
    }

    /// Drops all per-search results. Settings, history and stored maps stay.
    pub fn reset_results(&mut self) {
        self.map_id = None;
        self.completed_map_id = None;
        self.received.clear();
        self.last_position_update_received = None;
        self.viewport_adjusted = false;
        self.progress = 0.0;
        self.progress_step_title.clear();
        self.show_loading_bar = false;
        self.map_parameters = None;
        self.search_results = SearchListResponse::default();
        self.results_loading = false;
        self.map_total_matches = None;
        self.score_info = None;
        self.answer = None;
        self.map_timings = None;
        self.atlas_filename = None;
        self.selected_document = None;
    }

    /// The id of the map on screen, whether or not its job is still running.
    pub fn displayed_map_id(&self) -> Option<&MapId> {
        self.map_id.as_ref().or(self.completed_map_id.as_ref())
    }

    pub fn is_map_in_progress(&self) -> bool {
        self.phase == Phase::MapInProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_settings_and_history() {
        let mut settings = SearchSettings::default();
        settings.search.all_field_query = "cats".to_string();
        let mut state = SearchState::new(settings.clone(), true);
        state.history.record("cats", &settings);
        state.map_id = Some(MapId::new("m1"));
        state.received.insert("hue");
        state.last_position_update_received = Some(3.0);
        state.answer = Some("yes".to_string());

        state.reset_results();
        let once = format!("{state:?}");
        state.reset_results();
        assert_eq!(once, format!("{state:?}"));

        assert!(state.map_id.is_none());
        assert!(state.received.is_empty());
        assert!(state.last_position_update_received.is_none());
        assert_eq!(state.settings, settings);
        assert_eq!(state.history.entries().len(), 1);
    }
}
