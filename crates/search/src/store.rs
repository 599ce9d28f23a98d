//! The orchestration store: search submission and the map poll loop.
//!
//! Lock order is `epochs`, then `state`, then the map, then `datasets`. No
//! lock is held across an `.await`.

use std::sync::Arc;

use foundation::MapId;
use mapstate::SharedMapState;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use protocol::{
    ChannelSource, ClusterDescriptor, DatasetInfo, MapCreated, PollRequest, PollResponse, SearchHistoryRequest,
    SearchListResponse, SearchSettings, SearchType, SourceKind, StoreMapRequest, StoredMap,
    StoredMapRequest, StoredMapResponse, dataset::DatasetRequest, paths,
};
use runtime::{EventBus, JobEpochs, JobLease, Signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use transport::{ClientConfig, Transport, post_json};

use crate::atlas::load_atlas;
use crate::datasets::DatasetRegistry;
use crate::error::SearchError;
use crate::history::map_name;
use crate::merge::{AtlasRequest, MergeEnd, finish_job, merge_poll_response};
use crate::query_rewrite::extract_phrase_filters;
use crate::session::SessionGate;
use crate::state::{JobEnd, Phase, SearchState};

/// Result of asking for a search.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The session gate refused; a login is required.
    Blocked,
    /// No dataset is selected.
    Ignored,
    /// The query was empty; results and map were reset instead.
    Cleared,
    /// Another search or a reset took over before the map job started.
    Superseded,
    /// A stored map could not be restored.
    StoredMapMissing,
    Started(MapJob),
}

impl SearchOutcome {
    pub fn into_job(self) -> Option<MapJob> {
        match self {
            SearchOutcome::Started(job) => Some(job),
            _ => None,
        }
    }
}

/// A running poll loop.
#[derive(Debug)]
pub struct MapJob {
    pub map_id: MapId,
    handle: JoinHandle<JobEnd>,
}

impl MapJob {
    /// Waits for the poll loop to end.
    pub async fn finished(self) -> JobEnd {
        match self.handle.await {
            Ok(end) => end,
            Err(err) => {
                error!(map_id = %self.map_id, %err, "poll loop aborted");
                JobEnd::Errored
            }
        }
    }
}

struct Shared<T> {
    transport: T,
    config: ClientConfig,
    events: EventBus,
    map: SharedMapState,
    state: RwLock<SearchState>,
    epochs: Mutex<JobEpochs>,
    defaults: Arc<SearchSettings>,
    datasets: RwLock<DatasetRegistry>,
    session: Mutex<SessionGate>,
}

/// Cheap to clone; clones share all state.
pub struct SearchStore<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for SearchStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> SearchStore<T> {
    /// `defaults` is kept as the snapshot that [`Self::reset_settings_to_default`] restores.
    pub fn new(
        transport: T,
        config: ClientConfig,
        defaults: SearchSettings,
        map: SharedMapState,
        events: EventBus,
    ) -> Self {
        let state = SearchState::new(defaults.clone(), config.store_search_history);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                events,
                map,
                state: RwLock::new(state),
                epochs: Mutex::new(JobEpochs::new()),
                defaults: Arc::new(defaults),
                datasets: RwLock::new(DatasetRegistry::new()),
                session: Mutex::new(SessionGate::new(false)),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn map(&self) -> &SharedMapState {
        &self.shared.map
    }

    pub fn state(&self) -> RwLockReadGuard<'_, SearchState> {
        self.shared.state.read()
    }

    pub fn settings(&self) -> SearchSettings {
        self.shared.state.read().settings.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.read().phase
    }

    pub fn map_id(&self) -> Option<MapId> {
        self.shared.state.read().map_id.clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut SearchSettings)) {
        update(&mut self.shared.state.write().settings);
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.shared.session.lock().set_logged_in(logged_in);
    }

    pub fn current_map_name(&self) -> String {
        map_name(&self.shared.state.read().settings)
    }

    fn emit_all(&self, signals: Vec<Signal>) {
        for signal in signals {
            self.shared.events.emit(signal);
        }
    }

    fn is_current(&self, lease: &JobLease) -> bool {
        self.shared.epochs.lock().is_current(lease)
    }

    /// Submits the current settings: search list first, then the map job.
    pub async fn request_search_results(&self) -> Result<SearchOutcome, SearchError> {
        let (no_datasets, empty_query) = {
            let state = self.shared.state.read();
            (state.settings.dataset_ids.is_empty(), state.settings.has_empty_query())
        };
        if no_datasets {
            debug!("search ignored, no dataset selected");
            return Ok(SearchOutcome::Ignored);
        }
        if empty_query {
            self.reset_search_results_and_map(false);
            self.shared.state.write().phase = Phase::Cleared;
            return Ok(SearchOutcome::Cleared);
        }
        if !self.shared.session.lock().admit_search() {
            info!("search blocked until login");
            self.shared.events.emit(Signal::LoginRequired);
            return Ok(SearchOutcome::Blocked);
        }

        let lease = self.shared.epochs.lock().begin();
        let (settings, history_item) = {
            let mut state = self.shared.state.write();
            state.reset_results();
            state.phase = Phase::SearchSubmitted;
            state.results_loading = true;
            state.show_loading_bar = true;
            let moved = extract_phrase_filters(&mut state.settings.search);
            if moved > 0 {
                debug!(moved, "quoted phrases turned into filters");
            }
            let settings = state.settings.clone();
            let name = map_name(&settings);
            let history_item = state.history.record(&name, &settings).map(|entry| SearchHistoryRequest {
                name: entry.name.clone(),
                parameters: entry.parameters.clone(),
                total_matches: None,
            });
            (settings, history_item)
        };
        self.shared.map.write().begin_job();
        self.emit_all(vec![Signal::RegenerateAttributeArrays, Signal::ShowResultsTab]);
        if let Some(item) = history_item {
            self.spawn_history_upload(item);
        }

        let path = paths::with_ignore_cache(paths::SEARCH_LIST_RESULT, self.shared.config.ignore_cache);
        let results: SearchListResponse = match post_json(&self.shared.transport, &path, &settings).await {
            Ok(results) => results,
            Err(err) => {
                self.fail_if_current(&lease);
                return Err(err.into());
            }
        };
        {
            let epochs = self.shared.epochs.lock();
            if !epochs.is_current(&lease) {
                return Ok(SearchOutcome::Superseded);
            }
            let mut state = self.shared.state.write();
            debug!(total = results.total_matches, "search results received");
            state.search_results = results;
            state.phase = Phase::MapRequested;
        }

        self.request_map(lease, &settings).await
    }

    async fn request_map(&self, lease: JobLease, settings: &SearchSettings) -> Result<SearchOutcome, SearchError> {
        let path = paths::with_ignore_cache(paths::MAP, self.shared.config.ignore_cache);
        let created: MapCreated = match post_json(&self.shared.transport, &path, settings).await {
            Ok(created) => created,
            Err(err) => {
                self.fail_if_current(&lease);
                return Err(err.into());
            }
        };
        Ok(self.start_polling(lease, created.map_id))
    }

    fn start_polling(&self, lease: JobLease, map_id: MapId) -> SearchOutcome {
        {
            let epochs = self.shared.epochs.lock();
            if !epochs.is_current(&lease) {
                return SearchOutcome::Superseded;
            }
            let mut state = self.shared.state.write();
            state.map_id = Some(map_id.clone());
            state.viewport_adjusted = false;
            state.phase = Phase::MapInProgress;
        }
        info!(%map_id, "map job started");
        let store = self.clone();
        let handle = tokio::spawn(async move { store.poll_loop(lease).await });
        SearchOutcome::Started(MapJob { map_id, handle })
    }

    fn fail_if_current(&self, lease: &JobLease) {
        let epochs = self.shared.epochs.lock();
        if epochs.is_current(lease) {
            let mut state = self.shared.state.write();
            state.phase = Phase::Errored;
            state.results_loading = false;
            state.show_loading_bar = false;
        }
    }

    fn spawn_history_upload(&self, item: SearchHistoryRequest) {
        let store = self.clone();
        tokio::spawn(async move {
            let uploaded: Result<serde_json::Value, _> =
                post_json(&store.shared.transport, paths::ADD_SEARCH_HISTORY_ITEM, &item).await;
            if let Err(err) = uploaded {
                warn!(%err, name = %item.name, "search history item not stored");
            }
        });
    }

    async fn poll_loop(self, lease: JobLease) -> JobEnd {
        loop {
            let request = {
                let epochs = self.shared.epochs.lock();
                if !epochs.is_current(&lease) {
                    return JobEnd::Superseded;
                }
                let state = self.shared.state.read();
                let Some(map_id) = state.map_id.clone() else {
                    return JobEnd::Superseded;
                };
                PollRequest {
                    map_id,
                    exclude_fields: state.received.exclusion_list(self.shared.config.debug_autocut),
                    last_position_update_received: state.last_position_update_received,
                }
            };
            let body = match serde_json::to_vec(&request) {
                Ok(body) => body,
                Err(err) => {
                    error!(%err, "poll request not serializable");
                    return JobEnd::Errored;
                }
            };

            let result = self
                .shared
                .transport
                .post(paths::MAP_RESULT, body, self.shared.config.accept)
                .await;
            if !self.is_current(&lease) {
                debug!(map_id = %request.map_id, "stale poll response discarded");
                return JobEnd::Superseded;
            }

            match result {
                Ok(response) if response.is_not_found() => {
                    debug!(map_id = %request.map_id, "map job gone, polling stops");
                    return self.finish(&lease, true);
                }
                Ok(response) if response.is_success() => match response.decode::<PollResponse>() {
                    Ok(poll) => match self.apply_poll(&lease, poll) {
                        None => return JobEnd::Superseded,
                        Some(MergeEnd::Continue) => {}
                        Some(MergeEnd::Finished) => return self.finish(&lease, false),
                        Some(MergeEnd::Errored) => return JobEnd::Errored,
                    },
                    Err(err) => warn!(%err, "undecodable poll response"),
                },
                Ok(response) => warn!(status = response.status, "poll failed"),
                Err(err) => warn!(%err, "poll request failed"),
            }

            tokio::select! {
                _ = lease.cancelled() => return JobEnd::Superseded,
                _ = tokio::time::sleep(self.shared.config.poll_interval) => {}
            }
        }
    }

    /// Merges one poll response under all locks. `None` if the lease went stale.
    fn apply_poll(&self, lease: &JobLease, poll: PollResponse) -> Option<MergeEnd> {
        let report = {
            let epochs = self.shared.epochs.lock();
            if !epochs.is_current(lease) {
                return None;
            }
            let mut state = self.shared.state.write();
            let mut map = self.shared.map.write();
            let datasets = self.shared.datasets.read();
            merge_poll_response(&mut state, &mut map, &datasets, poll)
        };
        self.emit_all(report.signals);
        if let Some(request) = report.atlas_to_load {
            self.spawn_atlas_load(lease.clone(), request);
        }
        Some(report.end)
    }

    fn finish(&self, lease: &JobLease, forget_map: bool) -> JobEnd {
        let signals = {
            let epochs = self.shared.epochs.lock();
            if !epochs.is_current(lease) {
                return JobEnd::Superseded;
            }
            finish_job(&mut self.shared.state.write(), forget_map)
        };
        self.emit_all(signals);
        JobEnd::Finished
    }

    fn spawn_atlas_load(&self, lease: JobLease, request: AtlasRequest) {
        let store = self.clone();
        tokio::spawn(async move {
            let atlas = match load_atlas(&store.shared.transport, &request).await {
                Ok(atlas) => atlas,
                Err(err) => {
                    warn!(%err, "thumbnail atlas not loaded");
                    return;
                }
            };
            {
                let epochs = store.shared.epochs.lock();
                if !epochs.is_current(&lease) {
                    return;
                }
                let state = store.shared.state.read();
                if state.atlas_filename.as_deref() != Some(atlas.filename.as_str()) {
                    debug!(filename = %atlas.filename, "outdated thumbnail atlas dropped");
                    return;
                }
                store.shared.map.write().set_atlas(Some(atlas));
            }
            store.shared.events.emit(Signal::UpdateGeometry);
        });
    }

    /// Stops any running job and clears all results. The map keeps its
    /// points when `leave_map_unchanged` is set.
    pub fn reset_search_results_and_map(&self, leave_map_unchanged: bool) {
        self.shared.epochs.lock().invalidate();
        {
            let mut state = self.shared.state.write();
            state.reset_results();
            state.phase = Phase::Idle;
        }
        if !leave_map_unchanged {
            self.shared.map.write().reset();
            self.shared.events.emit(Signal::ResetMap);
        }
    }

    /// Back to an empty free-text search; projection and rendering return to their defaults.
    pub fn reset_search_box(&self) {
        let defaults = Arc::clone(&self.shared.defaults);
        let mut state = self.shared.state.write();
        let search = &mut state.settings.search;
        search.search_type = SearchType::ExternalInput;
        search.use_separate_queries = false;
        search.all_field_query.clear();
        search.all_field_query_negative.clear();
        search.origin_display_name.clear();
        search.cluster_origin_map_id = None;
        search.cluster_id = None;
        search.collection_id = None;
        search.collection_class = None;
        search.similar_to_item_id = None;
        state.settings.projection = defaults.projection.clone();
        state.settings.rendering = defaults.rendering.clone();
    }

    /// Restores the default settings, keeping the dataset selection.
    pub fn reset_settings_to_default(&self) {
        let mut settings = (*self.shared.defaults).clone();
        let mut state = self.shared.state.write();
        settings.dataset_ids = std::mem::take(&mut state.settings.dataset_ids);
        state.settings = settings;
    }

    fn clear_free_text(settings: &mut SearchSettings, search_type: SearchType) {
        let search = &mut settings.search;
        search.search_type = search_type;
        search.use_separate_queries = false;
        search.all_field_query.clear();
        search.all_field_query_negative.clear();
    }

    /// New search restricted to one cluster of the displayed map.
    pub async fn narrow_down_on_cluster(&self, cluster: &ClusterDescriptor) -> Result<SearchOutcome, SearchError> {
        {
            let mut state = self.shared.state.write();
            let origin = state.displayed_map_id().cloned().ok_or(SearchError::NoMap)?;
            Self::clear_free_text(&mut state.settings, SearchType::Cluster);
            let search = &mut state.settings.search;
            search.cluster_origin_map_id = Some(origin);
            search.cluster_id = Some(cluster.id);
            search.origin_display_name = cluster.title.clone();
        }
        self.request_search_results().await
    }

    pub async fn show_global_map(&self) -> Result<SearchOutcome, SearchError> {
        {
            let mut state = self.shared.state.write();
            Self::clear_free_text(&mut state.settings, SearchType::GlobalMap);
            state.settings.search.origin_display_name.clear();
        }
        self.request_search_results().await
    }

    /// New search for items similar to the open document, laid out by score
    /// on a polar projection.
    pub async fn show_similar_items(&self) -> Result<SearchOutcome, SearchError> {
        let index = self
            .shared
            .state
            .read()
            .selected_document
            .ok_or(SearchError::NoDocumentSelected)?;
        let (item_id, title) = {
            let map = self.shared.map.read();
            let item_id = map.point_id(index).clone();
            let datasets = self.shared.datasets.read();
            let title = datasets
                .get(&item_id.dataset_id)
                .and_then(|info| info.hover_label_rendering.title.as_ref())
                .map(|template| map.hover_label(index, template))
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| item_id.item_id.clone());
            (item_id, title)
        };
        {
            let mut state = self.shared.state.write();
            Self::clear_free_text(&mut state.settings, SearchType::SimilarToItem);
            state.settings.search.similar_to_item_id = Some(item_id);
            state.settings.search.origin_display_name = title;
            let projection = &mut state.settings.projection;
            projection.use_polar_projection = true;
            projection.x_axis = ChannelSource::new(SourceKind::Score, "");
            projection.y_axis = ChannelSource::new(SourceKind::Umap, "primary");
        }
        self.request_search_results().await
    }

    /// Maps the items of a collection, or of one of its classes.
    pub async fn show_collection_as_map(
        &self,
        collection_id: &str,
        class_name: Option<&str>,
        display_name: &str,
    ) -> Result<SearchOutcome, SearchError> {
        {
            let mut state = self.shared.state.write();
            Self::clear_free_text(&mut state.settings, SearchType::Collection);
            let search = &mut state.settings.search;
            search.collection_id = Some(collection_id.to_string());
            search.collection_class = class_name.map(str::to_string);
            search.origin_display_name = display_name.to_string();
        }
        self.request_search_results().await
    }

    pub async fn run_search_from_history(&self, index: usize) -> Result<SearchOutcome, SearchError> {
        {
            let mut state = self.shared.state.write();
            let parameters = state
                .history
                .get(index)
                .map(|entry| entry.parameters.clone())
                .ok_or(SearchError::UnknownHistoryEntry(index))?;
            state.settings = parameters;
        }
        self.request_search_results().await
    }

    /// Restores the settings of a stored map and resumes polling its job.
    pub async fn show_stored_map(&self, map_id: MapId) -> Result<SearchOutcome, SearchError> {
        self.reset_search_results_and_map(false);
        self.shared.events.emit(Signal::ShowResultsTab);
        let lease = self.shared.epochs.lock().begin();

        let body = StoredMapRequest { map_id: map_id.clone() };
        let stored: StoredMapResponse = match post_json(&self.shared.transport, paths::STORED_MAP, &body).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(%map_id, %err, "stored map unavailable");
                if self.is_current(&lease) {
                    self.reset_search_results_and_map(false);
                    self.shared.events.emit(Signal::Notice {
                        message: format!("The stored map '{map_id}' is no longer available."),
                    });
                }
                return Ok(SearchOutcome::StoredMapMissing);
            }
        };
        {
            let epochs = self.shared.epochs.lock();
            if !epochs.is_current(&lease) {
                return Ok(SearchOutcome::Superseded);
            }
            let mut state = self.shared.state.write();
            state.settings = stored.parameters;
            if let Some(results) = stored.search_result {
                state.search_results = results;
            }
        }
        self.shared.events.emit(Signal::RegenerateAttributeArrays);
        Ok(self.start_polling(lease, map_id))
    }

    /// Stores the displayed map under its current name.
    pub async fn store_current_map(&self) -> Result<StoredMap, SearchError> {
        let body = {
            let state = self.shared.state.read();
            let name = map_name(&state.settings);
            if name.is_empty() {
                return Err(SearchError::Unnamed);
            }
            let map_id = state.displayed_map_id().cloned().ok_or(SearchError::NoMap)?;
            StoreMapRequest {
                name,
                map_id,
                dataset_ids: state.settings.dataset_ids.clone(),
            }
        };
        let stored: StoredMap = post_json(&self.shared.transport, paths::STORE_MAP, &body).await?;
        self.shared.state.write().stored_maps.push(stored.clone());
        Ok(stored)
    }

    /// Opens point `index`: marks it visited and flattens it.
    ///
    /// Panics if `index` is not a loaded point.
    pub fn show_document_details(&self, index: usize) {
        let flatness_fallback = {
            let mut state = self.shared.state.write();
            state.selected_document = Some(index);
            state.settings.frontend.rendering.flatness.fallback as f32
        };
        self.shared.map.write().mark_visited(index, flatness_fallback);
        self.shared.events.emit(Signal::UpdateGeometry);
    }

    pub fn close_document_details(&self) {
        self.shared.state.write().selected_document = None;
        self.shared.map.write().clear_marked();
    }

    pub fn register_dataset(&self, info: DatasetInfo) {
        self.shared.datasets.write().insert(info);
    }

    pub fn dataset(&self, dataset_id: &str) -> Option<DatasetInfo> {
        self.shared.datasets.read().get(dataset_id).cloned()
    }

    /// Dataset metadata, fetched once and cached.
    pub async fn retrieve_dataset(&self, dataset_id: &str) -> Result<DatasetInfo, SearchError> {
        if let Some(info) = self.dataset(dataset_id) {
            return Ok(info);
        }
        let body = DatasetRequest {
            dataset_id: dataset_id.to_string(),
        };
        let info: DatasetInfo = post_json(&self.shared.transport, paths::DATASET, &body).await?;
        self.register_dataset(info.clone());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use foundation::PointId;
    use mapstate::MapState;
    use pretty_assertions::assert_eq;
    use protocol::{Channel, FilterOperator, MapResults, PerPointData, Progress, fields};
    use serde_json::json;
    use transport::TransportResponse;
    use transport::mock::MockTransport;

    fn store() -> SearchStore<MockTransport> {
        let mut defaults = SearchSettings::default();
        defaults.dataset_ids = vec!["ds".to_string()];
        let store = SearchStore::new(
            MockTransport::new(),
            ClientConfig::default(),
            defaults,
            MapState::new().shared(),
            EventBus::new(),
        );
        store.set_logged_in(true);
        store
    }

    fn points(n: usize) -> PollResponse {
        PollResponse {
            progress: Some(Progress {
                current_step: 1,
                total_steps: 3,
                step_title: "Projecting".into(),
                embeddings_available: true,
            }),
            results: Some(MapResults {
                per_point_data: Some(PerPointData {
                    item_ids: Some((0..n).map(|i| PointId::new("ds", format!("i{i}"))).collect()),
                    positions_x: Some((0..n).map(|i| i as f32).collect()),
                    positions_y: Some((0..n).map(|i| i as f32 * 0.5).collect()),
                    ..PerPointData::default()
                }),
                ..MapResults::default()
            }),
            ..PollResponse::default()
        }
    }

    fn script_search(transport: &MockTransport, map_id: &str) {
        transport.push_json(paths::SEARCH_LIST_RESULT, 200, &json!({"total_matches": 2}));
        transport.push_json(paths::MAP, 200, &json!({ "map_id": map_id }));
    }

    fn query(store: &SearchStore<MockTransport>, text: &str) {
        store.update_settings(|s| s.search.all_field_query = text.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn cats_search_polls_until_not_found() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_cbor(paths::MAP_RESULT, 200, &points(2));
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        assert_eq!(job.map_id.as_str(), "m1");
        assert_eq!(job.finished().await, JobEnd::Finished);

        let polls = transport.requests_to(paths::MAP_RESULT);
        assert_eq!(polls.len(), 2);
        assert!(polls.iter().all(|p| p.accept == Some(protocol::Encoding::Cbor)));
        let first: PollRequest = polls[0].json();
        assert_eq!(first.map_id.as_str(), "m1");
        assert_eq!(first.last_position_update_received, None);

        let map = store.map().read();
        assert_eq!(map.point_count(), 2);
        assert_eq!(map.columns().cluster_ids(), Some(&[-1i64, -1][..]));
        drop(map);

        let signals = store.events().signals();
        assert!(signals.contains(&Signal::FitViewport { instant: true }));
        assert!(signals.contains(&Signal::JobFinished { map_id: "m1".into() }));
        assert_eq!(store.phase(), Phase::Finished);
        assert!(store.map_id().is_none());
        assert_eq!(store.state().map_total_matches, Some(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.requests_to(paths::MAP_RESULT).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_search_supersedes_running_job() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "a");
        transport.push_json_delayed(paths::MAP_RESULT, &points(3), Duration::from_millis(50));
        script_search(transport, "b");
        transport.push_json(paths::MAP_RESULT, 200, &points(2));
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, "first");
        let first = store.request_search_results().await.unwrap().into_job().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        query(&store, "second");
        let second = store.request_search_results().await.unwrap().into_job().unwrap();

        assert_eq!(second.finished().await, JobEnd::Finished);
        assert_eq!(first.finished().await, JobEnd::Superseded);
        assert_eq!(store.map().read().point_count(), 2);
        assert_eq!(
            store.state().displayed_map_id().map(MapId::as_str),
            Some("b")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exclusions_grow_across_polls() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        let mut clusters = points(2);
        if let Some(results) = clusters.results.as_mut() {
            results.clusters = Some(
                [("0".to_string(), ClusterDescriptor {
                    id: 0,
                    title: "Tabbies".into(),
                    center_x: Some(0.5),
                    center_y: Some(0.5),
                })]
                .into(),
            );
            results.last_position_update = Some(12.5);
            if let Some(data) = results.per_point_data.as_mut() {
                data.set_channel(Channel::Size, vec![1.0, 2.0]);
            }
        }
        transport.push_json(paths::MAP_RESULT, 200, &clusters);
        transport.push_json(paths::MAP_RESULT, 200, &PollResponse::default());
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        assert_eq!(job.finished().await, JobEnd::Finished);

        let polls: Vec<PollRequest> = transport
            .requests_to(paths::MAP_RESULT)
            .iter()
            .map(|r| r.json())
            .collect();
        assert_eq!(polls.len(), 3);
        for pair in polls.windows(2) {
            assert!(pair[1].exclude_fields.is_superset(&pair[0].exclude_fields));
        }
        assert!(polls[0].exclude_fields.contains(fields::PARAMETERS));
        assert!(!polls[0].exclude_fields.contains(fields::CLUSTERS));
        assert!(polls[1].exclude_fields.contains(fields::CLUSTERS));
        assert!(polls[1].exclude_fields.contains("size"));
        assert_eq!(polls[1].last_position_update_received, Some(12.5));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_failures_keep_polling() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_error(paths::MAP_RESULT, "connection reset");
        transport.push_status(paths::MAP_RESULT, 502);
        transport.push_response(
            paths::MAP_RESULT,
            TransportResponse::new(200, Some("application/cbor"), b"\xff\x00".to_vec()),
        );
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        assert_eq!(job.finished().await, JobEnd::Finished);
        assert_eq!(transport.requests_to(paths::MAP_RESULT).len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_errors_end_the_job() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        let mut failed = points(2);
        failed.errors = vec!["no vectors for this dataset".into()];
        transport.push_json(paths::MAP_RESULT, 200, &failed);

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        assert_eq!(job.finished().await, JobEnd::Errored);

        assert_eq!(store.phase(), Phase::Errored);
        assert_eq!(store.map().read().point_count(), 0);
        assert_eq!(transport.requests_to(paths::MAP_RESULT).len(), 1);
        assert!(store.events().signals().contains(&Signal::ErrorNotice {
            message: "no vectors for this dataset".into()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn atlas_is_installed_for_current_job() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        let mut with_atlas = points(2);
        if let Some(results) = with_atlas.results.as_mut() {
            results.thumbnail_atlas_filename = Some("m1.png".into());
            results.thumbnail_sprite_size = Some(16);
        }
        transport.push_cbor(paths::MAP_RESULT, 200, &with_atlas);
        transport.push_status(paths::MAP_RESULT, 404);
        transport.push_response(
            &paths::thumbnail_atlas("m1.png"),
            TransportResponse::new(200, Some("image/png"), crate::atlas::png_bytes(2, 2)),
        );

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        assert_eq!(job.finished().await, JobEnd::Finished);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let map = store.map().read();
        let atlas = map.atlas().unwrap();
        assert_eq!(atlas.filename, "m1.png");
        assert_eq!(atlas.sprite_size, 16);
    }

    #[tokio::test]
    async fn guards_run_before_any_request() {
        let store = store();
        store.update_settings(|s| s.dataset_ids.clear());
        query(&store, "cats");
        assert!(matches!(store.request_search_results().await, Ok(SearchOutcome::Ignored)));

        store.update_settings(|s| {
            s.dataset_ids = vec!["ds".into()];
            s.search.all_field_query = "   ".into();
        });
        assert!(matches!(store.request_search_results().await, Ok(SearchOutcome::Cleared)));
        assert_eq!(store.phase(), Phase::Cleared);
        assert!(store.events().signals().contains(&Signal::ResetMap));
        assert!(store.transport().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_users_are_asked_to_log_in() {
        let store = store();
        store.set_logged_in(false);
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        job.finished().await;
        query(&store, "dogs");
        assert!(matches!(store.request_search_results().await, Ok(SearchOutcome::Blocked)));
        assert!(store.events().signals().contains(&Signal::LoginRequired));
        assert_eq!(transport.requests_to(paths::SEARCH_LIST_RESULT).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quoted_phrases_are_sent_as_filters() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_status(paths::MAP_RESULT, 404);

        query(&store, r#"cats "maine coon""#);
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        job.finished().await;

        let sent: SearchSettings = transport.requests_to(paths::SEARCH_LIST_RESULT)[0].json();
        assert_eq!(sent.search.all_field_query, "cats maine coon");
        assert_eq!(sent.search.filters.len(), 1);
        assert_eq!(sent.search.filters[0].operator, FilterOperator::Contains);
        assert!(transport.requests_to(paths::SEARCH_LIST_RESULT)[0].path.ends_with("?ignore_cache=false"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_is_idempotent_and_stops_the_job() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_json(paths::MAP_RESULT, 200, &points(2));
        transport.push_json_delayed(paths::MAP_RESULT, &points(2), Duration::from_secs(5));

        query(&store, "cats");
        let job = store.request_search_results().await.unwrap().into_job().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        store.reset_search_results_and_map(false);
        let once = (format!("{:?}", *store.state()), store.map().read().point_count());
        store.reset_search_results_and_map(false);
        let twice = (format!("{:?}", *store.state()), store.map().read().point_count());
        assert_eq!(once, twice);
        assert_eq!(once.1, 0);
        assert_eq!(job.finished().await, JobEnd::Superseded);
        assert_eq!(store.map().read().point_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_stored_map_leaves_a_clean_state() {
        let store = store();
        store.transport().push_status(paths::STORED_MAP, 404);

        let outcome = store.show_stored_map(MapId::new("gone")).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::StoredMapMissing));
        assert!(store.map_id().is_none());
        assert!(
            store
                .events()
                .signals()
                .iter()
                .any(|s| matches!(s, Signal::Notice { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stored_map_resumes_polling() {
        let store = store();
        let transport = store.transport();
        transport.push_json(
            paths::STORED_MAP,
            200,
            &json!({"parameters": {"dataset_ids": ["ds"], "search": {"all_field_query": "dogs"}}}),
        );
        transport.push_json(paths::MAP_RESULT, 200, &points(2));
        transport.push_status(paths::MAP_RESULT, 404);

        let job = store
            .show_stored_map(MapId::new("s1"))
            .await
            .unwrap()
            .into_job()
            .unwrap();
        assert_eq!(job.finished().await, JobEnd::Finished);
        assert_eq!(store.settings().search.all_field_query, "dogs");
        assert_eq!(store.map().read().point_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn derived_searches_rewrite_settings() {
        let store = store();
        let transport = store.transport();
        script_search(transport, "m1");
        transport.push_json(paths::MAP_RESULT, 200, &points(2));
        transport.push_status(paths::MAP_RESULT, 404);
        query(&store, "cats");
        store.request_search_results().await.unwrap().into_job().unwrap().finished().await;

        transport.push_json(paths::STORE_MAP, 200, &json!({"id": "st1", "name": "cats", "map_id": "m1"}));
        let stored = store.store_current_map().await.unwrap();
        assert_eq!(stored.id, "st1");
        let body: StoreMapRequest = transport.requests_to(paths::STORE_MAP)[0].json();
        assert_eq!(body.map_id.as_str(), "m1");

        store.show_document_details(1);
        assert_eq!(store.map().read().columns().channel_value(Channel::Flatness, 1, 0.0), 1.0);
        assert!(store.map().read().selection.visited.contains(1));

        script_search(transport, "m2");
        transport.push_status(paths::MAP_RESULT, 404);
        store.show_similar_items().await.unwrap().into_job().unwrap().finished().await;
        let settings = store.settings();
        assert_eq!(settings.search.search_type, SearchType::SimilarToItem);
        assert_eq!(settings.search.similar_to_item_id, Some(PointId::new("ds", "i1")));
        assert!(settings.projection.use_polar_projection);
        assert_eq!(store.current_map_name(), "Similar to 'i1'");

        script_search(transport, "m3");
        transport.push_status(paths::MAP_RESULT, 404);
        let cluster = ClusterDescriptor {
            id: 4,
            title: "Kittens".into(),
            center_x: None,
            center_y: None,
        };
        store.narrow_down_on_cluster(&cluster).await.unwrap().into_job().unwrap().finished().await;
        let search = store.settings().search;
        assert_eq!(search.cluster_id, Some(4));
        assert_eq!(search.cluster_origin_map_id.as_ref().map(MapId::as_str), Some("m2"));

        store.reset_settings_to_default();
        assert_eq!(store.settings().search.search_type, SearchType::ExternalInput);
        assert_eq!(store.settings().dataset_ids, vec!["ds".to_string()]);
        assert_eq!(store.state().history.entries().len(), 3);
    }

    #[tokio::test]
    async fn datasets_are_fetched_once() {
        let store = store();
        store.transport().push_json(
            paths::DATASET,
            200,
            &json!({"id": "ds", "name": "Papers", "object_fields": {}}),
        );
        assert_eq!(store.retrieve_dataset("ds").await.unwrap().name, "Papers");
        assert_eq!(store.retrieve_dataset("ds").await.unwrap().name, "Papers");
        assert_eq!(store.transport().requests_to(paths::DATASET).len(), 1);
    }
}
