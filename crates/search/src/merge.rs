//! One poll response → one atomic update of search and map state.
//!
//! Callers hold the write locks of both stores for the duration of
//! [`merge_poll_response`] and publish the returned signals afterwards.

use mapstate::{FitMode, MapState};
use protocol::{Channel, MapResults, PollResponse, fields};
use runtime::Signal;
use tracing::{debug, warn};

use crate::channel_policy::normalize_channel;
use crate::datasets::DatasetRegistry;
use crate::state::{Phase, SearchState};

/// Point size factor once thumbnails are shown.
pub const THUMBNAIL_POINT_SIZE_FACTOR: f64 = 3.0;

/// An atlas the caller should fetch outside the locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasRequest {
    pub filename: String,
    pub sprite_size: Option<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MergeEnd {
    #[default]
    Continue,
    Finished,
    Errored,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub signals: Vec<Signal>,
    pub atlas_to_load: Option<AtlasRequest>,
    pub end: MergeEnd,
}

pub fn merge_poll_response(
    state: &mut SearchState,
    map: &mut MapState,
    datasets: &DatasetRegistry,
    response: PollResponse,
) -> MergeReport {
    let mut report = MergeReport::default();

    if let Some(progress) = &response.progress {
        state.progress = progress.fraction();
        state.progress_step_title = progress.step_title.clone();
        state.show_loading_bar = !progress.embeddings_available;
        report.signals.push(Signal::Progress {
            current_step: progress.current_step,
            total_steps: progress.total_steps,
            step_title: progress.step_title.clone(),
        });
    }
    if let Some(parameters) = response.parameters {
        state.map_parameters = Some(parameters);
    }

    if !response.errors.is_empty() {
        let message = response.errors.join("\n");
        warn!(%message, "map job failed");
        state.reset_results();
        map.reset();
        state.phase = Phase::Errored;
        report.signals.push(Signal::ResetMap);
        report.signals.push(Signal::ErrorNotice { message });
        report.end = MergeEnd::Errored;
        return report;
    }

    if let Some(results) = response.results {
        merge_results(state, map, datasets, results, &mut report);
    }
    if response.finished {
        report.end = MergeEnd::Finished;
    }
    report
}

/// Marks the job finished. `forget_map` drops the map id (404 from the poll endpoint).
pub fn finish_job(state: &mut SearchState, forget_map: bool) -> Vec<Signal> {
    state.phase = Phase::Finished;
    state.show_loading_bar = false;
    state.progress = 1.0;
    let total = state
        .map_total_matches
        .unwrap_or(state.search_results.total_matches);
    state.history.set_last_total_matches(total);

    let map_id = state
        .map_id
        .as_ref()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();
    if forget_map {
        state.completed_map_id = state.map_id.take();
    }
    vec![Signal::JobFinished { map_id }]
}

fn non_empty<T>(values: Option<Vec<T>>) -> Option<Vec<T>> {
    values.filter(|v| !v.is_empty())
}

fn merge_results(
    state: &mut SearchState,
    map: &mut MapState,
    datasets: &DatasetRegistry,
    results: MapResults,
    report: &mut MergeReport,
) {
    let mut geometry_changed = false;
    let mut positions_merged = false;

    if let Some(details) = results.hover_label_data.filter(|d| !d.is_empty()) {
        map.set_item_details(details);
        state.received.insert(fields::HOVER_LABEL_DATA);
    }

    if let Some(mut data) = results.per_point_data {
        let columns = map.columns_mut();

        if let Some(ids) = non_empty(data.item_ids.take()) {
            let count = ids.len() as u64;
            match columns.merge_item_ids(ids) {
                Ok(()) => {
                    state.map_total_matches = Some(count);
                    state.results_loading = false;
                    state.received.insert(fields::ITEM_IDS);
                    geometry_changed = true;
                }
                Err(err) => warn!(%err, "item ids rejected"),
            }
        }

        let x = non_empty(data.positions_x.take());
        let y = non_empty(data.positions_y.take());
        if x.is_some() || y.is_some() {
            let x = x.or_else(|| columns.x().map(<[f32]>::to_vec));
            let y = y.or_else(|| columns.y().map(<[f32]>::to_vec));
            match (x, y) {
                (Some(x), Some(y)) => match columns.merge_positions(x, y) {
                    Ok(()) => {
                        positions_merged = true;
                        geometry_changed = true;
                        if let Some(update) = results.last_position_update {
                            let cursor = state
                                .last_position_update_received
                                .map_or(update, |seen| seen.max(update));
                            state.last_position_update_received = Some(cursor);
                        }
                    }
                    Err(err) => warn!(%err, "positions rejected"),
                },
                _ => debug!("only one position axis received so far"),
            }
        }

        for channel in Channel::ALL {
            let Some(raw) = non_empty(data.take_channel(channel)) else {
                continue;
            };
            let values = normalize_channel(channel, &raw, &state.settings, datasets);
            match columns.merge_channel(channel, values) {
                Ok(()) => {
                    state.received.insert(channel.field_name());
                    geometry_changed = true;
                }
                Err(err) => warn!(%err, %channel, "channel rejected"),
            }
        }

        match non_empty(data.cluster_ids.take()) {
            Some(ids) => match columns.merge_cluster_ids(ids) {
                Ok(()) => {
                    state.received.insert(fields::CLUSTER_IDS);
                    geometry_changed = true;
                }
                Err(err) => warn!(%err, "cluster ids rejected"),
            },
            None if !state.received.contains(fields::CLUSTER_IDS) && columns.x().is_some() => {
                columns.fill_unclustered();
            }
            None => {}
        }

        if let Some(ratios) = non_empty(data.thumbnail_aspect_ratios.take()) {
            match columns.merge_thumbnail_aspect_ratios(ratios) {
                Ok(()) => {
                    state.received.insert(fields::THUMBNAIL_ASPECT_RATIOS);
                    geometry_changed = true;
                }
                Err(err) => warn!(%err, "thumbnail aspect ratios rejected"),
            }
        }
    }

    match results.thumbnail_atlas_filename.as_deref() {
        None => {}
        Some(fields::ATLAS_LOADING) => {
            state.atlas_filename = None;
            if map.atlas().is_some() {
                map.set_atlas(None);
                geometry_changed = true;
            }
        }
        Some(filename) => {
            if state.atlas_filename.as_deref() != Some(filename) {
                state.atlas_filename = Some(filename.to_string());
                state.received.insert(fields::THUMBNAIL_ATLAS_FILENAME);
                let rendering = &mut state.settings.frontend.rendering;
                rendering.point_size_factor = THUMBNAIL_POINT_SIZE_FACTOR;
                rendering.max_opacity = 1.0;
                report.atlas_to_load = Some(AtlasRequest {
                    filename: filename.to_string(),
                    sprite_size: results.thumbnail_sprite_size,
                });
            }
        }
    }

    if let Some(clusters) = results.clusters.filter(|c| !c.is_empty()) {
        map.set_clusters(clusters);
        state.received.insert(fields::CLUSTERS);
    }

    if geometry_changed {
        report.signals.push(Signal::UpdateGeometry);
    }

    if positions_merged {
        if state.viewport_adjusted {
            map.fit_viewport(FitMode::Smooth);
            report.signals.push(Signal::FitViewport { instant: false });
        } else {
            map.viewport.reset_pan_and_zoom();
            map.fit_viewport(FitMode::Instant);
            state.viewport_adjusted = true;
            report.signals.push(Signal::ResetPanAndZoom);
            report.signals.push(Signal::FitViewport { instant: true });
        }
    }

    if let Some(score_info) = results.search_result_score_info {
        state.score_info = Some(score_info);
        state.received.insert(fields::SEARCH_RESULT_SCORE_INFO);
        report.signals.push(Signal::ShowScoreInfo);
    }
    if let Some(answer) = results.answer {
        state.answer = Some(answer);
    }
    if let Some(timings) = results.timings {
        state.map_timings = Some(timings);
    }
}
