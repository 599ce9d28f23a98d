//! In-memory map jobs that reveal their results step by step.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::io::Cursor;
use std::time::{Duration, Instant};

use foundation::MapId;
use parking_lot::Mutex;
use protocol::map::{ClusterDescriptor, MapResults, PerPointData, PollRequest, PollResponse, Progress};
use protocol::{Channel, SearchSettings, SourceKind, StoredMap, StoredMapResponse, fields};
use serde_json::json;
use tracing::{debug, info};

use crate::corpus::{Corpus, Hit, details, query_text, unit_hash};

pub const TOTAL_STEPS: u32 = 4;
pub const SPRITE_SIZE: u32 = 32;
const STEP_TITLES: [&str; TOTAL_STEPS as usize] =
    ["Embedding items", "Projecting", "Clustering", "Rendering thumbnails"];
const CATEGORY_PALETTE: [[u8; 3]; 6] = [
    [230, 120, 60],
    [70, 130, 220],
    [240, 200, 60],
    [60, 190, 180],
    [80, 170, 80],
    [160, 100, 200],
];

struct MapJob {
    settings: SearchSettings,
    hits: Vec<Hit>,
    started: Instant,
    /// The response with `finished = true` went out; later polls get 404.
    delivered_final: bool,
    fails: bool,
}

struct StoredEntry {
    id: String,
    name: String,
    map_id: MapId,
    settings: SearchSettings,
}

pub struct JobRegistry {
    corpus: Corpus,
    step: Duration,
    jobs: Mutex<HashMap<MapId, MapJob>>,
    stored: Mutex<Vec<StoredEntry>>,
}

/// Map ids are content hashes of the settings, so equal searches share a job.
pub fn map_id_for(settings: &SearchSettings) -> MapId {
    let bytes = serde_json::to_vec(settings).unwrap_or_default();
    let hash = blake3::hash(&bytes).to_hex();
    MapId::new(&hash.as_str()[..16])
}

pub fn atlas_filename(map_id: &MapId) -> String {
    format!("{map_id}.png")
}

fn cluster_of(hit: &Hit) -> i64 {
    hit.item.id.item_id.trim_start_matches("item").parse::<i64>().unwrap_or(0) % CATEGORY_PALETTE.len() as i64
}

fn cluster_center(cluster: i64) -> (f64, f64) {
    let angle = TAU * cluster as f64 / CATEGORY_PALETTE.len() as f64;
    (5.0 * angle.cos(), 5.0 * angle.sin())
}

/// Point positions; early steps are spread wider than the final layout.
fn position(hit: &Hit, refined: bool) -> (f32, f32) {
    let (cx, cy) = cluster_center(cluster_of(hit));
    let spread = if refined { 1.0 } else { 3.0 };
    let jx = unit_hash(&format!("x/{}", hit.item.id)) - 0.5;
    let jy = unit_hash(&format!("y/{}", hit.item.id)) - 0.5;
    ((cx + jx * spread) as f32, (cy + jy * spread) as f32)
}

fn channel_values(settings: &SearchSettings, channel: Channel, hits: &[Hit]) -> Option<Vec<f64>> {
    let source = settings.rendering.source(channel);
    let values = match source.kind {
        SourceKind::Fixed => return None,
        SourceKind::Score | SourceKind::FulltextScore => hits.iter().map(|h| h.score).collect(),
        SourceKind::Rank => (0..hits.len()).map(|i| i as f64).collect(),
        SourceKind::ClusterIdx => hits.iter().map(|h| cluster_of(h) as f64).collect(),
        SourceKind::NumberField if source.parameter == "year" => {
            hits.iter().map(|h| h.item.year as f64).collect()
        }
        SourceKind::OriginQueryIdx => vec![0.0; hits.len()],
        _ => vec![1.0; hits.len()],
    };
    Some(values)
}

impl JobRegistry {
    pub fn new(corpus: Corpus, step: Duration) -> Self {
        Self {
            corpus,
            step,
            jobs: Mutex::new(HashMap::new()),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Starts (or restarts) the job for these settings.
    pub fn create(&self, settings: SearchSettings, now: Instant) -> MapId {
        let map_id = map_id_for(&settings);
        let hits = self.corpus.search(&settings);
        let fails = query_text(&settings).split_whitespace().any(|w| w == "fail");
        info!(%map_id, points = hits.len(), "map job started");
        self.jobs.lock().insert(
            map_id.clone(),
            MapJob {
                settings,
                hits,
                started: now,
                delivered_final: false,
                fails,
            },
        );
        map_id
    }

    fn step_at(&self, job: &MapJob, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(job.started).as_millis();
        let step = elapsed / self.step.as_millis().max(1);
        step.min((TOTAL_STEPS - 1) as u128) as u32
    }

    /// Current state of a job, or `None` when it is unknown or already done.
    pub fn poll(&self, request: &PollRequest, now: Instant) -> Option<PollResponse> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&request.map_id)?;
        if job.delivered_final {
            return None;
        }
        let step = self.step_at(job, now);
        if job.fails && step >= 1 {
            jobs.remove(&request.map_id);
            return Some(PollResponse {
                errors: vec!["simulated failure while projecting".to_string()],
                ..PollResponse::default()
            });
        }

        let mut response = respond(job, step, request);
        if step + 1 == TOTAL_STEPS {
            response.finished = true;
            response.results.get_or_insert_with(MapResults::default).timings = Some(json!({
                "total_ms": now.saturating_duration_since(job.started).as_millis() as u64
            }));
            job.delivered_final = true;
            debug!(map_id = %request.map_id, "final map response delivered");
        }
        Some(response)
    }

    /// PNG sprite sheet with one square per result, row-major in result order.
    pub fn atlas_png(&self, filename: &str) -> Option<Result<Vec<u8>, image::ImageError>> {
        let jobs = self.jobs.lock();
        let job = jobs.values().find(|job| atlas_filename(&map_id_for(&job.settings)) == filename)?;
        let columns = (job.hits.len() as f64).sqrt().ceil().max(1.0) as u32;
        let rows = (job.hits.len() as u32).div_ceil(columns).max(1);
        let mut img = image::RgbaImage::new(columns * SPRITE_SIZE, rows * SPRITE_SIZE);
        for (i, hit) in job.hits.iter().enumerate() {
            let [r, g, b] = CATEGORY_PALETTE[cluster_of(hit) as usize];
            let (col, row) = (i as u32 % columns, i as u32 / columns);
            for y in 0..SPRITE_SIZE {
                for x in 0..SPRITE_SIZE {
                    img.put_pixel(col * SPRITE_SIZE + x, row * SPRITE_SIZE + y, image::Rgba([r, g, b, 255]));
                }
            }
        }
        let mut out = Cursor::new(Vec::new());
        Some(img.write_to(&mut out, image::ImageFormat::Png).map(|()| out.into_inner()))
    }

    pub fn store_map(&self, name: &str, map_id: &MapId) -> Option<StoredMap> {
        let settings = self.jobs.lock().get(map_id)?.settings.clone();
        let mut stored = self.stored.lock();
        let id = format!("stored{}", stored.len() + 1);
        stored.push(StoredEntry {
            id: id.clone(),
            name: name.to_string(),
            map_id: map_id.clone(),
            settings,
        });
        Some(StoredMap {
            id,
            name: name.to_string(),
            map_id: Some(map_id.clone()),
        })
    }

    pub fn stored_map(&self, map_id: &MapId) -> Option<StoredMapResponse> {
        let stored = self.stored.lock();
        let entry = stored.iter().rev().find(|e| &e.map_id == map_id)?;
        debug!(id = %entry.id, name = %entry.name, "stored map requested");
        Some(StoredMapResponse {
            parameters: entry.settings.clone(),
            search_result: Some(self.corpus.search_list(&entry.settings)),
        })
    }
}

fn respond(job: &MapJob, step: u32, request: &PollRequest) -> PollResponse {
    let wants = |field: &str| !request.exclude_fields.contains(field);
    let hits = &job.hits;
    let mut per_point = PerPointData::default();
    let mut results = MapResults::default();

    if wants(fields::ITEM_IDS) {
        per_point.item_ids = Some(hits.iter().map(|h| h.item.id.clone()).collect());
    }
    if wants(fields::HOVER_LABEL_DATA) {
        results.hover_label_data = Some(details(hits.iter()));
    }
    if wants(fields::THUMBNAIL_ASPECT_RATIOS) {
        per_point.thumbnail_aspect_ratios = Some(
            hits.iter()
                .map(|h| 0.75 + unit_hash(&format!("ratio/{}", h.item.id)) as f32 * 0.75)
                .collect(),
        );
    }

    if step >= 1 {
        let stamp = step.min(2) as f64;
        if request.last_position_update_received.is_none_or(|received| received < stamp) {
            let (xs, ys): (Vec<f32>, Vec<f32>) = hits.iter().map(|h| position(h, step >= 2)).unzip();
            if wants(fields::POSITIONS_X) {
                per_point.positions_x = Some(xs);
            }
            if wants(fields::POSITIONS_Y) {
                per_point.positions_y = Some(ys);
            }
            results.last_position_update = Some(stamp);
        }
        if wants(fields::THUMBNAIL_ATLAS_FILENAME) {
            if step + 1 == TOTAL_STEPS {
                results.thumbnail_atlas_filename = Some(atlas_filename(&request.map_id));
                results.thumbnail_sprite_size = Some(SPRITE_SIZE);
            } else {
                results.thumbnail_atlas_filename = Some(fields::ATLAS_LOADING.to_string());
            }
        }
    }

    if step >= 2 {
        if wants(fields::CLUSTER_IDS) {
            per_point.cluster_ids = Some(hits.iter().map(cluster_of).collect());
        }
        if wants(fields::CLUSTERS) {
            let mut clusters = BTreeMap::new();
            for hit in hits {
                let id = cluster_of(hit);
                clusters.entry(id.to_string()).or_insert_with(|| {
                    let (cx, cy) = cluster_center(id);
                    ClusterDescriptor {
                        id,
                        title: hit.item.category.to_string(),
                        center_x: Some(cx),
                        center_y: Some(cy),
                    }
                });
            }
            results.clusters = Some(clusters);
        }
        for channel in Channel::ALL {
            if wants(channel.field_name()) {
                if let Some(values) = channel_values(&job.settings, channel, hits) {
                    per_point.set_channel(channel, values);
                }
            }
        }
    }

    if step + 1 == TOTAL_STEPS && wants(fields::SEARCH_RESULT_SCORE_INFO) {
        let max = hits.first().map_or(0.0, |h| h.score);
        let min = hits.last().map_or(0.0, |h| h.score);
        results.search_result_score_info = Some(json!({"max_score": max, "min_score": min}));
    }

    PollResponse {
        finished: false,
        errors: Vec::new(),
        progress: Some(Progress {
            current_step: step,
            total_steps: TOTAL_STEPS,
            step_title: STEP_TITLES[step as usize].to_string(),
            embeddings_available: step >= 1,
        }),
        parameters: if wants(fields::PARAMETERS) {
            serde_json::to_value(&job.settings).ok()
        } else {
            None
        },
        results: Some(MapResults {
            per_point_data: Some(per_point),
            ..results
        }),
    }
}
