//! Helpers behind the `mapsync` command line tool.

use std::fmt;

use foundation::Aabb2;
use mapstate::MapState;
use protocol::SearchSettings;
use runtime::Signal;

/// Settings for a plain free-text search over `datasets`.
pub fn search_settings(defaults: &SearchSettings, query: &str, datasets: &[String], max_items: Option<u32>) -> SearchSettings {
    let mut settings = defaults.clone();
    settings.dataset_ids.clear();
    for dataset in datasets {
        if !settings.dataset_ids.contains(dataset) {
            settings.dataset_ids.push(dataset.clone());
        }
    }
    settings.search.all_field_query = query.to_string();
    if let Some(max_items) = max_items {
        settings.search.max_items_used_for_mapping = max_items;
    }
    settings
}

/// One line of terminal output for a signal, if it is worth printing.
pub fn describe(signal: &Signal) -> Option<String> {
    match signal {
        Signal::Progress {
            current_step,
            total_steps,
            step_title,
        } => Some(format!("[{}/{}] {step_title}", current_step + 1, total_steps)),
        Signal::FitViewport { instant: true } => Some("first positions received".to_string()),
        Signal::JobFinished { map_id } => Some(format!("map {map_id} finished")),
        Signal::ErrorNotice { message } => Some(format!("error: {message}")),
        Signal::Notice { message } => Some(message.clone()),
        Signal::LoginRequired => Some("login required for further searches".to_string()),
        _ => None,
    }
}

/// What ended up on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSummary {
    pub name: String,
    pub points: usize,
    pub clusters: Vec<String>,
    pub bounds: Option<Aabb2>,
    pub atlas: Option<String>,
}

impl MapSummary {
    pub fn of(name: String, map: &MapState) -> Self {
        Self {
            name,
            points: map.point_count(),
            clusters: map.clusters().values().map(|c| c.title.clone()).collect(),
            bounds: map.data_bounds(),
            atlas: map.atlas().map(|a| format!("{} ({}x{})", a.filename, a.width, a.height)),
        }
    }
}

impl fmt::Display for MapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} points", self.name, self.points)?;
        if !self.clusters.is_empty() {
            writeln!(f, "clusters: {}", self.clusters.join(", "))?;
        }
        if let Some(bounds) = self.bounds {
            writeln!(
                f,
                "extent: [{:.2}, {:.2}] .. [{:.2}, {:.2}]",
                bounds.min[0], bounds.min[1], bounds.max[0], bounds.max[1]
            )?;
        }
        if let Some(atlas) = &self.atlas {
            writeln!(f, "atlas: {atlas}")?;
        }
        Ok(())
    }
}
