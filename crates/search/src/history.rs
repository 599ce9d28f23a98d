use protocol::{SearchSettings, SearchType};
use tracing::warn;

/// Human-readable name of a search, used for history entries and stored maps.
///
/// Empty when there is nothing to name, e.g. an external-input search
/// without a query.
pub fn map_name(settings: &SearchSettings) -> String {
    let search = &settings.search;
    let origin = &search.origin_display_name;
    match search.search_type {
        SearchType::ExternalInput if search.use_separate_queries => search
            .separate_queries
            .iter()
            .filter(|(_, q)| !q.query.trim().is_empty())
            .map(|(field, q)| format!("{field}: {}", q.query.trim()))
            .collect::<Vec<_>>()
            .join(", "),
        SearchType::ExternalInput => {
            let query = search.all_field_query.trim();
            let negative = search.all_field_query_negative.trim();
            if negative.is_empty() {
                query.to_string()
            } else {
                format!("{query} (-{negative})")
            }
        }
        SearchType::Cluster => format!("Cluster '{origin}'"),
        SearchType::SimilarToItem => format!("Similar to '{origin}'"),
        SearchType::Collection => format!("Collection '{origin}'"),
        SearchType::GlobalMap => "Global map".to_string(),
        SearchType::Subset => format!("Subset '{origin}'"),
    }
}

/// One submitted search, replayable through `run_search_from_history`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHistoryEntry {
    pub name: String,
    pub parameters: SearchSettings,
    pub fingerprint: blake3::Hash,
    pub total_matches: Option<u64>,
}

/// Stable digest of the serialized settings.
pub fn fingerprint(settings: &SearchSettings) -> Result<blake3::Hash, serde_json::Error> {
    let bytes = serde_json::to_vec(settings)?;
    Ok(blake3::hash(&bytes))
}

/// Client-side search history.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    enabled: bool,
    entries: Vec<SearchHistoryEntry>,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SearchHistory {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn entries(&self) -> &[SearchHistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&SearchHistoryEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&SearchHistoryEntry> {
        self.entries.last()
    }

    /// Appends an entry unless history is disabled, `name` is empty, or the
    /// settings repeat the previous entry. Returns the appended entry.
    pub fn record(&mut self, name: &str, parameters: &SearchSettings) -> Option<&SearchHistoryEntry> {
        if !self.enabled || name.is_empty() {
            return None;
        }
        let fingerprint = match fingerprint(parameters) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                warn!(%err, "search settings could not be fingerprinted");
                return None;
            }
        };
        if self.entries.last().is_some_and(|last| last.fingerprint == fingerprint) {
            return None;
        }
        self.entries.push(SearchHistoryEntry {
            name: name.to_string(),
            parameters: parameters.clone(),
            fingerprint,
            total_matches: None,
        });
        self.entries.last()
    }

    /// Stores the final result count on the most recent entry.
    pub fn set_last_total_matches(&mut self, total_matches: u64) {
        if let Some(last) = self.entries.last_mut() {
            last.total_matches = Some(total_matches);
        }
    }
}
