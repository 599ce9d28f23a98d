//! Synthetic datasets the development server searches over.
//!
//! Items and scores are derived from hashes, so the same query always yields
//! the same ranking, positions and clusters.

use std::collections::BTreeMap;

use foundation::PointId;
use protocol::dataset::ObjectField;
use protocol::map::{ItemDetails, ItemFields};
use protocol::{DatasetInfo, DisplayTemplate, FieldType, LabelTemplates, SearchListResponse, SearchSettings};
use serde_json::{Value, json};

pub const DEMO_DATASET: &str = "demo";
const ITEM_COUNT: usize = 240;
const CATEGORIES: [&str; 6] = ["cats", "dogs", "birds", "fish", "trees", "boats"];

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: PointId,
    pub title: String,
    pub category: &'static str,
    pub year: i64,
}

impl Item {
    pub fn fields(&self) -> ItemFields {
        let mut fields = ItemFields::new();
        fields.insert("_id".into(), Value::String(self.id.item_id.clone()));
        fields.insert("title".into(), Value::String(self.title.clone()));
        fields.insert("category".into(), Value::String(self.category.into()));
        fields.insert("year".into(), json!(self.year));
        fields
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub item: Item,
    pub score: f64,
}

pub struct Corpus {
    items: Vec<Item>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::generate(ITEM_COUNT)
    }
}

/// Uniform value in [0, 1) derived from `key`.
pub fn unit_hash(key: &str) -> f64 {
    let hash = blake3::hash(key.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(word) >> 11) as f64 / (1u64 << 53) as f64
}

impl Corpus {
    pub fn generate(count: usize) -> Self {
        let items = (0..count)
            .map(|i| {
                let category = CATEGORIES[i % CATEGORIES.len()];
                Item {
                    id: PointId::new(DEMO_DATASET, format!("item{i:04}")),
                    title: format!("{category} #{}", i / CATEGORIES.len() + 1),
                    category,
                    year: 1950 + (unit_hash(&format!("year/{i}")) * 70.0) as i64,
                }
            })
            .collect();
        Self { items }
    }

    pub fn dataset(&self, dataset_id: &str) -> Option<DatasetInfo> {
        if dataset_id != DEMO_DATASET {
            return None;
        }
        let field = |identifier: &str, field_type: FieldType| {
            (
                identifier.to_string(),
                ObjectField {
                    identifier: identifier.to_string(),
                    field_type,
                    name: None,
                    is_available_for_search: field_type == FieldType::Text,
                },
            )
        };
        Some(DatasetInfo {
            id: DEMO_DATASET.into(),
            name: "Demo items".into(),
            object_fields: BTreeMap::from([
                field("_id", FieldType::Identifier),
                field("title", FieldType::Text),
                field("category", FieldType::Tag),
                field("year", FieldType::Integer),
            ]),
            default_search_fields: vec!["title".into()],
            hover_label_rendering: LabelTemplates {
                title: Some(DisplayTemplate::field("title")),
                subtitle: Some(DisplayTemplate::field("year")),
                ..LabelTemplates::default()
            },
            result_list_rendering: LabelTemplates {
                title: Some(DisplayTemplate::field("title")),
                ..LabelTemplates::default()
            },
        })
    }

    /// Ranks items for the settings' query, capped at the mapping limit.
    ///
    /// Items whose category appears in the query score above all others.
    pub fn search(&self, settings: &SearchSettings) -> Vec<Hit> {
        if !settings.dataset_ids.iter().any(|d| d == DEMO_DATASET) {
            return Vec::new();
        }
        let query = query_text(settings);
        let words: Vec<&str> = query.split_whitespace().collect();
        let mut hits: Vec<Hit> = self
            .items
            .iter()
            .map(|item| {
                let mut score = unit_hash(&format!("{query}/{}", item.id));
                if words.iter().any(|w| w.eq_ignore_ascii_case(item.category)) {
                    score += 1.0;
                }
                Hit {
                    item: item.clone(),
                    score,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.item.id.cmp(&b.item.id)));
        hits.truncate(settings.search.max_items_used_for_mapping.max(1) as usize);
        hits
    }

    /// Ranking plus the item details for the requested result page.
    pub fn search_list(&self, settings: &SearchSettings) -> SearchListResponse {
        let hits = self.search(settings);
        let per_page = settings.search.result_list_items_per_page.max(1) as usize;
        let start = settings.search.result_list_current_page as usize * per_page;
        SearchListResponse {
            sorted_ids: hits.iter().map(|h| h.item.id.clone()).collect(),
            total_matches: hits.len() as u64,
            items_by_dataset: details(hits.iter().skip(start).take(per_page)),
            timings: json!({"search_ms": 1}),
        }
    }
}

pub fn details<'a>(hits: impl Iterator<Item = &'a Hit>) -> ItemDetails {
    let mut by_dataset = ItemDetails::new();
    for hit in hits {
        by_dataset
            .entry(hit.item.id.dataset_id.clone())
            .or_default()
            .insert(hit.item.id.item_id.clone(), hit.item.fields());
    }
    by_dataset
}

/// Text that decides the ranking, combining every query the settings carry.
pub fn query_text(settings: &SearchSettings) -> String {
    let search = &settings.search;
    let mut parts = vec![search.all_field_query.clone()];
    parts.extend(search.separate_queries.values().map(|q| q.query.clone()));
    if let Some(cluster_id) = search.cluster_id {
        parts.push(format!("cluster:{cluster_id}"));
    }
    if let Some(similar) = &search.similar_to_item_id {
        parts.push(format!("similar:{similar}"));
    }
    if let Some(collection) = &search.collection_id {
        parts.push(format!("collection:{collection}"));
    }
    parts.retain(|p| !p.trim().is_empty());
    parts.join(" ")
}
