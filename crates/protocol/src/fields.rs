//! Names of the result fields a map job reveals over time.
//!
//! The poll request lists fields the client does not want (again); these
//! constants keep client and server agreeing on the spelling.

use std::collections::BTreeSet;

pub const ITEM_IDS: &str = "item_ids";
pub const CLUSTER_IDS: &str = "cluster_ids";
pub const POSITIONS_X: &str = "positions_x";
pub const POSITIONS_Y: &str = "positions_y";
pub const THUMBNAIL_ASPECT_RATIOS: &str = "thumbnail_aspect_ratios";
pub const HOVER_LABEL_DATA: &str = "hover_label_data";
pub const THUMBNAIL_ATLAS_FILENAME: &str = "thumbnail_atlas_filename";
pub const CLUSTERS: &str = "clusters";
pub const SEARCH_RESULT_SCORE_INFO: &str = "search_result_score_info";
pub const RAW_PROJECTIONS: &str = "raw_projections";
pub const SEARCH_RESULT_META_INFORMATION: &str = "search_result_meta_information";
pub const PARAMETERS: &str = "parameters";

/// Sentinel atlas filename while the backend is still rendering it.
pub const ATLAS_LOADING: &str = "loading";

/// Fields the client never consumes from the poll endpoint.
pub const NEVER_NEEDED: [&str; 3] = [RAW_PROJECTIONS, SEARCH_RESULT_META_INFORMATION, PARAMETERS];

/// Fields only requested while autocut debugging is on.
pub const DEBUG_ONLY: [&str; 1] = [SEARCH_RESULT_SCORE_INFO];

/// Exclusions that apply before anything has been received.
pub fn base_exclusions(debug_autocut: bool) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = NEVER_NEEDED.iter().map(|f| f.to_string()).collect();
    if !debug_autocut {
        fields.extend(DEBUG_ONLY.iter().map(|f| f.to_string()));
    }
    fields
}
