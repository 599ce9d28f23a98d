//! Backend endpoint paths, relative to the base URL.

pub const SEARCH_LIST_RESULT: &str = "/data_backend/search_list_result";
pub const MAP: &str = "/data_backend/map";
pub const MAP_RESULT: &str = "/data_backend/map/result";
pub const THUMBNAIL_ATLAS: &str = "/data_backend/map/thumbnail_atlas";
pub const STORED_MAP: &str = "/data_backend/stored_map/parameters_and_search_results";
pub const STORE_MAP: &str = "/data_backend/map/store";

pub const DATASET: &str = "/org/data_map/dataset";
pub const ADD_SEARCH_HISTORY_ITEM: &str = "/org/data_map/add_search_history_item";

pub const GET_COLLECTIONS: &str = "/org/data_map/get_collections";
pub const GET_COLLECTION: &str = "/org/data_map/get_collection";
pub const GET_COLLECTION_CLASS_ITEMS: &str = "/org/data_map/get_collection_class_items";
pub const DELETE_COLLECTION: &str = "/org/data_map/delete_collection";
pub const ADD_ITEM_TO_COLLECTION: &str = "/org/data_map/add_item_to_collection";
pub const REMOVE_COLLECTION_ITEM: &str = "/org/data_map/remove_collection_item";
pub const PROCESS_COLUMN: &str = "/org/data_map/process_column";
pub const CANCEL_COLUMN_PROCESSING: &str = "/org/data_map/cancel_column_processing";

/// Appends the cache flag the search and map endpoints accept.
pub fn with_ignore_cache(path: &str, ignore_cache: bool) -> String {
    format!("{path}?ignore_cache={ignore_cache}")
}

pub fn thumbnail_atlas(filename: &str) -> String {
    format!("{THUMBNAIL_ATLAS}/{filename}")
}
