//! Collections: server-owned item sets with per-class counts and computed columns.
//!
//! [`CollectionStore`] keeps the open collection and the current page of its
//! items in sync with the backend, refreshing on its own while the server is
//! still working on the collection.

pub mod error;
pub mod fields;
pub mod store;

pub use error::CollectionError;
pub use fields::{FieldOption, available_order_by_fields, available_source_fields};
pub use store::{CollectionState, CollectionStore, Continuation, PageQuery};
