//! Search and map orchestration.
//!
//! [`SearchStore`] owns the search settings, submits searches, and drives the
//! poll loop of the resulting map job. Each poll response is merged into the
//! shared [`mapstate::MapState`] in one atomic step; progress and geometry
//! changes are announced on the injected [`runtime::EventBus`].

pub mod atlas;
pub mod channel_policy;
pub mod datasets;
pub mod error;
pub mod exclusions;
pub mod history;
pub mod merge;
pub mod query_rewrite;
pub mod session;
pub mod state;
pub mod store;

pub use error::SearchError;
pub use exclusions::ReceivedFields;
pub use history::{SearchHistory, SearchHistoryEntry};
pub use state::{JobEnd, Phase, SearchState};
pub use store::{MapJob, SearchOutcome, SearchStore};
