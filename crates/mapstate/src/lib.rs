//! Canonical per-point map state: columns, item details, clusters, viewport,
//! selection and visibility filters.
//!
//! Pure state and math. Nothing here talks to the network; the search crate
//! merges poll results into a [`SharedMapState`].

pub mod columns;
pub mod lasso;
pub mod selection;
pub mod store;
pub mod viewport;
pub mod visibility;

pub use columns::{ColumnError, PerPointColumns};
pub use selection::{PointSelection, SelectionSet};
pub use store::{MapState, ProjectionData, SharedMapState, ThumbnailAtlas};
pub use viewport::{FitMode, Margins, Viewport};
pub use visibility::{FilterCategory, FilterPredicate, MergeMode, VisibilityFilter, VisibilityFilters};
