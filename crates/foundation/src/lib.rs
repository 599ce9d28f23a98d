pub mod bounds;
pub mod ids;
pub mod normalize;
pub mod ordering;

// Foundation crate: ids and numeric helpers shared by every store.
pub use bounds::*;
pub use ids::*;
pub use normalize::*;
