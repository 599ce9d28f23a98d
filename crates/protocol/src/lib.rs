//! Wire types shared by the map-sync client and the development server.
//!
//! Everything here is plain data: search settings, search/map/poll payloads,
//! collection payloads, field-group names, the JSON/CBOR codec and the display
//! templates used to render item labels.

pub mod channels;
pub mod codec;
pub mod collection;
pub mod dataset;
pub mod fields;
pub mod map;
pub mod paths;
pub mod search;
pub mod settings;
pub mod templates;

pub use channels::Channel;
pub use codec::{CodecError, Encoding};
pub use dataset::{DatasetInfo, FieldType, LabelTemplates};
pub use map::*;
pub use search::*;
pub use settings::*;
pub use templates::DisplayTemplate;
