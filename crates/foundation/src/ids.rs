use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one result point.
///
/// Results span several datasets, so an item id alone is ambiguous; the wire
/// form is the two-element array `[dataset_id, item_id]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct PointId {
    pub dataset_id: String,
    pub item_id: String,
}

impl PointId {
    pub fn new(dataset_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            item_id: item_id.into(),
        }
    }
}

impl From<(String, String)> for PointId {
    fn from((dataset_id, item_id): (String, String)) -> Self {
        Self { dataset_id, item_id }
    }
}

impl From<PointId> for (String, String) {
    fn from(id: PointId) -> Self {
        (id.dataset_id, id.item_id)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataset_id, self.item_id)
    }
}

/// Opaque token naming one backend map job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{MapId, PointId};

    #[test]
    fn point_id_uses_pair_wire_form() {
        let id = PointId::new("ds1", "a");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"["ds1","a"]"#);
        let back: PointId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn point_ids_order_by_dataset_first() {
        let mut ids = vec![PointId::new("b", "1"), PointId::new("a", "2")];
        ids.sort();
        assert_eq!(ids[0].dataset_id, "a");
    }

    #[test]
    fn map_id_is_a_bare_string() {
        let json = serde_json::to_string(&MapId::new("m1")).unwrap();
        assert_eq!(json, r#""m1""#);
    }
}
