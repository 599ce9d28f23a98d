//! Parallel per-point arrays.
//!
//! Invariant: every populated column has the same length. Unreceived columns
//! are `None`, except `cluster_ids`, which may hold a `-1` placeholder sized
//! to `x` until real cluster ids arrive. The placeholder follows `x` and never
//! takes part in length checks.

use std::collections::BTreeMap;

use foundation::{Aabb2, PointId};
use protocol::Channel;
use thiserror::Error;

/// Cluster id of points that belong to no cluster.
pub const UNCLUSTERED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("column '{column}' has {actual} entries but {expected} points are loaded")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerPointColumns {
    item_ids: Option<Vec<PointId>>,
    cluster_ids: Option<Vec<i64>>,
    cluster_ids_placeholder: bool,
    x: Option<Vec<f32>>,
    y: Option<Vec<f32>>,
    channels: BTreeMap<Channel, Vec<f32>>,
    thumbnail_aspect_ratios: Option<Vec<f32>>,
    /// Ids and positions belong to a previous job and give way to the first
    /// merge of a different length.
    stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    ItemIds,
    ClusterIds,
    Positions,
    Channel(Channel),
    ThumbnailAspectRatios,
}

impl Column {
    fn name(self) -> String {
        match self {
            Column::ItemIds => "item_ids".to_string(),
            Column::ClusterIds => "cluster_ids".to_string(),
            Column::Positions => "positions".to_string(),
            Column::Channel(channel) => channel.field_name().to_string(),
            Column::ThumbnailAspectRatios => "thumbnail_aspect_ratios".to_string(),
        }
    }
}

impl PerPointColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds columns from complete arrays. Fails if any length disagrees with `item_ids`.
    pub fn from_parts(
        item_ids: Vec<PointId>,
        x: Vec<f32>,
        y: Vec<f32>,
        cluster_ids: Option<Vec<i64>>,
        channels: BTreeMap<Channel, Vec<f32>>,
        thumbnail_aspect_ratios: Option<Vec<f32>>,
    ) -> Result<Self, ColumnError> {
        let mut columns = Self::new();
        columns.merge_item_ids(item_ids)?;
        columns.merge_positions(x, y)?;
        match cluster_ids {
            Some(ids) => columns.merge_cluster_ids(ids)?,
            None => columns.fill_unclustered(),
        }
        for (channel, values) in channels {
            columns.merge_channel(channel, values)?;
        }
        if let Some(ratios) = thumbnail_aspect_ratios {
            columns.merge_thumbnail_aspect_ratios(ratios)?;
        }
        Ok(columns)
    }

    /// Number of points, taken from any populated column.
    pub fn len(&self) -> usize {
        self.populated_len(None).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Keeps the current points visible until the next job delivers data.
    ///
    /// Only ids and positions survive. Channels, aspect ratios and real
    /// cluster ids describe the previous job's points and are dropped; cluster
    /// ids fall back to the `-1` placeholder.
    pub fn mark_stale(&mut self) {
        self.channels.clear();
        self.thumbnail_aspect_ratios = None;
        if self.cluster_ids.is_some() && !self.cluster_ids_placeholder {
            self.fill_unclustered();
        }
        self.stale = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn item_ids(&self) -> Option<&[PointId]> {
        self.item_ids.as_deref()
    }

    pub fn cluster_ids(&self) -> Option<&[i64]> {
        self.cluster_ids.as_deref()
    }

    /// True while `cluster_ids` holds the `-1` placeholder.
    pub fn cluster_ids_are_placeholder(&self) -> bool {
        self.cluster_ids_placeholder
    }

    pub fn x(&self) -> Option<&[f32]> {
        self.x.as_deref()
    }

    pub fn y(&self) -> Option<&[f32]> {
        self.y.as_deref()
    }

    pub fn channel(&self, channel: Channel) -> Option<&[f32]> {
        self.channels.get(&channel).map(Vec::as_slice)
    }

    pub fn thumbnail_aspect_ratios(&self) -> Option<&[f32]> {
        self.thumbnail_aspect_ratios.as_deref()
    }

    /// Channel value of one point, or `fallback` while the channel is missing.
    pub fn channel_value(&self, channel: Channel, index: usize, fallback: f32) -> f32 {
        self.channel(channel)
            .and_then(|values| values.get(index).copied())
            .unwrap_or(fallback)
    }

    /// Position of point `index`, if positions have been received.
    pub fn position(&self, index: usize) -> Option<[f32; 2]> {
        let x = self.x.as_ref()?.get(index)?;
        let y = self.y.as_ref()?.get(index)?;
        Some([*x, *y])
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_xy(self.x.as_deref()?, self.y.as_deref()?)
    }

    pub fn merge_item_ids(&mut self, ids: Vec<PointId>) -> Result<(), ColumnError> {
        self.admit(Column::ItemIds, ids.len())?;
        self.item_ids = Some(ids);
        Ok(())
    }

    pub fn merge_cluster_ids(&mut self, ids: Vec<i64>) -> Result<(), ColumnError> {
        self.admit(Column::ClusterIds, ids.len())?;
        self.cluster_ids = Some(ids);
        self.cluster_ids_placeholder = false;
        Ok(())
    }

    /// Marks every point as unclustered, sized to `x`.
    pub fn fill_unclustered(&mut self) {
        let len = self.x.as_ref().map_or_else(|| self.len(), Vec::len);
        self.cluster_ids = Some(vec![UNCLUSTERED; len]);
        self.cluster_ids_placeholder = true;
    }

    pub fn merge_positions(&mut self, x: Vec<f32>, y: Vec<f32>) -> Result<(), ColumnError> {
        if x.len() != y.len() {
            return Err(ColumnError::LengthMismatch {
                column: "positions_y".to_string(),
                expected: x.len(),
                actual: y.len(),
            });
        }
        self.admit(Column::Positions, x.len())?;
        let len = x.len();
        self.x = Some(x);
        self.y = Some(y);
        if self.cluster_ids_placeholder {
            self.cluster_ids = Some(vec![UNCLUSTERED; len]);
        }
        Ok(())
    }

    pub fn merge_channel(&mut self, channel: Channel, values: Vec<f32>) -> Result<(), ColumnError> {
        self.admit(Column::Channel(channel), values.len())?;
        self.channels.insert(channel, values);
        Ok(())
    }

    pub fn merge_thumbnail_aspect_ratios(&mut self, ratios: Vec<f32>) -> Result<(), ColumnError> {
        self.admit(Column::ThumbnailAspectRatios, ratios.len())?;
        self.thumbnail_aspect_ratios = Some(ratios);
        Ok(())
    }

    /// Overwrites one channel value, creating the column from `fallback` if needed.
    ///
    /// Panics if `index` is not a loaded point.
    pub fn set_channel_value(&mut self, channel: Channel, index: usize, value: f32, fallback: f32) {
        let len = self.len();
        assert!(index < len, "point index {index} out of range for {len} points");
        let values = self.channels.entry(channel).or_insert_with(|| vec![fallback; len]);
        values[index] = value;
    }

    /// Length shared by all populated columns other than `except`.
    fn populated_len(&self, except: Option<Column>) -> Option<usize> {
        let skip = |column: Column| except == Some(column);
        if !skip(Column::ItemIds) {
            if let Some(ids) = &self.item_ids {
                return Some(ids.len());
            }
        }
        if !skip(Column::Positions) {
            if let Some(x) = &self.x {
                return Some(x.len());
            }
        }
        if !skip(Column::ClusterIds) && !self.cluster_ids_placeholder {
            if let Some(ids) = &self.cluster_ids {
                return Some(ids.len());
            }
        }
        if let Some(values) = self
            .channels
            .iter()
            .find(|(channel, _)| !skip(Column::Channel(**channel)))
            .map(|(_, values)| values)
        {
            return Some(values.len());
        }
        if !skip(Column::ThumbnailAspectRatios) {
            if let Some(ratios) = &self.thumbnail_aspect_ratios {
                return Some(ratios.len());
            }
        }
        None
    }

    /// Checks that a column of `len` entries may be stored.
    fn admit(&mut self, column: Column, len: usize) -> Result<(), ColumnError> {
        if self.stale {
            self.stale = false;
            if self.populated_len(None).is_some_and(|current| current != len) {
                self.clear();
            }
            return Ok(());
        }
        match self.populated_len(Some(column)) {
            Some(expected) if expected != len => Err(ColumnError::LengthMismatch {
                column: column.name(),
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }
}
