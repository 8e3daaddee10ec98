use cutline_core::FrameTime;
use serde::{Deserialize, Serialize};

use crate::id::define_ids;
use crate::media::BinClipId;
use crate::timeline::TimelineId;
use crate::{Error, Result};

define_ids! {
    pub struct MarkerId;
}

/// Index into the marker colour palette.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct MarkerType(u8);

impl MarkerType {
    pub const PALETTE: [&'static str; 9] = [
        "#9b59b6", "#3daee9", "#1abc9c", "#1cdc9a", "#c9ce3b", "#fdbc4b", "#f39c1f", "#f47750",
        "#da4453",
    ];

    pub fn new(index: u8) -> Option<MarkerType> {
        (usize::from(index) < Self::PALETTE.len()).then_some(MarkerType(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn color(self) -> &'static str {
        Self::PALETTE[usize::from(self.0)]
    }

    pub fn all() -> impl Iterator<Item = MarkerType> {
        (0..Self::PALETTE.len() as u8).map(MarkerType)
    }
}

impl TryFrom<i64> for MarkerType {
    type Error = Error;

    fn try_from(index: i64) -> Result<MarkerType> {
        u8::try_from(index)
            .ok()
            .and_then(MarkerType::new)
            .ok_or(Error::InvalidMarkerType { index })
    }
}

impl From<MarkerType> for i64 {
    fn from(kind: MarkerType) -> i64 {
        i64::from(kind.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub time: FrameTime,
    pub comment: String,
    pub kind: MarkerType,
}

/// Persisted shape of one marker: `{ "pos": 10, "comment": "x", "type": 0 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub pos: i64,
    pub comment: String,
    #[serde(rename = "type")]
    pub kind: MarkerType,
}

impl From<&Marker> for MarkerRecord {
    fn from(marker: &Marker) -> MarkerRecord {
        MarkerRecord {
            pos: marker.time.frames(),
            comment: marker.comment.clone(),
            kind: marker.kind,
        }
    }
}

/// What a marker list is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerOwner {
    /// Guides of a whole timeline.
    Timeline(TimelineId),
    /// Markers of a bin clip.
    Clip(BinClipId),
}

impl MarkerOwner {
    pub fn is_guide(self) -> bool {
        matches!(self, MarkerOwner::Timeline(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerTypeFilter {
    Any,
    Only(MarkerType),
}

impl MarkerTypeFilter {
    pub fn matches(self, kind: MarkerType) -> bool {
        match self {
            MarkerTypeFilter::Any => true,
            MarkerTypeFilter::Only(k) => k == kind,
        }
    }
}

/// Which field of a marker row changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    Frame,
    Comment,
    Color,
}

/// Row-level change notification. Rows are positions in the list's storage
/// order and ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerEvent {
    RowsInserted {
        first: usize,
        last: usize,
    },
    RowsRemoved {
        first: usize,
        last: usize,
    },
    DataChanged {
        first: usize,
        last: usize,
        roles: Vec<MarkerRole>,
    },
}

impl MarkerEvent {
    pub fn touches_any(&self, roles: &[MarkerRole]) -> bool {
        match self {
            MarkerEvent::DataChanged { roles: changed, .. } => {
                changed.iter().any(|r| roles.contains(r))
            }
            _ => true,
        }
    }
}
