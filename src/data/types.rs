//! Record types parsed from the per-scenario JSON files.
//!
//! - [`ParkingSlot`] -- one row of `parking_slots.json`.
//! - [`Trajectory`] -- one instruction from `Traj.json`, optionally bound to a
//!   target slot.
//! - [`InstructionInfo`] -- one row of `Traj_withinfo.json` (instruction text
//!   plus the tags a matching slot must carry).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name -> required (or observed) integer value.
pub type SlotTags = BTreeMap<String, i64>;

// ---------------------------------------------------------------------------
// Parking slot identity
// ---------------------------------------------------------------------------

/// Identifier of a parking slot.
///
/// Datasets store it either as a JSON number or as a string; both forms are
/// kept verbatim so records serialize back the way they were read. Numbers
/// order before strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParkingId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ParkingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParkingId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ParkingId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Slot attributes
// ---------------------------------------------------------------------------

/// The closed set of attributes a slot carries and an instruction may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotAttribute {
    Occupied,
    Disabled,
    Charging,
    NextWall,
    SideRoad,
    NearExit,
    Sunlight,
    Column,
    NextDriveWay,
    Around,
}

impl SlotAttribute {
    pub const ALL: [SlotAttribute; 10] = [
        Self::NextWall,
        Self::SideRoad,
        Self::NearExit,
        Self::Sunlight,
        Self::Column,
        Self::NextDriveWay,
        Self::Charging,
        Self::Disabled,
        Self::Occupied,
        Self::Around,
    ];

    /// The key used for this attribute in the JSON records.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Occupied => "Occupied",
            Self::Disabled => "Disabled",
            Self::Charging => "Charging",
            Self::NextWall => "NextWall",
            Self::SideRoad => "SideRoad",
            Self::NearExit => "NearExit",
            Self::Sunlight => "Sunlight",
            Self::Column => "Column",
            Self::NextDriveWay => "NextDriveWay",
            Self::Around => "Around",
        }
    }

    /// Parse a record key. Keys are case-sensitive, as in the datasets.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|attr| attr.key() == key)
    }
}

// ---------------------------------------------------------------------------
// Parking slot
// ---------------------------------------------------------------------------

/// A single parking space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParkingSlot {
    #[serde(rename = "ParkingID")]
    pub parking_id: ParkingId,
    /// Waypoint step (1-based) the slot is visible from.
    #[serde(rename = "PathID")]
    pub path_id: u32,
    /// Position of the slot within its waypoint (1..=6).
    #[serde(rename = "LocID")]
    pub loc_id: u32,
    #[serde(default)]
    pub occupied: i64,
    #[serde(default)]
    pub disabled: i64,
    #[serde(default)]
    pub charging: i64,
    #[serde(default)]
    pub next_wall: i64,
    #[serde(default)]
    pub side_road: i64,
    #[serde(default)]
    pub near_exit: i64,
    #[serde(default)]
    pub sunlight: i64,
    #[serde(default)]
    pub column: i64,
    #[serde(default)]
    pub next_drive_way: i64,
    #[serde(default)]
    pub around: i64,
    /// Scenario the slot was loaded from. Filled in by the reader.
    #[serde(skip)]
    pub scan: String,
}

impl ParkingSlot {
    pub fn attribute(&self, attr: SlotAttribute) -> i64 {
        match attr {
            SlotAttribute::Occupied => self.occupied,
            SlotAttribute::Disabled => self.disabled,
            SlotAttribute::Charging => self.charging,
            SlotAttribute::NextWall => self.next_wall,
            SlotAttribute::SideRoad => self.side_road,
            SlotAttribute::NearExit => self.near_exit,
            SlotAttribute::Sunlight => self.sunlight,
            SlotAttribute::Column => self.column,
            SlotAttribute::NextDriveWay => self.next_drive_way,
            SlotAttribute::Around => self.around,
        }
    }

    /// Look up an attribute by its record key; unknown keys yield `None`.
    pub fn attribute_by_key(&self, key: &str) -> Option<i64> {
        SlotAttribute::from_key(key).map(|attr| self.attribute(attr))
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied != 0
    }

    /// Whether the slot carries every tag in `tags` with exactly that value.
    pub fn meets_criteria(&self, tags: &SlotTags) -> bool {
        tags.iter()
            .all(|(key, value)| self.attribute_by_key(key) == Some(*value))
    }

    /// All ten attributes as a tag map.
    pub fn tags(&self) -> SlotTags {
        SlotAttribute::ALL
            .iter()
            .map(|attr| (attr.key().to_string(), self.attribute(*attr)))
            .collect()
    }

    /// Linear distance of the slot along the route, counted in slot widths
    /// from the entrance.
    pub fn route_distance(&self) -> u32 {
        (self.path_id.saturating_sub(1)) * 3 + (self.loc_id.saturating_sub(1)) % 3 + 1
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// A natural-language parking request from `Traj.json`.
///
/// When the instruction names a target slot it also carries the slot's path
/// step, location and the tags the requester cares about; path-only
/// instructions carry none of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub scan: String,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_id: Option<u32>,
    #[serde(rename = "ParkingID", default, skip_serializing_if = "Option::is_none")]
    pub parking_id: Option<ParkingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<SlotTags>,
}

impl Trajectory {
    /// A path-only instruction.
    pub fn path_only(scan: &str, instruction: &str) -> Self {
        Self {
            scan: scan.to_string(),
            instruction: instruction.to_string(),
            path_id: None,
            loc_id: None,
            parking_id: None,
            tags: None,
        }
    }

    /// Whether the instruction designates a target slot (and so can be scored
    /// by slot selection).
    pub fn targets_slot(&self) -> bool {
        self.parking_id.is_some()
    }

    /// The value the instruction requires for `attr`, if it specifies one.
    pub fn required(&self, attr: SlotAttribute) -> Option<i64> {
        self.tags.as_ref()?.get(attr.key()).copied()
    }
}

/// One row of `Traj_withinfo.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionInfo {
    pub instruction: String,
    #[serde(default)]
    pub tags: Option<SlotTags>,
}
