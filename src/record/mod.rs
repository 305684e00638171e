//! Canonical match records
//!
//! Both fetch strategies converge on the types in this module. A
//! [`MatchRecord`] is built once by [`normalize`] from a strategy's raw output
//! and is never mutated afterwards.

pub mod codes;
mod normalize;

pub use codes::{is_special_event, tactic_name, SPECIAL_EVENT_CODES};
pub use normalize::{normalize, parse_match_date};

use crate::fetch::Strategy;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which team a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

/// One of the seven formation rating sectors, in ratings-table row order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RatingSlot {
    Midfield,
    RightDefense,
    CentralDefense,
    LeftDefense,
    RightAttack,
    CentralAttack,
    LeftAttack,
}

impl RatingSlot {
    /// All sectors in the order the rendered ratings table lists them
    pub const ALL: [RatingSlot; 7] = [
        RatingSlot::Midfield,
        RatingSlot::RightDefense,
        RatingSlot::CentralDefense,
        RatingSlot::LeftDefense,
        RatingSlot::RightAttack,
        RatingSlot::CentralAttack,
        RatingSlot::LeftAttack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Midfield => "midfield",
            Self::RightDefense => "right_defense",
            Self::CentralDefense => "central_defense",
            Self::LeftDefense => "left_defense",
            Self::RightAttack => "right_attack",
            Self::CentralAttack => "central_attack",
            Self::LeftAttack => "left_attack",
        }
    }
}

/// Match classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    League,
    Friendly,
    Cup,
    Qualification,
    Other,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Friendly => "friendly",
            Self::Cup => "cup",
            Self::Qualification => "qualification",
            Self::Other => "other",
        }
    }

    /// Parses a classification label, falling back to `Other`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "league" => Self::League,
            "friendly" => Self::Friendly,
            "cup" => Self::Cup,
            "qualification" => Self::Qualification,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seven formation ratings for one side; absent values stay `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationRatings {
    pub midfield: Option<f64>,
    pub right_defense: Option<f64>,
    pub central_defense: Option<f64>,
    pub left_defense: Option<f64>,
    pub right_attack: Option<f64>,
    pub central_attack: Option<f64>,
    pub left_attack: Option<f64>,
}

impl FormationRatings {
    pub fn get(&self, slot: RatingSlot) -> Option<f64> {
        match slot {
            RatingSlot::Midfield => self.midfield,
            RatingSlot::RightDefense => self.right_defense,
            RatingSlot::CentralDefense => self.central_defense,
            RatingSlot::LeftDefense => self.left_defense,
            RatingSlot::RightAttack => self.right_attack,
            RatingSlot::CentralAttack => self.central_attack,
            RatingSlot::LeftAttack => self.left_attack,
        }
    }

    pub fn set(&mut self, slot: RatingSlot, value: Option<f64>) {
        let target = match slot {
            RatingSlot::Midfield => &mut self.midfield,
            RatingSlot::RightDefense => &mut self.right_defense,
            RatingSlot::CentralDefense => &mut self.central_defense,
            RatingSlot::LeftDefense => &mut self.left_defense,
            RatingSlot::RightAttack => &mut self.right_attack,
            RatingSlot::CentralAttack => &mut self.central_attack,
            RatingSlot::LeftAttack => &mut self.left_attack,
        };
        *target = value;
    }

    pub fn is_empty(&self) -> bool {
        RatingSlot::ALL.iter().all(|slot| self.get(*slot).is_none())
    }
}

/// One team's descriptor within a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSide {
    pub id: Option<u64>,
    pub name: String,
    pub goals: Option<u32>,
    pub ratings: FormationRatings,
    pub tactic_type: Option<String>,
    pub tactic_skill: Option<u32>,
}

/// A single match event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub minute: u32,
    pub type_code: u32,
    pub subject_player: Option<u64>,
    pub object_player: Option<u64>,
    pub subject_team: Option<u64>,
    pub is_home: bool,
    pub is_special: bool,
}

/// Ratings snapshot for one minute of the match timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub minute: u32,
    pub ratings: serde_json::Value,
}

/// The canonical record produced for one successfully fetched match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub match_id: u64,
    pub played_at: Option<NaiveDateTime>,
    pub kind: MatchKind,
    pub arena: Option<String>,
    pub home: TeamSide,
    pub away: TeamSide,
    pub events: Vec<MatchEvent>,
    pub timeline: Option<Vec<TimelineSnapshot>>,
    pub source: Strategy,
}

impl MatchRecord {
    pub fn team(&self, side: Side) -> &TeamSide {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Number of events flagged as special
    pub fn special_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_special).count()
    }
}
