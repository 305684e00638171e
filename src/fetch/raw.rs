//! Strategy-neutral raw fetch output
//!
//! Both strategies fill a flat field map plus an event array. Values are kept
//! as trimmed text; the normalizer decides how to interpret them.

use crate::fetch::Strategy;
use crate::record::{RatingSlot, Side};
use std::collections::BTreeMap;

/// Keys of the flat field map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    MatchId,
    PlayedAt,
    Kind,
    ArenaName,
    TeamId(Side),
    TeamName(Side),
    Goals(Side),
    Rating(Side, RatingSlot),
    TacticType(Side),
    TacticSkill(Side),
}

/// An event as read from the source, before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub minute: u32,
    pub type_code: u32,
    pub subject_player: Option<u64>,
    pub object_player: Option<u64>,
    pub subject_team: Option<u64>,
    /// Set when the source states the side directly
    pub is_home: Option<bool>,
}

/// A timeline entry whose snapshot was valid JSON
#[derive(Debug, Clone, PartialEq)]
pub struct RawTimelinePoint {
    pub minute: u32,
    pub snapshot: serde_json::Value,
}

/// Raw result of fetching one match
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    pub strategy: Strategy,
    fields: BTreeMap<Field, String>,
    pub events: Vec<RawEvent>,
    pub timeline: Option<Vec<RawTimelinePoint>>,
}

impl RawMatch {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            fields: BTreeMap::new(),
            events: Vec::new(),
            timeline: None,
        }
    }

    /// Stores a trimmed value; blank values are treated as absent
    pub fn set(&mut self, field: Field, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if value.is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value.to_string());
        }
    }

    /// Stores the value if one was found
    pub fn set_opt(&mut self, field: Field, value: Option<impl AsRef<str>>) {
        if let Some(value) = value {
            self.set(field, value);
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn has(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }
}
