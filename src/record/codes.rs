//! Fixed lookup tables for source codes
//!
//! These tables mirror the source system's numbering as-is. They are opaque
//! constants: extend them only when the source adds codes.

use crate::record::MatchKind;

/// Event type codes flagged as special events
pub const SPECIAL_EVENT_CODES: &[u32] = &[
    105, 106, 107, 108, 109, 110, 111, 112, 113, 114, 115, 116, 117, 118, 119, 125, 135, 136, 137,
    138, 139, 140, 141, 142, 143, 190, 205, 206, 207, 208, 209, 210, 211, 212, 213, 214, 215, 216,
    217, 218, 219, 225, 235, 236, 237, 238, 239, 240, 241, 242, 243, 290,
];

/// Tactic identifiers and their display names
pub const TACTIC_NAMES: &[(u32, &str)] = &[
    (0, "Normal"),
    (1, "Pressing"),
    (2, "Counter-attacks"),
    (3, "Attack in the middle"),
    (4, "Attack on wings"),
    (7, "Play creatively"),
    (8, "Long shots"),
];

/// Returns true if the event type code is in the special-event set
pub fn is_special_event(type_code: u32) -> bool {
    SPECIAL_EVENT_CODES.contains(&type_code)
}

/// Looks up the display name for a tactic identifier
pub fn tactic_name(tactic_id: u32) -> Option<&'static str> {
    TACTIC_NAMES
        .iter()
        .find(|(id, _)| *id == tactic_id)
        .map(|(_, name)| *name)
}

/// Maps a structured-query match type code to a classification
pub fn match_kind_from_type(type_code: u32) -> MatchKind {
    match type_code {
        1 => MatchKind::League,
        2 => MatchKind::Qualification,
        3 => MatchKind::Cup,
        4 | 5 | 8 | 9 | 12 => MatchKind::Friendly,
        _ => MatchKind::Other,
    }
}
