//! CSV rendering of match records
//!
//! Columns come from a fixed ordered table. Nested structures are flattened:
//! events become `minute:type:subject:object:H|A[:SE]` joined by `;`, and
//! the timeline is written as compact JSON.

use crate::record::{MatchEvent, MatchRecord, RatingSlot, Side};

/// What a column reads from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue {
    MatchId,
    PlayedAt,
    Kind,
    Arena,
    TeamId(Side),
    TeamName(Side),
    Goals(Side),
    Rating(Side, RatingSlot),
    TacticType(Side),
    TacticSkill(Side),
    EventCount,
    SpecialEventCount,
    Events,
    Timeline,
}

/// One export column: a stable key, a display label and its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub value: ColumnValue,
}

impl Column {
    fn new(key: impl Into<String>, label: impl Into<String>, value: ColumnValue) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
        }
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Home => "Home",
        Side::Away => "Away",
    }
}

fn slot_label(slot: RatingSlot) -> &'static str {
    match slot {
        RatingSlot::Midfield => "Midfield",
        RatingSlot::RightDefense => "Right Defense",
        RatingSlot::CentralDefense => "Central Defense",
        RatingSlot::LeftDefense => "Left Defense",
        RatingSlot::RightAttack => "Right Attack",
        RatingSlot::CentralAttack => "Central Attack",
        RatingSlot::LeftAttack => "Left Attack",
    }
}

/// The export column table, in output order
pub fn columns() -> Vec<Column> {
    let mut columns = vec![
        Column::new("match_id", "Match ID", ColumnValue::MatchId),
        Column::new("played_at", "Date", ColumnValue::PlayedAt),
        Column::new("kind", "Match Type", ColumnValue::Kind),
        Column::new("arena", "Arena", ColumnValue::Arena),
    ];

    for side in Side::BOTH {
        let (key, label) = (side.as_str(), side_label(side));
        columns.push(Column::new(
            format!("{key}_team_id"),
            format!("{label} Team ID"),
            ColumnValue::TeamId(side),
        ));
        columns.push(Column::new(
            format!("{key}_team_name"),
            format!("{label} Team"),
            ColumnValue::TeamName(side),
        ));
        columns.push(Column::new(
            format!("{key}_goals"),
            format!("{label} Goals"),
            ColumnValue::Goals(side),
        ));
    }

    for side in Side::BOTH {
        for slot in RatingSlot::ALL {
            columns.push(Column::new(
                format!("{}_{}", side.as_str(), slot.as_str()),
                format!("{} {}", side_label(side), slot_label(slot)),
                ColumnValue::Rating(side, slot),
            ));
        }
        columns.push(Column::new(
            format!("{}_tactic_type", side.as_str()),
            format!("{} Tactic", side_label(side)),
            ColumnValue::TacticType(side),
        ));
        columns.push(Column::new(
            format!("{}_tactic_skill", side.as_str()),
            format!("{} Tactic Skill", side_label(side)),
            ColumnValue::TacticSkill(side),
        ));
    }

    columns.extend([
        Column::new("event_count", "Events", ColumnValue::EventCount),
        Column::new(
            "special_event_count",
            "Special Events",
            ColumnValue::SpecialEventCount,
        ),
        Column::new("events", "Event List", ColumnValue::Events),
        Column::new("timeline", "Timeline", ColumnValue::Timeline),
    ]);

    columns
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flatten_event(event: &MatchEvent) -> String {
    let mut text = format!(
        "{}:{}:{}:{}:{}",
        event.minute,
        event.type_code,
        opt(event.subject_player),
        opt(event.object_player),
        if event.is_home { "H" } else { "A" }
    );
    if event.is_special {
        text.push_str(":SE");
    }
    text
}

fn cell(record: &MatchRecord, value: ColumnValue) -> Result<String, serde_json::Error> {
    let text = match value {
        ColumnValue::MatchId => record.match_id.to_string(),
        ColumnValue::PlayedAt => opt(record
            .played_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S"))),
        ColumnValue::Kind => record.kind.to_string(),
        ColumnValue::Arena => record.arena.clone().unwrap_or_default(),
        ColumnValue::TeamId(side) => opt(record.team(side).id),
        ColumnValue::TeamName(side) => record.team(side).name.clone(),
        ColumnValue::Goals(side) => opt(record.team(side).goals),
        ColumnValue::Rating(side, slot) => opt(record.team(side).ratings.get(slot)),
        ColumnValue::TacticType(side) => record.team(side).tactic_type.clone().unwrap_or_default(),
        ColumnValue::TacticSkill(side) => opt(record.team(side).tactic_skill),
        ColumnValue::EventCount => record.events.len().to_string(),
        ColumnValue::SpecialEventCount => record.special_event_count().to_string(),
        ColumnValue::Events => record
            .events
            .iter()
            .map(flatten_event)
            .collect::<Vec<_>>()
            .join(";"),
        ColumnValue::Timeline => match &record.timeline {
            Some(timeline) => serde_json::to_string(timeline)?,
            None => String::new(),
        },
    };
    Ok(text)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Quotes a field when it contains a comma, quote, CR or LF
pub fn escape_field(field: &str) -> String {
    if needs_quotes(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

/// Renders the header row and one row per record
pub fn render(records: &[MatchRecord]) -> Result<String, serde_json::Error> {
    let columns = columns();
    let mut out = String::new();

    push_row(&mut out, columns.iter().map(|c| c.label.as_str()));

    for record in records {
        let cells = columns
            .iter()
            .map(|c| cell(record, c.value))
            .collect::<Result<Vec<_>, _>>()?;
        push_row(&mut out, cells.iter().map(String::as_str));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn test_column_table_shape() {
        let columns = columns();
        assert_eq!(columns.len(), 4 + 6 + 2 * 9 + 4);
        assert_eq!(columns[0].key, "match_id");
        assert!(columns.iter().any(|c| c.key == "away_central_attack"));
        assert_eq!(columns.last().map(|c| c.key.as_str()), Some("timeline"));
    }

    #[test]
    fn test_flatten_event() {
        let event = MatchEvent {
            minute: 12,
            type_code: 105,
            subject_player: Some(501),
            object_player: None,
            subject_team: Some(11),
            is_home: true,
            is_special: true,
        };
        assert_eq!(flatten_event(&event), "12:105:501::H:SE");

        let event = MatchEvent {
            is_home: false,
            is_special: false,
            ..event
        };
        assert_eq!(flatten_event(&event), "12:105:501::A");
    }
}
