//! Raw fetch output to canonical record
//!
//! Normalization never fails on missing optional data: an absent or
//! unparseable optional value becomes `None`. Only a record without an
//! identifier or team names is rejected.

use crate::fetch::raw::{Field, RawEvent, RawMatch};
use crate::record::codes::{is_special_event, tactic_name};
use crate::record::{
    FormationRatings, MatchEvent, MatchKind, MatchRecord, RatingSlot, Side, TeamSide,
    TimelineSnapshot,
};
use crate::ValidationError;
use chrono::NaiveDateTime;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M",
];

/// Converts a strategy's raw result into a [`MatchRecord`]
///
/// # Returns
///
/// * `Ok(MatchRecord)` - The canonical record, with gaps left as `None`
/// * `Err(ValidationError::MissingIdentity)` - No identifier or no team names
pub fn normalize(raw: &RawMatch) -> Result<MatchRecord, ValidationError> {
    let match_id = raw
        .get(Field::MatchId)
        .and_then(parse_id)
        .ok_or(ValidationError::MissingIdentity("match id"))?;

    let home = team_side(raw, Side::Home).ok_or(ValidationError::MissingIdentity("home team name"))?;
    let away = team_side(raw, Side::Away).ok_or(ValidationError::MissingIdentity("away team name"))?;

    let events = raw
        .events
        .iter()
        .map(|event| canonical_event(event, home.id))
        .collect();

    let timeline = raw.timeline.as_ref().map(|points| {
        points
            .iter()
            .map(|point| TimelineSnapshot {
                minute: point.minute,
                ratings: point.snapshot.clone(),
            })
            .collect()
    });

    Ok(MatchRecord {
        match_id,
        played_at: raw.get(Field::PlayedAt).and_then(parse_match_date),
        kind: raw
            .get(Field::Kind)
            .map(MatchKind::from_label)
            .unwrap_or(MatchKind::Other),
        arena: raw.get(Field::ArenaName).map(str::to_string),
        home,
        away,
        events,
        timeline,
        source: raw.strategy,
    })
}

/// Parses the date formats the source is known to render
pub fn parse_match_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn team_side(raw: &RawMatch, side: Side) -> Option<TeamSide> {
    let name = raw.get(Field::TeamName(side))?.to_string();

    let mut ratings = FormationRatings::default();
    for slot in RatingSlot::ALL {
        ratings.set(slot, raw.get(Field::Rating(side, slot)).and_then(parse_rating));
    }

    Some(TeamSide {
        id: raw.get(Field::TeamId(side)).and_then(parse_id),
        name,
        goals: raw.get(Field::Goals(side)).and_then(|v| v.parse().ok()),
        ratings,
        tactic_type: raw.get(Field::TacticType(side)).map(tactic_label),
        tactic_skill: raw.get(Field::TacticSkill(side)).and_then(|v| v.parse().ok()),
    })
}

fn canonical_event(event: &RawEvent, home_team: Option<u64>) -> MatchEvent {
    let is_home = event.is_home.unwrap_or_else(|| {
        matches!((event.subject_team, home_team), (Some(subject), Some(home)) if subject == home)
    });

    MatchEvent {
        minute: event.minute,
        type_code: event.type_code,
        subject_player: event.subject_player,
        object_player: event.object_player,
        subject_team: event.subject_team,
        is_home,
        is_special: is_special_event(event.type_code),
    }
}

/// Numeric tactic ids become their display name; text labels pass through
fn tactic_label(value: &str) -> String {
    match value.parse::<u32>() {
        Ok(id) => tactic_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Err(_) => value.to_string(),
    }
}

fn parse_id(value: &str) -> Option<u64> {
    value.trim().parse().ok().filter(|id| *id > 0)
}

fn parse_rating(value: &str) -> Option<f64> {
    value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::raw::RawTimelinePoint;
    use crate::fetch::Strategy;

    fn minimal_raw() -> RawMatch {
        let mut raw = RawMatch::new(Strategy::StructuredQuery);
        raw.set(Field::MatchId, "7001");
        raw.set(Field::TeamName(Side::Home), "Rovers");
        raw.set(Field::TeamName(Side::Away), "United");
        raw
    }

    #[test]
    fn test_missing_optional_fields_normalize_to_none() {
        let record = normalize(&minimal_raw()).unwrap();

        assert_eq!(record.match_id, 7001);
        assert_eq!(record.played_at, None);
        assert_eq!(record.kind, MatchKind::Other);
        assert!(record.home.ratings.is_empty());
        assert!(record.away.ratings.is_empty());
        assert_eq!(record.home.goals, None);
        assert_eq!(record.away.tactic_type, None);
        assert!(record.events.is_empty());
        assert_eq!(record.timeline, None);
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let mut raw = minimal_raw();
        raw.set(Field::MatchId, "");
        assert_eq!(
            normalize(&raw),
            Err(ValidationError::MissingIdentity("match id"))
        );

        let mut raw = minimal_raw();
        raw.set(Field::TeamName(Side::Away), "");
        assert_eq!(
            normalize(&raw),
            Err(ValidationError::MissingIdentity("away team name"))
        );
    }

    #[test]
    fn test_full_field_mapping() {
        let mut raw = minimal_raw();
        raw.set(Field::PlayedAt, "2024-03-09 20:15:00");
        raw.set(Field::Kind, "cup");
        raw.set(Field::TeamId(Side::Home), "11");
        raw.set(Field::TeamId(Side::Away), "22");
        raw.set(Field::Goals(Side::Home), "3");
        raw.set(Field::Goals(Side::Away), "1");
        raw.set(Field::Rating(Side::Home, RatingSlot::Midfield), "7,5");
        raw.set(Field::Rating(Side::Away, RatingSlot::LeftAttack), "not a number");
        raw.set(Field::TacticType(Side::Home), "1");
        raw.set(Field::TacticType(Side::Away), "Long shots");
        raw.set(Field::TacticSkill(Side::Home), "12");

        let record = normalize(&raw).unwrap();

        assert_eq!(
            record.played_at,
            parse_match_date("2024-03-09 20:15")
        );
        assert_eq!(record.kind, MatchKind::Cup);
        assert_eq!(record.home.id, Some(11));
        assert_eq!(record.home.goals, Some(3));
        assert_eq!(record.away.goals, Some(1));
        assert_eq!(record.home.ratings.midfield, Some(7.5));
        assert_eq!(record.away.ratings.left_attack, None);
        assert_eq!(record.home.tactic_type.as_deref(), Some("Pressing"));
        assert_eq!(record.away.tactic_type.as_deref(), Some("Long shots"));
        assert_eq!(record.home.tactic_skill, Some(12));
        assert_eq!(record.source, Strategy::StructuredQuery);
    }

    #[test]
    fn test_events_are_classified_and_sided() {
        let mut raw = minimal_raw();
        raw.set(Field::TeamId(Side::Home), "11");
        raw.events = vec![
            RawEvent {
                minute: 12,
                type_code: 105,
                subject_team: Some(11),
                ..RawEvent::default()
            },
            RawEvent {
                minute: 40,
                type_code: 20,
                subject_team: Some(22),
                ..RawEvent::default()
            },
            RawEvent {
                minute: 77,
                type_code: 20,
                is_home: Some(true),
                ..RawEvent::default()
            },
        ];

        let record = normalize(&raw).unwrap();

        assert!(record.events[0].is_special);
        assert!(record.events[0].is_home);
        assert!(!record.events[1].is_special);
        assert!(!record.events[1].is_home);
        assert!(record.events[2].is_home);
        assert_eq!(record.special_event_count(), 1);
    }

    #[test]
    fn test_timeline_is_carried_over() {
        let mut raw = minimal_raw();
        raw.timeline = Some(vec![RawTimelinePoint {
            minute: 45,
            snapshot: serde_json::json!({"home": [1, 2]}),
        }]);

        let record = normalize(&raw).unwrap();
        let timeline = record.timeline.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].minute, 45);
    }

    #[test]
    fn test_parse_match_date_formats() {
        assert!(parse_match_date("2024-03-09 20:15:00").is_some());
        assert!(parse_match_date("09.03.2024 20:15").is_some());
        assert!(parse_match_date("2024-03-09T20:15:00").is_some());
        assert!(parse_match_date("yesterday").is_none());
    }
}
