//! Strategy B: structured match-details query
//!
//! The query endpoint answers with an XML document rooted at a data element
//! containing one `Match` with `HomeTeam`, `AwayTeam`, `Arena` and
//! `EventList` sections. The schema is fixed, so no fallbacks are needed.

use crate::config::SourceConfig;
use crate::fetch::raw::{Field, RawEvent, RawMatch};
use crate::fetch::{FetchError, Fetcher, Strategy};
use crate::record::codes::match_kind_from_type;
use crate::record::{RatingSlot, Side};
use crate::state::JobOptions;
use crate::{AcquisitionError, ParseError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const RESOURCE: &str = "matchdetails";

/// Queries the source's structured interface for each match
pub struct StructuredQueryFetcher {
    client: Client,
    query_url: String,
    version: String,
    source_system: String,
    request_timeout: Duration,
}

impl StructuredQueryFetcher {
    /// Creates a new fetcher
    ///
    /// `request_timeout` must match the timeout `client` was built with; it is
    /// only used to report timeouts.
    pub fn new(client: Client, source: &SourceConfig, request_timeout: Duration) -> Self {
        Self {
            client,
            query_url: source.query_url.clone(),
            version: source.query_version.clone(),
            source_system: source.source_system.clone(),
            request_timeout,
        }
    }

    fn query_params(&self, match_id: u64, options: &JobOptions) -> Vec<(&'static str, String)> {
        vec![
            ("file", RESOURCE.to_string()),
            ("version", self.version.clone()),
            ("matchID", match_id.to_string()),
            ("matchEvents", options.include_events.to_string()),
            ("sourceSystem", self.source_system.clone()),
        ]
    }
}

#[async_trait]
impl Fetcher for StructuredQueryFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::StructuredQuery
    }

    async fn fetch(&self, match_id: u64, options: &JobOptions) -> Result<RawMatch, FetchError> {
        let response = self
            .client
            .get(&self.query_url)
            .query(&self.query_params(match_id, options))
            .send()
            .await
            .map_err(|e| self.classify_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Http {
                url: self.query_url.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify_request_error(e))?;

        parse_match_document(&body, match_id, options)
    }
}

impl StructuredQueryFetcher {
    fn classify_request_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            AcquisitionError::Timeout {
                url: self.query_url.clone(),
                secs: self.request_timeout.as_secs(),
            }
            .into()
        } else {
            AcquisitionError::Navigation {
                url: self.query_url.clone(),
                message: error.to_string(),
            }
            .into()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataDocument {
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Match")]
    match_element: Option<MatchElement>,
}

#[derive(Debug, Deserialize)]
struct MatchElement {
    #[serde(rename = "MatchID")]
    match_id: Option<String>,
    #[serde(rename = "MatchType")]
    match_type: Option<String>,
    #[serde(rename = "MatchDate")]
    match_date: Option<String>,
    #[serde(rename = "HomeTeam")]
    home_team: Option<TeamElement>,
    #[serde(rename = "AwayTeam")]
    away_team: Option<TeamElement>,
    #[serde(rename = "Arena")]
    arena: Option<ArenaElement>,
    #[serde(rename = "EventList")]
    event_list: Option<EventListElement>,
}

#[derive(Debug, Deserialize)]
struct TeamElement {
    #[serde(rename = "TeamID", alias = "HomeTeamID", alias = "AwayTeamID")]
    team_id: Option<String>,
    #[serde(rename = "TeamName", alias = "HomeTeamName", alias = "AwayTeamName")]
    team_name: Option<String>,
    #[serde(rename = "Goals", alias = "HomeGoals", alias = "AwayGoals")]
    goals: Option<String>,
    #[serde(rename = "TacticType")]
    tactic_type: Option<String>,
    #[serde(rename = "TacticSkill")]
    tactic_skill: Option<String>,
    #[serde(rename = "RatingMidfield")]
    rating_midfield: Option<String>,
    #[serde(rename = "RatingRightDef")]
    rating_right_def: Option<String>,
    #[serde(rename = "RatingMidDef")]
    rating_mid_def: Option<String>,
    #[serde(rename = "RatingLeftDef")]
    rating_left_def: Option<String>,
    #[serde(rename = "RatingRightAtt")]
    rating_right_att: Option<String>,
    #[serde(rename = "RatingMidAtt")]
    rating_mid_att: Option<String>,
    #[serde(rename = "RatingLeftAtt")]
    rating_left_att: Option<String>,
}

impl TeamElement {
    fn rating(&self, slot: RatingSlot) -> Option<&String> {
        match slot {
            RatingSlot::Midfield => self.rating_midfield.as_ref(),
            RatingSlot::RightDefense => self.rating_right_def.as_ref(),
            RatingSlot::CentralDefense => self.rating_mid_def.as_ref(),
            RatingSlot::LeftDefense => self.rating_left_def.as_ref(),
            RatingSlot::RightAttack => self.rating_right_att.as_ref(),
            RatingSlot::CentralAttack => self.rating_mid_att.as_ref(),
            RatingSlot::LeftAttack => self.rating_left_att.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArenaElement {
    #[serde(rename = "ArenaName")]
    arena_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListElement {
    #[serde(rename = "Event", default)]
    events: Vec<EventElement>,
}

#[derive(Debug, Deserialize)]
struct EventElement {
    #[serde(rename = "Minute")]
    minute: Option<String>,
    #[serde(rename = "EventTypeID")]
    event_type_id: Option<String>,
    #[serde(rename = "SubjectTeamID")]
    subject_team_id: Option<String>,
    #[serde(rename = "SubjectPlayerID")]
    subject_player_id: Option<String>,
    #[serde(rename = "ObjectPlayerID")]
    object_player_id: Option<String>,
}

/// Parses a match-details document into a raw match
///
/// # Arguments
///
/// * `xml` - The response body
/// * `match_id` - The identifier that was requested
/// * `options` - Which optional sections to keep
///
/// # Returns
///
/// * `Ok(RawMatch)` - The fields the document carried
/// * `Err(FetchError::Parse)` - The document is malformed, reports an error,
///   or has no `Match` element
pub fn parse_match_document(
    xml: &str,
    match_id: u64,
    options: &JobOptions,
) -> Result<RawMatch, FetchError> {
    let document: DataDocument =
        quick_xml::de::from_str(xml).map_err(|e| ParseError::MalformedDocument {
            id: match_id,
            message: e.to_string(),
        })?;

    if let Some(error) = document.error.filter(|e| !e.trim().is_empty()) {
        return Err(ParseError::MalformedDocument {
            id: match_id,
            message: format!("source reported: {}", error.trim()),
        }
        .into());
    }

    let element = document.match_element.ok_or(ParseError::MissingElement {
        id: match_id,
        what: "Match element",
    })?;

    let mut raw = RawMatch::new(Strategy::StructuredQuery);
    raw.set(
        Field::MatchId,
        element
            .match_id
            .clone()
            .unwrap_or_else(|| match_id.to_string()),
    );
    raw.set_opt(Field::PlayedAt, element.match_date.as_ref());
    if let Some(kind) = element
        .match_type
        .as_deref()
        .and_then(|code| code.trim().parse::<u32>().ok())
        .map(match_kind_from_type)
    {
        raw.set(Field::Kind, kind.as_str());
    }
    raw.set_opt(
        Field::ArenaName,
        element.arena.as_ref().and_then(|a| a.arena_name.as_ref()),
    );

    for (side, team) in [
        (Side::Home, element.home_team.as_ref()),
        (Side::Away, element.away_team.as_ref()),
    ] {
        let Some(team) = team else {
            continue;
        };

        raw.set_opt(Field::TeamId(side), team.team_id.as_ref());
        raw.set_opt(Field::TeamName(side), team.team_name.as_ref());
        raw.set_opt(Field::Goals(side), team.goals.as_ref());
        raw.set_opt(Field::TacticType(side), team.tactic_type.as_ref());
        raw.set_opt(Field::TacticSkill(side), team.tactic_skill.as_ref());

        if options.include_ratings {
            for slot in RatingSlot::ALL {
                raw.set_opt(Field::Rating(side, slot), team.rating(slot));
            }
        }
    }

    if options.include_events {
        let home_team = element
            .home_team
            .as_ref()
            .and_then(|team| team.team_id.as_deref())
            .and_then(parse_id);

        raw.events = element
            .event_list
            .map(|list| list.events)
            .unwrap_or_default()
            .iter()
            .filter_map(|event| raw_event(event, home_team))
            .collect();
    }

    Ok(raw)
}

fn raw_event(event: &EventElement, home_team: Option<u64>) -> Option<RawEvent> {
    let subject_team = event.subject_team_id.as_deref().and_then(parse_id);
    Some(RawEvent {
        minute: event.minute.as_deref()?.trim().parse().ok()?,
        type_code: event.event_type_id.as_deref()?.trim().parse().ok()?,
        subject_player: event.subject_player_id.as_deref().and_then(parse_id),
        object_player: event.object_player_id.as_deref().and_then(parse_id),
        subject_team,
        is_home: subject_team.map(|team| Some(team) == home_team),
    })
}

fn parse_id(value: &str) -> Option<u64> {
    value.trim().parse().ok().filter(|id| *id > 0)
}
