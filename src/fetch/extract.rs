//! DOM extraction for rendered match pages
//!
//! Every field has a primary selector and at most one fallback. A missing
//! optional field is left out of the [`RawMatch`]; only a page without any of
//! the expected structure, or without team names, is an error.
//!
//! # Page Structure
//!
//! | Field | Primary | Fallback |
//! |-------|---------|----------|
//! | Team names / ids | `.match-header a.team-home`, `a.team-away` | `.scoreboard .scoreboard-home`, `.scoreboard-away` |
//! | Score | `.scoreboard .scoreboard-score` | `.match-header .byline` |
//! | Date | `.match-header .match-date` | `time[datetime]` |
//! | Classification | marker elements in `.match-header` | `Other` |
//! | Ratings | `td.rating-home` / `td.rating-away` per row | last two cells of the row |
//! | Events | `.match-events .event` | `#eventsLegacy li` |
//! | Timeline | `input.timeline-minute` + `input.timeline-ratings` | none |

use crate::fetch::raw::{Field, RawEvent, RawMatch, RawTimelinePoint};
use crate::fetch::{FetchError, Strategy};
use crate::record::{MatchKind, RatingSlot, Side};
use crate::state::JobOptions;
use crate::{AcquisitionError, ParseError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

const RATING_ROWS: usize = 7;

const KIND_MARKERS: &[(&str, MatchKind)] = &[
    (".match-header .match-league", MatchKind::League),
    (".match-header .match-friendly", MatchKind::Friendly),
    (".match-header .match-cup", MatchKind::Cup),
    (".match-header .match-qualification", MatchKind::Qualification),
];

const TACTIC_TYPE_LABELS: &[&str] = &["tactic", "战术"];
const TACTIC_SKILL_LABELS: &[&str] = &["skill", "level", "技能", "等级"];

/// Extracts a raw match from a rendered detail page
///
/// # Arguments
///
/// * `html` - The rendered document
/// * `match_id` - The identifier that was navigated to
/// * `options` - Which optional sections to read
///
/// # Returns
///
/// * `Ok(RawMatch)` - Whatever the page offered
/// * `Err(FetchError)` - The page lacks its expected structure or team names
pub fn extract_match(html: &str, match_id: u64, options: &JobOptions) -> Result<RawMatch, FetchError> {
    let document = Html::parse_document(html);

    if !has_any(&document, ".match-header") && !has_any(&document, ".scoreboard") {
        return Err(AcquisitionError::Blocked { id: match_id }.into());
    }

    let mut raw = RawMatch::new(Strategy::IsolatedSession);
    raw.set(Field::MatchId, match_id.to_string());

    extract_teams(&document, &mut raw);
    if !raw.has(Field::TeamName(Side::Home)) || !raw.has(Field::TeamName(Side::Away)) {
        return Err(ParseError::MissingElement {
            id: match_id,
            what: "team names",
        }
        .into());
    }

    extract_score(&document, &mut raw);
    extract_date(&document, &mut raw);
    raw.set(Field::Kind, classify(&document).as_str());
    raw.set_opt(Field::ArenaName, first_text(&document, ".match-header a.arena"));

    extract_ratings_table(&document, &mut raw, options.include_ratings);

    if options.include_events {
        raw.events = extract_events(&document);
    }

    if options.include_timeline {
        raw.timeline = Some(extract_timeline(&document));
    }

    Ok(raw)
}

fn extract_teams(document: &Html, raw: &mut RawMatch) {
    for (side, anchor, fallback) in [
        (
            Side::Home,
            ".match-header a.team-home",
            ".scoreboard .scoreboard-home",
        ),
        (
            Side::Away,
            ".match-header a.team-away",
            ".scoreboard .scoreboard-away",
        ),
    ] {
        match first_element(document, anchor) {
            Some(element) => {
                raw.set(Field::TeamName(side), element_text(&element));
                raw.set_opt(
                    Field::TeamId(side),
                    element.value().attr("href").and_then(team_id_from_href),
                );
            }
            None => {
                tracing::trace!("Team anchor missing, using scoreboard for {:?}", side);
                raw.set_opt(Field::TeamName(side), first_text(document, fallback));
            }
        }
    }
}

fn extract_score(document: &Html, raw: &mut RawMatch) {
    let score = first_text(document, ".scoreboard .scoreboard-score")
        .and_then(|text| parse_score(&text))
        .or_else(|| {
            tracing::trace!("Scoreboard score missing, using header byline");
            first_text(document, ".match-header .byline").and_then(|text| parse_score(&text))
        });

    if let Some((home, away)) = score {
        raw.set(Field::Goals(Side::Home), home.to_string());
        raw.set(Field::Goals(Side::Away), away.to_string());
    }
}

fn extract_date(document: &Html, raw: &mut RawMatch) {
    let date = first_text(document, ".match-header .match-date").or_else(|| {
        first_element(document, "time[datetime]")
            .and_then(|element| element.value().attr("datetime").map(str::to_string))
    });
    raw.set_opt(Field::PlayedAt, date);
}

fn classify(document: &Html) -> MatchKind {
    KIND_MARKERS
        .iter()
        .find(|(css, _)| has_any(document, css))
        .map(|(_, kind)| *kind)
        .unwrap_or(MatchKind::Other)
}

/// Reads the seven rating rows and the tactic rows that follow them
fn extract_ratings_table(document: &Html, raw: &mut RawMatch, include_ratings: bool) {
    let (Ok(row_selector), Ok(cell_selector), Ok(home_selector), Ok(away_selector)) = (
        Selector::parse("table.ratings tr"),
        Selector::parse("td"),
        Selector::parse("td.rating-home"),
        Selector::parse("td.rating-away"),
    ) else {
        return;
    };

    // Header rows carry only `th` cells and must not take a rating slot
    let rows: Vec<ElementRef> = document
        .select(&row_selector)
        .filter(|row| row.select(&cell_selector).next().is_some())
        .collect();

    if include_ratings {
        for (row, slot) in rows.iter().zip(RatingSlot::ALL) {
            let primary = (
                row.select(&home_selector).next(),
                row.select(&away_selector).next(),
            );
            let (home, away) = match primary {
                (Some(home), Some(away)) => (element_text(&home), element_text(&away)),
                _ => match last_two_cells(row, &cell_selector) {
                    Some(pair) => pair,
                    None => continue,
                },
            };

            raw.set_opt(Field::Rating(Side::Home, slot), first_number(&home));
            raw.set_opt(Field::Rating(Side::Away, slot), first_number(&away));
        }
    }

    for row in rows.iter().skip(RATING_ROWS) {
        let label = row
            .select(&cell_selector)
            .next()
            .map(|cell| element_text(&cell).to_lowercase())
            .unwrap_or_default();
        let Some((home, away)) = last_two_cells(row, &cell_selector) else {
            continue;
        };

        // "Tactic skill" carries both keywords, so skill is checked first
        if contains_any(&label, TACTIC_SKILL_LABELS) {
            raw.set_opt(Field::TacticSkill(Side::Home), first_number(&home));
            raw.set_opt(Field::TacticSkill(Side::Away), first_number(&away));
        } else if contains_any(&label, TACTIC_TYPE_LABELS) {
            raw.set(Field::TacticType(Side::Home), home);
            raw.set(Field::TacticType(Side::Away), away);
        }
    }
}

fn extract_events(document: &Html) -> Vec<RawEvent> {
    let structured: Vec<RawEvent> = select_all(document, ".match-events .event")
        .iter()
        .filter_map(structured_event)
        .collect();

    if !structured.is_empty() {
        return structured;
    }

    tracing::trace!("Structured event list empty, trying legacy list");
    select_all(document, "#eventsLegacy li")
        .iter()
        .filter_map(legacy_event)
        .collect()
}

fn structured_event(element: &ElementRef) -> Option<RawEvent> {
    let attrs = element.value();
    Some(RawEvent {
        minute: attrs.attr("data-minute")?.trim().parse().ok()?,
        type_code: attrs.attr("data-type")?.trim().parse().ok()?,
        subject_player: attrs.attr("data-subject-player").and_then(parse_id),
        object_player: attrs.attr("data-object-player").and_then(parse_id),
        subject_team: attrs.attr("data-subject-team").and_then(parse_id),
        is_home: attrs.attr("data-team").and_then(side_flag),
    })
}

fn legacy_event(element: &ElementRef) -> Option<RawEvent> {
    let minute = legacy_minute_regex()
        .captures(&element_text(element))?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;

    let attrs = element.value();
    Some(RawEvent {
        minute,
        type_code: attrs.attr("data-event-type")?.trim().parse().ok()?,
        is_home: attrs.attr("data-team").and_then(side_flag),
        ..RawEvent::default()
    })
}

/// Pairs minute inputs with JSON snapshot inputs; malformed entries are skipped
fn extract_timeline(document: &Html) -> Vec<RawTimelinePoint> {
    let minutes = select_all(document, "input.timeline-minute");
    let snapshots = select_all(document, "input.timeline-ratings");

    minutes
        .iter()
        .zip(snapshots.iter())
        .filter_map(|(minute, snapshot)| {
            let minute: u32 = minute.value().attr("value")?.trim().parse().ok()?;
            let json = snapshot.value().attr("value")?;
            match serde_json::from_str(json) {
                Ok(snapshot) => Some(RawTimelinePoint { minute, snapshot }),
                Err(e) => {
                    tracing::debug!("Skipping timeline minute {}: {}", minute, e);
                    None
                }
            }
        })
        .collect()
}

/// Reads the first standalone `home - away` pair from text
///
/// Digit runs joined by more hyphens, as in dates, are not scores.
pub fn parse_score(text: &str) -> Option<(u32, u32)> {
    let captures = score_regex().captures(text)?;
    Some((captures[1].parse().ok()?, captures[2].parse().ok()?))
}

fn team_id_from_href(href: &str) -> Option<String> {
    team_id_regex()
        .captures(href)
        .map(|captures| captures[1].to_string())
}

fn first_number(text: &str) -> Option<String> {
    number_regex()
        .find(text)
        .map(|m| m.as_str().replace(',', "."))
}

fn parse_id(value: &str) -> Option<u64> {
    value.trim().parse().ok().filter(|id| *id > 0)
}

fn side_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "home" => Some(true),
        "away" => Some(false),
        _ => None,
    }
}

fn contains_any(label: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| label.contains(keyword))
}

fn last_two_cells(row: &ElementRef, cell_selector: &Selector) -> Option<(String, String)> {
    let cells: Vec<String> = row.select(cell_selector).map(|c| element_text(&c)).collect();
    match cells.len() {
        0 | 1 => None,
        n => Some((cells[n - 2].clone(), cells[n - 1].clone())),
    }
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_element<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    first_element(document, css)
        .map(|element| element_text(&element))
        .filter(|text| !text.is_empty())
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn has_any(document: &Html, css: &str) -> bool {
    first_element(document, css).is_some()
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\d-])(\d{1,3})\s*-\s*(\d{1,3})(?:$|[^\d-])").expect("score pattern is valid"))
}

fn team_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)teamid=(\d+)").expect("team id pattern is valid"))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("number pattern is valid"))
}

fn legacy_minute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*'").expect("minute pattern is valid"))
}
