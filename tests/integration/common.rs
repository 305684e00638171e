//! Shared fixtures for the integration tests

use match_harvester::config::{
    Config, FetcherConfig, JobConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use std::path::Path;

/// Creates a configuration pointing both strategies at a mock server
pub fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        user_agent: UserAgentConfig {
            client_name: "TestHarvester".to_string(),
            client_version: "1.0.0".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        source: SourceConfig {
            detail_url: format!("{}/Club/Matches/Match.aspx?matchID={{id}}", base_url),
            query_url: format!("{}/chppxml.ashx", base_url),
            query_version: "3.0".to_string(),
            source_system: "hattrick".to_string(),
            isolated_sessions: true,
        },
        fetcher: FetcherConfig {
            page_timeout_secs: 5,
            settle_delay_ms: 1, // Very short for testing
            request_timeout_secs: 5,
        },
        job: JobConfig {
            interval_ms: 100,
            checkpoint_every: 2,
            ..JobConfig::default()
        },
        output: OutputConfig {
            checkpoint_path: dir.join("checkpoint.json").display().to_string(),
            results_path: dir.join("results.json").display().to_string(),
        },
    }
}

/// A rendered detail page for one match
pub fn detail_page(home: &str, away: &str, score: &str) -> String {
    format!(
        r#"<html><body>
        <div class="match-header">
            <a class="team-home" href="/Club/?TeamID=11">{home}</a>
            <a class="team-away" href="/Club/?TeamID=22">{away}</a>
            <span class="match-date">2024-03-09 20:15</span>
            <a class="arena" href="/Arena/?ArenaID=5">Rovers Park</a>
        </div>
        <div class="scoreboard"><span class="scoreboard-score">{score}</span></div>
        <div class="match-events">
            <div class="event" data-minute="12" data-type="105" data-subject-player="501" data-subject-team="11"></div>
        </div>
        </body></html>"#
    )
}

/// A structured query document for one match
pub fn match_document(match_id: u64, home: &str, away: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<HattrickData>
  <Match>
    <MatchID>{match_id}</MatchID>
    <MatchType>1</MatchType>
    <MatchDate>2024-03-09 20:15:00</MatchDate>
    <HomeTeam>
      <HomeTeamID>11</HomeTeamID>
      <HomeTeamName>{home}</HomeTeamName>
      <HomeGoals>2</HomeGoals>
      <RatingMidfield>31</RatingMidfield>
    </HomeTeam>
    <AwayTeam>
      <AwayTeamID>22</AwayTeamID>
      <AwayTeamName>{away}</AwayTeamName>
      <AwayGoals>0</AwayGoals>
    </AwayTeam>
    <EventList>
      <Event Index="1">
        <Minute>30</Minute>
        <EventTypeID>20</EventTypeID>
        <SubjectTeamID>22</SubjectTeamID>
        <SubjectPlayerID>733</SubjectPlayerID>
        <ObjectPlayerID>0</ObjectPlayerID>
      </Event>
    </EventList>
  </Match>
</HattrickData>"#
    )
}
