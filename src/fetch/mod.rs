//! Match acquisition strategies
//!
//! This module contains the two interchangeable ways of obtaining one match:
//! - Strategy A: an isolated browsing session renders the detail view and the
//!   page is read with CSS selectors (`isolated`, `session`, `extract`)
//! - Strategy B: the structured query interface returns an XML document
//!   (`structured`)
//!
//! Both produce a [`RawMatch`]. Callers pick a strategy through
//! [`FetcherSet::select`] and never branch on the strategy themselves.

pub mod extract;
mod isolated;
pub mod raw;
pub mod session;
mod structured;

pub use isolated::IsolatedSessionFetcher;
pub use raw::{Field, RawEvent, RawMatch, RawTimelinePoint};
pub use session::{BrowserSession, HttpSessionLauncher, SessionGuard, SessionLauncher};
pub use structured::{parse_match_document, StructuredQueryFetcher};

use crate::config::{Config, UserAgentConfig};
use crate::state::JobOptions;
use crate::{AcquisitionError, HarvestError, ParseError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The acquisition strategy that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    IsolatedSession,
    StructuredQuery,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IsolatedSession => f.write_str("isolated-session"),
            Self::StructuredQuery => f.write_str("structured-query"),
        }
    }
}

/// Per-item fetch failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// Systemic failures abort the job instead of being recorded per item
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::Acquisition(AcquisitionError::SessionUnavailable(_))
        )
    }
}

impl From<FetchError> for HarvestError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Acquisition(e) => Self::Acquisition(e),
            FetchError::Parse(e) => Self::Parse(e),
        }
    }
}

/// One way of fetching a match by identifier
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The strategy this fetcher implements
    fn strategy(&self) -> Strategy;

    /// Checks that the strategy can run at all before a job starts
    ///
    /// Only systemic problems are reported here; per-item problems surface
    /// from [`Fetcher::fetch`].
    async fn preflight(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetches one match
    async fn fetch(&self, match_id: u64, options: &JobOptions) -> Result<RawMatch, FetchError>;
}

/// Both strategies, chosen per job by [`JobOptions::use_structured_api`]
#[derive(Clone)]
pub struct FetcherSet {
    isolated: Arc<dyn Fetcher>,
    structured: Arc<dyn Fetcher>,
}

impl FetcherSet {
    pub fn new(isolated: Arc<dyn Fetcher>, structured: Arc<dyn Fetcher>) -> Self {
        Self {
            isolated,
            structured,
        }
    }

    /// Builds the production fetchers from configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let request_timeout = Duration::from_secs(config.fetcher.request_timeout_secs);
        let client = build_http_client(&config.user_agent, request_timeout)?;

        let launcher = Arc::new(HttpSessionLauncher::new(
            config.user_agent.clone(),
            config.source.isolated_sessions,
        ));

        let isolated = IsolatedSessionFetcher::new(
            launcher,
            config.source.detail_url.clone(),
            Duration::from_secs(config.fetcher.page_timeout_secs),
            Duration::from_millis(config.fetcher.settle_delay_ms),
        );
        let structured = StructuredQueryFetcher::new(client, &config.source, request_timeout);

        Ok(Self::new(Arc::new(isolated), Arc::new(structured)))
    }

    /// Returns the fetcher for a job's options
    pub fn select(&self, options: &JobOptions) -> Arc<dyn Fetcher> {
        if options.use_structured_api {
            Arc::clone(&self.structured)
        } else {
            Arc::clone(&self.isolated)
        }
    }
}

/// Builds an HTTP client with the configured user agent
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}
