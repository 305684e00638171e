use serde::Deserialize;

/// Main configuration structure for Match-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub job: JobConfig,
    pub output: OutputConfig,
}

/// Client identification sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the client
    #[serde(rename = "client-name")]
    pub client_name: String,

    /// Version of the client
    #[serde(rename = "client-version")]
    pub client_version: String,

    /// Email address for operator contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+mailto:{})",
            self.client_name, self.client_version, self.contact_email
        )
    }
}

/// Remote source locations
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Detail view URL template, `{id}` is replaced by the match identifier
    #[serde(rename = "detail-url")]
    pub detail_url: String,

    /// Structured query endpoint
    #[serde(rename = "query-url")]
    pub query_url: String,

    /// Version token sent with structured queries
    #[serde(rename = "query-version", default = "default_query_version")]
    pub query_version: String,

    /// Source system name sent with structured queries
    #[serde(rename = "source-system", default = "default_source_system")]
    pub source_system: String,

    /// Whether isolated browsing sessions may be opened at all
    #[serde(rename = "isolated-sessions", default = "default_true")]
    pub isolated_sessions: bool,
}

/// Fetch strategy timing
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Hard timeout for one isolated-session extraction (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Delay after the page reports loaded, before extraction (milliseconds)
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// HTTP timeout for structured queries (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: default_page_timeout(),
            settle_delay_ms: default_settle_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Defaults for new jobs
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Delay between the completion of one item and the start of the next (milliseconds)
    #[serde(rename = "interval-ms", default = "default_interval")]
    pub interval_ms: u64,

    /// Write the full result set every this many completions
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u32,

    #[serde(rename = "include-events", default = "default_true")]
    pub include_events: bool,

    #[serde(rename = "include-timeline", default)]
    pub include_timeline: bool,

    #[serde(rename = "include-ratings", default = "default_true")]
    pub include_ratings: bool,

    #[serde(rename = "use-structured-api", default)]
    pub use_structured_api: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            checkpoint_every: default_checkpoint_every(),
            include_events: true,
            include_timeline: false,
            include_ratings: true,
            use_structured_api: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the progress checkpoint file
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Path to the accumulated results file
    #[serde(rename = "results-path")]
    pub results_path: String,
}

fn default_query_version() -> String {
    "3.0".to_string()
}

fn default_source_system() -> String {
    "hattrick".to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_timeout() -> u64 {
    30
}

fn default_settle_delay() -> u64 {
    1500
}

fn default_request_timeout() -> u64 {
    20
}

fn default_interval() -> u64 {
    2000
}

fn default_checkpoint_every() -> u32 {
    10
}
