//! Strategy A: isolated-session page extraction

use crate::config::ID_PLACEHOLDER;
use crate::fetch::extract::extract_match;
use crate::fetch::session::{SessionGuard, SessionLauncher};
use crate::fetch::{FetchError, Fetcher, RawMatch, Strategy};
use crate::state::JobOptions;
use crate::AcquisitionError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Renders each match's detail view in a fresh isolated session
pub struct IsolatedSessionFetcher {
    launcher: Arc<dyn SessionLauncher>,
    detail_url: String,
    page_timeout: Duration,
    settle_delay: Duration,
}

impl IsolatedSessionFetcher {
    /// Creates a new fetcher
    ///
    /// # Arguments
    ///
    /// * `launcher` - Opens the isolated sessions
    /// * `detail_url` - Detail view template containing `{id}`
    /// * `page_timeout` - Hard bound on navigation, load, settle and extraction
    /// * `settle_delay` - Pause after the load signal before reading the page
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        detail_url: String,
        page_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            launcher,
            detail_url,
            page_timeout,
            settle_delay,
        }
    }

    fn detail_url(&self, match_id: u64) -> Result<Url, AcquisitionError> {
        let url = self
            .detail_url
            .replace(ID_PLACEHOLDER, &match_id.to_string());
        Url::parse(&url).map_err(|e| AcquisitionError::Navigation {
            url,
            message: e.to_string(),
        })
    }

    async fn load_and_extract(
        &self,
        guard: &mut SessionGuard,
        url: &Url,
        match_id: u64,
        options: &JobOptions,
    ) -> Result<RawMatch, FetchError> {
        let session = guard.session()?;
        session.navigate(url).await?;
        session.wait_until_loaded().await?;
        tokio::time::sleep(self.settle_delay).await;
        let html = session.content().await?;
        extract_match(&html, match_id, options)
    }
}

#[async_trait]
impl Fetcher for IsolatedSessionFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::IsolatedSession
    }

    /// Opens and immediately closes one session
    async fn preflight(&self) -> Result<(), FetchError> {
        let session = self.launcher.launch().await?;
        SessionGuard::new(session, "preflight").close().await;
        Ok(())
    }

    async fn fetch(&self, match_id: u64, options: &JobOptions) -> Result<RawMatch, FetchError> {
        let url = self.detail_url(match_id)?;

        // Creation failures are systemic and not subject to the page timeout
        let session = self.launcher.launch().await?;
        let mut guard = SessionGuard::new(session, format!("match {}", match_id));

        let outcome = tokio::time::timeout(
            self.page_timeout,
            self.load_and_extract(&mut guard, &url, match_id, options),
        )
        .await;

        guard.close().await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Match {} timed out after {:?}", match_id, self.page_timeout);
                Err(AcquisitionError::Timeout {
                    url: url.to_string(),
                    secs: self.page_timeout.as_secs(),
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::session::BrowserSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<html><body>
        <div class="match-header">
            <a class="team-home" href="/Club/?TeamID=1">Alpha</a>
            <a class="team-away" href="/Club/?TeamID=2">Beta</a>
        </div>
    </body></html>"#;

    #[derive(Clone, Copy)]
    enum Behavior {
        Serve(&'static str),
        Hang,
        FailNavigation,
    }

    struct FakeSession {
        behavior: Behavior,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, url: &Url) -> Result<(), AcquisitionError> {
            match self.behavior {
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behavior::FailNavigation => Err(AcquisitionError::Navigation {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                }),
                Behavior::Serve(_) => Ok(()),
            }
        }

        async fn wait_until_loaded(&mut self) -> Result<(), AcquisitionError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, AcquisitionError> {
            match self.behavior {
                Behavior::Serve(html) => Ok(html.to_string()),
                _ => Ok(String::new()),
            }
        }

        async fn close(self: Box<Self>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeLauncher {
        behavior: Option<Behavior>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquisitionError> {
            match self.behavior {
                Some(behavior) => Ok(Box::new(FakeSession {
                    behavior,
                    closes: Arc::clone(&self.closes),
                })),
                None => Err(AcquisitionError::SessionUnavailable(
                    "private browsing disabled".to_string(),
                )),
            }
        }
    }

    fn fetcher(behavior: Option<Behavior>) -> (IsolatedSessionFetcher, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(FakeLauncher {
            behavior,
            closes: Arc::clone(&closes),
        });
        let fetcher = IsolatedSessionFetcher::new(
            launcher,
            "https://www.example.org/Match.aspx?matchID={id}".to_string(),
            Duration::from_secs(30),
            Duration::from_millis(10),
        );
        (fetcher, closes)
    }

    fn options() -> JobOptions {
        JobOptions::default()
    }

    #[tokio::test]
    async fn test_success_closes_session_once() {
        let (fetcher, closes) = fetcher(Some(Behavior::Serve(PAGE)));

        let raw = fetcher.fetch(42, &options()).await.unwrap();

        assert_eq!(raw.strategy, Strategy::IsolatedSession);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_closes_session_once() {
        let (fetcher, closes) = fetcher(Some(Behavior::Hang));

        let result = fetcher.fetch(42, &options()).await;

        assert!(matches!(
            result,
            Err(FetchError::Acquisition(AcquisitionError::Timeout { secs: 30, .. }))
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_closes_session_once() {
        let (fetcher, closes) = fetcher(Some(Behavior::FailNavigation));

        let result = fetcher.fetch(42, &options()).await;

        assert!(matches!(
            result,
            Err(FetchError::Acquisition(AcquisitionError::Navigation { .. }))
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_closes_session_once() {
        let (fetcher, closes) = fetcher(Some(Behavior::Serve("<html></html>")));

        let result = fetcher.fetch(42, &options()).await;

        assert!(matches!(
            result,
            Err(FetchError::Acquisition(AcquisitionError::Blocked { id: 42 }))
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_systemic() {
        let (fetcher, closes) = fetcher(None);

        let result = fetcher.fetch(42, &options()).await;
        assert!(result.unwrap_err().is_systemic());

        let preflight = fetcher.preflight().await;
        assert!(preflight.unwrap_err().is_systemic());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detail_url_substitution() {
        let (fetcher, _) = fetcher(None);
        let url = fetcher.detail_url(123).unwrap();
        assert_eq!(url.query(), Some("matchID=123"));
    }
}
