//! Isolated browsing sessions
//!
//! A session is opened per match, used for one navigation and torn down
//! afterwards. [`SessionGuard`] owns the session so teardown happens exactly
//! once on every exit path:
//! 1. Explicit async [`SessionGuard::close`] on the normal path
//! 2. `Drop` fallback that spawns the close on the runtime (timeouts, panics,
//!    early returns)

use crate::config::UserAgentConfig;
use crate::AcquisitionError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// A single isolated browsing context
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates to the detail view
    async fn navigate(&mut self, url: &Url) -> Result<(), AcquisitionError>;

    /// Resolves once the page reports it finished loading
    async fn wait_until_loaded(&mut self) -> Result<(), AcquisitionError>;

    /// Returns the rendered document
    async fn content(&mut self) -> Result<String, AcquisitionError>;

    /// Tears the context down, discarding its cookies and storage
    async fn close(self: Box<Self>);
}

/// Opens new isolated sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Opens a fresh session that shares nothing with previous ones
    ///
    /// A failure here means sessions cannot be created at all and is reported
    /// as [`AcquisitionError::SessionUnavailable`].
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquisitionError>;
}

/// Owns a session and guarantees it is closed once
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    label: String,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>, label: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            label: label.into(),
        }
    }

    /// The live session
    ///
    /// Only fails if the session was already handed back for closing.
    pub fn session(&mut self) -> Result<&mut dyn BrowserSession, AcquisitionError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(AcquisitionError::SessionUnavailable(format!(
                "session for {} already closed",
                self.label
            ))),
        }
    }

    /// Closes the session, consuming the guard
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
            tracing::trace!("Session closed for {}", self.label);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let label = std::mem::take(&mut self.label);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        session.close().await;
                        tracing::trace!("Session closed on drop for {}", label);
                    });
                }
                Err(_) => {
                    tracing::warn!("Session for {} dropped outside a runtime", label);
                }
            }
        }
    }
}

/// Launches sessions backed by a fresh HTTP client with its own cookie jar
///
/// Each session starts with an empty jar, so nothing leaks from the
/// operator's own browsing or between matches.
pub struct HttpSessionLauncher {
    user_agent: UserAgentConfig,
    enabled: bool,
}

impl HttpSessionLauncher {
    pub fn new(user_agent: UserAgentConfig, enabled: bool) -> Self {
        Self {
            user_agent,
            enabled,
        }
    }
}

#[async_trait]
impl SessionLauncher for HttpSessionLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquisitionError> {
        if !self.enabled {
            return Err(AcquisitionError::SessionUnavailable(
                "isolated sessions are disabled in configuration".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(self.user_agent.header_value())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| AcquisitionError::SessionUnavailable(e.to_string()))?;

        Ok(Box::new(HttpSession {
            client,
            current: None,
            document: None,
        }))
    }
}

struct HttpSession {
    client: Client,
    current: Option<Url>,
    document: Option<String>,
}

impl HttpSession {
    fn current_url(&self) -> String {
        self.current
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "about:blank".to_string())
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), AcquisitionError> {
        self.current = Some(url.clone());
        self.document = None;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AcquisitionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AcquisitionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        self.document = Some(body);
        Ok(())
    }

    async fn wait_until_loaded(&mut self) -> Result<(), AcquisitionError> {
        // The body is read in full by navigate, which is the load signal here
        match self.document {
            Some(_) => Ok(()),
            None => Err(AcquisitionError::Navigation {
                url: self.current_url(),
                message: "no document loaded".to_string(),
            }),
        }
    }

    async fn content(&mut self) -> Result<String, AcquisitionError> {
        self.document
            .clone()
            .ok_or_else(|| AcquisitionError::Navigation {
                url: self.current_url(),
                message: "no document loaded".to_string(),
            })
    }

    async fn close(self: Box<Self>) {
        tracing::trace!("Discarding session for {}", self.current_url());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_agent() -> UserAgentConfig {
        UserAgentConfig {
            client_name: "TestHarvester".to_string(),
            client_version: "1.0".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    struct CountingSession {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for CountingSession {
        async fn navigate(&mut self, _url: &Url) -> Result<(), AcquisitionError> {
            Ok(())
        }

        async fn wait_until_loaded(&mut self) -> Result<(), AcquisitionError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, AcquisitionError> {
            Ok(String::new())
        }

        async fn close(self: Box<Self>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_explicit_close_runs_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = SessionGuard::new(
            Box::new(CountingSession {
                closes: Arc::clone(&closes),
            }),
            "match 1",
        );

        guard.close().await;
        tokio::task::yield_now().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_closes_session() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _guard = SessionGuard::new(
                Box::new(CountingSession {
                    closes: Arc::clone(&closes),
                }),
                "match 2",
            );
        }

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_launcher_is_unavailable() {
        let launcher = HttpSessionLauncher::new(user_agent(), false);
        let result = launcher.launch().await;
        assert!(matches!(
            result,
            Err(AcquisitionError::SessionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_http_session_loads_document() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/match"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let launcher = HttpSessionLauncher::new(user_agent(), true);
        let mut session = launcher.launch().await.unwrap();
        let url = Url::parse(&format!("{}/match", mock_server.uri())).unwrap();

        session.navigate(&url).await.unwrap();
        session.wait_until_loaded().await.unwrap();
        assert_eq!(session.content().await.unwrap(), "<html>ok</html>");
        session.close().await;
    }

    #[tokio::test]
    async fn test_http_session_reports_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let launcher = HttpSessionLauncher::new(user_agent(), true);
        let mut session = launcher.launch().await.unwrap();
        let url = Url::parse(&format!("{}/match", mock_server.uri())).unwrap();

        let result = session.navigate(&url).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::Http { status: 503, .. })
        ));
        assert!(session.wait_until_loaded().await.is_err());
    }
}
