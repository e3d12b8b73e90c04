//! Page fetching over HTTP, from files, and from stdin.
//!
//! [`HttpTransport`] is the reqwest-backed [`Transport`]: one client with a
//! shared cookie jar serves the login, the article fetch and the logout, so
//! session and CSRF cookies carry over between them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode, redirect};
use url::Url;

use crate::parse::{Document, compile_selector};
use crate::session::{LoginRequest, LoginResponse, Transport};
use crate::{GleanerError, Result};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 Gleaner/0.1".to_string(),
            max_redirects: 10,
        }
    }
}

/// The reqwest [`Transport`].
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    config: FetchConfig,
    basic: RwLock<HashMap<String, (String, String)>>,
}

impl HttpTransport {
    /// Builds a client with its own cookie jar.
    ///
    /// # Errors
    ///
    /// [`GleanerError::HttpError`] when the TLS backend cannot be initialised.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .timeout(Duration::from_secs(config.timeout))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self { client, config, basic: RwLock::new(HashMap::new()) })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn basic_for(&self, origin: &str) -> Option<(String, String)> {
        let basic = self.basic.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        basic.get(origin).cloned()
    }

    fn send_error(&self, error: reqwest::Error) -> GleanerError {
        if error.is_timeout() {
            GleanerError::Timeout { timeout: self.config.timeout }
        } else {
            GleanerError::FetchFailed(error.to_string())
        }
    }
}

fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| GleanerError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GleanerError::InvalidUrl(format!("{url}: URL must use http:// or https://")));
    }
    Ok(parsed)
}

/// Text of every `selector` match in `html`, trimmed; `None` when empty.
fn selected_text(html: &str, selector: &str) -> Option<String> {
    let selector = match compile_selector(selector) {
        Ok(selector) => selector,
        Err(e) => {
            tracing::warn!(error = %e, "invalid login response selector");
            return None;
        }
    };
    let doc = Document::parse(html);
    let text: String = doc.html().select(&selector).flat_map(|el| el.text()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = parse_http_url(url)?;
        let origin = parsed.origin().ascii_serialization();

        let mut request = self
            .client
            .get(parsed)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header("Upgrade-Insecure-Requests", "1");
        if let Some((username, password)) = self.basic_for(&origin) {
            tracing::debug!(%origin, "sending basic credentials");
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(|e| self.send_error(e))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(url, "server requires credentials");
            return Err(GleanerError::AuthRequired { domain: origin });
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(GleanerError::FetchFailed(format!("HTTP {status} for {url}")));
        }

        response.text().await.map_err(|e| self.send_error(e))
    }

    async fn submit_login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let target = parse_http_url(&request.login_url)?;
        let form: Vec<(&str, &str)> = request.fields.iter().map(|f| (f.name.as_str(), f.value.as_str())).collect();
        tracing::debug!(target_url = %target, fields = form.len(), "submitting login form");

        let response = self
            .client
            .post(target.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ORIGIN, target.origin().ascii_serialization())
            .header(REFERER, target.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        let success = status.is_success() || status.is_redirection();
        let extracted_text = match request.response_selector.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(selector) => match response.text().await {
                Ok(body) => selected_text(&body, selector),
                Err(e) => {
                    tracing::debug!(error = %e, "could not read login response body");
                    None
                }
            },
            None => None,
        };

        Ok(LoginResponse {
            success,
            status_code: Some(status.as_u16()),
            message: Some(format!("Status: {status}")),
            extracted_text,
        })
    }

    async fn logout(&self, url: &str) -> Result<()> {
        let parsed = parse_http_url(url)?;
        let response = self.client.get(parsed).send().await.map_err(|e| self.send_error(e))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(GleanerError::FetchFailed(format!("logout returned HTTP {status}")));
        }
        Ok(())
    }

    fn set_basic_auth(&self, origin: &str, username: &str, password: &str) {
        let mut basic = self.basic.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        basic.insert(origin.to_string(), (username.to_string(), password.to_string()));
    }
}

/// Reads HTML content from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
