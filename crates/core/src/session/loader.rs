use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::credentials::{BasicCredentialSource, MemoryCredentials};
use super::login::resolve_login_request;
use super::slot::{LoadTicket, ViewSlot};
use super::transport::{Transport, origin_of};
use crate::GleanerError;
use crate::article::{ArticleContent, fragment_text};
use crate::config::{ConfigStore, FeedAuthConfig, FeedSelectorConfig, KeyValueBackend};
use crate::parse::Document;
use crate::readability::{ExtractOptions, Readability};
use crate::refine::refine_article;
use crate::selectors::resolve_selector_content;

/// Extractions with fewer characters of text count as empty.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Which engine turns the fetched page into content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Readability,
    Selectors,
}

/// Progress of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    ResolvingConfig,
    LoggingIn,
    FetchingAfterLogin,
    Fetching,
    Extracting,
    PostProcessing,
    LoggingOut,
    Done,
    /// Superseded by a newer load of the same slot.
    Aborted,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadState::Idle => "idle",
            LoadState::ResolvingConfig => "resolving feed configuration",
            LoadState::LoggingIn => "logging in",
            LoadState::FetchingAfterLogin => "fetching after login",
            LoadState::Fetching => "fetching",
            LoadState::Extracting => "extracting",
            LoadState::PostProcessing => "recovering images",
            LoadState::LoggingOut => "logging out",
            LoadState::Done => "done",
            LoadState::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// What gets displayed for a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleView {
    pub title: Option<String>,
    pub byline: Option<String>,
    /// HTML fragment.
    pub content: String,
    /// Characters of readable text in `content`.
    pub length: usize,
    pub custom_css: Option<String>,
    pub mode: ExtractionMode,
}

impl ArticleView {
    fn from_article(article: ArticleContent, custom_css: Option<String>) -> Self {
        Self {
            title: Some(article.title),
            byline: article.byline,
            content: article.content,
            length: article.length,
            custom_css,
            mode: ExtractionMode::Readability,
        }
    }
}

/// Receives the visible effects of the current load of a slot. Superseded
/// loads never call it.
pub trait ViewSink: Send + Sync {
    fn on_state(&self, _state: LoadState) {}
    fn show_content(&self, view: &ArticleView);
    fn show_error(&self, error: &GleanerError);
    /// The site asked for credentials; `domain` is `scheme://host`.
    fn request_credentials(&self, domain: &str);
}

/// Everything a [`RecordingSink`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    State(LoadState),
    Content(ArticleView),
    Error(String),
    Credentials(String),
}

/// A [`ViewSink`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn states(&self) -> Vec<LoadState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn contents(&self) -> Vec<ArticleView> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Content(view) => Some(view),
                _ => None,
            })
            .collect()
    }
}

impl ViewSink for RecordingSink {
    fn on_state(&self, state: LoadState) {
        self.push(SinkEvent::State(state));
    }

    fn show_content(&self, view: &ArticleView) {
        self.push(SinkEvent::Content(view.clone()));
    }

    fn show_error(&self, error: &GleanerError) {
        self.push(SinkEvent::Error(error.to_string()));
    }

    fn request_credentials(&self, domain: &str) {
        self.push(SinkEvent::Credentials(domain.to_string()));
    }
}

/// One article to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub feed_id: String,
    pub url: String,
    pub mode: ExtractionMode,
    /// Unlocks the feed's stored login; without it the page is fetched
    /// anonymously.
    pub master_secret: Option<String>,
}

impl LoadRequest {
    pub fn new(feed_id: impl Into<String>, url: impl Into<String>, mode: ExtractionMode) -> Self {
        Self { feed_id: feed_id.into(), url: url.into(), mode, master_secret: None }
    }

    pub fn with_master_secret(mut self, secret: impl Into<String>) -> Self {
        self.master_secret = Some(secret.into());
        self
    }
}

/// How a load ended.
#[derive(Debug)]
pub enum LoadOutcome {
    Displayed(ArticleView),
    Failed(GleanerError),
    /// The site wants interactive credentials for this domain.
    CredentialsNeeded(String),
    /// A newer load of the same slot took over; nothing was displayed.
    Superseded,
}

impl LoadOutcome {
    pub fn is_displayed(&self) -> bool {
        matches!(self, LoadOutcome::Displayed(_))
    }
}

/// Visible side of one load; every effect is dropped once the load is stale.
struct Run<'a> {
    slot: &'a ViewSlot,
    ticket: LoadTicket,
    sink: &'a dyn ViewSink,
}

impl Run<'_> {
    fn is_current(&self) -> bool {
        self.slot.is_current(self.ticket)
    }

    fn enter(&self, state: LoadState) {
        if self.is_current() {
            tracing::debug!(generation = self.ticket.generation(), %state, "load state");
            self.sink.on_state(state);
        }
    }

    fn superseded(&self) -> LoadOutcome {
        tracing::debug!(generation = self.ticket.generation(), state = %LoadState::Aborted, "load superseded");
        LoadOutcome::Superseded
    }

    fn fail(&self, error: GleanerError) -> LoadOutcome {
        if !self.is_current() {
            return self.superseded();
        }
        self.sink.show_error(&error);
        LoadOutcome::Failed(error)
    }
}

/// Runs the login, fetch, extract and logout cycle for a view slot.
///
/// Every network step is followed by a stale check: once a newer load of the
/// same slot has started, this one finishes its in-flight request, skips the
/// logout and returns [`LoadOutcome::Superseded`] without touching the sink.
pub struct ArticleLoader<T: Transport, B: KeyValueBackend> {
    transport: Arc<T>,
    store: Arc<ConfigStore<B>>,
    credentials: Arc<dyn BasicCredentialSource>,
    slot: ViewSlot,
    reader: Readability,
}

impl<T: Transport, B: KeyValueBackend> ArticleLoader<T, B> {
    pub fn new(transport: Arc<T>, store: Arc<ConfigStore<B>>) -> Self {
        Self {
            transport,
            store,
            credentials: Arc::new(MemoryCredentials::new()),
            slot: ViewSlot::new(),
            reader: Readability::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn BasicCredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_reader(mut self, reader: Readability) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_slot(mut self, slot: ViewSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn slot(&self) -> &ViewSlot {
        &self.slot
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Loads one article into the slot, superseding any load in progress.
    pub async fn load(&self, request: &LoadRequest, sink: &dyn ViewSink) -> LoadOutcome {
        let run = Run { slot: &self.slot, ticket: self.slot.begin(), sink };
        tracing::debug!(feed_id = %request.feed_id, url = %request.url, generation = run.ticket.generation(), "starting load");

        run.enter(LoadState::ResolvingConfig);
        let config = self.store.get(&request.feed_id).unwrap_or_else(|| FeedSelectorConfig::new(&request.feed_id));
        if request.mode == ExtractionMode::Selectors && !config.has_selector_content() {
            return run.fail(GleanerError::NoSelectorConfig);
        }
        let origin = match origin_of(&request.url) {
            Ok(origin) => origin,
            Err(e) => return run.fail(e),
        };
        let auth = self.store.load_auth_config(&request.feed_id, request.master_secret.as_deref());

        if let Some(auth) = &auth {
            run.enter(LoadState::LoggingIn);
            self.login(auth, &run).await;
            if !run.is_current() {
                return run.superseded();
            }
        }

        if let Some(basic) = self.credentials.basic_credentials(&origin) {
            tracing::debug!(%origin, "applying stored basic credentials");
            self.transport.set_basic_auth(&origin, &basic.username, &basic.password);
        }

        run.enter(if auth.is_some() { LoadState::FetchingAfterLogin } else { LoadState::Fetching });
        let fetched = self.transport.fetch_html(&request.url).await;
        if !run.is_current() {
            return run.superseded();
        }

        let outcome = match fetched {
            Ok(html) => self.extract(&html, request, &config, &run),
            Err(GleanerError::AuthRequired { domain }) => LoadOutcome::CredentialsNeeded(domain),
            Err(e @ GleanerError::FetchFailed(_)) => LoadOutcome::Failed(e),
            Err(e) => LoadOutcome::Failed(GleanerError::FetchFailed(e.to_string())),
        };

        match &outcome {
            LoadOutcome::Displayed(view) => sink.show_content(view),
            LoadOutcome::Failed(error) => sink.show_error(error),
            LoadOutcome::CredentialsNeeded(domain) => {
                tracing::info!(%domain, "site requires credentials");
                sink.request_credentials(domain);
            }
            LoadOutcome::Superseded => {}
        }

        if let Some(logout_url) = auth.as_ref().and_then(|a| a.logout_url.as_deref()) {
            self.logout(logout_url, &run).await;
        }
        run.enter(LoadState::Done);
        outcome
    }

    /// Best-effort form login; failures are logged and the load goes on.
    async fn login(&self, auth: &FeedAuthConfig, run: &Run<'_>) {
        let page = self.transport.fetch_html(&auth.login_url).await;
        if !run.is_current() {
            return;
        }
        let page = page.unwrap_or_else(|e| {
            tracing::warn!(login_url = %auth.login_url, error = %e, "could not fetch login page");
            String::new()
        });

        let request = resolve_login_request(auth, &page);
        match self.transport.submit_login(&request).await {
            Ok(response) if response.success => {
                tracing::info!(
                    target_url = %request.login_url,
                    status = ?response.status_code,
                    extracted = ?response.extracted_text,
                    "login succeeded"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    target_url = %request.login_url,
                    status = ?response.status_code,
                    message = ?response.message,
                    "login rejected, fetching anyway"
                );
            }
            Err(e) => tracing::warn!(target_url = %request.login_url, error = %e, "login failed, fetching anyway"),
        }
    }

    async fn logout(&self, logout_url: &str, run: &Run<'_>) {
        if !run.is_current() {
            tracing::debug!(logout_url, "skipping logout for superseded load");
            return;
        }
        run.enter(LoadState::LoggingOut);
        if let Err(e) = self.transport.logout(logout_url).await {
            tracing::warn!(logout_url, error = %e, "logout failed");
        }
    }

    fn extract(&self, html: &str, request: &LoadRequest, config: &FeedSelectorConfig, run: &Run<'_>) -> LoadOutcome {
        run.enter(LoadState::Extracting);
        match request.mode {
            ExtractionMode::Readability => {
                let options = ExtractOptions::with_url(&request.url);
                let base = options.base_url();
                let prepared = self.reader.prepare(html, base.as_ref());
                let article = match self.reader.extract_prepared(&prepared, &options) {
                    Some(article) if article.length >= MIN_CONTENT_CHARS => article,
                    _ => return LoadOutcome::Failed(GleanerError::ReadabilityFailed),
                };

                run.enter(LoadState::PostProcessing);
                let article = refine_article(article, &prepared, base.as_ref());
                LoadOutcome::Displayed(ArticleView::from_article(article, config.custom_css.clone()))
            }
            ExtractionMode::Selectors => {
                let content = match resolve_selector_content(html, config) {
                    Ok(content) => content.into_html(),
                    Err(e) => return LoadOutcome::Failed(e),
                };
                let length = fragment_text(&content).chars().count();
                if length < MIN_CONTENT_CHARS {
                    return LoadOutcome::Failed(GleanerError::SelectorsNoContent);
                }
                LoadOutcome::Displayed(ArticleView {
                    title: Document::parse(html).title(),
                    byline: None,
                    content,
                    length,
                    custom_css: config.custom_css.clone(),
                    mode: ExtractionMode::Selectors,
                })
            }
        }
    }
}
