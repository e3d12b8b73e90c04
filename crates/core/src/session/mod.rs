//! The authenticated fetch cycle.
//!
//! [`ArticleLoader`] resolves a feed's configuration, optionally logs in
//! through the page's login form, fetches the article, extracts it with the
//! configured engine and logs out again. Network access goes through the
//! [`Transport`] trait; everything visible goes to a [`ViewSink`].
//!
//! ```text
//! Idle -> ResolvingConfig -> (LoggingIn -> FetchingAfterLogin | Fetching)
//!      -> Extracting -> (PostProcessing) -> LoggingOut -> Done
//! ```
//!
//! A newer load of the same [`ViewSlot`] moves older ones to `Aborted`.

pub mod credentials;
pub mod loader;
pub mod login;
pub mod slot;
pub mod transport;

pub use credentials::{BasicCredentialSource, BasicCredentials, MemoryCredentials};
pub use loader::{
    ArticleLoader, ArticleView, ExtractionMode, LoadOutcome, LoadRequest, LoadState, MIN_CONTENT_CHARS,
    RecordingSink, SinkEvent, ViewSink,
};
pub use login::{form_value, login_form_target, resolve_login_request};
pub use slot::{LoadTicket, ViewSlot};
pub use transport::{LoginField, LoginRequest, LoginResponse, Transport, origin_of};
