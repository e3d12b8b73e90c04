pub mod article;
pub mod config;
pub mod crypto;
pub mod dom_tree;
pub mod error;
pub mod extract;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod metadata;
pub mod parse;
pub mod postprocess;
pub mod preprocess;
pub mod present;
pub mod readability;
pub mod refine;
pub mod scoring;
pub mod selectors;
pub mod session;
pub mod urls;

pub use article::{ArticleContent, OutputFormat};
pub use config::{ConfigStore, FeedAuthConfig, FeedSelectorConfig, FileBackend, KeyValueBackend, MemoryBackend};
pub use crypto::{EncryptedSecret, decrypt_password, encrypt_password};
#[doc(hidden)]
pub use dom_tree::DomEdits;
pub use error::{GleanerError, Result};
#[doc(hidden)]
pub use extract::{ExtractConfig, ExtractedContent, extract_content};
#[cfg(feature = "fetch")]
pub use fetch::{FetchConfig, HttpTransport, fetch_file, fetch_stdin};
pub use metadata::Metadata;
pub use parse::Document;
#[doc(hidden)]
pub use postprocess::{PostProcessConfig, postprocess_html};
#[doc(hidden)]
pub use preprocess::{PreprocessConfig, preprocess_html};
pub use present::rewrite_through_proxy;
pub use readability::{
    ExtractOptions, Readability, ReadabilityConfig, ReadabilityConfigBuilder, can_extract_article, extract_article,
};
pub use refine::{refine_article, refine_content};
#[doc(hidden)]
pub use scoring::{ScoreConfig, ScoreResult, calculate_score, link_density};
pub use selectors::{Operation, SelectorItem, SelectorMode, apply_selector_config, resolve_selector_content};
pub use session::{
    ArticleLoader, ArticleView, BasicCredentialSource, BasicCredentials, ExtractionMode, LoadOutcome, LoadRequest,
    LoadState, MemoryCredentials, Transport, ViewSink, ViewSlot,
};
