use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::crypto::{EncryptedSecret, decrypt_password, encrypt_password};
use crate::selectors::SelectorItem;

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

/// An extra login form field. An empty `value` is resolved from the login
/// page (CSRF tokens and similar hidden inputs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraField {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl ExtraField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    /// Whether the value must be read from the login page.
    pub fn is_dynamic(&self) -> bool {
        self.value.is_empty()
    }
}

/// A site login descriptor with the password in clear. Only ever held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAuthConfig {
    pub login_url: String,
    pub username_field: String,
    pub password_field: String,
    pub username: String,
    pub password: String,
    pub extra_fields: Vec<ExtraField>,
    /// Selector whose text confirms a successful login.
    pub response_selector: Option<String>,
    pub logout_url: Option<String>,
}

impl FeedAuthConfig {
    pub fn new(login_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            username_field: default_username_field(),
            password_field: default_password_field(),
            username: username.into(),
            password: password.into(),
            extra_fields: Vec::new(),
            response_selector: None,
            logout_url: None,
        }
    }
}

/// The persisted login descriptor. The password only exists encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuthConfig {
    pub login_url: String,
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
    pub username: String,
    #[serde(default)]
    pub extra_fields: Vec<ExtraField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    pub encrypted: EncryptedSecret,
}

impl StoredAuthConfig {
    /// Encrypts the password of `auth` under `master`.
    pub fn seal(auth: &FeedAuthConfig, master: &str) -> Result<Self> {
        Ok(Self {
            login_url: auth.login_url.clone(),
            username_field: auth.username_field.clone(),
            password_field: auth.password_field.clone(),
            username: auth.username.clone(),
            extra_fields: auth.extra_fields.clone(),
            response_selector: auth.response_selector.clone(),
            logout_url: auth.logout_url.clone(),
            encrypted: encrypt_password(&auth.password, master)?,
        })
    }

    /// Decrypts into the in-memory form.
    pub fn unseal(&self, master: &str) -> Result<FeedAuthConfig> {
        Ok(FeedAuthConfig {
            login_url: self.login_url.clone(),
            username_field: self.username_field.clone(),
            password_field: self.password_field.clone(),
            username: self.username.clone(),
            password: decrypt_password(&self.encrypted, master)?,
            extra_fields: self.extra_fields.clone(),
            response_selector: self.response_selector.clone(),
            logout_url: self.logout_url.clone(),
        })
    }
}

/// Per-feed extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSelectorConfig {
    pub feed_id: String,
    #[serde(default)]
    pub selectors: Vec<SelectorItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<StoredAuthConfig>,
    /// Unix milliseconds of the last change.
    #[serde(default)]
    pub updated_at: u64,
}

impl FeedSelectorConfig {
    pub fn new(feed_id: impl Into<String>) -> Self {
        Self { feed_id: feed_id.into(), selectors: Vec::new(), custom_css: None, auth_config: None, updated_at: 0 }
    }

    /// Whether selector mode has anything to work with.
    pub fn has_selector_content(&self) -> bool {
        !self.selectors.is_empty() || self.custom_css.as_deref().is_some_and(|css| !css.trim().is_empty())
    }

    /// Sorts rules by `order` and renumbers them contiguously from 0.
    pub fn normalize_order(&mut self) {
        self.selectors.sort_by_key(|item| item.order);
        self.renumber();
    }

    /// Renumbers rules by their position.
    pub fn renumber(&mut self) {
        for (i, item) in self.selectors.iter_mut().enumerate() {
            item.order = i;
        }
    }

    /// Bumps `updated_at`, strictly increasing even within one millisecond.
    pub fn touch(&mut self) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
        self.updated_at = now.max(self.updated_at + 1);
    }
}
