use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{GleanerError, Result};

/// One submitted form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginField {
    pub name: String,
    pub value: String,
}

impl LoginField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A form login to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// POST target.
    pub login_url: String,
    pub fields: Vec<LoginField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_selector: Option<String>,
}

impl LoginRequest {
    /// Value of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}

/// Outcome of a form login.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Text of the `response_selector` matches in the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

/// The network side of a load.
///
/// Implementations share one session (cookies, Basic credentials) across
/// every call so a login carries over to the fetch and the logout.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches a page body.
    ///
    /// # Errors
    ///
    /// [`GleanerError::AuthRequired`] when the site asks for interactive
    /// credentials; any other error is treated as a fetch failure.
    async fn fetch_html(&self, url: &str) -> Result<String>;

    /// Submits a login form.
    async fn submit_login(&self, request: &LoginRequest) -> Result<LoginResponse>;

    /// Ends the session at `url`.
    async fn logout(&self, url: &str) -> Result<()>;

    /// Sends HTTP Basic credentials on later requests to `origin`.
    fn set_basic_auth(&self, origin: &str, username: &str, password: &str);
}

/// `scheme://host[:port]` of a URL, the key for per-site credentials.
pub fn origin_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| GleanerError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GleanerError::InvalidUrl(format!("{url}: only http and https are supported")));
    }
    Ok(parsed.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        assert_eq!(origin_of("https://news.example.com/a/b?c=d").unwrap(), "https://news.example.com");
        assert_eq!(origin_of("http://127.0.0.1:8080/x").unwrap(), "http://127.0.0.1:8080");
        assert!(matches!(origin_of("not a url"), Err(GleanerError::InvalidUrl(_))));
        assert!(matches!(origin_of("file:///tmp/a.html"), Err(GleanerError::InvalidUrl(_))));
    }

    #[test]
    fn test_login_request_schema() {
        let request = LoginRequest {
            login_url: "https://example.com/login".into(),
            fields: vec![LoginField::new("username", "ada")],
            response_selector: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["loginUrl"], "https://example.com/login");
        assert_eq!(json["fields"][0]["name"], "username");
        assert_eq!(request.field("username"), Some("ada"));
    }
}
