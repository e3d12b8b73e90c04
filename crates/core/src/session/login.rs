//! Login form discovery.
//!
//! The login page is fetched before submitting so the POST goes to the
//! form's real `action` and per-session hidden values (CSRF tokens) can be
//! copied into the request.

use url::Url;

use super::transport::{LoginField, LoginRequest};
use crate::config::FeedAuthConfig;
use crate::parse::{Document, Element};

/// The POST target of the first form holding a password input, resolved
/// against the login page URL. Falls back to the login page URL.
pub fn login_form_target(page: &Document, login_url: &str) -> String {
    let action = page
        .select("form")
        .unwrap_or_default()
        .into_iter()
        .find(has_password_input)
        .and_then(|form| form.attr("action"))
        .map(str::trim)
        .filter(|action| !action.is_empty());

    let Some(action) = action else {
        return login_url.to_string();
    };
    match Url::parse(login_url).and_then(|base| base.join(action)) {
        Ok(target) => target.to_string(),
        Err(e) => {
            tracing::debug!(action, error = %e, "unresolvable login form action");
            login_url.to_string()
        }
    }
}

fn has_password_input(form: &Element<'_>) -> bool {
    form.select("input")
        .unwrap_or_default()
        .iter()
        .any(|input| input.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("password")))
}

/// Current value of the form control called `name` on the page.
pub fn form_value(page: &Document, name: &str) -> Option<String> {
    let control = page
        .select("input, textarea, select")
        .unwrap_or_default()
        .into_iter()
        .find(|el| el.attr("name") == Some(name))?;

    if control.is("textarea") {
        return Some(control.text());
    }
    if control.is("select") {
        let options = control.select("option").unwrap_or_default();
        let chosen = options.iter().find(|o| o.has_attr("selected")).or(options.first())?;
        return Some(chosen.attr("value").map(str::to_string).unwrap_or_else(|| chosen.text().trim().to_string()));
    }
    Some(control.attr("value").unwrap_or_default().to_string())
}

/// Builds the login submission from `auth` and the fetched login page.
///
/// Extra fields with an empty value are read from the page; a field the page
/// does not have is submitted empty.
pub fn resolve_login_request(auth: &FeedAuthConfig, login_page: &str) -> LoginRequest {
    let page = Document::parse(login_page);
    let mut fields = vec![
        LoginField::new(&auth.username_field, &auth.username),
        LoginField::new(&auth.password_field, &auth.password),
    ];

    for extra in &auth.extra_fields {
        let value = if extra.is_dynamic() {
            form_value(&page, &extra.name).unwrap_or_else(|| {
                tracing::debug!(field = %extra.name, "dynamic login field not found on login page");
                String::new()
            })
        } else {
            extra.value.clone()
        };
        fields.push(LoginField::new(&extra.name, value));
    }

    LoginRequest {
        login_url: login_form_target(&page, &auth.login_url),
        fields,
        response_selector: auth.response_selector.clone().filter(|s| !s.trim().is_empty()),
    }
}
