//! Parsing for the SAP login handshake.
//!
//! The init page carries a `#SL__FORM` element whose hidden inputs
//! (notably `sap-login-XSRF`) must be posted back verbatim, and the landing
//! page after login embeds the session hash as ` hash="<32 hex chars>"`.

use super::error::PortalError;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

// Static selectors - compiled once
static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#SL__FORM").unwrap());
static HIDDEN_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[type=hidden]").unwrap());
// The leading space is significant: it disambiguates the single occurrence
// of the marker in the landing page.
static HASH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#" hash="([0-9a-fA-F]{32})""#).unwrap());

/// The login form discovered on the init page.
#[derive(Debug, Clone)]
pub struct LoginForm {
    /// Form action path, relative to the ERP host.
    pub action: String,
    /// Hidden input name/value pairs, in document order.
    pub hidden_fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Assembles the form-encoded POST body by hand.
    ///
    /// Values are deliberately NOT percent-encoded: the `sap-login-XSRF`
    /// token must round-trip byte-identical or the portal rejects the login.
    pub fn post_body(&self, username: &str, password: &str) -> String {
        let mut body = format!("sap-user={}&sap-password={}", username, password);
        for (name, value) in &self.hidden_fields {
            body.push('&');
            body.push_str(name);
            body.push('=');
            body.push_str(value);
        }
        body
    }
}

/// Parses the init page and extracts the login form.
pub fn parse_login_form(html: &str) -> Result<LoginForm, PortalError> {
    let document = Html::parse_document(html);

    let form = document
        .select(&FORM_SELECTOR)
        .next()
        .ok_or_else(|| PortalError::Fetch {
            message: "login form #SL__FORM not found on init page".to_string(),
        })?;

    let action = form
        .value()
        .attr("action")
        .unwrap_or_default()
        .to_string();

    let mut hidden_fields = Vec::new();
    for input in form.select(&HIDDEN_INPUT_SELECTOR) {
        let name = input.value().attr("name").unwrap_or_default();
        let value = input.value().attr("value").unwrap_or_default();
        if !name.is_empty() {
            hidden_fields.push((name.to_string(), value.to_string()));
        }
    }

    Ok(LoginForm {
        action,
        hidden_fields,
    })
}

/// Extracts the 32-character session hash from the landing page body.
///
/// Returns `None` when the marker is absent, which the caller surfaces as
/// an authentication failure.
pub fn extract_session_hash(body: &str) -> Option<String> {
    HASH_REGEX
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
