use scraper::Html;
use tracing::warn;

use crate::api::ApiError;

/// Hidden fields the login form must echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// One-time token issued with each page load
    pub execution: String,
    /// Per-attempt AES key for the password field
    pub salt: String,
}

/// Extract the login form's hidden fields. `Ok(None)` means the page carries
/// no login form at all, which happens when single sign-on already went through.
pub fn parse_login_form(html: &str) -> Result<Option<LoginForm>, ApiError> {
    let doc = Html::parse_document(html);

    let Some(execution) = doc
        .select(selector!("#execution"))
        .next()
        .and_then(|el| el.value().attr("value"))
    else {
        return Ok(None);
    };

    let salt = doc
        .select(selector!("#pwdEncryptSalt"))
        .next()
        .and_then(|el| el.value().attr("value"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            warn!("Login page has an execution token but no password salt");
            ApiError::malformed("login page", "password salt field missing")
        })?;

    Ok(Some(LoginForm {
        execution: execution.to_string(),
        salt: salt.to_string(),
    }))
}
