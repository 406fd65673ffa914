//! Login state and the token cache.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, WikiError};
use crate::params::{Directives, Params};
use crate::site::Site;

/// Token type used when none is given.
pub const DEFAULT_TOKEN_TYPE: &str = "csrf";

#[derive(Clone)]
pub(crate) struct Credentials {
    user: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity state owned by a [`Site`].
#[derive(Debug, Default)]
pub(crate) struct Session {
    tokens: HashMap<String, String>,
    deferred: Option<Credentials>,
    logged_in: bool,
    is_bot: Option<bool>,
}

impl Session {
    pub(crate) fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub(crate) fn mark_logged_in(&mut self) {
        self.logged_in = true;
        self.deferred = None;
    }
}

impl Site {
    /// Log in with a bot password or account credentials.
    ///
    /// Clears cached tokens. With `on_demand` the credentials are stored and
    /// used by the next call that needs them.
    pub async fn login(&mut self, user: &str, password: &str, on_demand: bool) -> Result<()> {
        self.session.tokens.clear();
        let credentials = Credentials {
            user: user.to_string(),
            password: password.to_string(),
        };

        if on_demand {
            tracing::debug!(code = "login-deferred", user, "Login deferred until first call");
            self.session.deferred = Some(credentials);
            return Ok(());
        }

        self.do_login(credentials).await
    }

    /// Whether a login has succeeded on this site.
    pub fn is_logged_in(&self) -> bool {
        self.session.logged_in
    }

    /// Whether deferred credentials are waiting for the next call.
    pub fn has_pending_login(&self) -> bool {
        self.session.deferred.is_some()
    }

    pub(crate) async fn login_if_pending(&mut self) -> Result<()> {
        match self.session.deferred.clone() {
            Some(credentials) => self.do_login(credentials).await,
            None => Ok(()),
        }
    }

    async fn do_login(&mut self, credentials: Credentials) -> Result<()> {
        self.session.tokens.clear();
        let token = self.fetch_token("login").await?;

        let params = Params::new()
            .with("lgname", credentials.user.as_str())
            .with("lgpassword", credentials.password.as_str())
            .with("lgtoken", token);
        let mut body = self.send_call("login", &params, &Directives::new()).await?;

        let result = match body.get_mut("login").map(Value::take) {
            Some(result) => result,
            None => {
                return Err(WikiError::protocol(
                    "Missing login element in login result",
                    body,
                ))
            }
        };
        if result.get("result").and_then(Value::as_str) != Some("Success") {
            return Err(WikiError::Authentication { payload: result });
        }

        self.session.mark_logged_in();
        tracing::info!(code = "login", user = %credentials.user, api = %self.url(), "Logged in");
        Ok(())
    }

    /// Get a token of the given type (`csrf`, `login`, `watch`, ...).
    ///
    /// Tokens are cached until the next login. Fetching a `login` token never
    /// triggers a deferred login.
    pub async fn token(&mut self, token_type: &str) -> Result<String> {
        if let Some(token) = self.session.tokens.get(token_type) {
            return Ok(token.clone());
        }

        if token_type != "login" {
            self.login_if_pending().await?;
        }

        let token = self.fetch_token(token_type).await?;
        self.session
            .tokens
            .insert(token_type.to_string(), token.clone());
        Ok(token)
    }

    /// Shorthand for the default `csrf` token.
    pub async fn csrf_token(&mut self) -> Result<String> {
        self.token(DEFAULT_TOKEN_TYPE).await
    }

    async fn fetch_token(&self, token_type: &str) -> Result<String> {
        let params = Params::new()
            .with("meta", "tokens")
            .with("type", token_type)
            .with("continue", "");
        let body = self
            .send_call("query", &params, &Directives::new().no_login())
            .await?;

        let key = format!("{token_type}token");
        match body
            .get("query")
            .and_then(|q| q.get("tokens"))
            .and_then(|t| t.get(&key))
            .and_then(Value::as_str)
        {
            Some(token) => Ok(token.to_string()),
            None => Err(WikiError::protocol(
                format!("Missing {key} in tokens response"),
                body,
            )),
        }
    }

    /// Whether the current account has the `bot` right. Checked once.
    pub async fn is_bot(&mut self) -> Result<bool> {
        if let Some(is_bot) = self.session.is_bot {
            return Ok(is_bot);
        }

        let params = Params::new()
            .with("meta", "userinfo")
            .with("uiprop", "rights");
        let body = self.call("query", params).await?;

        let is_bot = match body
            .get("query")
            .and_then(|q| q.get("userinfo"))
            .and_then(|u| u.get("rights"))
            .and_then(Value::as_array)
        {
            Some(rights) => rights.iter().any(|r| r.as_str() == Some("bot")),
            None => {
                return Err(WikiError::protocol(
                    "Missing userinfo rights in query result",
                    body,
                ))
            }
        };
        self.session.is_bot = Some(is_bot);
        Ok(is_bot)
    }
}
